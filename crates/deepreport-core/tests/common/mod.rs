//! Deterministic fakes recording every call made by the pipeline.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use deepreport_core::{
    EvidenceItem, EvidenceSource, GenerationError, GenerationRequest, Judge, LanguageModel,
    RefinementLoop, ReportComposer, ResearchPipeline, SearchError, Summarizer,
};

type SearchFn = dyn Fn(&str, usize, usize) -> Result<Vec<EvidenceItem>, SearchError> + Send + Sync;

pub fn items(prefix: &str, count: usize) -> Vec<EvidenceItem> {
    (0..count)
        .map(|idx| {
            EvidenceItem::new(
                Some(format!("https://example.com/{prefix}{idx}")),
                Some(format!("{prefix}{idx}")),
                format!("evidence {prefix}{idx}"),
            )
        })
        .collect()
}

pub struct FakeSource {
    respond: Box<SearchFn>,
    calls: Mutex<Vec<(String, usize)>>,
}

impl FakeSource {
    /// `respond(query, call_index, count)`
    pub fn new(
        respond: impl Fn(&str, usize, usize) -> Result<Vec<EvidenceItem>, SearchError>
        + Send
        + Sync
        + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn returning(n: usize) -> Arc<Self> {
        Self::new(move |_, call, _| Ok(items(&format!("c{call}-"), n)))
    }

    pub fn echoing_count() -> Arc<Self> {
        Self::new(|_, call, count| Ok(items(&format!("c{call}-"), count)))
    }

    pub fn empty() -> Arc<Self> {
        Self::new(|_, _, _| Ok(Vec::new()))
    }

    pub fn failing() -> Arc<Self> {
        Self::new(|_, _, _| Err(SearchError::Request("connection reset".to_string())))
    }

    pub fn counts(&self) -> Vec<usize> {
        self.calls.lock().unwrap().iter().map(|(_, c)| *c).collect()
    }

    pub fn queries(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(q, _)| q.clone()).collect()
    }
}

#[async_trait]
impl EvidenceSource for FakeSource {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<EvidenceItem>, SearchError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((query.to_string(), count));
            calls.len() - 1
        };
        (self.respond)(query, call, count)
    }
}

type SummarizeFn = dyn Fn(usize) -> Result<String, GenerationError> + Send + Sync;

pub struct FakeSummarizer {
    respond: Box<SummarizeFn>,
    evidence_sizes: Mutex<Vec<usize>>,
    evidence_urls: Mutex<Vec<Vec<String>>>,
}

impl FakeSummarizer {
    /// `respond(call_index)`
    pub fn new(
        respond: impl Fn(usize) -> Result<String, GenerationError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            evidence_sizes: Mutex::new(Vec::new()),
            evidence_urls: Mutex::new(Vec::new()),
        })
    }

    /// Returns `S1`, `S2`, ... for successive calls.
    pub fn numbered() -> Arc<Self> {
        Self::new(|call| Ok(format!("S{}", call + 1)))
    }

    pub fn calls(&self) -> usize {
        self.evidence_sizes.lock().unwrap().len()
    }

    pub fn evidence_sizes(&self) -> Vec<usize> {
        self.evidence_sizes.lock().unwrap().clone()
    }

    pub fn evidence_urls(&self, call: usize) -> Vec<String> {
        self.evidence_urls.lock().unwrap()[call].clone()
    }
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    async fn summarize(
        &self,
        _topic: &str,
        _subtopic: &str,
        evidence: &[EvidenceItem],
    ) -> Result<String, GenerationError> {
        let call = {
            let mut sizes = self.evidence_sizes.lock().unwrap();
            sizes.push(evidence.len());
            sizes.len() - 1
        };
        self.evidence_urls
            .lock()
            .unwrap()
            .push(evidence.iter().filter_map(|item| item.url.clone()).collect());
        (self.respond)(call)
    }
}

type JudgeFn = dyn Fn(usize) -> Result<bool, GenerationError> + Send + Sync;

pub struct FakeJudge {
    respond: Box<JudgeFn>,
    seen: Mutex<Vec<String>>,
}

impl FakeJudge {
    /// `respond(call_index)`
    pub fn new(
        respond: impl Fn(usize) -> Result<bool, GenerationError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn always(need_more: bool) -> Arc<Self> {
        Self::new(move |_| Ok(need_more))
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Judge for FakeJudge {
    async fn need_more_info(
        &self,
        _subtopic: &str,
        summary: &str,
    ) -> Result<bool, GenerationError> {
        let call = {
            let mut seen = self.seen.lock().unwrap();
            seen.push(summary.to_string());
            seen.len() - 1
        };
        (self.respond)(call)
    }
}

pub struct FakeModel {
    reply: Result<String, GenerationError>,
    prompts: Mutex<Vec<String>>,
}

impl FakeModel {
    pub fn replying(reply: Result<String, GenerationError>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        self.reply.clone()
    }
}

pub fn refinement_loop(
    source: &Arc<FakeSource>,
    summarizer: &Arc<FakeSummarizer>,
    judge: &Arc<FakeJudge>,
) -> RefinementLoop {
    RefinementLoop::new(source.clone(), summarizer.clone(), judge.clone())
}

pub fn pipeline(refinement: RefinementLoop, model: &Arc<FakeModel>) -> ResearchPipeline {
    ResearchPipeline::new(refinement, ReportComposer::new(model.clone()))
}
