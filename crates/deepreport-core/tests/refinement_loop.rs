mod common;

use std::sync::Arc;

use common::{FakeJudge, FakeModel, FakeSource, FakeSummarizer, items, pipeline, refinement_loop};
use deepreport_core::{
    AbandonReason, AcceptReason, ConfigurationError, EventCollector, EvidenceStrategy,
    FAILED_SUMMARY_TEXT, GenerationError, INSUFFICIENT_DATA_REPORT, PipelineEvent,
    RefinementPolicy, SearchError, SubtopicOutcome, SummaryRecord,
};

const TOPIC: &str = "квантовые вычисления";
const SUBTOPIC: &str = "кубиты";

#[tokio::test]
async fn sufficient_first_summary_is_accepted_immediately() {
    let source = FakeSource::returning(3);
    let summarizer = FakeSummarizer::numbered();
    let judge = FakeJudge::always(false);
    let refinement = refinement_loop(&source, &summarizer, &judge);

    let records = refinement
        .run_stage(TOPIC, &[SUBTOPIC.to_string()])
        .await
        .expect("valid input");

    assert_eq!(
        records,
        vec![SummaryRecord {
            subtopic: SUBTOPIC.to_string(),
            summary: "S1".to_string(),
        }]
    );
    assert_eq!(source.counts(), vec![3]);
    assert_eq!(source.queries(), vec!["квантовые вычисления кубиты".to_string()]);
    assert_eq!(summarizer.calls(), 1);
    assert_eq!(judge.calls(), 1);
}

#[tokio::test]
async fn persistent_insufficiency_accepts_last_attempt() {
    let source = FakeSource::returning(3);
    let summarizer = FakeSummarizer::numbered();
    let judge = FakeJudge::always(true);
    let refinement = refinement_loop(&source, &summarizer, &judge);

    let outcome = refinement.process(TOPIC, SUBTOPIC).await;

    assert_eq!(
        outcome,
        SubtopicOutcome::Accepted {
            record: SummaryRecord {
                subtopic: SUBTOPIC.to_string(),
                summary: "S2".to_string(),
            },
            attempts: 2,
            evidence_count: 8,
            reason: AcceptReason::AttemptsExhausted,
        }
    );
    assert_eq!(source.counts(), vec![3, 8]);
    assert_eq!(summarizer.calls(), 2);
    assert_eq!(judge.calls(), 2);
}

#[tokio::test]
async fn empty_evidence_abandons_without_generation() {
    let source = FakeSource::empty();
    let summarizer = FakeSummarizer::numbered();
    let judge = FakeJudge::always(false);
    let refinement = refinement_loop(&source, &summarizer, &judge);

    let outcome = refinement.process(TOPIC, SUBTOPIC).await;

    assert_eq!(
        outcome,
        SubtopicOutcome::Abandoned {
            attempts: 1,
            reason: AbandonReason::NoEvidence,
        }
    );
    assert_eq!(summarizer.calls(), 0);
    assert_eq!(judge.calls(), 0);
}

#[tokio::test]
async fn search_failure_abandons_without_generation() {
    let source = FakeSource::failing();
    let summarizer = FakeSummarizer::numbered();
    let judge = FakeJudge::always(false);
    let refinement = refinement_loop(&source, &summarizer, &judge);

    let records = refinement
        .run_stage(TOPIC, &[SUBTOPIC.to_string()])
        .await
        .expect("valid input");

    assert!(records.is_empty());
    assert_eq!(source.counts(), vec![3]);
    assert_eq!(summarizer.calls(), 0);
    assert_eq!(judge.calls(), 0);
}

#[tokio::test]
async fn search_failure_on_retry_discards_earlier_draft() {
    let source = FakeSource::new(|_, call, count| {
        if call == 0 {
            Ok(items("a", count))
        } else {
            Err(SearchError::Status { status: 503 })
        }
    });
    let summarizer = FakeSummarizer::numbered();
    let judge = FakeJudge::always(true);
    let refinement = refinement_loop(&source, &summarizer, &judge);

    let outcome = refinement.process(TOPIC, SUBTOPIC).await;

    assert_eq!(
        outcome,
        SubtopicOutcome::Abandoned {
            attempts: 2,
            reason: AbandonReason::SearchFailed,
        }
    );
    assert!(outcome.into_record().is_none());
    assert_eq!(summarizer.calls(), 1);
}

#[tokio::test]
async fn summarizer_failure_skips_judge_and_retries() {
    let source = FakeSource::returning(3);
    let summarizer = FakeSummarizer::new(|call| {
        if call == 0 {
            Err(GenerationError::Request("timeout".to_string()))
        } else {
            Ok("восстановленное summary".to_string())
        }
    });
    let judge = FakeJudge::always(false);
    let refinement = refinement_loop(&source, &summarizer, &judge);

    let record = refinement
        .process(TOPIC, SUBTOPIC)
        .await
        .into_record()
        .expect("second attempt accepted");

    assert_eq!(record.summary, "восстановленное summary");
    assert_eq!(source.counts(), vec![3, 8]);
    assert_eq!(judge.seen(), vec!["восстановленное summary".to_string()]);
}

#[tokio::test]
async fn summarizer_failure_on_every_attempt_accepts_failure_text() {
    let source = FakeSource::returning(3);
    let summarizer = FakeSummarizer::new(|_| Err(GenerationError::EmptyResponse));
    let judge = FakeJudge::always(false);
    let refinement = refinement_loop(&source, &summarizer, &judge);

    let record = refinement
        .process(TOPIC, SUBTOPIC)
        .await
        .into_record()
        .expect("last attempt accepted");

    assert_eq!(record.summary, FAILED_SUMMARY_TEXT);
    assert_eq!(summarizer.calls(), 2);
    assert_eq!(judge.calls(), 0);
}

#[tokio::test]
async fn judge_failure_is_treated_as_insufficient() {
    let source = FakeSource::returning(3);
    let summarizer = FakeSummarizer::numbered();
    let judge = FakeJudge::new(|call| {
        if call == 0 {
            Err(GenerationError::InvalidResponse("возможно".to_string()))
        } else {
            Ok(false)
        }
    });
    let refinement = refinement_loop(&source, &summarizer, &judge);

    let outcome = refinement.process(TOPIC, SUBTOPIC).await;

    assert_eq!(outcome.record().map(|r| r.summary.as_str()), Some("S2"));
    assert!(matches!(
        outcome,
        SubtopicOutcome::Accepted {
            reason: AcceptReason::Sufficient,
            ..
        }
    ));
    assert_eq!(source.counts(), vec![3, 8]);
}

#[tokio::test]
async fn evidence_cap_forces_acceptance_before_attempts_run_out() {
    let source = FakeSource::echoing_count();
    let summarizer = FakeSummarizer::numbered();
    let judge = FakeJudge::always(true);
    let refinement = refinement_loop(&source, &summarizer, &judge).with_policy(RefinementPolicy {
        max_attempts: 5,
        ..RefinementPolicy::default()
    });

    let (collector, mut receiver) = EventCollector::new();
    let refinement = refinement.with_sink(Arc::new(collector));

    let outcome = refinement.process(TOPIC, SUBTOPIC).await;
    drop(refinement);

    let mut cap_events = Vec::new();
    while let Some(record) = receiver.recv().await {
        if let PipelineEvent::EvidenceCapReached {
            attempt,
            evidence_cap,
            ..
        } = record.event
        {
            cap_events.push((attempt, evidence_cap));
        }
    }
    assert_eq!(cap_events, vec![(2, 15)]);

    assert_eq!(
        outcome,
        SubtopicOutcome::Accepted {
            record: SummaryRecord {
                subtopic: SUBTOPIC.to_string(),
                summary: "S3".to_string(),
            },
            attempts: 3,
            evidence_count: 13,
            reason: AcceptReason::EvidenceCapReached,
        }
    );
    assert_eq!(source.counts(), vec![3, 8, 13]);
    assert_eq!(summarizer.evidence_sizes(), vec![3, 8, 13]);
}

#[tokio::test]
async fn evidence_counts_are_monotonic_and_bounded() {
    let source = FakeSource::echoing_count();
    let summarizer = FakeSummarizer::numbered();
    let judge = FakeJudge::always(true);
    let refinement = refinement_loop(&source, &summarizer, &judge).with_policy(RefinementPolicy {
        max_attempts: 10,
        initial_evidence: 1,
        evidence_step: 4,
        evidence_cap: 15,
        strategy: EvidenceStrategy::Refetch,
    });

    let outcome = refinement.process(TOPIC, SUBTOPIC).await;
    let counts = source.counts();

    assert_eq!(counts, vec![1, 5, 9, 13]);
    assert!(counts.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(counts.iter().all(|count| *count <= 15));
    assert!(outcome.record().is_some());
}

#[tokio::test]
async fn single_attempt_budget_never_escalates() {
    let source = FakeSource::returning(3);
    let summarizer = FakeSummarizer::numbered();
    let judge = FakeJudge::always(true);
    let refinement = refinement_loop(&source, &summarizer, &judge).with_policy(RefinementPolicy {
        max_attempts: 1,
        ..RefinementPolicy::default()
    });

    let outcome = refinement.process(TOPIC, SUBTOPIC).await;

    assert_eq!(outcome.record().map(|r| r.summary.as_str()), Some("S1"));
    assert_eq!(source.counts(), vec![3]);
}

#[tokio::test]
async fn refetch_strategy_summarizes_only_latest_results() {
    let source = FakeSource::new(|_, call, count| {
        if call == 0 {
            Ok(items("a", count))
        } else {
            let mut fresh = items("b", count - 1);
            fresh.extend(items("a", 1));
            Ok(fresh)
        }
    });
    let summarizer = FakeSummarizer::numbered();
    let judge = FakeJudge::always(true);
    let refinement = refinement_loop(&source, &summarizer, &judge);

    refinement.process(TOPIC, SUBTOPIC).await;

    assert_eq!(summarizer.evidence_sizes(), vec![3, 8]);
}

#[tokio::test]
async fn accumulate_strategy_merges_evidence_across_attempts() {
    let source = FakeSource::new(|_, call, count| {
        if call == 0 {
            Ok(items("a", count))
        } else {
            let mut fresh = items("b", count - 1);
            fresh.extend(items("a", 1));
            Ok(fresh)
        }
    });
    let summarizer = FakeSummarizer::numbered();
    let judge = FakeJudge::always(true);
    let refinement = refinement_loop(&source, &summarizer, &judge).with_policy(RefinementPolicy {
        strategy: EvidenceStrategy::Accumulate,
        ..RefinementPolicy::default()
    });

    refinement.process(TOPIC, SUBTOPIC).await;

    assert_eq!(source.counts(), vec![3, 8]);
    assert_eq!(summarizer.evidence_sizes(), vec![3, 10]);
    let urls = summarizer.evidence_urls(1);
    assert_eq!(urls[0], "https://example.com/a0");
    assert_eq!(urls[3], "https://example.com/b0");
}

#[tokio::test]
async fn stage_preserves_order_and_omits_abandoned_subtopics() {
    let source = FakeSource::new(|query, _, count| {
        if query.ends_with("алгоритмы") {
            Ok(Vec::new())
        } else {
            Ok(items("x", count))
        }
    });
    let summarizer = FakeSummarizer::numbered();
    let judge = FakeJudge::always(false);
    let refinement = refinement_loop(&source, &summarizer, &judge);

    let subtopics = vec![
        "кубиты".to_string(),
        "алгоритмы".to_string(),
        "декогеренция".to_string(),
    ];
    let records = refinement.run_stage(TOPIC, &subtopics).await.unwrap();

    let names: Vec<_> = records.iter().map(|r| r.subtopic.as_str()).collect();
    assert_eq!(names, vec!["кубиты", "декогеренция"]);
    assert_eq!(records[1].summary, "S2");
}

#[tokio::test]
async fn blank_subtopic_is_skipped_without_dropping_the_rest() {
    let source = FakeSource::returning(3);
    let summarizer = FakeSummarizer::numbered();
    let judge = FakeJudge::always(false);
    let refinement = refinement_loop(&source, &summarizer, &judge);

    assert_eq!(
        refinement.process(TOPIC, "  ").await,
        SubtopicOutcome::Abandoned {
            attempts: 0,
            reason: AbandonReason::BlankSubtopic,
        }
    );
    assert!(source.counts().is_empty());

    let model = FakeModel::replying(Ok("report".to_string()));
    let pipeline = pipeline(refinement, &model);
    let records = pipeline
        .run_subtopic_stage(TOPIC, &["кубиты".to_string(), "  ".to_string()])
        .await;

    assert_eq!(
        records,
        vec![SummaryRecord {
            subtopic: "кубиты".to_string(),
            summary: "S1".to_string(),
        }]
    );
    assert_eq!(source.queries(), vec!["квантовые вычисления кубиты".to_string()]);
    assert_eq!(summarizer.calls(), 1);
}

#[tokio::test]
async fn invalid_stage_input_makes_no_calls() {
    let source = FakeSource::returning(3);
    let summarizer = FakeSummarizer::numbered();
    let judge = FakeJudge::always(false);
    let refinement = refinement_loop(&source, &summarizer, &judge);

    assert_eq!(
        refinement.run_stage("", &[SUBTOPIC.to_string()]).await,
        Err(ConfigurationError::MissingTopic)
    );
    assert_eq!(
        refinement.run_stage(TOPIC, &[]).await,
        Err(ConfigurationError::NoSubtopics)
    );
    assert!(source.counts().is_empty());
}

#[tokio::test]
async fn pipeline_stage_reports_rejected_input_as_empty_result() {
    let source = FakeSource::returning(3);
    let summarizer = FakeSummarizer::numbered();
    let judge = FakeJudge::always(false);
    let (collector, mut receiver) = EventCollector::new();
    let refinement = refinement_loop(&source, &summarizer, &judge).with_sink(Arc::new(collector));
    let model = FakeModel::replying(Ok("report".to_string()));
    let pipeline = pipeline(refinement, &model);

    let records = pipeline.run_subtopic_stage(TOPIC, &[]).await;

    assert!(records.is_empty());
    let record = receiver.recv().await.expect("rejection event");
    assert!(matches!(record.event, PipelineEvent::StageRejected { .. }));
    assert!(source.counts().is_empty());
}

#[tokio::test]
async fn retry_emits_decision_events_in_order() {
    let source = FakeSource::returning(3);
    let summarizer = FakeSummarizer::numbered();
    let judge = FakeJudge::always(true);
    let (collector, mut receiver) = EventCollector::new();
    let refinement = refinement_loop(&source, &summarizer, &judge).with_sink(Arc::new(collector));

    refinement.process(TOPIC, SUBTOPIC).await;
    drop(refinement);

    let mut kinds = Vec::new();
    while let Some(record) = receiver.recv().await {
        kinds.push(record.event);
    }

    assert_eq!(kinds.len(), 5);
    assert!(matches!(kinds[0], PipelineEvent::SubtopicStarted { .. }));
    assert!(matches!(
        kinds[1],
        PipelineEvent::SearchIssued {
            evidence_count: 3,
            ..
        }
    ));
    assert!(matches!(
        kinds[2],
        PipelineEvent::Retrying {
            next_evidence_count: 8,
            ..
        }
    ));
    assert!(matches!(
        kinds[3],
        PipelineEvent::SearchIssued {
            evidence_count: 8,
            ..
        }
    ));
    assert!(matches!(
        kinds[4],
        PipelineEvent::SummaryAccepted {
            reason: AcceptReason::AttemptsExhausted,
            ..
        }
    ));
}

#[tokio::test]
async fn report_stage_without_records_skips_generation() {
    let source = FakeSource::returning(3);
    let summarizer = FakeSummarizer::numbered();
    let judge = FakeJudge::always(false);
    let model = FakeModel::replying(Ok("report".to_string()));
    let pipeline = pipeline(refinement_loop(&source, &summarizer, &judge), &model);

    let report = pipeline.run_report_stage(TOPIC, &[]).await;

    assert_eq!(report, INSUFFICIENT_DATA_REPORT);
    assert!(model.prompts().is_empty());
}
