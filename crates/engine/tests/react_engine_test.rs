//! End-to-end ReAct Engine scenarios (spec §8 S1-S5; S6 belongs to the
//! sync hub's own test suite).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use atomflow_atoms::StaticAtomRegistry;
use atomflow_core::config::EngineConfig;
use atomflow_core::mocks::{MockAtomInvoker, MockBlobStore, MockClock, MockLlmClient};
use atomflow_core::traits::{AtomInvoker, AtomRegistry, BlobStore, LlmClient, NoOpEventEmitter};
use atomflow_core::types::{
    AtomDescriptor, AtomRequest, AtomResponse, OutputFieldKind, ProjectContext, Session,
    SessionEvent, SessionMode, TerminalStatus,
};
use atomflow_core::{Error, Result};
use atomflow_engine::sink::RecordingSink;
use atomflow_engine::ReActEngine;
use atomflow_store::dataset_cache::DatasetMetadataCache;
use atomflow_store::insight_cache::InsightCache;

fn blob_store() -> Arc<dyn BlobStore> {
    Arc::new(MockBlobStore::new())
}

fn config() -> EngineConfig {
    EngineConfig {
        max_steps: 20,
        max_operations: 12,
        max_stalled: 4,
        max_replays: 7,
        max_retries_per_step: 2,
        llm_timeout_secs: 60,
        plan_bound_secs: 90,
        eval_bound_secs: 120,
        step_guard_backoff_ms: 10,
        debounce_persist_secs: 1,
        planning_temperature: 0.4,
        evaluation_temperature: 0.1,
    }
}

fn session(available_files: Vec<&str>) -> Session {
    Session::new(
        "session-1",
        "load sales.arrow, group by Region summing Revenue, bar chart",
        ProjectContext {
            client: "c".into(),
            app: "a".into(),
            project: "p".into(),
        },
        SessionMode::Laboratory,
        available_files.into_iter().map(String::from).collect(),
        0,
    )
}

fn atom(id: &str, produces_dataset: bool, output_field: OutputFieldKind) -> AtomDescriptor {
    AtomDescriptor {
        atom_id: id.to_string(),
        display_name: id.to_string(),
        description: String::new(),
        endpoint: format!("http://atoms.local/{id}").parse().unwrap(),
        produces_dataset,
        prefers_latest_dataset: id == "chart-maker",
        output_field,
    }
}

async fn events_of_kind(sink: &RecordingSink, kind: &str) -> Vec<SessionEvent> {
    sink.events
        .lock()
        .await
        .iter()
        .filter(|e| e.kind() == kind)
        .cloned()
        .collect()
}

// --- S1: happy path three-step ----------------------------------------

#[tokio::test]
async fn s1_happy_path_three_step() {
    let registry = StaticAtomRegistry::new();
    registry.register(atom("data-upload-validate", true, OutputFieldKind::OutputFile));
    registry.register(atom("groupby-wtg-avg", true, OutputFieldKind::OutputFile));
    registry.register(atom("chart-maker", false, OutputFieldKind::None));
    let atoms: Arc<dyn AtomRegistry> = Arc::new(registry);

    let invoker = MockAtomInvoker::new();
    invoker.set_response(
        "data-upload-validate",
        AtomResponse {
            success: true,
            data: json!({"output_file": "sales_loaded.arrow", "row_count": 100}),
            error: None,
        },
    );
    invoker.set_response(
        "groupby-wtg-avg",
        AtomResponse {
            success: true,
            data: json!({"output_file": "grouped_123.arrow", "row_count": 50}),
            error: None,
        },
    );
    invoker.set_response(
        "chart-maker",
        AtomResponse {
            success: true,
            data: json!({"chart_path": "chart1.png"}),
            error: None,
        },
    );
    let invoker: Arc<dyn AtomInvoker> = Arc::new(invoker);

    let llm = MockLlmClient::new();
    llm.push_json(json!({
        "atom_id": "data-upload-validate",
        "description": "load sales.arrow",
        "files_used": ["sales.arrow"],
        "output_alias": null,
        "goal_achieved": false
    }));
    llm.push_json(json!({"decision": "continue", "reasoning": "loaded", "correctness": true, "issues": []}));
    llm.push_json(json!({
        "atom_id": "groupby-wtg-avg",
        "description": "group by region",
        "files_used": ["sales_loaded.arrow"],
        "output_alias": "grouped_data",
        "goal_achieved": false
    }));
    llm.push_json(json!({"decision": "continue", "reasoning": "grouped", "correctness": true, "issues": []}));
    llm.push_json(json!({
        "atom_id": "chart-maker",
        "description": "bar chart",
        "files_used": [],
        "output_alias": null,
        "goal_achieved": false
    }));
    llm.push_json(json!({"decision": "complete", "reasoning": "chart rendered", "correctness": true, "issues": []}));
    let llm: Arc<dyn LlmClient> = Arc::new(llm);

    let clock: Arc<dyn atomflow_core::traits::Clock> = Arc::new(MockClock::new(1_700_000_000_000));
    let insight_cache = Arc::new(InsightCache::new(clock.clone()));
    let metadata_cache = Arc::new(DatasetMetadataCache::new(300, clock.clone()));
    let engine = ReActEngine::new(
        config(),
        llm,
        atoms,
        invoker,
        blob_store(),
        metadata_cache,
        clock,
        Arc::new(NoOpEventEmitter),
        insight_cache,
    );

    let mut sess = session(vec!["sales.arrow"]);
    let sink = RecordingSink::new();
    let cancelled = AtomicBool::new(false);

    let status = engine.run(&mut sess, &sink, &cancelled).await.unwrap();
    assert_eq!(status, TerminalStatus::Completed);
    assert!(sess.react_state.goal_achieved);
    assert_eq!(sess.execution_history.len(), 3);
    assert_eq!(sess.execution_history[2].plan.atom_id, "chart-maker");
    assert_eq!(sess.execution_history[2].plan.files_used, vec!["grouped_123.arrow".to_string()]);

    assert_eq!(events_of_kind(&sink, "workflow_started").await.len(), 1);
    assert_eq!(events_of_kind(&sink, "workflow_completed").await.len(), 1);
    assert_eq!(events_of_kind(&sink, "react_action").await.len(), 3);
}

// --- S2: loop detection --------------------------------------------------

#[tokio::test]
async fn s2_loop_detection_stops_at_second_cycle() {
    let registry = StaticAtomRegistry::new();
    registry.register(atom("groupby-wtg-avg", true, OutputFieldKind::OutputFile));
    // chart-maker stays registered to prove loop-detected termination does
    // NOT trigger forced visualization the way a genuine `complete` does.
    registry.register(atom("chart-maker", false, OutputFieldKind::None));
    let atoms: Arc<dyn AtomRegistry> = Arc::new(registry);

    let invoker = MockAtomInvoker::new();
    invoker.set_response(
        "groupby-wtg-avg",
        AtomResponse {
            success: true,
            data: json!({"output_file": "grouped1.arrow", "row_count": 10}),
            error: None,
        },
    );
    let invoker: Arc<dyn AtomInvoker> = Arc::new(invoker);

    let llm = MockLlmClient::new();
    llm.push_json(json!({
        "atom_id": "groupby-wtg-avg",
        "description": "group fileA",
        "files_used": ["fileA.csv"],
        "output_alias": null,
        "goal_achieved": false
    }));
    llm.push_json(json!({"decision": "continue", "reasoning": "ok", "correctness": true, "issues": []}));
    llm.push_json(json!({
        "atom_id": "groupby-wtg-avg",
        "description": "group fileA again",
        "files_used": ["fileA.csv"],
        "output_alias": null,
        "goal_achieved": false
    }));
    let llm: Arc<dyn LlmClient> = Arc::new(llm);

    let clock: Arc<dyn atomflow_core::traits::Clock> = Arc::new(MockClock::new(0));
    let insight_cache = Arc::new(InsightCache::new(clock.clone()));
    let metadata_cache = Arc::new(DatasetMetadataCache::new(300, clock.clone()));
    let engine = ReActEngine::new(
        config(),
        llm,
        atoms,
        invoker,
        blob_store(),
        metadata_cache,
        clock,
        Arc::new(NoOpEventEmitter),
        insight_cache,
    );

    let mut sess = session(vec!["fileA.csv"]);
    let sink = RecordingSink::new();
    let cancelled = AtomicBool::new(false);

    let status = engine.run(&mut sess, &sink, &cancelled).await.unwrap();
    assert_eq!(status, TerminalStatus::Completed);
    assert_eq!(
        sess.execution_history.len(),
        1,
        "the repeated proposal must not execute a second time, and loop \
         detection must not synthesize a forced-visualization chart step"
    );
    assert_eq!(events_of_kind(&sink, "react_loop_detected").await.len(), 1);
    assert_eq!(events_of_kind(&sink, "workflow_completed").await.len(), 1);
    assert_eq!(events_of_kind(&sink, "react_action").await.len(), 1, "no third cycle should run");
}

// --- S3: forced visualization --------------------------------------------

#[tokio::test]
async fn s3_forced_visualization_synthesizes_chart_step() {
    let registry = StaticAtomRegistry::new();
    registry.register(atom("groupby-wtg-avg", true, OutputFieldKind::OutputFile));
    registry.register(atom("chart-maker", false, OutputFieldKind::None));
    let atoms: Arc<dyn AtomRegistry> = Arc::new(registry);

    let invoker = MockAtomInvoker::new();
    invoker.set_response(
        "groupby-wtg-avg",
        AtomResponse {
            success: true,
            data: json!({"output_file": "grouped1.arrow", "row_count": 10}),
            error: None,
        },
    );
    invoker.set_response(
        "chart-maker",
        AtomResponse {
            success: true,
            data: json!({"chart_path": "chart1.png"}),
            error: None,
        },
    );
    let invoker: Arc<dyn AtomInvoker> = Arc::new(invoker);

    let llm = MockLlmClient::new();
    llm.push_json(json!({
        "atom_id": "groupby-wtg-avg",
        "description": "group data",
        "files_used": ["fileA.csv"],
        "output_alias": "grouped",
        "goal_achieved": false
    }));
    llm.push_json(json!({"decision": "continue", "reasoning": "ok", "correctness": true, "issues": []}));
    llm.push_json(json!({"goal_achieved": true}));
    llm.push_json(json!({"decision": "continue", "reasoning": "chart rendered", "correctness": true, "issues": []}));
    let llm: Arc<dyn LlmClient> = Arc::new(llm);

    let clock: Arc<dyn atomflow_core::traits::Clock> = Arc::new(MockClock::new(0));
    let insight_cache = Arc::new(InsightCache::new(clock.clone()));
    let metadata_cache = Arc::new(DatasetMetadataCache::new(300, clock.clone()));
    let engine = ReActEngine::new(
        config(),
        llm,
        atoms,
        invoker,
        blob_store(),
        metadata_cache,
        clock,
        Arc::new(NoOpEventEmitter),
        insight_cache,
    );

    let mut sess = session(vec!["fileA.csv"]);
    let sink = RecordingSink::new();
    let cancelled = AtomicBool::new(false);

    let status = engine.run(&mut sess, &sink, &cancelled).await.unwrap();
    assert_eq!(status, TerminalStatus::Completed);
    assert_eq!(sess.execution_history.len(), 2, "the synthesized chart step must be appended");
    assert_eq!(sess.execution_history[1].plan.atom_id, "chart-maker");
    assert_eq!(events_of_kind(&sink, "workflow_completed").await.len(), 1);
}

// --- S4: replay on missing materialized output ---------------------------

/// Returns fixed responses in call order, regardless of which atom is
/// invoked — used to script the exact sequence of main-execution vs.
/// auto-save round-trip calls a replay scenario depends on.
#[derive(Default)]
struct SequencedInvoker {
    responses: Mutex<VecDeque<Result<AtomResponse>>>,
}

impl SequencedInvoker {
    fn new(responses: Vec<AtomResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
        }
    }
}

#[async_trait]
impl AtomInvoker for SequencedInvoker {
    async fn invoke(&self, _atom: &AtomDescriptor, _request: AtomRequest) -> Result<AtomResponse> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::internal("SequencedInvoker: call queue exhausted")))
    }
}

#[tokio::test]
async fn s4_replay_recovers_from_missing_materialized_output() {
    let registry = StaticAtomRegistry::new();
    registry.register(atom("merge", true, OutputFieldKind::MergeJsonResultFile));
    registry.register(atom("groupby-wtg-avg", true, OutputFieldKind::OutputFile));
    let atoms: Arc<dyn AtomRegistry> = Arc::new(registry);

    // 1: merge executes.            2: merge's auto-save round-trip fails.
    // 3: replay re-executes merge.  4: replay's auto-save round-trip succeeds.
    // 5: groupby executes.          6: groupby's auto-save round-trip succeeds.
    let invoker: Arc<dyn AtomInvoker> = Arc::new(SequencedInvoker::new(vec![
        AtomResponse {
            success: true,
            data: json!({"merge_json": {"result_file": "merged_1.arrow"}, "row_count": 20}),
            error: None,
        },
        AtomResponse {
            success: false,
            data: json!({}),
            error: Some("disk full".to_string()),
        },
        AtomResponse {
            success: true,
            data: json!({"merge_json": {"result_file": "merged_1.arrow"}, "row_count": 20}),
            error: None,
        },
        AtomResponse {
            success: true,
            data: json!({"merge_json": {"result_file": "merged_1.arrow"}}),
            error: None,
        },
        AtomResponse {
            success: true,
            data: json!({"output_file": "grouped_1.arrow", "row_count": 8}),
            error: None,
        },
        AtomResponse {
            success: true,
            data: json!({"output_file": "grouped_1.arrow"}),
            error: None,
        },
    ]));

    let llm = MockLlmClient::new();
    llm.push_json(json!({
        "atom_id": "merge",
        "description": "merge files",
        "files_used": ["a.csv", "b.csv"],
        "output_alias": "merged",
        "goal_achieved": false
    }));
    llm.push_json(json!({"decision": "continue", "reasoning": "merged", "correctness": true, "issues": []}));
    // rejected: the merged file isn't materialized yet.
    llm.push_json(json!({
        "atom_id": "groupby-wtg-avg",
        "description": "group merged data",
        "files_used": ["merged_1.arrow"],
        "output_alias": null,
        "goal_achieved": false
    }));
    // re-planned after replay patches step 1 in place.
    llm.push_json(json!({
        "atom_id": "groupby-wtg-avg",
        "description": "group merged data",
        "files_used": ["merged_1.arrow"],
        "output_alias": null,
        "goal_achieved": false
    }));
    llm.push_json(json!({"decision": "complete", "reasoning": "grouped", "correctness": true, "issues": []}));
    let llm: Arc<dyn LlmClient> = Arc::new(llm);

    let clock: Arc<dyn atomflow_core::traits::Clock> = Arc::new(MockClock::new(0));
    let insight_cache = Arc::new(InsightCache::new(clock.clone()));
    let metadata_cache = Arc::new(DatasetMetadataCache::new(300, clock.clone()));
    let engine = ReActEngine::new(
        config(),
        llm,
        atoms,
        invoker,
        blob_store(),
        metadata_cache,
        clock,
        Arc::new(NoOpEventEmitter),
        insight_cache,
    );

    let mut sess = session(vec!["a.csv", "b.csv"]);
    let sink = RecordingSink::new();
    let cancelled = AtomicBool::new(false);

    let status = engine.run(&mut sess, &sink, &cancelled).await.unwrap();
    assert_eq!(status, TerminalStatus::Completed);
    assert_eq!(sess.replay_count, 1);
    assert_eq!(sess.execution_history.len(), 2);
    assert!(sess.execution_history[0].success);
    assert_eq!(sess.execution_history[1].plan.atom_id, "groupby-wtg-avg");
    assert_eq!(events_of_kind(&sink, "react_validation_blocked").await.len(), 1);
}

// --- S5: LLM plan timeout then resume ------------------------------------

/// Hangs forever on its `n`th `complete_json` call (simulating a planning
/// call that never returns inside the plan bound); every other call pops
/// the next response off a fixed queue.
struct HangOnNthCall {
    n: usize,
    calls: AtomicUsize,
    json_queue: Mutex<VecDeque<serde_json::Value>>,
}

impl HangOnNthCall {
    fn new(n: usize, responses: Vec<serde_json::Value>) -> Self {
        Self {
            n,
            calls: AtomicUsize::new(0),
            json_queue: Mutex::new(responses.into_iter().collect()),
        }
    }
}

#[async_trait]
impl LlmClient for HangOnNthCall {
    async fn complete_json(
        &self,
        _messages: &[atomflow_core::traits::ChatMessage],
        _temperature: f32,
        _max_attempts: usize,
    ) -> Result<serde_json::Value> {
        let idx = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if idx == self.n {
            std::future::pending::<()>().await;
        }
        self.json_queue
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::internal("HangOnNthCall: json queue exhausted"))
    }

    async fn complete_text(
        &self,
        _messages: &[atomflow_core::traits::ChatMessage],
        _temperature: f32,
    ) -> Result<String> {
        Err(Error::internal("HangOnNthCall: no text responses configured"))
    }
}

#[tokio::test]
async fn s5_plan_timeout_pauses_and_resume_continues_same_step() {
    let registry = StaticAtomRegistry::new();
    registry.register(atom("merge", false, OutputFieldKind::None));
    registry.register(atom("groupby-wtg-avg", false, OutputFieldKind::None));
    let atoms: Arc<dyn AtomRegistry> = Arc::new(registry);

    let invoker = MockAtomInvoker::new();
    invoker.set_response(
        "merge",
        AtomResponse { success: true, data: json!({"row_count": 5}), error: None },
    );
    invoker.set_response(
        "groupby-wtg-avg",
        AtomResponse { success: true, data: json!({"row_count": 5}), error: None },
    );
    let invoker: Arc<dyn AtomInvoker> = Arc::new(invoker);

    // Call 3 is step 2's first planning attempt; it hangs past the bound.
    let llm: Arc<dyn LlmClient> = Arc::new(HangOnNthCall::new(
        3,
        vec![
            json!({
                "atom_id": "merge",
                "description": "merge files",
                "files_used": ["a.csv", "b.csv"],
                "output_alias": null,
                "goal_achieved": false
            }),
            json!({"decision": "continue", "reasoning": "merged", "correctness": true, "issues": []}),
            json!({
                "atom_id": "groupby-wtg-avg",
                "description": "group data",
                "files_used": ["a.csv"],
                "output_alias": null,
                "goal_achieved": false
            }),
            json!({"decision": "complete", "reasoning": "grouped", "correctness": true, "issues": []}),
        ],
    ));

    let mut cfg = config();
    cfg.plan_bound_secs = 1;

    let clock: Arc<dyn atomflow_core::traits::Clock> = Arc::new(MockClock::new(0));
    let insight_cache = Arc::new(InsightCache::new(clock.clone()));
    let metadata_cache = Arc::new(DatasetMetadataCache::new(300, clock.clone()));
    let engine = ReActEngine::new(
        cfg,
        llm,
        atoms,
        invoker,
        blob_store(),
        metadata_cache,
        clock,
        Arc::new(NoOpEventEmitter),
        insight_cache,
    );

    let mut sess = session(vec!["a.csv", "b.csv"]);
    let sink = RecordingSink::new();
    let cancelled = AtomicBool::new(false);

    let status = engine.run(&mut sess, &sink, &cancelled).await.unwrap();
    assert_eq!(status, TerminalStatus::Paused);
    assert!(sess.react_state.paused);
    assert_eq!(sess.react_state.paused_at_step, Some(2));
    assert_eq!(events_of_kind(&sink, "react_generation_timeout").await.len(), 1);

    let resumed_status = engine.resume(&mut sess, &sink, &cancelled).await.unwrap();
    assert_eq!(resumed_status, TerminalStatus::Completed);
    assert!(!sess.react_state.paused);
    assert_eq!(sess.execution_history.len(), 2);
    assert_eq!(sess.execution_history[1].plan.atom_id, "groupby-wtg-avg");
}
