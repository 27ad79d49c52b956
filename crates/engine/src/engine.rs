//! The ReAct Engine (spec §4.1): drives Plan → Validate → Execute →
//! Auto-Save → Evaluate → Decide to completion, under `MAX_STEPS`,
//! `MAX_OPERATIONS`, `MAX_STALLED`, `MAX_REPLAYS` and explicit
//! cancellation (spec §5, §7, §8.1/§8.3/§8.4/§8.9/§8.10). Implemented
//! using the teacher's cooperative-scheduling idiom: an async loop over
//! bounded iterations, with `tokio::time::timeout` at each suspension
//! point and a periodic sibling task for heartbeats cancelled via
//! `tokio::select!` once the awaited future resolves.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use atomflow_core::config::EngineConfig;
use atomflow_core::events::{EventEnvelope, EventType};
use atomflow_core::traits::{
    AtomInvoker, AtomRegistry, BlobStore, ChatMessage, Clock, EventEmitter, LlmClient,
};
use atomflow_core::types::{
    AtomDescriptor, AtomRequest, DatasetMetadata, Decision, RejectionReason, Session, StepPlan,
    StepRecord, TerminalStatus, ValidationOutcome,
};
use atomflow_core::{Error, Result};
use atomflow_store::dataset_cache::DatasetMetadataCache;
use atomflow_store::insight_cache::InsightCache;

use crate::autosave::auto_save;
use crate::dependency::validate;
use crate::evaluator::evaluate;
use crate::insight::{per_step_insight, terminal_insight};
use crate::prompt::{change_approach_note, planning_prompt};
use crate::replay::{replay, ReplayOutcome};
use crate::rewriter::rewrite;
use crate::sink::{Disconnect, SessionSink};
use crate::step_guard::StepGuardTable;

const PLANNING_MAX_ATTEMPTS: usize = 3;
const ATOM_RETRIES: u32 = 3;
const GUARD_ACQUIRE_MAX_ATTEMPTS: u32 = 20;
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
const CHART_MAKER_ATOM: &str = "chart-maker";

pub struct ReActEngine {
    config: EngineConfig,
    llm: Arc<dyn LlmClient>,
    atoms: Arc<dyn AtomRegistry>,
    invoker: Arc<dyn AtomInvoker>,
    blob_store: Arc<dyn BlobStore>,
    metadata_cache: Arc<DatasetMetadataCache>,
    clock: Arc<dyn Clock>,
    guards: Arc<StepGuardTable>,
    events: Arc<dyn EventEmitter>,
    insight_cache: Arc<InsightCache>,
}

/// Raw plan shape returned by the planning LLM call, before it becomes a
/// [`StepPlan`] (spec §4.1 step 3).
#[derive(serde::Deserialize)]
struct RawPlan {
    atom_id: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    files_used: Vec<String>,
    #[serde(default)]
    inputs: Value,
    output_alias: Option<String>,
    #[serde(default)]
    goal_achieved: bool,
}

impl ReActEngine {
    pub fn new(
        config: EngineConfig,
        llm: Arc<dyn LlmClient>,
        atoms: Arc<dyn AtomRegistry>,
        invoker: Arc<dyn AtomInvoker>,
        blob_store: Arc<dyn BlobStore>,
        metadata_cache: Arc<DatasetMetadataCache>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventEmitter>,
        insight_cache: Arc<InsightCache>,
    ) -> Self {
        Self {
            config,
            llm,
            atoms,
            invoker,
            blob_store,
            metadata_cache,
            clock,
            guards: Arc::new(StepGuardTable::new()),
            events,
            insight_cache,
        }
    }

    /// Drives `session` to a terminal status. `cancelled` is polled at the
    /// top of each cycle and between phases (spec §5 "Cancellation").
    pub async fn run(
        &self,
        session: &mut Session,
        sink: &dyn SessionSink,
        cancelled: &AtomicBool,
    ) -> Result<TerminalStatus> {
        sink.send(atomflow_core::types::SessionEvent::WorkflowStarted {
            session_id: session.session_id.clone(),
            goal: session.goal.clone(),
        })
        .await
        .ok();
        self.emit(
            EventType::SessionStarted,
            serde_json::json!({"goal": session.goal}),
            Some(&session.session_id),
        )
        .await;

        self.drive(session, sink, cancelled).await
    }

    async fn drive(
        &self,
        session: &mut Session,
        sink: &dyn SessionSink,
        cancelled: &AtomicBool,
    ) -> Result<TerminalStatus> {
        let mut change_approach_pending: Option<StepPlan> = None;
        let mut skip_forced_visualization = false;

        let status = loop {
            if cancelled.load(Ordering::SeqCst) {
                break TerminalStatus::Stopped;
            }
            if session.react_state.current_step_number > self.config.max_steps {
                break TerminalStatus::Aborted;
            }
            if session.react_state.stalled_cycles >= self.config.max_stalled {
                sink.send(atomflow_core::types::SessionEvent::ReactStalled {
                    cycles: session.react_state.stalled_cycles,
                })
                .await
                .ok();
                self.emit(
                    EventType::StallDetected,
                    serde_json::json!({"cycles": session.react_state.stalled_cycles}),
                    Some(&session.session_id),
                )
                .await;
                break TerminalStatus::Aborted;
            }
            if session.react_state.operations_executed >= self.config.max_operations {
                sink.send(atomflow_core::types::SessionEvent::ReactAbortComplexity {
                    operations_executed: session.react_state.operations_executed,
                    max_operations: self.config.max_operations,
                })
                .await
                .ok();
                self.emit(
                    EventType::ComplexityAborted,
                    serde_json::json!({"operations_executed": session.react_state.operations_executed}),
                    Some(&session.session_id),
                )
                .await;
                break TerminalStatus::Aborted;
            }

            let Some(token) = self.acquire_guard_with_backoff(session).await else {
                break TerminalStatus::Aborted;
            };

            let cycle_result = self
                .run_one_cycle(session, sink, &mut change_approach_pending)
                .await;

            self.guards.release(&session.session_id, token);

            match cycle_result {
                Ok(CycleOutcome::Continue) => continue,
                Ok(CycleOutcome::GoalAchieved) => {
                    session.react_state.goal_achieved = true;
                    break TerminalStatus::Completed;
                }
                Ok(CycleOutcome::LoopDetected) => {
                    skip_forced_visualization = true;
                    break TerminalStatus::Completed;
                }
                Ok(CycleOutcome::Paused) => break TerminalStatus::Paused,
                Err(Error::Other(ref e)) if e.downcast_ref::<Disconnect>().is_some() => {
                    break TerminalStatus::Stopped;
                }
                Err(_) => break TerminalStatus::Aborted,
            }
        };

        let status = if status == TerminalStatus::Completed && !skip_forced_visualization {
            self.enforce_forced_visualization(session, sink).await;
            TerminalStatus::Completed
        } else {
            status
        };

        match status {
            TerminalStatus::Completed => {
                sink.send(atomflow_core::types::SessionEvent::WorkflowCompleted {
                    session_id: session.session_id.clone(),
                    total_steps: session.execution_history.len() as u32,
                    summary: format!("completed in {} steps", session.execution_history.len()),
                })
                .await
                .ok();
                self.emit(EventType::SessionCompleted, Value::Null, Some(&session.session_id))
                    .await;
                self.emit_terminal_insight(session, sink).await;
            }
            TerminalStatus::Stopped => {
                sink.send(atomflow_core::types::SessionEvent::WorkflowStopped {
                    session_id: session.session_id.clone(),
                    reason: "cancelled or disconnected".to_string(),
                })
                .await
                .ok();
                self.emit(EventType::SessionCancelled, Value::Null, Some(&session.session_id))
                    .await;
            }
            TerminalStatus::Paused => {
                session.react_state.paused = true;
                session.react_state.paused_at_step = Some(session.react_state.current_step_number);
                self.emit(
                    EventType::SessionPaused,
                    serde_json::json!({"paused_at_step": session.react_state.paused_at_step}),
                    Some(&session.session_id),
                )
                .await;
            }
            TerminalStatus::Aborted => {
                sink.send(atomflow_core::types::SessionEvent::WorkflowStopped {
                    session_id: session.session_id.clone(),
                    reason: "resource cap reached".to_string(),
                })
                .await
                .ok();
                self.emit(EventType::SessionCancelled, Value::Null, Some(&session.session_id))
                    .await;
            }
        }

        Ok(status)
    }

    /// Pushes an entry onto the internal audit trail (spec §7 "the process
    /// never crashes due to a user session" — audit emission is
    /// best-effort and never itself a source of engine failure).
    async fn emit(&self, event_type: EventType, payload: Value, session_id: Option<&str>) {
        let mut envelope = EventEnvelope::new(event_type, payload);
        if let Some(id) = session_id {
            envelope = envelope.with_session(id);
        }
        self.events.emit(envelope).await;
    }

    /// Resumes a session previously left in [`TerminalStatus::Paused`]
    /// (spec §4.1 "plan-timeout leaves session paused at correct step",
    /// §8.10). Clears the pause flags and re-enters `run`.
    pub async fn resume(
        &self,
        session: &mut Session,
        sink: &dyn SessionSink,
        cancelled: &AtomicBool,
    ) -> Result<TerminalStatus> {
        session.react_state.paused = false;
        session.react_state.paused_at_step = None;
        self.emit(
            EventType::SessionResumed,
            serde_json::json!({"step_number": session.react_state.current_step_number}),
            Some(&session.session_id),
        )
        .await;
        self.drive(session, sink, cancelled).await
    }

    async fn acquire_guard_with_backoff(&self, session: &Session) -> Option<uuid::Uuid> {
        for _ in 0..GUARD_ACQUIRE_MAX_ATTEMPTS {
            let now = self.clock.now_ms();
            if let Some(token) =
                self.guards
                    .acquire(&session.session_id, session.react_state.current_step_number, now)
            {
                return Some(token);
            }
            tokio::time::sleep(Duration::from_millis(self.config.step_guard_backoff_ms)).await;
        }
        None
    }

    async fn run_one_cycle(
        &self,
        session: &mut Session,
        sink: &dyn SessionSink,
        change_approach_pending: &mut Option<StepPlan>,
    ) -> Result<CycleOutcome> {
        let loop_risk = self.detect_loop_risk(session);
        let file_metadata = self.fetch_file_metadata(session).await;

        let rewritten = loop {
            let mut prompt = planning_prompt(session, &file_metadata, loop_risk);
            if let Some(rejected) = change_approach_pending.take() {
                prompt.push_str(&change_approach_note(&rejected));
            }

            let raw = match self.plan_with_heartbeat(session, sink, &prompt).await {
                PlanOutcome::Plan(v) => v,
                PlanOutcome::Paused => {
                    self.emit(
                        EventType::PlanTimedOut,
                        serde_json::json!({"step_number": session.react_state.current_step_number}),
                        Some(&session.session_id),
                    )
                    .await;
                    return Ok(CycleOutcome::Paused);
                }
                PlanOutcome::Disconnected => {
                    return Err(Error::Other(anyhow::Error::new(Disconnect)))
                }
            };

            let Ok(raw_plan): std::result::Result<RawPlan, _> = serde_json::from_value(raw) else {
                return Ok(CycleOutcome::GoalAchieved);
            };

            if raw_plan.goal_achieved {
                return Ok(CycleOutcome::GoalAchieved);
            }

            let Some(atom_id) = raw_plan
                .atom_id
                .clone()
                .or_else(|| self.infer_atom_from_description(&raw_plan.description))
            else {
                return Ok(CycleOutcome::GoalAchieved);
            };

            let Some(atom) = self.atoms.get(&atom_id) else {
                return Ok(CycleOutcome::GoalAchieved);
            };

            let plan = StepPlan {
                step_number: session.react_state.current_step_number,
                atom_id: atom.atom_id.clone(),
                human_description: raw_plan.description,
                files_used: raw_plan.files_used,
                inputs: raw_plan.inputs,
                output_alias: raw_plan.output_alias,
                prompt: None,
            };
            session
                .cached_plans
                .insert(plan.step_number, plan.clone());
            self.emit(
                EventType::PlanProposed,
                serde_json::json!({"step_number": plan.step_number, "atom_id": plan.atom_id}),
                Some(&session.session_id),
            )
            .await;

            let rewritten = rewrite(session, plan);

            if self.is_repeat_of_previous(session, &rewritten) {
                sink.send(atomflow_core::types::SessionEvent::ReactLoopDetected {
                    step_number: rewritten.step_number,
                })
                .await
                .ok();
                self.emit(
                    EventType::LoopDetected,
                    serde_json::json!({"step_number": rewritten.step_number}),
                    Some(&session.session_id),
                )
                .await;
                return Ok(CycleOutcome::LoopDetected);
            }

            let last = session.last_history_entry();
            let last_atom = last.and_then(|r| self.atoms.get(&r.plan.atom_id));
            let outcome = validate(session, last, last_atom.as_ref(), &rewritten);

            if let ValidationOutcome::Rejected(reason) = outcome {
                sink.send(atomflow_core::types::SessionEvent::ReactValidationBlocked {
                    step_number: rewritten.step_number,
                    reason: serde_json::to_value(&reason).unwrap_or(Value::Null),
                })
                .await
                .ok();
                self.emit(
                    EventType::DependencyRejected,
                    serde_json::json!({
                        "step_number": rewritten.step_number,
                        "atom_id": rewritten.atom_id,
                        "reason": format!("{:?}", reason),
                    }),
                    Some(&session.session_id),
                )
                .await;

                if matches!(reason, RejectionReason::MissingMaterializedOutput { .. }) {
                    if let Some(last_atom) = &last_atom {
                        let replay_outcome = replay(
                            self.invoker.as_ref(),
                            &self.clock,
                            last_atom,
                            session,
                            self.config.max_replays,
                        )
                        .await?;
                        self.emit(
                            EventType::ReplayAttempted,
                            serde_json::json!({"step_number": rewritten.step_number}),
                            Some(&session.session_id),
                        )
                        .await;
                        if matches!(replay_outcome, ReplayOutcome::Exhausted) {
                            return Ok(CycleOutcome::GoalAchieved);
                        }
                    }
                }
                session.react_state.stalled_cycles += 1;
                continue;
            }

            break rewritten;
        };

        sink.send(atomflow_core::types::SessionEvent::ReactAction {
            step_number: rewritten.step_number,
            atom_id: rewritten.atom_id.clone(),
            human_description: rewritten.human_description.clone(),
        })
        .await
        .map_err(|_| Error::Other(anyhow::Error::new(Disconnect)))?;

        let atom = self
            .atoms
            .get(&rewritten.atom_id)
            .ok_or_else(|| Error::atom_not_found(rewritten.atom_id.clone()))?;

        let record = self
            .execute_and_evaluate(session, sink, &atom, rewritten)
            .await?;

        let progressed = record.success;
        session.execution_history.push(record.clone());
        session.updated_at = self.clock.now_ms();

        if progressed {
            session.react_state.stalled_cycles = 0;
        } else {
            session.react_state.stalled_cycles += 1;
        }
        session.react_state.operations_executed += 1;

        let decision = record
            .evaluation
            .as_ref()
            .map(|e| e.decision)
            .unwrap_or(Decision::Continue);

        sink.send(atomflow_core::types::SessionEvent::ReactDecision {
            step_number: record.plan.step_number,
            decision,
            reasoning: record
                .evaluation
                .as_ref()
                .map(|e| e.reasoning.clone())
                .unwrap_or_default(),
        })
        .await
        .ok();

        match decision {
            Decision::Continue => {
                session.react_state.retry_count = 0;
                session.react_state.current_step_number += 1;
                Ok(CycleOutcome::Continue)
            }
            Decision::RetryWithCorrection => {
                session.react_state.retry_count += 1;
                if session.react_state.retry_count >= self.config.max_retries_per_step {
                    *change_approach_pending = Some(record.plan.clone());
                    Ok(CycleOutcome::Continue)
                } else {
                    if let Some(corrected) = record.evaluation.and_then(|e| e.corrected_prompt) {
                        let mut reworked = record.plan;
                        reworked.prompt = Some(corrected);
                        *change_approach_pending = Some(reworked);
                    }
                    Ok(CycleOutcome::Continue)
                }
            }
            Decision::ChangeApproach => {
                *change_approach_pending = Some(record.plan.clone());
                Ok(CycleOutcome::Continue)
            }
            Decision::Complete => Ok(CycleOutcome::GoalAchieved),
        }
    }

    async fn execute_and_evaluate(
        &self,
        session: &mut Session,
        sink: &dyn SessionSink,
        atom: &AtomDescriptor,
        plan: StepPlan,
    ) -> Result<StepRecord> {
        let started_at = self.clock.now_ms();

        sink.send(atomflow_core::types::SessionEvent::StepStarted {
            step_number: plan.step_number,
            atom_id: atom.atom_id.clone(),
        })
        .await
        .ok();

        self.emit(
            EventType::AtomCallStarted,
            serde_json::json!({"step_number": plan.step_number, "atom_id": atom.atom_id}),
            Some(&session.session_id),
        )
        .await;

        let response = self.invoke_with_retries(session, sink, atom, &plan).await;
        let finished_at = self.clock.now_ms();

        let (success, observation, error) = match response {
            Ok(resp) => (resp.success, Some(resp.data), resp.error),
            Err(e) => (false, None, Some(e.to_string())),
        };

        self.emit(
            EventType::AtomCallFinished,
            serde_json::to_value(atomflow_core::events::AtomCallPayload {
                atom_id: atom.atom_id.clone(),
                step_number: plan.step_number,
                success: Some(success),
                duration_ms: Some((finished_at - started_at).max(0) as u64),
                error: error.clone(),
            })
            .unwrap_or(Value::Null),
            Some(&session.session_id),
        )
        .await;

        if success {
            if let Some(obs) = &observation {
                let _ = auto_save(
                    self.invoker.as_ref(),
                    &self.clock,
                    atom,
                    session,
                    plan.output_alias.as_deref(),
                    obs,
                )
                .await;

                let created_path = session.available_files.last().cloned().unwrap_or_default();
                sink.send(atomflow_core::types::SessionEvent::FileCreated {
                    step_number: plan.step_number,
                    path: created_path.clone(),
                    alias: plan.output_alias.clone(),
                })
                .await
                .ok();
                self.emit(
                    EventType::FileCreated,
                    serde_json::json!({"step_number": plan.step_number, "path": created_path}),
                    Some(&session.session_id),
                )
                .await;
            }

            sink.send(atomflow_core::types::SessionEvent::StepCompleted {
                step_number: plan.step_number,
                atom_id: atom.atom_id.clone(),
            })
            .await
            .ok();
        } else {
            sink.send(atomflow_core::types::SessionEvent::StepFailed {
                step_number: plan.step_number,
                atom_id: atom.atom_id.clone(),
                error: error.clone().unwrap_or_default(),
            })
            .await
            .ok();
        }

        let evaluation = match tokio::time::timeout(
            Duration::from_secs(self.config.eval_bound_secs),
            evaluate(
                &self.llm,
                session,
                &plan,
                observation.as_ref().unwrap_or(&Value::Null),
                success,
                self.config.evaluation_temperature,
            ),
        )
        .await
        {
            Ok(eval) => eval,
            Err(_) => atomflow_core::types::Evaluation {
                decision: if success { Decision::Continue } else { Decision::RetryWithCorrection },
                reasoning: "evaluation timed out".to_string(),
                quality_score: if success { 0.5 } else { 0.0 },
                correctness: success,
                issues: Vec::new(),
                corrected_prompt: None,
            },
        };

        self.emit(
            EventType::StepEvaluated,
            serde_json::json!({
                "step_number": plan.step_number,
                "decision": evaluation.decision,
                "quality_score": evaluation.quality_score,
            }),
            Some(&session.session_id),
        )
        .await;

        let record = StepRecord {
            plan,
            observation,
            success,
            error,
            evaluation: Some(evaluation),
            started_at,
            finished_at,
        };

        let facts_digest = sha2_digest(&record.observation);
        let (markdown, _structured_insight, is_fallback) =
            per_step_insight(&self.llm, &self.insight_cache, &record.plan.atom_id, &facts_digest, &record).await;
        if is_fallback {
            sink.send(atomflow_core::types::SessionEvent::InsightFailed {
                step_number: record.plan.step_number,
                error: "insight generation degraded to fallback".to_string(),
            })
            .await
            .ok();
        } else {
            sink.send(atomflow_core::types::SessionEvent::WorkflowInsight {
                step_number: record.plan.step_number,
                markdown,
            })
            .await
            .ok();
        }

        Ok(record)
    }

    async fn invoke_with_retries(
        &self,
        session: &Session,
        sink: &dyn SessionSink,
        atom: &AtomDescriptor,
        plan: &StepPlan,
    ) -> Result<atomflow_core::types::AtomResponse> {
        let request = AtomRequest {
            session_id: session.session_id.clone(),
            step_number: plan.step_number,
            files: plan.files_used.clone(),
            inputs: plan.inputs.clone(),
            prompt: plan.prompt.clone(),
        };

        let mut attempt = 1;
        loop {
            match self.invoker.invoke(atom, request.clone()).await {
                Ok(resp) if resp.success => return Ok(resp),
                Ok(resp) if attempt >= ATOM_RETRIES => return Ok(resp),
                Ok(resp) => {
                    sink.send(atomflow_core::types::SessionEvent::AtomRetry {
                        step_number: plan.step_number,
                        atom_id: atom.atom_id.clone(),
                        attempt,
                    })
                    .await
                    .ok();
                    self.emit(
                        EventType::AtomRetry,
                        serde_json::json!({"step_number": plan.step_number, "atom_id": atom.atom_id, "attempt": attempt}),
                        Some(&session.session_id),
                    )
                    .await;
                    let _ = resp;
                }
                Err(e) if attempt >= ATOM_RETRIES => return Err(e),
                Err(_) => {
                    sink.send(atomflow_core::types::SessionEvent::AtomRetry {
                        step_number: plan.step_number,
                        atom_id: atom.atom_id.clone(),
                        attempt,
                    })
                    .await
                    .ok();
                    self.emit(
                        EventType::AtomRetry,
                        serde_json::json!({"step_number": plan.step_number, "atom_id": atom.atom_id, "attempt": attempt}),
                        Some(&session.session_id),
                    )
                    .await;
                }
            }
            attempt += 1;
            tokio::time::sleep(Duration::from_millis(200 * attempt as u64)).await;
        }
    }

    async fn plan_with_heartbeat(
        &self,
        session: &Session,
        sink: &dyn SessionSink,
        prompt: &str,
    ) -> PlanOutcome {
        let messages = vec![
            ChatMessage::system(
                "You plan the next step of a data analysis workflow. Respond with JSON only.",
            ),
            ChatMessage::user(prompt.to_string()),
        ];

        let call = self
            .llm
            .complete_json(&messages, self.config.planning_temperature, PLANNING_MAX_ATTEMPTS);
        tokio::pin!(call);

        let bound = tokio::time::sleep(Duration::from_secs(self.config.plan_bound_secs));
        tokio::pin!(bound);

        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                res = &mut call => {
                    return match res {
                        Ok(v) => PlanOutcome::Plan(v),
                        Err(_) => PlanOutcome::Paused,
                    };
                }
                _ = &mut bound => {
                    sink.send(atomflow_core::types::SessionEvent::ReactGenerationTimeout {
                        step_number: session.react_state.current_step_number,
                    })
                    .await
                    .ok();
                    return PlanOutcome::Paused;
                }
                _ = heartbeat.tick() => {
                    if sink
                        .send(atomflow_core::types::SessionEvent::ReactGenerationStatus {
                            step_number: session.react_state.current_step_number,
                            message: "still generating plan".to_string(),
                        })
                        .await
                        .is_err()
                    {
                        return PlanOutcome::Disconnected;
                    }
                }
            }
        }
    }

    /// Column/dtype/row-count metadata for each of `available_files` the
    /// Dataset Metadata Cache already knows about (spec §4.1 step 3). A
    /// cache miss just omits that file from the planning prompt rather
    /// than failing the cycle — population of the cache (from an atom's
    /// own response, or a future blob-store `stat` pass) is the operator's
    /// concern, not the engine's.
    async fn fetch_file_metadata(&self, session: &Session) -> Vec<DatasetMetadata> {
        let mut out = Vec::with_capacity(session.available_files.len());
        for path in &session.available_files {
            if let Ok(Some(meta)) = self.metadata_cache.get(self.blob_store.as_ref(), path).await {
                out.push(meta);
            }
        }
        out
    }

    fn detect_loop_risk(&self, session: &Session) -> bool {
        let Some(last) = session.execution_history.last() else {
            return false;
        };
        session
            .execution_history
            .iter()
            .rev()
            .take(3)
            .any(|r| r.plan.atom_id == last.plan.atom_id)
    }

    fn is_repeat_of_previous(&self, session: &Session, proposed: &StepPlan) -> bool {
        let Some(last) = session.execution_history.last() else {
            return false;
        };
        let last_files: std::collections::HashSet<&str> =
            last.plan.files_used.iter().map(String::as_str).collect();
        let proposed_files: std::collections::HashSet<&str> =
            proposed.files_used.iter().map(String::as_str).collect();
        last.plan.atom_id == proposed.atom_id && last_files == proposed_files
    }

    fn infer_atom_from_description(&self, description: &str) -> Option<String> {
        let lower = description.to_lowercase();
        self.atoms
            .list()
            .into_iter()
            .find(|a| lower.contains(&a.atom_id.to_lowercase()) || lower.contains(&a.display_name.to_lowercase()))
            .map(|a| a.atom_id)
    }

    /// Spec §4.5 "forced visualization": before honoring a `complete`
    /// transition, a prior step must have used `chart-maker`; if not, the
    /// engine synthesizes exactly one terminal chart-maker cycle.
    async fn enforce_forced_visualization(&self, session: &mut Session, sink: &dyn SessionSink) {
        let already_charted = session
            .execution_history
            .iter()
            .any(|r| r.plan.atom_id == CHART_MAKER_ATOM);
        if already_charted || session.available_files.is_empty() {
            return;
        }

        let Some(atom) = self.atoms.get(CHART_MAKER_ATOM) else {
            return;
        };

        let plan = StepPlan {
            step_number: session.react_state.current_step_number,
            atom_id: CHART_MAKER_ATOM.to_string(),
            human_description: "synthesized terminal visualization".to_string(),
            files_used: vec![session.available_files.last().cloned().unwrap_or_default()],
            inputs: Value::Null,
            output_alias: None,
            prompt: None,
        };
        let plan = rewrite(session, plan);

        if let Ok(record) = self.execute_and_evaluate(session, sink, &atom, plan).await {
            session.execution_history.push(record);
            session.react_state.current_step_number += 1;
        }
    }

    async fn emit_terminal_insight(&self, session: &Session, sink: &dyn SessionSink) {
        match terminal_insight(&self.llm, session).await {
            Some(markdown) => {
                sink.send(atomflow_core::types::SessionEvent::WorkflowInsight {
                    step_number: session.react_state.current_step_number,
                    markdown,
                })
                .await
                .ok();
            }
            None => {
                sink.send(atomflow_core::types::SessionEvent::InsightFailed {
                    step_number: session.react_state.current_step_number,
                    error: "terminal insight generation failed".to_string(),
                })
                .await
                .ok();
            }
        }
    }
}

enum CycleOutcome {
    Continue,
    GoalAchieved,
    /// The proposed step repeats the prior one (spec §4.1 "loop detection");
    /// the run ends as `Completed` without the forced-visualization pass
    /// that applies to a genuine `complete` decision (spec §4.5, §8.4).
    LoopDetected,
    Paused,
}

enum PlanOutcome {
    Plan(Value),
    Paused,
    Disconnected,
}

fn sha2_digest(value: &Option<Value>) -> String {
    use sha2::{Digest, Sha256};
    let rendered = value.as_ref().map(|v| v.to_string()).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(rendered.as_bytes());
    format!("{:x}", hasher.finalize())
}
