//! Replay Controller (spec §4.4): re-executes the most recently cached
//! step plan when Dependency Validation finds its output missing, bounded
//! by `MAX_REPLAYS` (testable property §8.6).

use atomflow_core::traits::{AtomInvoker, Clock};
use atomflow_core::types::{AtomDescriptor, Session};
use atomflow_core::{Error, Result};

use crate::autosave::auto_save;
use crate::rewriter::rewrite;

pub enum ReplayOutcome {
    Patched,
    Exhausted,
    NothingToReplay,
}

/// Rebinds `cached_plans[last_step]`'s `files_used`/`inputs` against the
/// *current* alias registry, re-invokes the atom, and patches the last
/// `StepRecord` in place. Does not extend `execution_history`.
pub async fn replay<I: AtomInvoker + ?Sized, C: Clock>(
    invoker: &I,
    clock: &C,
    atom: &AtomDescriptor,
    session: &mut Session,
    max_replays: u32,
) -> Result<ReplayOutcome> {
    if session.replay_count >= max_replays {
        return Ok(ReplayOutcome::Exhausted);
    }

    let last_step = match session.last_history_entry() {
        Some(record) => record.plan.step_number,
        None => return Ok(ReplayOutcome::NothingToReplay),
    };

    let Some(cached) = session.cached_plans.get(&last_step).cloned() else {
        return Ok(ReplayOutcome::NothingToReplay);
    };

    let rebound = rewrite(session, cached);
    session.replay_count += 1;

    let request = atomflow_core::types::AtomRequest {
        session_id: session.session_id.clone(),
        step_number: rebound.step_number,
        files: rebound.files_used.clone(),
        inputs: rebound.inputs.clone(),
        prompt: rebound.prompt.clone(),
    };

    let started_at = clock.now_ms();
    let response = invoker.invoke(atom, request).await;
    let finished_at = clock.now_ms();

    let (success, observation, error) = match response {
        Ok(resp) => (resp.success, Some(resp.data), resp.error),
        Err(e) => (false, None, Some(e.to_string())),
    };

    if success {
        if let Some(obs) = &observation {
            let outcome = auto_save(
                invoker,
                clock,
                atom,
                session,
                rebound.output_alias.as_deref(),
                obs,
            )
            .await?;
            let _ = outcome;
        }
    }

    let Some(last_record) = session.execution_history.last_mut() else {
        return Err(Error::engine("replay target vanished from history"));
    };
    last_record.plan = rebound;
    last_record.observation = observation;
    last_record.success = success;
    last_record.error = error;
    last_record.started_at = started_at;
    last_record.finished_at = finished_at;

    Ok(ReplayOutcome::Patched)
}
