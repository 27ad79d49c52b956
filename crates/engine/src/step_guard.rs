//! Per-session Step Guard table (spec §4.2). `acquire` fails fast — it
//! never waits inside the cell; the ReAct Engine owns the 500ms
//! backoff-and-retry loop described in spec §4.1 step 1.

use dashmap::DashMap;
use uuid::Uuid;

use atomflow_core::types::{GuardStatus, StepGuard};

#[derive(Debug, Default)]
pub struct StepGuardTable {
    guards: DashMap<String, StepGuard>,
}

impl StepGuardTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a fresh guard for `session_id` at `step_number` if none is
    /// currently held. Returns the guard's token on success.
    pub fn acquire(&self, session_id: &str, step_number: u32, now: i64) -> Option<Uuid> {
        match self.guards.entry(session_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let guard = StepGuard::acquire(step_number, now);
                let token = guard.token;
                slot.insert(guard);
                Some(token)
            }
        }
    }

    /// Advances the held guard's status, if `token` still matches.
    pub fn advance(&self, session_id: &str, token: Uuid, status: GuardStatus, now: i64) {
        if let Some(mut guard) = self.guards.get_mut(session_id) {
            if guard.token == token {
                guard.advance(status, now);
            }
        }
    }

    /// Releases the guard iff the presented token matches the one
    /// installed — a stale release from a superseded cycle is a no-op
    /// (spec §4.2, invariant §8.2).
    pub fn release(&self, session_id: &str, token: Uuid) {
        if let Some(entry) = self.guards.get(session_id) {
            if entry.token != token {
                return;
            }
        } else {
            return;
        }
        self.guards.remove_if(session_id, |_, g| g.token == token);
    }

    pub fn is_held(&self, session_id: &str) -> bool {
        self.guards.contains_key(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_while_first_is_held() {
        let table = StepGuardTable::new();
        let first = table.acquire("s1", 1, 0);
        assert!(first.is_some());
        assert!(table.acquire("s1", 1, 0).is_none());
    }

    #[test]
    fn release_with_stale_token_is_a_no_op() {
        let table = StepGuardTable::new();
        let token = table.acquire("s1", 1, 0).unwrap();
        table.release("s1", Uuid::new_v4());
        assert!(table.is_held("s1"));
        table.release("s1", token);
        assert!(!table.is_held("s1"));
    }

    #[test]
    fn acquire_succeeds_again_after_release() {
        let table = StepGuardTable::new();
        let token = table.acquire("s1", 1, 0).unwrap();
        table.release("s1", token);
        assert!(table.acquire("s1", 2, 1).is_some());
    }
}
