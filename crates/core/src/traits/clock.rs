//! Clock trait: injected time source so engine timing (guards, debounce,
//! cache TTLs) is deterministic under test (spec §9 "Model these as
//! injected interfaces ... Clock").

/// Milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall-clock implementation used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

impl Clock for std::sync::Arc<dyn Clock> {
    fn now_ms(&self) -> i64 {
        self.as_ref().now_ms()
    }
}
