// Time Provider Port (for testability)

/// Time provider interface (allows mocking in tests)
pub trait TimeProvider: Send + Sync {
    /// Current time in milliseconds since epoch
    fn now_millis(&self) -> i64;

    /// Milliseconds elapsed since `start_millis`
    fn elapsed_millis(&self, start_millis: i64) -> i64 {
        (self.now_millis() - start_millis).max(0)
    }
}

/// System clock (production)
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}
