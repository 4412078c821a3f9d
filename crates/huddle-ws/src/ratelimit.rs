use tokio::time::{Duration, Instant};

pub const CHAT_WINDOW: Duration = Duration::from_secs(60);
pub const CHAT_BUDGET: u32 = 30;

/// Fixed-window counter for the chat path. One instance per connection,
/// created on connect and dropped with it, so a reconnect starts a fresh
/// budget. Negotiation traffic is not throttled here.
pub struct ChatRateLimiter {
    window: Duration,
    budget: u32,
    window_start: Instant,
    count: u32,
}

impl ChatRateLimiter {
    pub fn new() -> Self {
        Self::with_limits(CHAT_WINDOW, CHAT_BUDGET)
    }

    pub fn with_limits(window: Duration, budget: u32) -> Self {
        Self {
            window,
            budget,
            window_start: Instant::now(),
            count: 0,
        }
    }

    /// Account for one chat send. Returns false when the window budget is
    /// exhausted; rejected sends do not advance the counter.
    pub fn check(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.window_start) >= self.window {
            self.window_start = now;
            self.count = 0;
        }
        if self.count >= self.budget {
            return false;
        }
        self.count += 1;
        true
    }
}

impl Default for ChatRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
