use std::time::{Duration, Instant};

/// Token bucket guarding one connection's inbound messages.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    tokens: u32,
    max_tokens: u32,
    refill_interval: Duration, // one token per interval
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new(max_tokens: u32, refill_interval: Duration) -> Self {
        Self {
            tokens: max_tokens, // Start with full bucket
            max_tokens,
            refill_interval,
            last_refill: Instant::now(),
        }
    }

    pub fn check_rate_limit(&mut self) -> bool {
        self.refill_tokens(Instant::now());

        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    fn refill_tokens(&mut self, now: Instant) {
        if self.refill_interval.is_zero() {
            self.tokens = self.max_tokens;
            return;
        }
        let elapsed = now.duration_since(self.last_refill);
        let earned = elapsed.as_millis() / self.refill_interval.as_millis().max(1);
        if earned == 0 {
            return;
        }

        let earned = u32::try_from(earned).unwrap_or(u32::MAX);
        self.tokens = self.tokens.saturating_add(earned).min(self.max_tokens);
        if self.tokens == self.max_tokens {
            self.last_refill = now;
        } else {
            // Partial intervals carry over to the next check.
            self.last_refill += self.refill_interval * earned;
        }
    }

    pub fn remaining_tokens(&mut self) -> u32 {
        self.refill_tokens(Instant::now());
        self.tokens
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(30, Duration::from_millis(500))
    }
}
