use std::time::Instant;

/// Token bucket guarding the hot receive path.
///
/// Refill is lazy: tokens accrue on the next `try_consume` call instead of
/// on a timer, keeping the fast path branch-light. Not thread-safe; there
/// is one limiter per session, touched only by that session's I/O thread.
pub struct RateLimiter {
    refill_rate: f64,
    capacity: f64,
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// `rate` tokens per second, `burst` bucket capacity.
    pub fn new(rate: f64, burst: f64) -> RateLimiter {
        RateLimiter {
            refill_rate: rate,
            capacity: burst,
            tokens: burst,
            last_refill: Instant::now(),
        }
    }

    /// Deducts `amount` tokens if available. Denials deduct nothing.
    #[inline]
    pub fn try_consume(&mut self, amount: f64) -> bool {
        let now = Instant::now();
        let delta = now.duration_since(self.last_refill).as_secs_f64();

        let refill = delta * self.refill_rate;
        if refill > 0.0 {
            self.tokens = self.capacity.min(self.tokens + refill);
            self.last_refill = now;
        }

        if self.tokens >= amount {
            self.tokens -= amount;
            return true;
        }

        false
    }

    pub fn update_config(&mut self, rate: f64, burst: f64) {
        self.refill_rate = rate;
        self.capacity = burst;
        if self.tokens > self.capacity {
            self.tokens = self.capacity;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_initial_burst() {
        // 10 tokens/sec, burst 5: five immediate consumes, then denial.
        let mut limiter = RateLimiter::new(10.0, 5.0);

        assert!(limiter.try_consume(5.0));
        assert!(!limiter.try_consume(1.0));
    }

    #[test]
    fn test_denial_deducts_nothing() {
        let mut limiter = RateLimiter::new(10.0, 2.0);

        assert!(!limiter.try_consume(5.0));
        // The two burst tokens are still there.
        assert!(limiter.try_consume(2.0));
    }

    #[test]
    fn test_refill() {
        // 100 tokens/sec, burst 10: drain, wait 25ms (~2.5 tokens), two
        // more consumes must succeed.
        let mut limiter = RateLimiter::new(100.0, 10.0);

        assert!(limiter.try_consume(10.0));
        assert!(!limiter.try_consume(1.0));

        thread::sleep(Duration::from_millis(25));

        assert!(limiter.try_consume(1.0));
        assert!(limiter.try_consume(1.0));
    }

    #[test]
    fn test_tokens_capped_at_capacity() {
        let mut limiter = RateLimiter::new(1000.0, 3.0);

        thread::sleep(Duration::from_millis(20));

        // Despite 20ms at 1000/sec, only the burst capacity is available.
        assert!(limiter.try_consume(3.0));
        assert!(!limiter.try_consume(1.0));
    }

    #[test]
    fn test_partial_amounts() {
        let mut limiter = RateLimiter::new(10.0, 10.0);

        for _ in 0..19 {
            assert!(limiter.try_consume(0.5));
        }
    }

    #[test]
    fn test_update_config_reclamps() {
        let mut limiter = RateLimiter::new(10.0, 10.0);
        limiter.update_config(10.0, 2.0);

        assert!(limiter.try_consume(2.0));
        assert!(!limiter.try_consume(1.0));
    }
}
