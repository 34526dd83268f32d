use std::time::Duration;

/// Reconnect backoff schedule handed to clients in the connect payload and
/// used by internal consumers of the socket.
///
/// Delays grow exponentially from `base` up to `cap`. A connection that
/// stays up for at least `stability_window` resets the schedule, so a
/// flapping link keeps backing off while a one-off drop retries quickly.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base: Duration,
    cap: Duration,
    stability_window: Duration,
    attempt: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(1),
            Duration::from_secs(30),
            Duration::from_secs(60),
        )
    }
}

impl ReconnectPolicy {
    pub fn new(base: Duration, cap: Duration, stability_window: Duration) -> Self {
        Self {
            base,
            cap,
            stability_window,
            attempt: 0,
        }
    }

    /// Delay to wait before the next attempt; advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let exp = self.attempt.min(16); // shift guard
        let delay = self
            .base
            .checked_mul(1u32 << exp)
            .map(|d| d.min(self.cap))
            .unwrap_or(self.cap);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Record how long the last connection survived. Stable connections
    /// reset the schedule; short-lived ones leave it where it was.
    pub fn connection_closed(&mut self, connected_for: Duration) {
        if connected_for >= self.stability_window {
            self.attempt = 0;
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_until_the_cap() {
        let mut policy = ReconnectPolicy::new(
            Duration::from_secs(1),
            Duration::from_secs(8),
            Duration::from_secs(60),
        );
        assert_eq!(policy.next_delay(), Duration::from_secs(1));
        assert_eq!(policy.next_delay(), Duration::from_secs(2));
        assert_eq!(policy.next_delay(), Duration::from_secs(4));
        assert_eq!(policy.next_delay(), Duration::from_secs(8));
        // capped from here on
        assert_eq!(policy.next_delay(), Duration::from_secs(8));
        assert_eq!(policy.next_delay(), Duration::from_secs(8));
    }

    #[test]
    fn stable_connection_resets_the_schedule() {
        let mut policy = ReconnectPolicy::default();
        policy.next_delay();
        policy.next_delay();
        policy.next_delay();
        assert!(policy.attempt() > 0);

        policy.connection_closed(Duration::from_secs(120));
        assert_eq!(policy.attempt(), 0);
        assert_eq!(policy.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn short_lived_connection_keeps_backing_off() {
        let mut policy = ReconnectPolicy::default();
        let first = policy.next_delay();
        policy.connection_closed(Duration::from_secs(2));
        let second = policy.next_delay();
        assert!(second > first);
    }

    #[test]
    fn large_attempt_counts_do_not_overflow() {
        let mut policy = ReconnectPolicy::new(
            Duration::from_secs(1),
            Duration::from_secs(30),
            Duration::from_secs(60),
        );
        for _ in 0..100 {
            assert!(policy.next_delay() <= Duration::from_secs(30));
        }
    }
}
