//! Upload timing with additive backoff on throttling.

use std::time::Duration;
use tokio::time::Instant;

/// Decides when buffered readings are pushed to the cloud.
///
/// Until the first successful upload the configured initial delay applies.
/// After that the delay is `base_interval`, grown by `throttle_increment`
/// for every throttled attempt and reset on the next success.
///
/// Note: there is no cap on the backoff. A service that keeps throttling
/// pushes uploads further and further apart.
#[derive(Debug, Clone)]
pub struct UploadScheduler {
    base_interval: Duration,
    throttle_increment: Duration,
    current_delay: Duration,
    /// Delay before the first upload, cleared on the first success
    initial_delay: Option<Duration>,
    last_upload: Instant,
    upload_count: u32,
    max_uploads: u32,
}

impl UploadScheduler {
    /// Create a scheduler whose clock starts at `start`.
    ///
    /// `max_uploads == 0` means no limit.
    pub fn new(
        base_interval: Duration,
        initial_delay: Duration,
        throttle_increment: Duration,
        max_uploads: u32,
        start: Instant,
    ) -> Self {
        Self {
            base_interval,
            throttle_increment,
            current_delay: base_interval,
            initial_delay: Some(initial_delay),
            last_upload: start,
            upload_count: 0,
            max_uploads,
        }
    }

    pub fn base_interval(&self) -> Duration {
        self.base_interval
    }

    /// Delay that has to pass since the last attempt before uploading.
    pub fn current_delay(&self) -> Duration {
        self.initial_delay.unwrap_or(self.current_delay)
    }

    pub fn upload_count(&self) -> u32 {
        self.upload_count
    }

    pub fn max_uploads(&self) -> u32 {
        self.max_uploads
    }

    pub fn last_upload(&self) -> Instant {
        self.last_upload
    }

    pub fn should_upload(&self, elapsed: Duration) -> bool {
        elapsed >= self.current_delay()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.should_upload(now.saturating_duration_since(self.last_upload))
    }

    /// Time left until the next upload is due.
    pub fn next_upload_in(&self, now: Instant) -> Duration {
        self.current_delay()
            .saturating_sub(now.saturating_duration_since(self.last_upload))
    }

    /// Fraction of the current delay that has passed, in `[0, 1]`.
    pub fn progress(&self, now: Instant) -> f64 {
        let delay = self.current_delay().as_secs_f64();
        if delay <= 0.0 {
            return 1.0;
        }
        (now.saturating_duration_since(self.last_upload).as_secs_f64() / delay).clamp(0.0, 1.0)
    }

    pub fn record_success(&mut self, now: Instant) {
        self.upload_count += 1;
        self.initial_delay = None;
        self.current_delay = self.base_interval;
        self.last_upload = now;
    }

    pub fn record_throttled(&mut self, now: Instant) {
        match self.initial_delay.as_mut() {
            Some(initial) => *initial += self.throttle_increment,
            None => self.current_delay += self.throttle_increment,
        }
        self.last_upload = now;
    }

    /// True once the upload cap has been reached.
    pub fn is_finished(&self) -> bool {
        self.max_uploads > 0 && self.upload_count >= self.max_uploads
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_secs(600);
    const INITIAL: Duration = Duration::from_secs(300);
    const THROTTLE: Duration = Duration::from_secs(120);

    fn scheduler(max_uploads: u32) -> (UploadScheduler, Instant) {
        let start = Instant::now();
        (
            UploadScheduler::new(BASE, INITIAL, THROTTLE, max_uploads, start),
            start,
        )
    }

    #[test]
    fn test_first_upload_uses_initial_delay() {
        let (s, start) = scheduler(0);
        assert_eq!(s.current_delay(), INITIAL);
        assert!(!s.is_due(start + INITIAL - Duration::from_millis(1)));
        assert!(s.is_due(start + INITIAL));
    }

    #[test]
    fn test_should_upload_flips_exactly_at_delay() {
        let (mut s, start) = scheduler(0);
        s.record_success(start);
        assert!(!s.should_upload(Duration::ZERO));
        assert!(!s.should_upload(BASE - Duration::from_nanos(1)));
        assert!(s.should_upload(BASE));
        assert!(s.should_upload(BASE * 2));
    }

    #[test]
    fn test_throttling_adds_increment_then_success_resets() {
        let (mut s, start) = scheduler(0);
        s.record_success(start);

        s.record_throttled(start);
        assert_eq!(s.current_delay(), BASE + THROTTLE);
        s.record_throttled(start);
        assert_eq!(s.current_delay(), BASE + THROTTLE * 2);
        assert_eq!(s.upload_count(), 1);

        s.record_success(start);
        assert_eq!(s.current_delay(), BASE);
        assert_eq!(s.upload_count(), 2);
    }

    #[test]
    fn test_throttled_before_first_upload_extends_initial_delay() {
        let (mut s, start) = scheduler(0);
        s.record_throttled(start);
        assert_eq!(s.current_delay(), INITIAL + THROTTLE);
        s.record_success(start);
        assert_eq!(s.current_delay(), BASE);
    }

    #[test]
    fn test_delay_never_below_base_after_first_upload() {
        let (mut s, start) = scheduler(0);
        s.record_success(start);
        for i in 0..20 {
            if i % 3 == 0 {
                s.record_success(start);
            } else {
                s.record_throttled(start);
            }
            assert!(s.current_delay() >= s.base_interval());
        }
    }

    #[test]
    fn test_attempt_restarts_the_clock() {
        let (mut s, start) = scheduler(0);
        let later = start + INITIAL;
        s.record_throttled(later);
        assert!(!s.is_due(later + INITIAL));
        assert!(s.is_due(later + INITIAL + THROTTLE));
    }

    #[test]
    fn test_max_uploads() {
        let (mut s, start) = scheduler(3);
        for _ in 0..2 {
            s.record_success(start);
            assert!(!s.is_finished());
        }
        s.record_throttled(start);
        assert!(!s.is_finished());
        s.record_success(start);
        assert!(s.is_finished());
    }

    #[test]
    fn test_unlimited_uploads() {
        let (mut s, start) = scheduler(0);
        for _ in 0..100 {
            s.record_success(start);
        }
        assert!(!s.is_finished());
    }

    #[test]
    fn test_progress_and_countdown() {
        let (s, start) = scheduler(0);
        assert_eq!(s.progress(start), 0.0);
        assert_eq!(s.progress(start + INITIAL / 2), 0.5);
        assert_eq!(s.progress(start + INITIAL * 4), 1.0);
        assert_eq!(s.next_upload_in(start + Duration::from_secs(100)), Duration::from_secs(200));
        assert_eq!(s.next_upload_in(start + INITIAL * 2), Duration::ZERO);
    }
}
