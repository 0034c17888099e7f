//! Per-caller daily admission control.
//!
//! Each [`RateLimiter`] owns one map from caller to the timestamps of its admitted
//! interactions. Counting is by local calendar day, so a caller's quota resets at local
//! midnight. Records older than 24 hours are pruned at most once per cleanup interval, and
//! callers left without records are dropped from the map.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{Duration, Local, NaiveDateTime};
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const DEFAULT_CLEANUP_INTERVAL_HOURS: u32 = 24;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("clock unavailable: {0}")]
    ClockUnavailable(String),
    #[error("rate limit state lock is poisoned")]
    StatePoisoned,
}

/// Source of local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Result<NaiveDateTime, RateLimitError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Result<NaiveDateTime, RateLimitError> {
        Ok(Local::now().naive_local())
    }
}

/// Hand-driven clock for tests and replays.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug)]
pub struct ManualClock {
    now: std::sync::Mutex<NaiveDateTime>,
    unavailable: std::sync::Mutex<bool>,
}

#[cfg(any(test, feature = "test-util"))]
impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self { now: std::sync::Mutex::new(start), unavailable: std::sync::Mutex::new(false) }
    }

    pub fn set(&self, value: NaiveDateTime) {
        if let Ok(mut now) = self.now.lock() {
            *now = value;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut flag) = self.unavailable.lock() {
            *flag = unavailable;
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
impl Clock for ManualClock {
    fn now(&self) -> Result<NaiveDateTime, RateLimitError> {
        let unavailable = self
            .unavailable
            .lock()
            .map_err(|_| RateLimitError::ClockUnavailable("manual clock poisoned".to_string()))?;
        if *unavailable {
            return Err(RateLimitError::ClockUnavailable("manual clock disabled".to_string()));
        }
        self.now
            .lock()
            .map(|now| *now)
            .map_err(|_| RateLimitError::ClockUnavailable("manual clock poisoned".to_string()))
    }
}

#[derive(Debug, Default)]
struct RateLimitState {
    requests: HashMap<String, Vec<NaiveDateTime>>,
    last_cleanup: Option<NaiveDateTime>,
}

impl RateLimitState {
    /// Drops records older than 24h unless the previous prune is younger than `interval`.
    fn prune_if_due(&mut self, now: NaiveDateTime, interval: Duration) -> bool {
        if let Some(last_cleanup) = self.last_cleanup {
            if now - last_cleanup < interval {
                return false;
            }
        }

        let cutoff = now - Duration::days(1);
        self.requests.retain(|_, records| {
            records.retain(|timestamp| *timestamp > cutoff);
            !records.is_empty()
        });
        self.last_cleanup = Some(now);
        true
    }

    fn count_on_day(&self, key: &str, now: NaiveDateTime) -> usize {
        let today = now.date();
        self.requests
            .get(key)
            .map(|records| records.iter().filter(|timestamp| timestamp.date() == today).count())
            .unwrap_or(0)
    }
}

pub struct RateLimiter {
    name: &'static str,
    max_requests: u32,
    cleanup_interval: Duration,
    clock: Arc<dyn Clock>,
    state: RwLock<RateLimitState>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("name", &self.name)
            .field("max_requests", &self.max_requests)
            .field("cleanup_interval", &self.cleanup_interval)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    pub fn new(name: &'static str, max_requests_per_day: u32) -> Self {
        Self {
            name,
            max_requests: max_requests_per_day,
            cleanup_interval: Duration::hours(i64::from(DEFAULT_CLEANUP_INTERVAL_HOURS)),
            clock: Arc::new(SystemClock),
            state: RwLock::new(RateLimitState::default()),
        }
    }

    pub fn with_cleanup_interval_hours(mut self, hours: u32) -> Self {
        self.cleanup_interval = Duration::hours(i64::from(hours));
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn quota(&self) -> u32 {
        self.max_requests
    }

    /// Admits and records one interaction for `key`, or refuses it.
    ///
    /// Fails closed: an empty key or any internal fault yields `false`.
    pub fn can_proceed(&self, key: &str) -> bool {
        match self.try_admit(key) {
            Ok(admitted) => admitted,
            Err(err) => {
                error!(
                    event_name = "rate_limit.check_failed",
                    limiter = self.name,
                    caller = key.trim(),
                    error = %err,
                    "rate limit check failed, denying"
                );
                false
            }
        }
    }

    /// Like [`RateLimiter::can_proceed`], but surfaces internal faults instead of denying.
    ///
    /// The key is trimmed first; an empty key is refused without touching state.
    pub fn try_admit(&self, key: &str) -> Result<bool, RateLimitError> {
        let key = key.trim();
        if key.is_empty() {
            warn!(
                event_name = "rate_limit.empty_caller",
                limiter = self.name,
                "empty caller id provided"
            );
            return Ok(false);
        }

        let now = self.clock.now()?;
        let mut state = self.state.write().map_err(|_| RateLimitError::StatePoisoned)?;

        if state.prune_if_due(now, self.cleanup_interval) {
            debug!(
                event_name = "rate_limit.pruned",
                limiter = self.name,
                active_callers = state.requests.len(),
                "cleaned up rate limiting records"
            );
        }

        let today = now.date();
        let records = state.requests.entry(key.to_string()).or_default();
        records.retain(|timestamp| timestamp.date() == today);

        if records.len() >= self.max_requests as usize {
            warn!(
                event_name = "rate_limit.exceeded",
                limiter = self.name,
                caller = key,
                limit = self.max_requests,
                "rate limit exceeded"
            );
            return Ok(false);
        }

        records.push(now);
        Ok(true)
    }

    /// Quota left today for `key`. Read-only; internal faults yield 0.
    pub fn get_remaining(&self, key: &str) -> u32 {
        let key = key.trim();
        if key.is_empty() {
            return 0;
        }

        match self.try_remaining(key) {
            Ok(remaining) => remaining,
            Err(err) => {
                error!(
                    event_name = "rate_limit.remaining_failed",
                    limiter = self.name,
                    caller = key,
                    error = %err,
                    "could not compute remaining requests"
                );
                0
            }
        }
    }

    fn try_remaining(&self, key: &str) -> Result<u32, RateLimitError> {
        let now = self.clock.now()?;
        let state = self.state.read().map_err(|_| RateLimitError::StatePoisoned)?;
        let used = u32::try_from(state.count_on_day(key, now)).unwrap_or(u32::MAX);
        Ok(self.max_requests.saturating_sub(used))
    }

    /// Clears one caller's records, or every caller's when `key` is `None`.
    pub fn reset(&self, key: Option<&str>) {
        let mut state = match self.state.write() {
            Ok(state) => state,
            Err(_) => {
                error!(
                    event_name = "rate_limit.reset_failed",
                    limiter = self.name,
                    error = %RateLimitError::StatePoisoned,
                    "could not reset rate limits"
                );
                return;
            }
        };

        match key.map(str::trim) {
            Some(key) if !key.is_empty() => {
                if state.requests.remove(key).is_some() {
                    info!(
                        event_name = "rate_limit.reset",
                        limiter = self.name,
                        caller = key,
                        "reset rate limit for caller"
                    );
                }
            }
            Some(_) => {}
            None => {
                state.requests.clear();
                info!(event_name = "rate_limit.reset_all", limiter = self.name, "reset all rate limits");
            }
        }
    }

    /// Number of callers currently holding records.
    pub fn active_callers(&self) -> usize {
        self.state.read().map(|state| state.requests.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use chrono::{Duration, NaiveDate, NaiveDateTime};

    use super::{ManualClock, RateLimitError, RateLimiter};

    const CALLER: &str = "+15551230000";

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, day)
            .and_then(|date| date.and_hms_opt(hour, minute, 0))
            .expect("valid timestamp")
    }

    fn limiter(quota: u32, clock: &Arc<ManualClock>) -> RateLimiter {
        RateLimiter::new("voice", quota).with_clock(clock.clone())
    }

    fn stored_records(limiter: &RateLimiter, key: &str) -> usize {
        limiter.state.read().expect("state").requests.get(key).map(Vec::len).unwrap_or(0)
    }

    #[test]
    fn admits_up_to_quota_and_counts_down_remaining() {
        let clock = Arc::new(ManualClock::new(at(10, 9, 0)));
        let limiter = limiter(3, &clock);

        for used in 1..=3 {
            assert!(limiter.can_proceed(CALLER), "call {used} should be admitted");
            assert_eq!(limiter.get_remaining(CALLER), 3 - used);
            clock.advance(Duration::minutes(5));
        }
    }

    #[test]
    fn call_beyond_quota_is_denied_without_recording() {
        let clock = Arc::new(ManualClock::new(at(10, 9, 0)));
        let limiter = limiter(2, &clock);

        assert!(limiter.can_proceed(CALLER));
        assert!(limiter.can_proceed(CALLER));
        assert!(!limiter.can_proceed(CALLER));
        assert!(!limiter.can_proceed(CALLER));

        assert_eq!(stored_records(&limiter, CALLER), 2);
        assert_eq!(limiter.get_remaining(CALLER), 0);
    }

    #[test]
    fn quota_resets_at_local_midnight_not_after_24_hours() {
        let clock = Arc::new(ManualClock::new(at(10, 23, 50)));
        let limiter = limiter(1, &clock);

        assert!(limiter.can_proceed(CALLER));
        assert!(!limiter.can_proceed(CALLER));

        clock.set(at(11, 0, 5));
        assert_eq!(limiter.get_remaining(CALLER), 1);
        assert!(limiter.can_proceed(CALLER), "a new calendar day should reset the count");
        assert_eq!(stored_records(&limiter, CALLER), 1);
    }

    #[test]
    fn empty_caller_is_denied_without_mutation() {
        let clock = Arc::new(ManualClock::new(at(10, 9, 0)));
        let limiter = limiter(5, &clock);

        assert!(!limiter.can_proceed(""));
        assert!(!limiter.can_proceed("   "));
        assert_eq!(limiter.get_remaining(""), 0);
        assert_eq!(limiter.active_callers(), 0);
    }

    #[test]
    fn try_admit_trims_and_refuses_empty_keys() {
        let clock = Arc::new(ManualClock::new(at(10, 9, 0)));
        let limiter = limiter(2, &clock);

        assert_eq!(limiter.try_admit(""), Ok(false));
        assert_eq!(limiter.try_admit("  "), Ok(false));
        assert_eq!(limiter.active_callers(), 0);

        assert_eq!(limiter.try_admit(" +15550000001 "), Ok(true));
        assert_eq!(limiter.get_remaining("+15550000001"), 1);
        assert_eq!(stored_records(&limiter, "+15550000001"), 1);
        assert_eq!(stored_records(&limiter, " +15550000001 "), 0);
    }

    #[test]
    fn callers_are_counted_independently() {
        let clock = Arc::new(ManualClock::new(at(10, 9, 0)));
        let limiter = limiter(1, &clock);

        assert!(limiter.can_proceed("+15550000001"));
        assert!(limiter.can_proceed("+15550000002"));
        assert!(!limiter.can_proceed("+15550000001"));
        assert_eq!(limiter.active_callers(), 2);
    }

    #[test]
    fn caller_key_is_trimmed_before_counting() {
        let clock = Arc::new(ManualClock::new(at(10, 9, 0)));
        let limiter = limiter(1, &clock);

        assert!(limiter.can_proceed(" +15550000001 "));
        assert!(!limiter.can_proceed("+15550000001"));
    }

    #[test]
    fn get_remaining_does_not_create_entries() {
        let clock = Arc::new(ManualClock::new(at(10, 9, 0)));
        let limiter = limiter(4, &clock);

        assert_eq!(limiter.get_remaining(CALLER), 4);
        assert_eq!(limiter.active_callers(), 0);
    }

    #[test]
    fn concurrent_admissions_never_exceed_quota() {
        let clock = Arc::new(ManualClock::new(at(10, 9, 0)));
        let limiter = limiter(10, &clock);

        let admitted = thread::scope(|scope| {
            let handles: Vec<_> =
                (0..50).map(|_| scope.spawn(|| limiter.can_proceed(CALLER))).collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("worker thread"))
                .filter(|admitted| *admitted)
                .count()
        });

        assert_eq!(admitted, 10);
        assert_eq!(stored_records(&limiter, CALLER), 10);
        assert_eq!(limiter.get_remaining(CALLER), 0);
    }

    #[test]
    fn pruning_drops_stale_callers_once_interval_elapsed() {
        let clock = Arc::new(ManualClock::new(at(10, 8, 0)));
        let limiter = limiter(5, &clock);

        // first admission performs the initial prune and arms the interval
        assert!(limiter.can_proceed("+15550000001"));
        assert!(limiter.can_proceed("+15550000002"));

        clock.set(at(11, 9, 0));
        assert!(limiter.can_proceed("+15550000003"));

        assert_eq!(limiter.active_callers(), 1);
        assert_eq!(stored_records(&limiter, "+15550000003"), 1);
    }

    #[test]
    fn pruning_is_skipped_until_interval_elapses() {
        let clock = Arc::new(ManualClock::new(at(10, 8, 0)));
        let limiter = limiter(5, &clock).with_cleanup_interval_hours(48);

        assert!(limiter.can_proceed("+15550000001"));

        clock.set(at(11, 9, 0));
        assert!(limiter.can_proceed("+15550000002"));
        assert_eq!(limiter.active_callers(), 2, "stale caller is kept until the next prune");

        clock.set(at(12, 9, 0));
        assert!(limiter.can_proceed("+15550000003"));
        assert_eq!(limiter.active_callers(), 1);
    }

    #[test]
    fn reset_clears_one_caller_or_all() {
        let clock = Arc::new(ManualClock::new(at(10, 9, 0)));
        let limiter = limiter(1, &clock);

        assert!(limiter.can_proceed("+15550000001"));
        assert!(limiter.can_proceed("+15550000002"));

        limiter.reset(Some("+15550000001"));
        assert!(limiter.can_proceed("+15550000001"));
        assert!(!limiter.can_proceed("+15550000002"));

        limiter.reset(None);
        assert_eq!(limiter.active_callers(), 0);
        assert_eq!(limiter.get_remaining("+15550000002"), 1);
    }

    #[test]
    fn clock_failure_fails_closed() {
        let clock = Arc::new(ManualClock::new(at(10, 9, 0)));
        let limiter = limiter(5, &clock);
        clock.set_unavailable(true);

        assert!(!limiter.can_proceed(CALLER));
        assert_eq!(limiter.get_remaining(CALLER), 0);
        assert!(matches!(limiter.try_admit(CALLER), Err(RateLimitError::ClockUnavailable(_))));

        clock.set_unavailable(false);
        assert!(limiter.can_proceed(CALLER));
    }

    #[test]
    fn poisoned_state_fails_closed() {
        let clock = Arc::new(ManualClock::new(at(10, 9, 0)));
        let limiter = limiter(5, &clock);

        let poisoned = thread::scope(|scope| {
            scope
                .spawn(|| {
                    let _guard = limiter.state.write().expect("state");
                    panic!("poison the limiter state");
                })
                .join()
        });
        assert!(poisoned.is_err());

        assert!(!limiter.can_proceed(CALLER));
        assert_eq!(limiter.get_remaining(CALLER), 0);
        assert_eq!(limiter.try_admit(CALLER), Err(RateLimitError::StatePoisoned));
    }
}
