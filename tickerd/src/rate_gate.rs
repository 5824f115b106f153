use crate::model::SubscriptionKey;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Per-key admission control: admits at most one event per `window` per key.
///
/// A single coarse lock guards the whole map rather than a lock per key — admission
/// work is O(1), so the coarse lock never becomes a bottleneck, and it keeps the
/// correctness argument trivial (see the module tests for concurrent admission).
/// `admit` never suspends: it is called from the hot tick-callback path and must not
/// be allowed to block on anything beyond this mutex.
#[derive(Debug)]
pub struct RateGate {
    window: Duration,
    last_admitted: Mutex<HashMap<SubscriptionKey, Instant>>,
}

impl RateGate {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_admitted: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` and records `now` as the key's new admission time iff
    /// `now - last(key) >= window`, or the key has no prior admission. Never rewrites
    /// `last(key)` backward: a `now` that is earlier than the stored time (clock
    /// non-monotonicity) is treated as zero elapsed time and rejected.
    pub fn admit(&self, key: &SubscriptionKey, now: Instant) -> bool {
        let mut map = self.last_admitted.lock();
        match map.get(key) {
            None => {
                map.insert(key.clone(), now);
                true
            }
            Some(&last) => {
                if now < last {
                    return false;
                }
                if now.duration_since(last) >= self.window {
                    map.insert(key.clone(), now);
                    true
                } else {
                    false
                }
            }
        }
    }
}
