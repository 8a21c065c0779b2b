//! Single-slot cache with time-to-live
//!
//! Process local. Expiry is measured with the injected clock, so tests can
//! step past the TTL without waiting.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use core_kernel::Clock;

/// Default lifetime of cached CRM field configuration
pub const DEFAULT_CONFIG_TTL: Duration = Duration::from_secs(300);

struct Entry<T> {
    value: T,
    stored_at: DateTime<Utc>,
}

pub struct TtlCache<T> {
    clock: Arc<dyn Clock>,
    ttl: Duration,
    slot: Mutex<Option<Entry<T>>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            clock,
            ttl,
            slot: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached value, unless absent or older than the TTL
    pub fn get(&self) -> Option<T> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = slot.as_ref()?;
        let age = self.clock.now().signed_duration_since(entry.stored_at);
        let fresh = age.to_std().map(|age| age < self.ttl).unwrap_or(true);
        fresh.then(|| entry.value.clone())
    }

    pub fn set(&self, value: T) {
        let stored_at = self.clock.now();
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(Entry { value, stored_at });
    }

    pub fn invalidate(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::MockClock;

    #[test]
    fn test_expires_after_ttl() {
        let clock = MockClock::new();
        let cache = TtlCache::new(Arc::new(clock.clone()), Duration::from_secs(300));

        cache.set(7);
        clock.advance(Duration::from_secs(299));
        assert_eq!(cache.get(), Some(7));

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get(), None);
    }

    #[test]
    fn test_invalidate() {
        let clock = MockClock::new();
        let cache = TtlCache::new(Arc::new(clock), DEFAULT_CONFIG_TTL);
        cache.set("config".to_string());
        cache.invalidate();
        assert_eq!(cache.get(), None);
    }
}
