use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_COACHING_LOOKBACK_DAYS: i64 = 30;

/// Point-in-time settings for one evaluation. Callers own this value and
/// pass it in; nothing in the engine reads the clock on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineContext {
    /// Day the snapshot is evaluated on. A warning whose expiration date is
    /// on or before this day is no longer active.
    pub as_of: NaiveDate,
    pub coaching_lookback_days: i64,
}

impl EngineContext {
    pub fn as_of(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            coaching_lookback_days: DEFAULT_COACHING_LOOKBACK_DAYS,
        }
    }

    pub fn today() -> Self {
        Self::as_of(Utc::now().date_naive())
    }

    pub fn with_coaching_lookback(mut self, days: i64) -> Self {
        self.coaching_lookback_days = days.max(0);
        self
    }

    /// Earliest action date that still counts as recent coaching. A window
    /// reaching past the calendar's range starts at `NaiveDate::MIN`.
    pub fn coaching_cutoff(&self) -> NaiveDate {
        Duration::try_days(self.coaching_lookback_days)
            .and_then(|window| self.as_of.checked_sub_signed(window))
            .unwrap_or(NaiveDate::MIN)
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::today()
    }
}
