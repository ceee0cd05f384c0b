use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

const MILLIS_PER_MINUTE: i64 = 60_000;

/// The whole cache as persisted: resource key -> entry.
pub type CacheMap = HashMap<String, CacheEntry>;

/// A cached value and the time it was last written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CacheEntry {
    pub data: Value,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl CacheEntry {
    pub fn new(data: Value, timestamp: i64) -> Self {
        Self { data, timestamp }
    }

    /// Age in milliseconds at `now`. Negative when the clock moved backwards.
    /// Saturates for out-of-range timestamps read from a tampered blob.
    pub fn age_millis(&self, now: i64) -> i64 {
        now.saturating_sub(self.timestamp)
    }

    pub fn age_minutes(&self, now: i64) -> i64 {
        self.age_millis(now) / MILLIS_PER_MINUTE
    }

    pub fn age_display(&self, now: i64) -> String {
        let minutes = self.age_minutes(now);
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}
