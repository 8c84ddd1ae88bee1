use serde::{Deserialize, Serialize};

use crate::format::DEFAULT_TIME_PATTERN;

/// Placeholder shown when a participant has no profile picture.
pub const DEFAULT_AVATAR: &str = "/avatar.png";

/// Number of placeholder bubbles shown while history loads.
pub const DEFAULT_SKELETON_ROWS: usize = 6;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub default_avatar: String,
    pub skeleton_rows: usize,
    /// strftime-style pattern for message timestamps
    pub time_pattern: String,
    /// Render timestamps in the machine's local offset instead of UTC
    pub local_time: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            default_avatar: DEFAULT_AVATAR.to_string(),
            skeleton_rows: DEFAULT_SKELETON_ROWS,
            time_pattern: DEFAULT_TIME_PATTERN.to_string(),
            local_time: false,
        }
    }
}

impl ViewConfig {
    /// Parse a JSON config. Missing fields keep their defaults.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
