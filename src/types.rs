use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest accepted site URL, matching the `sites.url` column width.
pub const URL_MAX_LEN: usize = 2000;

/// One row per distinct URL ever checked. `last_check_time` moves on every
/// check; `last_status_update_time` only when the verdict changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub url: String,
    pub contains_profanity: bool,
    pub last_check_time: DateTime<Utc>,
    pub last_status_update_time: DateTime<Utc>,
}

/// Optional filters for the listing endpoint.
#[derive(Debug, Clone, Default)]
pub struct SiteFilters {
    pub contains_profanity: Option<bool>,
    pub last_check_after: Option<DateTime<Utc>>,
    pub last_status_update_after: Option<DateTime<Utc>>,
}
