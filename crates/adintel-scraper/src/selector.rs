//! Bounds how many creatives receive the expensive detail-view scrape.

use adintel_core::Creative;
use chrono::{DateTime, Utc};

/// At most `cap` creatives that carry an archive id, ordered by
/// impression-range midpoint then days running, both descending. Ties keep
/// discovery order.
#[must_use]
pub fn select_top_performers(creatives: &[Creative], cap: usize, now: DateTime<Utc>) -> Vec<&Creative> {
    let mut eligible: Vec<&Creative> = creatives
        .iter()
        .filter(|c| c.archive_id.as_deref().is_some_and(|id| !id.trim().is_empty()))
        .collect();
    eligible.sort_by(|a, b| {
        b.reach_midpoint()
            .cmp(&a.reach_midpoint())
            .then_with(|| b.days_running(now).cmp(&a.days_running(now)))
    });
    eligible.truncate(cap);
    eligible
}
