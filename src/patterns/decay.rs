// src/patterns/decay.rs — Pattern confidence decay

use chrono::{DateTime, Utc};

/// Confidence after exponential decay over the time elapsed since `since`.
///
/// Callers pass the moment decay was last applied, so repeated calls compose:
/// decaying over `a..b` then `b..c` equals decaying over `a..c` once.
/// Patterns that keep getting reinforced hold their confidence; ones that stop
/// showing up fade and are eventually pruned.
pub fn decayed_confidence(
    confidence: f64,
    since: DateTime<Utc>,
    now: DateTime<Utc>,
    rate_per_week: f64,
) -> f64 {
    if rate_per_week <= 0.0 {
        return confidence;
    }
    let weeks_since = (now - since).num_seconds().max(0) as f64 / (7.0 * 86_400.0);
    confidence * (-rate_per_week * weeks_since).exp()
}
