//! Settles open forecasts against freshly observed rounds.

use crate::error::Result;
use crate::storage::Database;
use crate::types::{ForecastResult, Label, Round};

/// Compare each fetched round against an open forecast for the same issue
/// and settle it WIN or LOSS. Rounds without a matching forecast (for
/// example observed after a restart that skipped issuance) are left
/// unresolved: accepted bookkeeping loss, not an error. Returns how many
/// forecasts were settled.
pub async fn resolve_results(
    db: &Database,
    fetched: &[Round],
    high_threshold: i64,
) -> Result<u32> {
    let mut settled = 0u32;

    for round in fetched {
        let Some(forecast) = db.get_forecast(&round.issue).await? else {
            continue;
        };
        if forecast.result.is_some() {
            continue;
        }

        let actual = Label::from_number(round.number, high_threshold);
        let result = if actual == forecast.predicted {
            ForecastResult::Win
        } else {
            ForecastResult::Loss
        };

        if db.resolve_forecast(&round.issue, result).await? {
            settled += 1;
            tracing::info!(
                issue = %round.issue,
                predicted = %forecast.predicted,
                actual = %actual,
                result = %result,
                "forecast settled"
            );
        }
    }

    Ok(settled)
}
