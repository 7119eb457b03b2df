//! Status and summary message rendering
//!
//! Pure functions from store snapshots to Telegram-HTML text. The rest of
//! the system treats the output as an opaque string.

use crate::types::{Forecast, ForecastResult, ForecastStats, Label, Round};

/// Fallback payload when the round store is empty.
pub const NO_DATA_MESSAGE: &str = "No draw history yet.";

/// Render the broadcast status message: recent rounds annotated with their
/// forecast outcome, plus the next-bet line from the latest forecast.
pub fn build_status_message(
    title: &str,
    recent: &[(Round, Option<Forecast>)],
    latest: Option<&Forecast>,
    high_threshold: i64,
) -> String {
    if recent.is_empty() {
        return NO_DATA_MESSAGE.to_string();
    }

    let mut lines = Vec::with_capacity(recent.len());
    for (round, forecast) in recent {
        let label = Label::from_number(round.number, high_threshold);
        let (multiplier, marker) = match forecast {
            Some(f) => (f.multiplier, outcome_marker(f.result)),
            None => (1, "➖"),
        };
        lines.push(format!(
            "{}  {:<4}  {}x  {}",
            issue_suffix(&round.issue),
            label.as_str(),
            multiplier,
            marker
        ));
    }

    let next_bet = match latest {
        Some(f) => format!(
            "📊 <b>BET → {} {} {}x</b>",
            issue_suffix(&f.issue),
            f.predicted,
            f.multiplier
        ),
        None => "📊 <b>BET → ??? HIGH 1x</b>".to_string(),
    };

    format!(
        "<b>{title}</b>\n🔥 <b>PRIME PREDICTIONS</b> 🔥\n\n{}\n\n{next_bet}",
        lines.join("\n")
    )
}

/// Render the daily accuracy summary.
pub fn build_daily_summary(stats: &ForecastStats) -> String {
    format!(
        "📊 <b>Daily Forecast Summary</b>\n\n\
        Total: {}\n\
        Wins: {}\n\
        Losses: {}\n\
        Pending: {}\n\
        Win rate: {}",
        stats.total, stats.wins, stats.losses, stats.pending, stats.win_rate
    )
}

fn outcome_marker(result: Option<ForecastResult>) -> &'static str {
    match result {
        Some(ForecastResult::Win) => "💖💖",
        Some(ForecastResult::Loss) => "🖤🖤",
        None => "⌛",
    }
}

// Short display form of an issue id: the last three characters.
fn issue_suffix(issue: &str) -> &str {
    let len = issue.chars().count();
    if len <= 3 {
        return issue;
    }
    let (idx, _) = issue.char_indices().nth(len - 3).unwrap_or((0, ' '));
    &issue[idx..]
}
