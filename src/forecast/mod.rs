//! Forecasting and staking engines
//!
//! Both are pure functions over store snapshots: the forecast is a majority
//! vote over the trailing window, the stake multiplier is a capped
//! Martingale ladder keyed off the previous forecast's result. Keeping them
//! side-effect free is what makes the worker's state machine testable.

#[cfg(test)]
mod tests;

use crate::config::WorkerConfig;
use crate::types::{Forecast, ForecastResult, Label, Round};

/// Forecast fields produced by the engine, before the staking multiplier
/// and timestamp are attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastDraft {
    /// Issue id of the round being predicted.
    pub issue: String,
    pub predicted: Label,
    pub confidence: f64,
}

/// Majority vote over the trailing window of `history` (oldest first).
///
/// The majority label wins with confidence `majority / window`. A tie
/// breaks toward the label of the most recent round at confidence 0.5.
/// An empty history yields the fixed default: HIGH at 0.6 with a
/// synthetic issue id.
pub fn forecast_next(history: &[Round], config: &WorkerConfig) -> ForecastDraft {
    let Some(last) = history.last() else {
        return ForecastDraft {
            issue: "0".to_string(),
            predicted: Label::High,
            confidence: 0.6,
        };
    };

    let start = history.len().saturating_sub(config.history_window);
    let window = &history[start..];

    let high = window
        .iter()
        .filter(|r| Label::from_number(r.number, config.high_threshold) == Label::High)
        .count();
    let low = window.len() - high;

    let (predicted, confidence) = if high > low {
        (Label::High, high as f64 / window.len() as f64)
    } else if low > high {
        (Label::Low, low as f64 / window.len() as f64)
    } else {
        (Label::from_number(last.number, config.high_threshold), 0.5)
    };

    ForecastDraft {
        issue: next_issue_id(&last.issue),
        predicted,
        confidence,
    }
}

/// Derive the id of the round following `last`.
///
/// Purely numeric ids are incremented. Anything else gets a `-n` suffix
/// marker: a best-effort placeholder with no correctness semantics, kept
/// only so the forecast has a key. Callers must not rely on it matching a
/// future feed id.
pub fn next_issue_id(last: &str) -> String {
    last.parse::<u64>()
        .ok()
        .and_then(|n| n.checked_add(1))
        .map(|n| n.to_string())
        .unwrap_or_else(|| format!("{last}-n"))
}

/// Stake multiplier for the next forecast.
///
/// No previous forecast or a previous WIN resets to 1. A LOSS, or a
/// forecast still pending, doubles the previous multiplier, clamped at
/// `cap`.
pub fn next_multiplier(previous: Option<&Forecast>, cap: i64) -> i64 {
    match previous {
        None => 1,
        Some(f) if f.result == Some(ForecastResult::Win) => 1,
        Some(f) => f.multiplier.saturating_mul(2).min(cap),
    }
}
