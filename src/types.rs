//! Core domain types shared across modules

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// HIGH/LOW label derived from a drawn number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Label {
    High,
    Low,
}

impl Label {
    /// Derive the label for a drawn number. Numbers at or above the
    /// threshold are HIGH, everything below is LOW.
    pub fn from_number(number: i64, threshold: i64) -> Self {
        if number >= threshold {
            Label::High
        } else {
            Label::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::High => "HIGH",
            Label::Low => "LOW",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "HIGH" => Some(Label::High),
            "LOW" => Some(Label::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One externally observed draw round. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    /// Natural key from the draw feed.
    pub issue: String,
    pub number: i64,
    pub color: String,
    pub observed_at: DateTime<Utc>,
}

/// Settled outcome of a forecast. A pending forecast has no result yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ForecastResult {
    Win,
    Loss,
}

impl ForecastResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastResult::Win => "WIN",
            ForecastResult::Loss => "LOSS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "WIN" => Some(ForecastResult::Win),
            "LOSS" => Some(ForecastResult::Loss),
            _ => None,
        }
    }
}

impl fmt::Display for ForecastResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A forecast issued for a not-yet-observed draw round.
///
/// Created once per issue id, then mutated exactly once when the matching
/// round arrives and the result is settled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    /// Issue id of the round this forecast predicts.
    pub issue: String,
    pub predicted: Label,
    /// Majority share of the trailing window, in [0, 1].
    pub confidence: f64,
    /// Martingale stake multiplier.
    pub multiplier: i64,
    pub created_at: DateTime<Utc>,
    /// None while the predicted round has not been observed.
    pub result: Option<ForecastResult>,
}

/// Accuracy summary over the forecast store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ForecastStats {
    pub total: i64,
    pub wins: i64,
    pub losses: i64,
    pub pending: i64,
    /// wins / total, rounded to 2 decimal places. Zero when empty.
    pub win_rate: Decimal,
}

impl ForecastStats {
    pub fn new(total: i64, wins: i64, losses: i64, pending: i64) -> Self {
        let win_rate = if total > 0 {
            (Decimal::from(wins) / Decimal::from(total)).round_dp(2)
        } else {
            Decimal::ZERO
        };
        Self {
            total,
            wins,
            losses,
            pending,
            win_rate,
        }
    }
}
