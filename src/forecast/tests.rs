//! Tests for the forecasting and staking engines

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::config::WorkerConfig;
    use crate::types::{Forecast, ForecastResult, Label, Round};
    use chrono::Utc;

    fn round(issue: &str, number: i64) -> Round {
        Round {
            issue: issue.to_string(),
            number,
            color: String::new(),
            observed_at: Utc::now(),
        }
    }

    fn rounds_from_numbers(numbers: &[i64]) -> Vec<Round> {
        numbers
            .iter()
            .enumerate()
            .map(|(i, &n)| round(&(100 + i as i64).to_string(), n))
            .collect()
    }

    fn previous(result: Option<ForecastResult>, multiplier: i64) -> Forecast {
        Forecast {
            issue: "100".to_string(),
            predicted: Label::High,
            confidence: 0.6,
            multiplier,
            created_at: Utc::now(),
            result,
        }
    }

    #[test]
    fn test_majority_low_window() {
        // 8 LOW, 2 HIGH
        let history = rounds_from_numbers(&[1, 2, 7, 0, 3, 4, 9, 1, 2, 3]);
        let draft = forecast_next(&history, &WorkerConfig::default());
        assert_eq!(draft.predicted, Label::Low);
        assert_eq!(draft.confidence, 0.8);
        assert_eq!(draft.issue, "110");
    }

    #[test]
    fn test_majority_high_window() {
        let history = rounds_from_numbers(&[5, 6, 7, 8, 9, 5, 6, 1, 2, 3]);
        let draft = forecast_next(&history, &WorkerConfig::default());
        assert_eq!(draft.predicted, Label::High);
        assert_eq!(draft.confidence, 0.7);
    }

    #[test]
    fn test_tie_breaks_toward_last_round() {
        let history = rounds_from_numbers(&[1, 9, 2, 8, 3, 7, 4, 6, 0, 5]);
        let draft = forecast_next(&history, &WorkerConfig::default());
        // last round is 5 -> HIGH
        assert_eq!(draft.predicted, Label::High);
        assert_eq!(draft.confidence, 0.5);

        let history = rounds_from_numbers(&[1, 9, 2, 8, 3, 7, 4, 6, 5, 0]);
        let draft = forecast_next(&history, &WorkerConfig::default());
        assert_eq!(draft.predicted, Label::Low);
        assert_eq!(draft.confidence, 0.5);
    }

    #[test]
    fn test_short_history_uses_all_rounds() {
        let history = rounds_from_numbers(&[9, 8, 1]);
        let draft = forecast_next(&history, &WorkerConfig::default());
        assert_eq!(draft.predicted, Label::High);
        assert!((draft.confidence - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_only_trailing_window_counts() {
        // 12 rounds, all LOW except the oldest two; window of 10 sees only LOW
        let history = rounds_from_numbers(&[9, 9, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1]);
        let draft = forecast_next(&history, &WorkerConfig::default());
        assert_eq!(draft.predicted, Label::Low);
        assert_eq!(draft.confidence, 1.0);
    }

    #[test]
    fn test_empty_history_default_forecast() {
        let draft = forecast_next(&[], &WorkerConfig::default());
        assert_eq!(draft.predicted, Label::High);
        assert_eq!(draft.confidence, 0.6);
        assert_eq!(draft.issue, "0");
    }

    #[test]
    fn test_next_issue_id_numeric() {
        assert_eq!(next_issue_id("20240806101"), "20240806102");
        assert_eq!(next_issue_id("99"), "100");
    }

    #[test]
    fn test_next_issue_id_non_numeric_marker() {
        assert_eq!(next_issue_id("abc123x"), "abc123x-n");
        assert_eq!(next_issue_id(""), "-n");
    }

    #[test]
    fn test_multiplier_no_previous() {
        assert_eq!(next_multiplier(None, 81), 1);
    }

    #[test]
    fn test_multiplier_resets_after_win() {
        let prev = previous(Some(ForecastResult::Win), 64);
        assert_eq!(next_multiplier(Some(&prev), 81), 1);
    }

    #[test]
    fn test_multiplier_doubles_after_loss() {
        let prev = previous(Some(ForecastResult::Loss), 4);
        assert_eq!(next_multiplier(Some(&prev), 81), 8);
    }

    #[test]
    fn test_multiplier_pending_counts_as_not_won() {
        let prev = previous(None, 2);
        assert_eq!(next_multiplier(Some(&prev), 81), 4);
    }

    #[test]
    fn test_multiplier_clamped_at_cap() {
        let prev = previous(Some(ForecastResult::Loss), 64);
        assert_eq!(next_multiplier(Some(&prev), 81), 81);

        // staying at the cap keeps escalating to the cap, not past it
        let prev = previous(Some(ForecastResult::Loss), 81);
        assert_eq!(next_multiplier(Some(&prev), 81), 81);
    }

    #[test]
    fn test_multiplier_monotone_under_losses() {
        let mut mult = next_multiplier(None, 81);
        for _ in 0..10 {
            let prev = previous(Some(ForecastResult::Loss), mult);
            let next = next_multiplier(Some(&prev), 81);
            assert!(next >= mult);
            assert!(next <= 81);
            mult = next;
        }
        assert_eq!(mult, 81);
    }
}
