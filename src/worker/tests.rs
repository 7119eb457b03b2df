//! Tests for the polling worker and supervisor

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::config::{Config, DatabaseConfig, SourceConfig, SummaryConfig, TelegramConfig, WorkerConfig};
    use crate::testing::{RecordingChannel, ScriptedDrawSource};
    use crate::types::{ForecastResult, Label, Round};

    fn test_config() -> Config {
        Config {
            telegram: TelegramConfig {
                bot_token: "123:abc".to_string(),
                admin_id: 42,
            },
            source: SourceConfig::default(),
            database: DatabaseConfig::default(),
            worker: WorkerConfig {
                post_interval_secs: 1,
                retry_backoff_secs: 1,
                ..WorkerConfig::default()
            },
            summary: SummaryConfig::default(),
        }
    }

    fn round(issue: &str, number: i64) -> Round {
        Round {
            issue: issue.to_string(),
            number,
            color: "green".to_string(),
            observed_at: chrono::Utc::now(),
        }
    }

    async fn worker_with(
        batches: Vec<Vec<Round>>,
        destinations: &[&str],
    ) -> (PollWorker<ScriptedDrawSource, RecordingChannel>, Database, Arc<RecordingChannel>) {
        let db = Database::connect_in_memory().await.unwrap();
        for dest in destinations {
            db.add_destination(dest).await.unwrap();
        }
        let source = ScriptedDrawSource::new();
        for batch in batches {
            source.push_batch(batch).await;
        }
        let channel = Arc::new(RecordingChannel::new());
        let worker = PollWorker::new(db.clone(), source, channel.clone(), test_config());
        (worker, db, channel)
    }

    #[tokio::test]
    async fn test_cycle_persists_forecasts_and_broadcasts() {
        let batch: Vec<Round> = (0..10).map(|i| round(&(101 + i).to_string(), 1)).collect();
        let (worker, db, channel) = worker_with(vec![batch], &["-1001", "-1002"]).await;

        let outcome = worker.run_cycle().await.unwrap();
        assert_eq!(outcome, CycleOutcome::Posted);

        // all-LOW window predicts LOW for the next issue at multiplier 1
        let latest = db.latest_forecast().await.unwrap().unwrap();
        assert_eq!(latest.issue, "111");
        assert_eq!(latest.predicted, Label::Low);
        assert_eq!(latest.multiplier, 1);
        assert_eq!(latest.result, None);

        let deliveries = channel.deliveries().await;
        assert_eq!(deliveries.len(), 2);
        assert!(deliveries[0].1.contains("BET → 111 LOW 1x"));
    }

    #[tokio::test]
    async fn test_empty_fetches_are_noop_cycles() {
        let (worker, db, channel) = worker_with(vec![], &["-1001"]).await;

        // three consecutive empty batches: no forecasts, no rounds, no posts
        for _ in 0..3 {
            let outcome = worker.run_cycle().await.unwrap();
            assert_eq!(outcome, CycleOutcome::NoData);
        }

        assert!(db.latest_forecast().await.unwrap().is_none());
        assert!(db.list_recent_rounds(100).await.unwrap().is_empty());
        assert!(channel.deliveries().await.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_error_is_noop_cycle() {
        let (worker, db, _channel) = worker_with(vec![], &["-1001"]).await;
        worker.source.push_error().await;

        let outcome = worker.run_cycle().await.unwrap();
        assert_eq!(outcome, CycleOutcome::NoData);
        assert!(db.latest_forecast().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_forecast_issuance_is_idempotent_across_cycles() {
        let batch: Vec<Round> = (0..10).map(|i| round(&(101 + i).to_string(), 1)).collect();
        // same batch twice: the second cycle sees the same next issue
        let (worker, db, _channel) =
            worker_with(vec![batch.clone(), batch], &["-1001"]).await;

        worker.run_cycle().await.unwrap();
        let first = db.latest_forecast().await.unwrap().unwrap();

        worker.run_cycle().await.unwrap();
        let second = db.latest_forecast().await.unwrap().unwrap();

        assert_eq!(first.issue, second.issue);
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(db.forecast_stats().await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_lost_forecast_doubles_next_multiplier() {
        // cycle 1 forecasts issue 111 from an all-LOW window
        let batch1: Vec<Round> = (0..10).map(|i| round(&(101 + i).to_string(), 1)).collect();
        // cycle 2 observes issue 111 coming up HIGH: the LOW forecast loses
        let mut batch2 = batch1.clone();
        batch2.push(round("111", 9));

        let (worker, db, _channel) = worker_with(vec![batch1, batch2], &["-1001"]).await;

        worker.run_cycle().await.unwrap();
        worker.run_cycle().await.unwrap();

        let settled = db.get_forecast("111").await.unwrap().unwrap();
        assert_eq!(settled.result, Some(ForecastResult::Loss));

        let next = db.latest_forecast().await.unwrap().unwrap();
        assert_eq!(next.issue, "112");
        assert_eq!(next.multiplier, 2);
    }

    #[tokio::test]
    async fn test_won_forecast_resets_next_multiplier() {
        let batch1: Vec<Round> = (0..10).map(|i| round(&(101 + i).to_string(), 1)).collect();
        // issue 111 comes up LOW: the LOW forecast wins
        let mut batch2 = batch1.clone();
        batch2.push(round("111", 2));

        let (worker, db, _channel) = worker_with(vec![batch1, batch2], &["-1001"]).await;

        worker.run_cycle().await.unwrap();
        worker.run_cycle().await.unwrap();

        let settled = db.get_forecast("111").await.unwrap().unwrap();
        assert_eq!(settled.result, Some(ForecastResult::Win));

        let next = db.latest_forecast().await.unwrap().unwrap();
        assert_eq!(next.issue, "112");
        assert_eq!(next.multiplier, 1);
    }

    #[tokio::test]
    async fn test_one_failing_destination_does_not_block_others() {
        let batch: Vec<Round> = (0..5).map(|i| round(&(101 + i).to_string(), 8)).collect();
        let (worker, _db, channel) =
            worker_with(vec![batch], &["-1001", "-1002", "-1003"]).await;
        channel.fail_destination("-1002").await;

        let outcome = worker.run_cycle().await.unwrap();
        assert_eq!(outcome, CycleOutcome::Posted);

        let delivered: Vec<String> = channel
            .deliveries()
            .await
            .into_iter()
            .map(|(dest, _)| dest)
            .collect();
        assert_eq!(delivered, vec!["-1001".to_string(), "-1003".to_string()]);
    }

    #[tokio::test]
    async fn test_supervisor_rejects_double_start() {
        let supervisor = Supervisor::new();

        supervisor
            .start(|mut shutdown| async move {
                let _ = shutdown.changed().await;
            })
            .await
            .unwrap();
        assert!(supervisor.is_running().await);

        let second = supervisor
            .start(|mut shutdown| async move {
                let _ = shutdown.changed().await;
            })
            .await;
        assert!(matches!(second, Err(BotError::AlreadyRunning)));

        supervisor.stop().await.unwrap();
        assert!(!supervisor.is_running().await);
    }

    #[tokio::test]
    async fn test_supervisor_stop_without_start() {
        let supervisor = Supervisor::new();
        assert!(matches!(supervisor.stop().await, Err(BotError::NotRunning)));
    }

    #[tokio::test]
    async fn test_supervisor_restart_after_stop() {
        let supervisor = Supervisor::new();

        supervisor
            .start(|mut shutdown| async move {
                let _ = shutdown.changed().await;
            })
            .await
            .unwrap();
        supervisor.stop().await.unwrap();

        // a fresh start after a clean stop is allowed
        supervisor
            .start(|mut shutdown| async move {
                let _ = shutdown.changed().await;
            })
            .await
            .unwrap();
        assert!(supervisor.is_running().await);
        supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_loop_stops_on_shutdown() {
        let (worker, _db, channel) = worker_with(vec![], &["-1001"]).await;
        let supervisor = Supervisor::new();

        supervisor.start(|shutdown| worker.run(shutdown)).await.unwrap();
        assert!(supervisor.is_running().await);

        supervisor.stop().await.unwrap();
        assert!(!supervisor.is_running().await);
        // empty-script source means nothing was ever broadcast
        assert!(channel.deliveries().await.is_empty());
    }
}
