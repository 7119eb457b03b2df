//! Daily accuracy summary
//!
//! Independent of the polling worker: it runs whether or not forecasting is
//! active. Each pass sleeps until the next wall-clock boundary, broadcasts
//! the accuracy counts, then re-computes the boundary from scratch so drift
//! never accumulates.

use crate::config::SummaryConfig;
use crate::message;
use crate::notify::{self, DeliveryChannel};
use crate::storage::Database;
use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, LocalResult, Offset, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Next occurrence of `hour:minute` in the given fixed-offset zone,
/// strictly after `now`, as a UTC instant.
pub fn next_boundary(
    now: DateTime<Utc>,
    hour: u32,
    minute: u32,
    offset: FixedOffset,
) -> DateTime<Utc> {
    let local = now.with_timezone(&offset);
    let today = local
        .date_naive()
        .and_hms_opt(hour, minute, 0)
        .unwrap_or_else(|| local.date_naive().and_hms_opt(0, 0, 0).unwrap_or_default());

    let candidate = if today <= local.naive_local() {
        today + ChronoDuration::days(1)
    } else {
        today
    };

    match offset.from_local_datetime(&candidate) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        // unreachable for a fixed offset; fall back to a day out
        _ => now + ChronoDuration::days(1),
    }
}

pub struct DailyAggregator<C> {
    db: Database,
    channel: Arc<C>,
    config: SummaryConfig,
}

impl<C> DailyAggregator<C>
where
    C: DeliveryChannel,
{
    pub fn new(db: Database, channel: Arc<C>, config: SummaryConfig) -> Self {
        Self {
            db,
            channel,
            config,
        }
    }

    fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.config.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }

    pub async fn run(self) {
        let offset = self.offset();
        loop {
            let now = Utc::now();
            let target = next_boundary(now, self.config.hour, self.config.minute, offset);
            let wait = (target - now).to_std().unwrap_or(Duration::ZERO);
            tracing::info!(target = %target, "daily summary sleeping until boundary");
            tokio::time::sleep(wait).await;

            self.emit().await;
        }
    }

    async fn emit(&self) {
        let stats = match self.db.forecast_stats().await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::error!("daily summary stats failed: {e}");
                return;
            }
        };

        let destinations = match self.db.list_destinations().await {
            Ok(destinations) => destinations,
            Err(e) => {
                tracing::error!("daily summary destinations failed: {e}");
                return;
            }
        };

        let text = message::build_daily_summary(&stats);
        let (delivered, failed) =
            notify::broadcast(self.channel.as_ref(), &destinations, &text).await;
        tracing::info!(delivered, failed, "daily summary broadcast");
    }
}
