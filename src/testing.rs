//! Test doubles for the source and delivery seams.

use crate::error::{BotError, Result};
use crate::notify::DeliveryChannel;
use crate::source::DrawSource;
use crate::types::Round;
use async_trait::async_trait;
use std::collections::HashSet;
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// Draw source that replays scripted batches, one per fetch. Once the
/// script is exhausted every fetch returns an empty batch.
pub struct ScriptedDrawSource {
    batches: Mutex<VecDeque<Result<Vec<Round>>>>,
}

impl ScriptedDrawSource {
    pub fn new() -> Self {
        Self {
            batches: Mutex::new(VecDeque::new()),
        }
    }

    pub async fn push_batch(&self, rounds: Vec<Round>) {
        self.batches.lock().await.push_back(Ok(rounds));
    }

    pub async fn push_error(&self) {
        self.batches
            .lock()
            .await
            .push_back(Err(BotError::Source("scripted fetch failure".into())));
    }
}

impl Default for ScriptedDrawSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DrawSource for ScriptedDrawSource {
    async fn fetch(&self, _page_size: u32) -> Result<Vec<Round>> {
        match self.batches.lock().await.pop_front() {
            Some(batch) => batch,
            None => Ok(Vec::new()),
        }
    }
}

/// Delivery channel that records payloads and can simulate per-destination
/// failures.
pub struct RecordingChannel {
    deliveries: Mutex<Vec<(String, String)>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self {
            deliveries: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Every delivery to `destination` will fail from now on.
    pub async fn fail_destination(&self, destination: &str) {
        self.failing.lock().await.insert(destination.to_string());
    }

    pub async fn deliveries(&self) -> Vec<(String, String)> {
        self.deliveries.lock().await.clone()
    }
}

impl Default for RecordingChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryChannel for RecordingChannel {
    async fn deliver(&self, destination: &str, text: &str) -> Result<()> {
        if self.failing.lock().await.contains(destination) {
            return Err(BotError::Telegram(format!(
                "simulated delivery failure to {destination}"
            )));
        }
        self.deliveries
            .lock()
            .await
            .push((destination.to_string(), text.to_string()));
        Ok(())
    }
}
