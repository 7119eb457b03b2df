//! Telegram command surface
//!
//! `TelegramBot` long-polls getUpdates, filters mutating commands to the
//! admin user and hands parsed commands to `CommandHandler`, which owns the
//! dispatch to the supervisor, registry and stats. Every command gets an
//! explicit reply.

use crate::config::Config;
use crate::error::Result;
use crate::notify::{self, DeliveryChannel};
use crate::source::DrawSource;
use crate::storage::Database;
use crate::worker::{PollWorker, Supervisor};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Commands accepted from the chat surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    /// Start the forecast worker.
    Run,
    /// Stop the forecast worker.
    Halt,
    /// Running state and registered chats.
    Status,
    /// Register a broadcast chat.
    AddChat { chat_id: String },
    /// Remove one broadcast chat.
    DelChat { chat_id: String },
    /// Drop every registered chat.
    ClearChats,
    /// Broadcast an operator notice.
    Notice { text: String },
    /// Accuracy summary on demand.
    Stats,
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    from: Option<TelegramUser>,
    chat: TelegramChat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct GetUpdatesResponse {
    result: Vec<TelegramUpdate>,
}

#[derive(Debug, Serialize)]
struct ReplyRequest<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'a str,
}

const HELP_TEXT: &str = "🤖 <b>WinGo Forecast Bot</b>\n\n\
/run - start forecasting\n\
/halt - stop forecasting\n\
/status - worker state and chats\n\
/addchat &lt;id&gt; - register a broadcast chat\n\
/delchat &lt;id&gt; - remove a broadcast chat\n\
/clearchats - remove all broadcast chats\n\
/notice &lt;text&gt; - broadcast a notice\n\
/stats - forecast accuracy\n\
/help - this message";

/// Long-polling command listener.
pub struct TelegramBot {
    http: reqwest::Client,
    bot_token: String,
    admin_id: i64,
    last_update_id: RwLock<i64>,
}

impl TelegramBot {
    pub fn new(bot_token: String, admin_id: i64) -> Self {
        Self {
            http: reqwest::Client::new(),
            bot_token,
            admin_id,
            last_update_id: RwLock::new(0),
        }
    }

    /// Poll for updates and dispatch commands until the process exits.
    pub async fn run<S, C>(self: Arc<Self>, handler: Arc<CommandHandler<S, C>>)
    where
        S: DrawSource + Clone + Send + Sync + 'static,
        C: DeliveryChannel + Send + Sync + 'static,
    {
        tracing::info!("telegram command listener started");

        loop {
            match self.poll_updates().await {
                Ok(updates) => {
                    for update in updates {
                        if let Some(msg) = update.message {
                            self.handle_message(&msg, &handler).await;
                        }
                        let mut last_id = self.last_update_id.write().await;
                        *last_id = update.update_id + 1;
                    }
                }
                Err(e) => {
                    tracing::error!("failed to poll telegram updates: {e}");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                }
            }

            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        }
    }

    async fn poll_updates(&self) -> Result<Vec<TelegramUpdate>> {
        let last_id = *self.last_update_id.read().await;
        let url = format!(
            "https://api.telegram.org/bot{}/getUpdates?offset={}&timeout=30",
            self.bot_token, last_id
        );

        let response: GetUpdatesResponse = self.http.get(&url).send().await?.json().await?;
        Ok(response.result)
    }

    async fn handle_message<S, C>(&self, msg: &TelegramMessage, handler: &CommandHandler<S, C>)
    where
        S: DrawSource + Clone + Send + Sync + 'static,
        C: DeliveryChannel + Send + Sync + 'static,
    {
        let Some(text) = msg.text.as_deref() else {
            return;
        };
        let Some((cmd, args)) = parse_command(text) else {
            return;
        };

        tracing::info!(chat = msg.chat.id, "received command: /{cmd}");

        if matches!(cmd.as_str(), "start" | "help") {
            self.reply(msg.chat.id, HELP_TEXT).await;
            return;
        }

        // Everything else mutates or inspects state: admin only. The
        // handler below assumes authorization already happened here.
        let from_id = msg.from.as_ref().map(|u| u.id);
        if from_id != Some(self.admin_id) {
            self.reply(msg.chat.id, "❌ Not authorized").await;
            return;
        }

        let command = match cmd.as_str() {
            "run" => BotCommand::Run,
            "halt" => BotCommand::Halt,
            "status" => BotCommand::Status,
            "stats" => BotCommand::Stats,
            "clearchats" => BotCommand::ClearChats,
            "addchat" => {
                if args.is_empty() {
                    self.reply(msg.chat.id, "❌ Usage: /addchat <chat_id_or_@handle>")
                        .await;
                    return;
                }
                BotCommand::AddChat { chat_id: args }
            }
            "delchat" => {
                if args.is_empty() {
                    self.reply(msg.chat.id, "❌ Usage: /delchat <chat_id_or_@handle>")
                        .await;
                    return;
                }
                BotCommand::DelChat { chat_id: args }
            }
            "notice" => {
                if args.is_empty() {
                    self.reply(msg.chat.id, "❌ Usage: /notice <text>").await;
                    return;
                }
                BotCommand::Notice { text: args }
            }
            _ => {
                self.reply(
                    msg.chat.id,
                    &format!("❓ Unknown command: /{cmd}\nUse /help for available commands"),
                )
                .await;
                return;
            }
        };

        let response = handler.handle(command).await;
        self.reply(msg.chat.id, &response).await;
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let request = ReplyRequest {
            chat_id,
            text,
            parse_mode: "HTML",
        };

        if let Err(e) = self.http.post(&url).json(&request).send().await {
            tracing::error!("failed to send telegram reply: {e}");
        }
    }
}

/// Split `/cmd arg...` into a lowercased command and its argument string.
/// Returns None for non-command text.
pub(crate) fn parse_command(text: &str) -> Option<(String, String)> {
    let text = text.trim();
    let rest = text.strip_prefix('/')?;

    let mut parts = rest.splitn(2, char::is_whitespace);
    let cmd = parts.next()?;
    // strip the @botname suffix used in group chats
    let cmd = cmd.split('@').next().unwrap_or(cmd).to_lowercase();
    if cmd.is_empty() {
        return None;
    }

    let args = parts.next().map(str::trim).unwrap_or("").to_string();
    Some((cmd, args))
}

/// Dispatches authorized commands against the supervisor, registry and
/// forecast store.
pub struct CommandHandler<S, C> {
    db: Database,
    supervisor: Arc<Supervisor>,
    source: S,
    channel: Arc<C>,
    config: Config,
}

impl<S, C> CommandHandler<S, C>
where
    S: DrawSource + Clone + Send + Sync + 'static,
    C: DeliveryChannel + Send + Sync + 'static,
{
    pub fn new(
        db: Database,
        supervisor: Arc<Supervisor>,
        source: S,
        channel: Arc<C>,
        config: Config,
    ) -> Self {
        Self {
            db,
            supervisor,
            source,
            channel,
            config,
        }
    }

    /// Execute one already-authorized command and produce the reply text.
    pub async fn handle(&self, command: BotCommand) -> String {
        match command {
            BotCommand::Run => self.start_worker().await,
            BotCommand::Halt => self.stop_worker().await,
            BotCommand::Status => self.status().await,
            BotCommand::AddChat { chat_id } => self.add_chat(&chat_id).await,
            BotCommand::DelChat { chat_id } => self.del_chat(&chat_id).await,
            BotCommand::ClearChats => self.clear_chats().await,
            BotCommand::Notice { text } => self.notice(&text).await,
            BotCommand::Stats => self.stats().await,
        }
    }

    async fn start_worker(&self) -> String {
        let destinations = match self.db.list_destinations().await {
            Ok(destinations) => destinations,
            Err(e) => return format!("❌ Database error: {e}"),
        };
        if destinations.is_empty() {
            return "⚠️ No broadcast chats registered. Use /addchat <id> first.".to_string();
        }

        let worker = PollWorker::new(
            self.db.clone(),
            self.source.clone(),
            self.channel.clone(),
            self.config.clone(),
        );

        match self.supervisor.start(|shutdown| worker.run(shutdown)).await {
            Ok(()) => format!(
                "✅ Forecasting started. Posting every {}s to {} chat(s).",
                self.config.worker.post_interval_secs,
                destinations.len()
            ),
            Err(crate::error::BotError::AlreadyRunning) => {
                "⚠️ Forecasting already running.".to_string()
            }
            Err(e) => format!("❌ Failed to start: {e}"),
        }
    }

    async fn stop_worker(&self) -> String {
        match self.supervisor.stop().await {
            Ok(()) => "🛑 Forecasting stopped.".to_string(),
            Err(crate::error::BotError::NotRunning) => {
                "⚠️ No forecast worker running.".to_string()
            }
            Err(e) => format!("❌ Failed to stop: {e}"),
        }
    }

    async fn status(&self) -> String {
        let running = self.supervisor.is_running().await;
        let chats = match self.db.list_destinations().await {
            Ok(chats) => chats,
            Err(e) => return format!("❌ Database error: {e}"),
        };

        let chats_line = if chats.is_empty() {
            "none".to_string()
        } else {
            chats.join(", ")
        };
        format!(
            "Running: {}\nChats: {}",
            if running { "yes" } else { "no" },
            chats_line
        )
    }

    async fn add_chat(&self, chat_id: &str) -> String {
        if !is_valid_destination(chat_id) {
            return format!("❌ Invalid chat id: {chat_id}");
        }
        match self.db.add_destination(chat_id).await {
            Ok(true) => format!("✅ Chat registered: {chat_id}"),
            Ok(false) => format!("⚠️ Chat already registered: {chat_id}"),
            Err(e) => format!("❌ Database error: {e}"),
        }
    }

    async fn del_chat(&self, chat_id: &str) -> String {
        match self.db.remove_destination(chat_id).await {
            Ok(true) => format!("✅ Chat removed: {chat_id}"),
            Ok(false) => format!("⚠️ Chat was not registered: {chat_id}"),
            Err(e) => format!("❌ Database error: {e}"),
        }
    }

    async fn clear_chats(&self) -> String {
        match self.db.clear_destinations().await {
            Ok(removed) => format!("✅ Cleared {removed} chat(s)."),
            Err(e) => format!("❌ Database error: {e}"),
        }
    }

    async fn notice(&self, text: &str) -> String {
        let destinations = match self.db.list_destinations().await {
            Ok(destinations) => destinations,
            Err(e) => return format!("❌ Database error: {e}"),
        };
        if destinations.is_empty() {
            return "⚠️ No broadcast chats registered.".to_string();
        }

        let (delivered, failed) =
            notify::broadcast(self.channel.as_ref(), &destinations, text).await;
        format!("📣 Notice delivered to {delivered} chat(s), {failed} failed.")
    }

    async fn stats(&self) -> String {
        match self.db.forecast_stats().await {
            Ok(stats) => format!(
                "📊 <b>Forecast Accuracy</b>\n\n\
                Total: {}\nWins: {}\nLosses: {}\nPending: {}\nWin rate: {}",
                stats.total, stats.wins, stats.losses, stats.pending, stats.win_rate
            ),
            Err(e) => format!("❌ Database error: {e}"),
        }
    }
}

/// A destination is a numeric chat id (possibly negative) or an @handle.
fn is_valid_destination(chat_id: &str) -> bool {
    if chat_id.parse::<i64>().is_ok() {
        return true;
    }
    chat_id.starts_with('@') && chat_id.len() > 1 && !chat_id.contains(char::is_whitespace)
}
