//! The Telegram bot: long polls for messages and lets verified users list
//! and create goals.

use std::{collections::HashMap, time::Duration};

use deadpool_postgres::Pool;
use secrecy::SecretString;

use crate::{
    api::{
        err::{ApiErrorKind, ApiResult},
        model::{
            category::Category,
            goal::{Goal, NewGoal},
            tg_user::TgUser,
            user::User,
        },
    },
    config::HttpHost,
    db::{Transaction, types::Key},
    prelude::*,
    util::Never,
};
use self::fsm::Command;


mod client;
mod fsm;
pub(crate) mod messages;
mod schema;

pub(crate) use self::{client::TelegramClient, fsm::ChatState};


#[derive(Debug, Clone, confique::Config)]
pub(crate) struct BotConfig {
    /// The token of the Telegram bot, as given by @BotFather. Without it,
    /// the `bot` command does not start and verified chats are not
    /// notified.
    pub(crate) token: Option<SecretString>,

    /// Base URL of the Telegram Bot API.
    #[config(default = "https://api.telegram.org")]
    pub(crate) api_url: HttpHost,

    /// How long one `getUpdates` request waits for new messages.
    #[config(default = "60s", deserialize_with = crate::config::deserialize_duration)]
    pub(crate) poll_timeout: Duration,

    /// How long to wait after a failed poll or a failure handling a message.
    #[config(default = "5s", deserialize_with = crate::config::deserialize_duration)]
    pub(crate) error_backoff: Duration,

    /// Number of characters of the codes that link chats to users.
    #[config(default = 8)]
    pub(crate) verification_code_length: usize,
}

impl BotConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if !(4..=32).contains(&self.verification_code_length) {
            bail!("`bot.verification_code_length` must be between 4 and 32");
        }
        if self.poll_timeout.as_secs() == 0 {
            bail!("`bot.poll_timeout` must be at least 1s");
        }

        Ok(())
    }
}


/// Runs the polling loop forever. Only fails on startup.
pub(crate) async fn run(config: &BotConfig, db: Pool) -> Result<Never> {
    let client = TelegramClient::from_config(config)?
        .ok_or_else(|| anyhow!("`bot.token` is not set, cannot start the bot"))?;
    let me = client.get_me().await.context("failed to reach Telegram API")?;
    info!(
        "Starting bot '{}' (id {})",
        me.username.as_deref().unwrap_or("<unnamed>"),
        me.id,
    );

    let mut bot = Bot {
        client,
        db,
        code_length: config.verification_code_length,
        states: HashMap::new(),
    };

    let mut offset = 0;
    loop {
        let updates = match bot.client.get_updates(offset, config.poll_timeout).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!("Failed to fetch updates (retrying in {:?}): {e:#}", config.error_backoff);
                tokio::time::sleep(config.error_backoff).await;
                continue;
            }
        };

        if !updates.is_empty() {
            trace!("Received {} updates", updates.len());
        }

        for update in updates {
            offset = update.update_id + 1;
            let Some(message) = update.message else {
                continue;
            };
            let Some(text) = message.text else {
                trace!("Ignoring message without text in chat {}", message.chat.id);
                continue;
            };

            if let Err(e) = bot.handle_message(message.chat.id, &text).await {
                error!("Failed to handle message in chat {}: {e:#}", message.chat.id);
                tokio::time::sleep(config.error_backoff).await;
            }
        }
    }
}


struct Bot {
    client: TelegramClient,
    db: Pool,
    code_length: usize,
    states: HashMap<i64, ChatState>,
}

/// What to do after handling one message.
#[derive(Debug)]
pub(crate) struct Outcome {
    pub(crate) reply: Option<String>,
    pub(crate) next_state: Option<ChatState>,
}

impl Outcome {
    fn reply(text: impl Into<String>, next_state: Option<ChatState>) -> Self {
        Self { reply: Some(text.into()), next_state }
    }
}

impl Bot {
    /// Handles one message in its own transaction. The chat state is only
    /// changed and the reply only sent if that transaction was committed.
    async fn handle_message(&mut self, chat_id: i64, text: &str) -> Result<()> {
        let mut connection = self.db.get().await.context("failed to get DB connection")?;
        let tx = Transaction::new(connection.transaction().await?);

        let state = self.states.get(&chat_id).cloned();
        let outcome = match respond(&tx, chat_id, text, state, self.code_length).await {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Err(e) = tx.rollback().await {
                    warn!("Failed to roll back transaction: {e}");
                }
                return Err(e.into());
            }
        };
        tx.commit().await.context("failed to commit transaction")?;

        match outcome.next_state {
            Some(state) => self.states.insert(chat_id, state),
            None => self.states.remove(&chat_id),
        };

        if let Some(reply) = outcome.reply {
            self.client.send_message(chat_id, &reply).await?;
        }

        Ok(())
    }
}

/// Decides on the reply and the next state of the chat. Only reads and writes
/// the database, the caller applies the outcome.
pub(crate) async fn respond(
    db: &Transaction<'_>,
    chat_id: i64,
    text: &str,
    state: Option<ChatState>,
    code_length: usize,
) -> ApiResult<Outcome> {
    let mut tg_user = TgUser::get_or_create(db, chat_id).await?;
    let Some(user) = tg_user.linked_user(db).await? else {
        let code = tg_user.renew_verification_code(db, code_length).await?;
        debug!("Sent new verification code to chat {chat_id}");
        return Ok(Outcome::reply(messages::verify_with_code(&code), None));
    };

    if let Some(command) = Command::parse(text) {
        let outcome = match command {
            Command::Goals => {
                let goals = Goal::list_by_author(db, &user).await?;
                let text = if goals.is_empty() {
                    messages::NO_GOALS.to_owned()
                } else {
                    let items = goals.iter().map(|g| (g.id, g.title.as_str()));
                    fsm::numbered_list(messages::GOALS_HEADING, items)
                };
                Outcome::reply(text, state)
            }
            Command::Create => {
                let categories = Category::list_writable(db, &user).await?;
                if categories.is_empty() {
                    Outcome::reply(messages::NO_CATEGORIES, None)
                } else {
                    let items = categories.iter().map(|c| (c.id, c.title.as_str()));
                    let text = fsm::numbered_list(messages::SELECT_CATEGORY, items);
                    let offered = categories.iter().map(|c| c.id).collect();
                    Outcome::reply(text, Some(ChatState::SelectCategory { offered }))
                }
            }
            Command::Cancel => Outcome::reply(messages::CANCELLED, None),
            Command::Unknown(name) => {
                trace!("Unknown command '/{name}' in chat {chat_id}");
                Outcome::reply(messages::UNKNOWN_COMMAND, state)
            }
        };
        return Ok(outcome);
    }

    let outcome = match state {
        None => Outcome { reply: None, next_state: None },
        Some(ChatState::SelectCategory { offered }) => match fsm::pick_category(&offered, text) {
            Some(category) => {
                Outcome::reply(messages::ENTER_TITLE, Some(ChatState::EnterTitle { category }))
            }
            None => Outcome::reply(
                messages::CATEGORY_DOES_NOT_EXIST,
                Some(ChatState::SelectCategory { offered }),
            ),
        },
        Some(ChatState::EnterTitle { category }) => match fsm::goal_title(text) {
            None => Outcome::reply(
                messages::INVALID_TITLE,
                Some(ChatState::EnterTitle { category }),
            ),
            Some(title) => create_goal(db, category, title, &user).await?,
        },
    };

    Ok(outcome)
}

async fn create_goal(
    db: &Transaction<'_>,
    category: Key,
    title: &str,
    user: &User,
) -> ApiResult<Outcome> {
    let new = NewGoal {
        title: title.to_owned(),
        description: String::new(),
        category,
        due_date: None,
        status: Default::default(),
        priority: Default::default(),
    };

    match Goal::create(db, new, user).await {
        Ok(goal) => {
            info!("User '{}' created goal {} via Telegram", user.username, goal.id);
            Ok(Outcome::reply(messages::goal_created(goal.id, &goal.title), None))
        }
        // The category was deleted or the role changed since it was offered.
        Err(e) if e.kind != ApiErrorKind::InternalServerError => {
            debug!("Could not create goal in category {category} via Telegram: {e}");
            Ok(Outcome::reply(messages::CATEGORY_GONE, None))
        }
        Err(e) => Err(e),
    }
}
