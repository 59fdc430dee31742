use serde::Serialize;
use tokio_postgres::Row;

use crate::{
    api::err::{ApiError, ApiResult},
    db::{Transaction, types::Key},
    prelude::*,
    util::gen_random_string,
};
use super::user::User;


/// Characters used for verification codes. Without `0`, `O`, `1` and `I` to
/// avoid typos when copying the code from the chat.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// A Telegram chat talking to the bot. It is "verified" once it is linked to
/// a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct TgUser {
    #[serde(skip)]
    pub(crate) id: Key,
    pub(crate) chat_id: i64,
    pub(crate) user: Option<Key>,
    #[serde(skip)]
    pub(crate) verification_code: Option<String>,
}

impl TgUser {
    const COLUMNS: &'static str = "id, chat_id, user_id, verification_code";

    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get(0),
            chat_id: row.get(1),
            user: row.get(2),
            verification_code: row.get(3),
        }
    }

    pub(crate) fn is_verified(&self) -> bool {
        self.user.is_some()
    }

    /// Returns the entry for the given chat, creating it if necessary.
    pub(crate) async fn get_or_create(db: &Transaction<'_>, chat_id: i64) -> ApiResult<Self> {
        let select = format!("select {} from tg_users where chat_id = $1", Self::COLUMNS);
        if let Some(row) = db.query_opt(&select, &[&chat_id]).await? {
            return Ok(Self::from_row(&row));
        }

        let insert = format!(
            "insert into tg_users (chat_id) values ($1) returning {}",
            Self::COLUMNS,
        );
        let tg_user = Self::from_row(&db.query_one(&insert, &[&chat_id]).await?);
        debug!("New Telegram chat {chat_id}");

        Ok(tg_user)
    }

    /// Replaces the verification code with a new random one and returns it.
    pub(crate) async fn renew_verification_code(
        &mut self,
        db: &Transaction<'_>,
        len: usize,
    ) -> ApiResult<String> {
        // Collisions are unlikely, but the column is unique, so we check.
        let code = loop {
            let candidate = gen_random_string(CODE_ALPHABET, len);
            let taken = db
                .query_one(
                    "select exists(select from tg_users where verification_code = $1)",
                    &[&candidate],
                )
                .await?
                .get::<_, bool>(0);
            if !taken {
                break candidate;
            }
        };

        db.execute(
            "update tg_users set verification_code = $2 where id = $1",
            &[&self.id, &code],
        ).await?;
        self.verification_code = Some(code.clone());

        Ok(code)
    }

    /// Loads the user this chat is linked to.
    pub(crate) async fn linked_user(&self, db: &Transaction<'_>) -> ApiResult<Option<User>> {
        match self.user {
            None => Ok(None),
            Some(key) => User::load_by_key(db, key).await,
        }
    }

    /// Links the chat with the given verification code to `user`.
    pub(crate) async fn verify(db: &Transaction<'_>, code: &str, user: &User) -> ApiResult<Self> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ApiError::field("verification_code", "This field may not be blank."));
        }

        let query = format!(
            "update tg_users set user_id = $2, verification_code = null \
                where verification_code = $1 \
                returning {}",
            Self::COLUMNS,
        );
        let tg_user = db.query_opt(&query, &[&code, &user.id])
            .await?
            .map(|row| Self::from_row(&row))
            .ok_or_else(|| ApiError::field("verification_code", "Invalid verification code"))?;

        info!("Linked Telegram chat {} to user '{}'", tg_user.chat_id, user.username);
        Ok(tg_user)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_response_shape() {
        let tg_user = TgUser {
            id: Key(1),
            chat_id: 123456789,
            user: Some(Key(4)),
            verification_code: None,
        };

        assert_eq!(
            serde_json::to_value(&tg_user).unwrap(),
            serde_json::json!({ "chat_id": 123456789, "user": 4 }),
        );
    }

    #[test]
    fn codes_avoid_ambiguous_characters() {
        let code = gen_random_string(CODE_ALPHABET, 64);
        assert!(!code.contains(['0', 'O', '1', 'I']));
    }
}
