use std::{borrow::Cow, time::Duration};

use base64::Engine as _;
use hyper::HeaderMap;
use tokio_postgres::Error as PgError;

use crate::{
    api::{err::{ApiResult, not_authenticated}, model::user::User},
    db::{DbConnection, Transaction},
    prelude::*,
};


mod handlers;
pub(crate) mod password;
mod session_id;

pub(crate) use self::{
    handlers::{login, logout, profile, signup, update_password, update_profile},
    session_id::SessionId,
};


/// Name of the cookie storing the session ID.
pub(crate) const SESSION_COOKIE: &str = "todolist-session";


/// Authentication and sessions.
#[derive(Debug, Clone, confique::Config)]
pub(crate) struct AuthConfig {
    /// Duration of a login session. Sessions older than that are not accepted
    /// anymore and are periodically removed from the database.
    #[config(default = "30d", deserialize_with = crate::config::deserialize_duration)]
    pub(crate) session_duration: Duration,

    /// Whether to set the `Secure` attribute on the session cookie. With that,
    /// browsers only send the cookie via HTTPS. Only disable this for local
    /// development without TLS.
    #[config(default = true)]
    pub(crate) secure_cookie: bool,
}

/// Information about whether or not, and if so how someone talking to us is
/// authenticated.
#[derive(Debug)]
pub(crate) enum AuthContext {
    Anonymous,
    User {
        user: User,
        session: SessionId,
    },
}

impl AuthContext {
    /// Looks up the session referred to by the session cookie in the given
    /// headers. Expired or unknown sessions are treated as anonymous.
    pub(crate) async fn new(
        headers: &HeaderMap,
        config: &AuthConfig,
        db: &Transaction<'_>,
    ) -> Result<Self, PgError> {
        let Some(session) = SessionId::from_headers(headers) else {
            return Ok(Self::Anonymous);
        };

        let query = format!(
            "select {} from user_sessions \
                join users on users.id = user_sessions.user_id \
                where user_sessions.id = $1 \
                and extract(epoch from now() - user_sessions.created) < $2::double precision",
            User::COLUMNS,
        );
        let row = db.query_opt(&query, &[&session, &config.session_duration.as_secs_f64()]).await?;

        match row {
            None => Ok(Self::Anonymous),
            Some(row) => Ok(Self::User {
                user: User::from_row_start(&row, 0),
                session,
            }),
        }
    }

    pub(crate) fn user(&self) -> Option<&User> {
        match self {
            Self::Anonymous => None,
            Self::User { user, .. } => Some(user),
        }
    }

    /// Returns the logged in user or a "not authenticated" error.
    pub(crate) fn require_user(&self) -> ApiResult<&User> {
        self.user().ok_or_else(|| {
            not_authenticated!("Authentication credentials were not provided.")
        })
    }

    /// Returns a representation of the optional username useful for logging.
    pub(crate) fn debug_log_username(&self) -> Cow<'static, str> {
        match self {
            Self::Anonymous => "anonymous".into(),
            Self::User { user, .. } => format!("'{}'", user.username).into(),
        }
    }
}

/// Creates a new session for `user` and persists it in the database.
pub(crate) async fn persist_new_session(
    db: &Transaction<'_>,
    user: &User,
) -> Result<SessionId, PgError> {
    let session_id = SessionId::new();

    // A collision is so unfathomably unlikely that we don't check for it
    // here. We just pass the error up and respond with 500. Note that
    // Postgres will always error in case of collision, so security is
    // never compromised.
    db.execute(
        "insert into user_sessions (id, user_id) values ($1, $2)",
        &[&session_id, &user.id],
    ).await?;

    Ok(session_id)
}

/// Long running task to perform various DB maintenance.
pub(crate) async fn db_maintenance(db: &DbConnection, config: &AuthConfig) -> ! {
    /// Delete outdated user sessions every hour. Note that the session
    /// expiration time is still checked whenever the session is validated. So
    /// this duration is not about correctness, just about how often to clean
    /// up.
    const RUN_PERIOD: Duration = Duration::from_secs(60 * 60);

    loop {
        // Remove outdated user sessions.
        let sql = "delete from user_sessions \
            where extract(epoch from now() - created) > $1::double precision";
        match db.execute(sql, &[&config.session_duration.as_secs_f64()]).await {
            Err(e) => error!("Error deleting outdated user sessions: {}", e),
            Ok(0) => debug!("No outdated user sessions found in DB"),
            Ok(num) => info!("Deleted {num} outdated user sessions from DB"),
        }

        tokio::time::sleep(RUN_PERIOD).await;
    }
}

// Our base64 decoding with the URL safe character set.
fn base64decode(input: impl AsRef<[u8]>) -> Result<Vec<u8>, base64::DecodeError> {
    base64::engine::general_purpose::URL_SAFE.decode(input)
}

fn base64encode(input: impl AsRef<[u8]>) -> String {
    base64::engine::general_purpose::URL_SAFE.encode(input)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_is_url_safe() {
        let encoded = base64encode([0xfb, 0xff, 0xfe]);
        assert_eq!(encoded, "-__-");
        assert_eq!(base64decode(&encoded).unwrap(), vec![0xfb, 0xff, 0xfe]);
        assert!(base64decode("+//+").is_err());
    }

    #[test]
    fn anonymous_has_no_user() {
        let auth = AuthContext::Anonymous;
        assert!(auth.user().is_none());
        assert_eq!(auth.require_user().unwrap_err().status(), hyper::StatusCode::UNAUTHORIZED);
        assert_eq!(auth.debug_log_username(), "anonymous");
    }
}
