use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;

use crate::{
    api::err::{ApiError, ApiResult, map_db_err},
    auth::password,
    db::{Transaction, types::Key},
    prelude::*,
};


const MAX_USERNAME_LEN: usize = 150;
const MAX_EMAIL_LEN: usize = 254;

/// A registered user. The password hash is never loaded into this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct User {
    pub(crate) id: Key,
    pub(crate) username: String,
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) email: String,
    #[serde(skip)]
    pub(crate) date_joined: DateTime<Utc>,
}

/// Data for registering a new user.
#[derive(Debug)]
pub(crate) struct NewUser {
    pub(crate) username: String,
    pub(crate) password: SecretString,
    pub(crate) password_repeat: SecretString,
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) email: String,
}

/// Changes to a profile. `None` fields stay as they are.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ProfileUpdate {
    pub(crate) username: Option<String>,
    pub(crate) first_name: Option<String>,
    pub(crate) last_name: Option<String>,
    pub(crate) email: Option<String>,
}

impl User {
    /// Columns read by [`Self::from_row_start`], qualified with the table
    /// name `users`.
    pub(crate) const COLUMNS: &'static str = "users.id, users.username, \
        users.first_name, users.last_name, users.email, users.date_joined";
    pub(crate) const NUM_COLUMNS: usize = 6;

    /// Reads a user from the row, starting at column `start`. The columns
    /// have to be selected as in [`Self::COLUMNS`].
    pub(crate) fn from_row_start(row: &Row, start: usize) -> Self {
        Self {
            id: row.get(start),
            username: row.get(start + 1),
            first_name: row.get(start + 2),
            last_name: row.get(start + 3),
            email: row.get(start + 4),
            date_joined: row.get(start + 5),
        }
    }

    pub(crate) async fn load_by_key(db: &Transaction<'_>, key: Key) -> ApiResult<Option<Self>> {
        let query = format!("select {} from users where id = $1", Self::COLUMNS);
        db.query_opt(&query, &[&key])
            .await?
            .map(|row| Self::from_row_start(&row, 0))
            .pipe(Ok)
    }

    pub(crate) async fn load_by_username(
        db: &Transaction<'_>,
        username: &str,
    ) -> ApiResult<Option<Self>> {
        let query = format!("select {} from users where username = $1", Self::COLUMNS);
        db.query_opt(&query, &[&username])
            .await?
            .map(|row| Self::from_row_start(&row, 0))
            .pipe(Ok)
    }

    /// Registers a new user.
    pub(crate) async fn create(db: &Transaction<'_>, new: NewUser) -> ApiResult<Self> {
        use secrecy::ExposeSecret;

        let username = new.username.trim();
        validate_username(username)?;
        validate_email(&new.email)?;
        if new.password.expose_secret() != new.password_repeat.expose_secret() {
            return Err(ApiError::field("password_repeat", "Passwords do not match."));
        }
        password::validate(&new.password, username)
            .map_err(|msg| ApiError::field("password", msg))?;

        let hash = password::hash(&new.password)?;
        let query = format!(
            "insert into users (username, password, first_name, last_name, email) \
                values ($1, $2, $3, $4, $5) \
                returning {}",
            Self::COLUMNS,
        );
        let result = db.query_one(
            &query,
            &[&username, &hash, &new.first_name.trim(), &new.last_name.trim(), &new.email.trim()],
        ).await;

        let user = map_db_err!(result, {
            if constraint == "users_username_key" => username_taken(),
        })?.pipe(|row| Self::from_row_start(&row, 0));

        info!("Registered new user '{}' ({})", user.username, user.id);
        Ok(user)
    }

    /// Checks the given credentials. Returns the user if they are valid.
    pub(crate) async fn authenticate(
        db: &Transaction<'_>,
        username: &str,
        pw: &SecretString,
    ) -> ApiResult<Option<Self>> {
        let query = format!("select {}, users.password from users where username = $1", Self::COLUMNS);
        let Some(row) = db.query_opt(&query, &[&username]).await? else {
            return Ok(None);
        };

        let hash: String = row.get(Self::NUM_COLUMNS);
        if password::verify(pw, &hash) {
            Ok(Some(Self::from_row_start(&row, 0)))
        } else {
            Ok(None)
        }
    }

    /// Updates the profile fields of this user and returns the new state.
    pub(crate) async fn update_profile(
        &self,
        db: &Transaction<'_>,
        update: ProfileUpdate,
    ) -> ApiResult<Self> {
        let username = update.username.as_deref().map(str::trim);
        if let Some(username) = username {
            validate_username(username)?;
        }
        if let Some(email) = &update.email {
            validate_email(email)?;
        }

        let query = format!(
            "update users set \
                username = coalesce($2, username), \
                first_name = coalesce($3, first_name), \
                last_name = coalesce($4, last_name), \
                email = coalesce($5, email) \
                where id = $1 \
                returning {}",
            Self::COLUMNS,
        );
        let result = db.query_one(&query, &[
            &self.id,
            &username,
            &update.first_name.as_deref().map(str::trim),
            &update.last_name.as_deref().map(str::trim),
            &update.email.as_deref().map(str::trim),
        ]).await;

        map_db_err!(result, {
            if constraint == "users_username_key" => username_taken(),
        })?.pipe(|row| Ok(Self::from_row_start(&row, 0)))
    }

    /// Replaces the password of this user, if `old` is the current one.
    pub(crate) async fn change_password(
        &self,
        db: &Transaction<'_>,
        old: &SecretString,
        new: &SecretString,
    ) -> ApiResult<()> {
        let hash: String = db.query_one("select password from users where id = $1", &[&self.id])
            .await?
            .get(0);

        if !password::verify(old, &hash) {
            return Err(ApiError::field("old_password", "Password is incorrect."));
        }
        password::validate(new, &self.username)
            .map_err(|msg| ApiError::field("new_password", msg))?;

        let new_hash = password::hash(new)?;
        db.execute("update users set password = $2 where id = $1", &[&self.id, &new_hash]).await?;
        debug!("Changed password of user '{}'", self.username);

        Ok(())
    }
}

fn username_taken() -> ApiError {
    ApiError::field("username", "A user with that username already exists.")
}

/// Usernames are 1 to 150 characters: letters, digits and `@.+-_`.
pub(crate) fn validate_username(username: &str) -> ApiResult<()> {
    if username.is_empty() {
        return Err(ApiError::field("username", "This field may not be blank."));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(ApiError::field(
            "username",
            format!("Ensure this field has no more than {MAX_USERNAME_LEN} characters."),
        ));
    }

    static VALID: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("valid username regex"));
    if !VALID.is_match(username) {
        return Err(ApiError::field(
            "username",
            "Enter a valid username. This value may contain only letters, \
                numbers, and @/./+/-/_ characters.",
        ));
    }

    Ok(())
}

/// The email address is optional. If given, it needs a local part and a
/// domain.
pub(crate) fn validate_email(email: &str) -> ApiResult<()> {
    let email = email.trim();
    if email.is_empty() {
        return Ok(());
    }

    let valid = email.len() <= MAX_EMAIL_LEN
        && !email.contains(char::is_whitespace)
        && email.split_once('@').is_some_and(|(local, domain)| {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@')
        });

    if valid {
        Ok(())
    } else {
        Err(ApiError::field("email", "Enter a valid email address."))
    }
}
