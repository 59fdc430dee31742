//! Endpoints below `/core/`: registration, login, logout and the profile of
//! the current user.

use secrecy::SecretString;
use serde::Deserialize;

use crate::{
    api::{
        Context, Reply, Request,
        err::{ApiResult, permission_denied},
        model::user::{NewUser, ProfileUpdate, User},
        util::{UpdateMode, required},
    },
    prelude::*,
};
use super::{SessionId, persist_new_session, AuthContext};


#[derive(Deserialize)]
struct SignupBody {
    username: Option<String>,
    password: Option<SecretString>,
    password_repeat: Option<SecretString>,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    email: String,
}

#[derive(Deserialize)]
struct LoginBody {
    username: Option<String>,
    password: Option<SecretString>,
}

#[derive(Deserialize)]
struct PasswordBody {
    old_password: Option<SecretString>,
    new_password: Option<SecretString>,
}


/// `POST /core/signup`
pub(crate) async fn signup(req: &Request, ctx: &Context<'_>) -> ApiResult<Reply> {
    let body: SignupBody = req.json_body()?;
    let new = NewUser {
        username: required(body.username, "username")?,
        password: required(body.password, "password")?,
        password_repeat: required(body.password_repeat, "password_repeat")?,
        first_name: body.first_name,
        last_name: body.last_name,
        email: body.email,
    };

    Reply::created(&User::create(&ctx.db, new).await?)
}

/// `POST /core/login`: checks the credentials and starts a new session.
pub(crate) async fn login(req: &Request, ctx: &Context<'_>) -> ApiResult<Reply> {
    let body: LoginBody = req.json_body()?;
    let username = required(body.username, "username")?;
    let password = required(body.password, "password")?;

    let Some(user) = User::authenticate(&ctx.db, username.trim(), &password).await? else {
        debug!("Failed login attempt for '{}'", username.trim());
        return Err(permission_denied!("Invalid username or password."));
    };

    let session = persist_new_session(&ctx.db, &user).await?;
    debug!("Persisted new session for '{}'", user.username);

    Ok(Reply::created(&user)?.with_cookie(session.set_cookie(&ctx.config.auth)))
}

/// `GET /core/profile`
pub(crate) fn profile(ctx: &Context<'_>) -> ApiResult<Reply> {
    Reply::ok(ctx.require_user()?)
}

/// `PUT` and `PATCH /core/profile`
pub(crate) async fn update_profile(
    req: &Request,
    ctx: &Context<'_>,
    mode: UpdateMode,
) -> ApiResult<Reply> {
    let user = ctx.require_user()?;
    let body: ProfileUpdate = req.json_body()?;
    let update = ProfileUpdate {
        username: mode.check(body.username, "username")?,
        ..body
    };

    Reply::ok(&user.update_profile(&ctx.db, update).await?)
}

/// `DELETE /core/profile`: logs out by removing the current session.
///
/// The session cookie is removed in any case. Consider someone on a public
/// computer: they want to delete the local session cookie when they leave
/// it. That's the important thing, not whether the session is still in the
/// DB.
pub(crate) async fn logout(ctx: &Context<'_>) -> ApiResult<Reply> {
    if let AuthContext::User { session, .. } = &ctx.auth {
        match session.remove_from_db(&ctx.db).await? {
            Some(username) => debug!("Removed session for '{username}' from DB"),
            None => warn!("Session not found in DB during logout"),
        }
    }

    Ok(Reply::no_content().with_cookie(SessionId::unset_cookie(&ctx.config.auth)))
}

/// `PUT` and `PATCH /core/update_password`
pub(crate) async fn update_password(req: &Request, ctx: &Context<'_>) -> ApiResult<Reply> {
    let user = ctx.require_user()?;
    let body: PasswordBody = req.json_body()?;
    let old = required(body.old_password, "old_password")?;
    let new = required(body.new_password, "new_password")?;

    user.change_password(&ctx.db, &old, &new).await?;
    Reply::ok(&serde_json::json!({}))
}
