use std::sync::Arc;

use crate::{
    api::{err::ApiResult, model::user::User},
    auth::AuthContext,
    bot::TelegramClient,
    config::Config,
    db::Transaction,
};


/// The context that is accessible to every endpoint of our API.
pub(crate) struct Context<'a> {
    /// The transaction of the current request.
    pub(crate) db: Transaction<'a>,
    pub(crate) auth: AuthContext,
    pub(crate) config: Arc<Config>,

    /// Only set if a bot token is configured.
    pub(crate) telegram: Option<TelegramClient>,
}

impl Context<'_> {
    /// Returns the logged in user or a "not authenticated" error.
    pub(crate) fn require_user(&self) -> ApiResult<&User> {
        self.auth.require_user()
    }
}
