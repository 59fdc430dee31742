use serde::Deserialize;

use crate::{
    api::{
        Context, Reply, Request,
        err::ApiResult,
        model::tg_user::TgUser,
        util::required,
    },
    bot::messages,
    prelude::*,
};


#[derive(Debug, Deserialize)]
struct VerifyBody {
    verification_code: Option<String>,
}

/// Links the Telegram chat with the given verification code to the current
/// user. The chat is notified once the link is committed.
pub(in crate::api) async fn verify(req: &Request, ctx: &Context<'_>) -> ApiResult<Reply> {
    let user = ctx.require_user()?;
    let body: VerifyBody = req.json_body()?;
    let code = required(body.verification_code, "verification_code")?;

    let tg_user = TgUser::verify(&ctx.db, &code, user).await?;
    let reply = Reply::ok(&tg_user)?;

    let Some(telegram) = ctx.telegram.clone() else {
        debug!("No bot token configured, not notifying chat {}", tg_user.chat_id);
        return Ok(reply);
    };

    let chat_id = tg_user.chat_id;
    Ok(reply.after_commit(async move {
        if let Err(e) = telegram.send_message(chat_id, messages::VERIFIED).await {
            warn!("Failed to notify chat {chat_id} about successful verification: {e:#}");
        }
    }))
}
