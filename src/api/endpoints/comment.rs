use serde::Deserialize;

use crate::{
    api::{
        Context, Reply, Request, list,
        err::ApiResult,
        model::comment::{Comment, CommentFilter, NewComment},
        util::{UpdateMode, required},
    },
    db::types::Key,
};


#[derive(Debug, Deserialize)]
struct CommentBody {
    goal: Option<Key>,
    text: Option<String>,
}

pub(super) async fn create(req: &Request, ctx: &Context<'_>) -> ApiResult<Reply> {
    let user = ctx.require_user()?;
    let body: CommentBody = req.json_body()?;
    let new = NewComment {
        goal: required(body.goal, "goal")?,
        text: required(body.text, "text")?,
    };

    Reply::created(&Comment::create(&ctx.db, new, user).await?)
}

pub(super) async fn list(req: &Request, ctx: &Context<'_>) -> ApiResult<Reply> {
    let user = ctx.require_user()?;
    let query = req.list_query();
    let paging = query.paging();
    let filter = CommentFilter {
        goal: query.key("goal")?,
    };
    let order = query.order(Comment::ORDERINGS, Comment::DEFAULT_ORDER);

    let comments = Comment::list(&ctx.db, user, filter, order, paging).await?;
    list::reply(comments, paging, &req.path, &query)
}

pub(super) async fn get(key: Key, ctx: &Context<'_>) -> ApiResult<Reply> {
    let user = ctx.require_user()?;
    Reply::ok(&Comment::load(&ctx.db, key, user).await?)
}

/// Only the text of a comment can be changed. The goal is read-only after
/// creation and ignored here.
pub(super) async fn update(
    key: Key,
    req: &Request,
    ctx: &Context<'_>,
    mode: UpdateMode,
) -> ApiResult<Reply> {
    let user = ctx.require_user()?;
    let body: CommentBody = req.json_body()?;

    let comment = match mode.check(body.text, "text")? {
        Some(text) => Comment::update(&ctx.db, key, user, &text).await?,
        None => Comment::load_own(&ctx.db, key, user).await?,
    };

    Reply::ok(&comment)
}
