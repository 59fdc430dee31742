use serde::Deserialize;

use crate::{
    api::{
        Context, Reply, Request, list,
        err::ApiResult,
        model::board::{Board, BoardUpdate, ParticipantInput},
        util::{UpdateMode, required},
    },
    db::types::Key,
};


#[derive(Debug, Deserialize)]
struct BoardBody {
    title: Option<String>,
    participants: Option<Vec<ParticipantInput>>,
}

pub(super) async fn create(req: &Request, ctx: &Context<'_>) -> ApiResult<Reply> {
    let user = ctx.require_user()?;
    let body: BoardBody = req.json_body()?;
    let title = required(body.title, "title")?;

    Reply::created(&Board::create(&ctx.db, &title, user).await?)
}

pub(super) async fn list(req: &Request, ctx: &Context<'_>) -> ApiResult<Reply> {
    let user = ctx.require_user()?;
    let query = req.list_query();
    let paging = query.paging();

    let boards = Board::list(&ctx.db, user, paging).await?;
    list::reply(boards, paging, &req.path, &query)
}

pub(super) async fn get(key: Key, ctx: &Context<'_>) -> ApiResult<Reply> {
    let user = ctx.require_user()?;
    Reply::ok(&Board::load(&ctx.db, key, user).await?)
}

pub(super) async fn update(
    key: Key,
    req: &Request,
    ctx: &Context<'_>,
    mode: UpdateMode,
) -> ApiResult<Reply> {
    let user = ctx.require_user()?;
    let body: BoardBody = req.json_body()?;
    let update = BoardUpdate {
        title: mode.check(body.title, "title")?,
        participants: mode.check(body.participants, "participants")?,
    };

    Reply::ok(&Board::update(&ctx.db, key, user, update).await?)
}
