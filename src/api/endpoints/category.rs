use serde::Deserialize;

use crate::{
    api::{
        Context, Reply, Request, list,
        err::ApiResult,
        model::category::{Category, CategoryFilter, CategoryUpdate, NewCategory},
        util::{UpdateMode, required},
    },
    db::types::Key,
};


#[derive(Debug, Deserialize)]
struct CategoryBody {
    title: Option<String>,
    board: Option<Key>,
}

pub(super) async fn create(req: &Request, ctx: &Context<'_>) -> ApiResult<Reply> {
    let user = ctx.require_user()?;
    let body: CategoryBody = req.json_body()?;
    let new = NewCategory {
        title: required(body.title, "title")?,
        board: required(body.board, "board")?,
    };

    Reply::created(&Category::create(&ctx.db, new, user).await?)
}

pub(super) async fn list(req: &Request, ctx: &Context<'_>) -> ApiResult<Reply> {
    let user = ctx.require_user()?;
    let query = req.list_query();
    let paging = query.paging();
    let filter = CategoryFilter {
        board: query.key("board")?,
        search: query.search(),
    };
    let order = query.order(Category::ORDERINGS, Category::DEFAULT_ORDER);

    let categories = Category::list(&ctx.db, user, filter, order, paging).await?;
    list::reply(categories, paging, &req.path, &query)
}

pub(super) async fn get(key: Key, ctx: &Context<'_>) -> ApiResult<Reply> {
    let user = ctx.require_user()?;
    Reply::ok(&Category::load(&ctx.db, key, user).await?)
}

pub(super) async fn update(
    key: Key,
    req: &Request,
    ctx: &Context<'_>,
    mode: UpdateMode,
) -> ApiResult<Reply> {
    let user = ctx.require_user()?;
    let body: CategoryBody = req.json_body()?;
    let update = CategoryUpdate {
        title: mode.check(body.title, "title")?,
        board: mode.check(body.board, "board")?,
    };

    Reply::ok(&Category::update(&ctx.db, key, user, update).await?)
}
