//! The endpoints of the API, one module per resource. They parse the request,
//! call into the model and build the reply.

use crate::db::types::Key;
use super::{
    Context, Reply, Request, Resource,
    err::ApiResult,
    model::{
        access::Action,
        board::Board,
        category::Category,
        comment::Comment,
        goal::Goal,
    },
    util::UpdateMode,
};

mod board;
mod bot;
mod category;
mod comment;
mod goal;

pub(super) use self::bot::verify as verify_bot;


pub(super) async fn create(resource: Resource, req: &Request, ctx: &Context<'_>) -> ApiResult<Reply> {
    match resource {
        Resource::Board => board::create(req, ctx).await,
        Resource::Category => category::create(req, ctx).await,
        Resource::Goal => goal::create(req, ctx).await,
        Resource::Comment => comment::create(req, ctx).await,
    }
}

pub(super) async fn list(resource: Resource, req: &Request, ctx: &Context<'_>) -> ApiResult<Reply> {
    match resource {
        Resource::Board => board::list(req, ctx).await,
        Resource::Category => category::list(req, ctx).await,
        Resource::Goal => goal::list(req, ctx).await,
        Resource::Comment => comment::list(req, ctx).await,
    }
}

pub(super) async fn get(resource: Resource, key: Key, ctx: &Context<'_>) -> ApiResult<Reply> {
    match resource {
        Resource::Board => board::get(key, ctx).await,
        Resource::Category => category::get(key, ctx).await,
        Resource::Goal => goal::get(key, ctx).await,
        Resource::Comment => comment::get(key, ctx).await,
    }
}

pub(super) async fn update(
    resource: Resource,
    key: Key,
    req: &Request,
    ctx: &Context<'_>,
    mode: UpdateMode,
) -> ApiResult<Reply> {
    // Visibility and permission are checked before the body is parsed.
    let user = ctx.require_user()?;
    let db = &ctx.db;
    match resource {
        Resource::Board => {
            Board::require(db, key, user, Action::Manage).await?;
        }
        Resource::Category => {
            Category::require_writable(db, key, user).await?;
        }
        Resource::Goal => {
            Goal::require_writable(db, key, user).await?;
        }
        Resource::Comment => {
            Comment::load_own(db, key, user).await?;
        }
    }

    match resource {
        Resource::Board => board::update(key, req, ctx, mode).await,
        Resource::Category => category::update(key, req, ctx, mode).await,
        Resource::Goal => goal::update(key, req, ctx, mode).await,
        Resource::Comment => comment::update(key, req, ctx, mode).await,
    }
}

/// Deleting means different things per resource: boards and categories are
/// marked as deleted, goals are archived and comments are removed.
pub(super) async fn delete(resource: Resource, key: Key, ctx: &Context<'_>) -> ApiResult<Reply> {
    let user = ctx.require_user()?;
    let db = &ctx.db;
    match resource {
        Resource::Board => Board::delete(db, key, user).await?,
        Resource::Category => Category::delete(db, key, user).await?,
        Resource::Goal => Goal::delete(db, key, user).await?,
        Resource::Comment => Comment::delete(db, key, user).await?,
    }

    Ok(Reply::no_content())
}
