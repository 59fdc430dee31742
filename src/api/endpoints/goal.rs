use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
    api::{
        Context, Reply, Request, list,
        err::ApiResult,
        model::goal::{Goal, GoalFilter, GoalUpdate, NewGoal},
        util::{UpdateMode, nullable, required},
    },
    db::types::{Key, Priority, Status},
};


#[derive(Debug, Deserialize)]
struct GoalBody {
    title: Option<String>,
    description: Option<String>,
    category: Option<Key>,
    #[serde(default, deserialize_with = "nullable")]
    due_date: Option<Option<NaiveDate>>,
    status: Option<Status>,
    priority: Option<Priority>,
}

pub(super) async fn create(req: &Request, ctx: &Context<'_>) -> ApiResult<Reply> {
    let user = ctx.require_user()?;
    let body: GoalBody = req.json_body()?;
    let new = NewGoal {
        title: required(body.title, "title")?,
        description: body.description.unwrap_or_default(),
        category: required(body.category, "category")?,
        due_date: body.due_date.flatten(),
        status: body.status.unwrap_or_default(),
        priority: body.priority.unwrap_or_default(),
    };

    Reply::created(&Goal::create(&ctx.db, new, user).await?)
}

pub(super) async fn list(req: &Request, ctx: &Context<'_>) -> ApiResult<Reply> {
    let user = ctx.require_user()?;
    let query = req.list_query();
    let paging = query.paging();
    let filter = GoalFilter {
        categories: query.list("category__in")?,
        statuses: query.list("status__in")?,
        priorities: query.list("priority__in")?,
        due_before: query.date("due_date__lte")?,
        due_after: query.date("due_date__gte")?,
        search: query.search(),
    };
    let order = query.order(Goal::ORDERINGS, Goal::DEFAULT_ORDER);

    let goals = Goal::list(&ctx.db, user, filter, order, paging).await?;
    list::reply(goals, paging, &req.path, &query)
}

pub(super) async fn get(key: Key, ctx: &Context<'_>) -> ApiResult<Reply> {
    let user = ctx.require_user()?;
    Reply::ok(&Goal::load(&ctx.db, key, user).await?)
}

pub(super) async fn update(
    key: Key,
    req: &Request,
    ctx: &Context<'_>,
    mode: UpdateMode,
) -> ApiResult<Reply> {
    let user = ctx.require_user()?;
    let body: GoalBody = req.json_body()?;

    // Only title and category are required for `PUT`, the other fields have
    // defaults and keep their value when missing.
    let update = GoalUpdate {
        title: mode.check(body.title, "title")?,
        category: mode.check(body.category, "category")?,
        description: body.description,
        due_date: body.due_date,
        status: body.status,
        priority: body.priority,
    };

    Reply::ok(&Goal::update(&ctx.db, key, user, update).await?)
}
