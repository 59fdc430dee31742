use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio_postgres::Row;

use crate::{
    api::err::{ApiError, ApiResult, not_found, permission_denied},
    db::{Transaction, types::{Key, Priority, Role, Status}},
    prelude::*,
};
use super::{
    Filter, Listing, Order, Paging,
    access::{self, Action},
    like_pattern,
    user::User,
    validate_title,
};


#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct Goal {
    pub(crate) id: Key,
    pub(crate) created: DateTime<Utc>,
    pub(crate) updated: DateTime<Utc>,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) category: Key,
    pub(crate) due_date: Option<NaiveDate>,
    pub(crate) status: Status,
    pub(crate) priority: Priority,
    /// The author.
    pub(crate) user: User,
}

#[derive(Debug)]
pub(crate) struct NewGoal {
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) category: Key,
    pub(crate) due_date: Option<NaiveDate>,
    pub(crate) status: Status,
    pub(crate) priority: Priority,
}

/// Changes to a goal. `None` fields stay as they are. For `due_date`,
/// `Some(None)` removes the date.
#[derive(Debug, Default)]
pub(crate) struct GoalUpdate {
    pub(crate) title: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) category: Option<Key>,
    pub(crate) due_date: Option<Option<NaiveDate>>,
    pub(crate) status: Option<Status>,
    pub(crate) priority: Option<Priority>,
}

/// Filters for listing goals.
#[derive(Debug, Default)]
pub(crate) struct GoalFilter {
    pub(crate) categories: Option<Vec<Key>>,
    pub(crate) statuses: Option<Vec<Status>>,
    pub(crate) priorities: Option<Vec<Priority>>,
    pub(crate) due_before: Option<NaiveDate>,
    pub(crate) due_after: Option<NaiveDate>,
    /// Case-insensitive substring of title or description.
    pub(crate) search: Option<String>,
}

impl Goal {
    pub(crate) const ORDERINGS: &'static [(&'static str, &'static str)] = &[
        ("title", "goals.title"),
        ("created", "goals.created"),
        ("due_date", "goals.due_date"),
        ("priority", "goals.priority"),
    ];
    pub(crate) const DEFAULT_ORDER: Order = Order::asc("goals.title");

    const FROM: &'static str = "goals \
        join users on users.id = goals.user_id \
        join goal_categories on goal_categories.id = goals.category \
        join boards on boards.id = goal_categories.board";

    fn selection() -> String {
        format!(
            "goals.id, goals.created, goals.updated, goals.title, goals.description, \
                goals.category, goals.due_date, goals.status, goals.priority, {}",
            User::COLUMNS,
        )
    }

    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get(0),
            created: row.get(1),
            updated: row.get(2),
            title: row.get(3),
            description: row.get(4),
            category: row.get(5),
            due_date: row.get(6),
            status: row.get(7),
            priority: row.get(8),
            user: User::from_row_start(row, 9),
        }
    }

    /// Goals that are not archived and whose category and board are not
    /// deleted.
    fn active() -> Filter {
        let mut filter = Filter::default();
        filter.add("goals.status <> $", Status::Archived);
        filter.add_plain("not goal_categories.is_deleted and not boards.is_deleted");
        filter
    }

    pub(crate) async fn create(db: &Transaction<'_>, new: NewGoal, user: &User) -> ApiResult<Self> {
        let title = validate_title(&new.title, "title")?;
        check_target_category(db, new.category, user).await?;

        let key: Key = db
            .query_one(
                "insert into goals \
                    (title, description, category, due_date, user_id, status, priority) \
                    values ($1, $2, $3, $4, $5, $6, $7) \
                    returning id",
                &[
                    &title,
                    &new.description,
                    &new.category,
                    &new.due_date,
                    &user.id,
                    &new.status,
                    &new.priority,
                ],
            )
            .await?
            .get(0);

        debug!("User '{}' created goal {key} in category {}", user.username, new.category);
        Self::load_by_key(db, key).await
    }

    /// Goals in categories of boards that `user` participates in. Archived
    /// goals are never listed.
    pub(crate) async fn list(
        db: &Transaction<'_>,
        user: &User,
        filter: GoalFilter,
        order: Order,
        paging: Option<Paging>,
    ) -> ApiResult<Listing<Self>> {
        let mut sql_filter = Self::active();
        sql_filter.add(
            "exists (select from board_participants p \
                where p.board = boards.id and p.user_id = $)",
            user.id,
        );

        if let Some(categories) = filter.categories {
            sql_filter.add("goals.category = any($)", categories);
        }
        if let Some(statuses) = filter.statuses {
            let statuses = statuses.into_iter().map(i16::from).collect::<Vec<_>>();
            sql_filter.add("goals.status = any($)", statuses);
        }
        if let Some(priorities) = filter.priorities {
            let priorities = priorities.into_iter().map(i16::from).collect::<Vec<_>>();
            sql_filter.add("goals.priority = any($)", priorities);
        }
        if let Some(date) = filter.due_before {
            sql_filter.add("goals.due_date <= $", date);
        }
        if let Some(date) = filter.due_after {
            sql_filter.add("goals.due_date >= $", date);
        }
        if let Some(search) = filter.search.filter(|s| !s.trim().is_empty()) {
            sql_filter.add(
                "(goals.title ilike $ or goals.description ilike $)",
                like_pattern(search.trim()),
            );
        }

        sql_filter.fetch(
            db,
            &Self::selection(),
            Self::FROM,
            order,
            "goals.id",
            paging,
            Self::from_row,
        ).await
    }

    /// Active goals written by `user`, ordered by title.
    pub(crate) async fn list_by_author(db: &Transaction<'_>, user: &User) -> ApiResult<Vec<Self>> {
        let mut filter = Self::active();
        filter.add("goals.user_id = $", user.id);
        filter
            .fetch(
                db,
                &Self::selection(),
                Self::FROM,
                Self::DEFAULT_ORDER,
                "goals.id",
                None,
                Self::from_row,
            )
            .await
            .map(|listing| listing.items)
    }

    pub(crate) async fn load(db: &Transaction<'_>, key: Key, user: &User) -> ApiResult<Self> {
        Self::load_with_role(db, key, user).await.map(|(goal, _)| goal)
    }

    pub(crate) async fn update(
        db: &Transaction<'_>,
        key: Key,
        user: &User,
        update: GoalUpdate,
    ) -> ApiResult<Self> {
        let current = Self::require_writable(db, key, user).await?;

        let title = update.title.as_deref()
            .map(|title| validate_title(title, "title"))
            .transpose()?;
        if let Some(category) = update.category.filter(|c| *c != current.category) {
            check_target_category(db, category, user).await?;
        }

        let due_date = match update.due_date {
            Some(date) => date,
            None => current.due_date,
        };

        db.execute(
            "update goals set \
                title = coalesce($2, title), \
                description = coalesce($3, description), \
                category = coalesce($4, category), \
                due_date = $5, \
                status = coalesce($6, status), \
                priority = coalesce($7, priority) \
                where id = $1",
            &[
                &key,
                &title,
                &update.description,
                &update.category,
                &due_date,
                &update.status,
                &update.priority,
            ],
        ).await?;

        // Not `load`: archiving a goal through an update makes it invisible,
        // but the response still shows the new state.
        Self::load_by_key(db, key).await
    }

    /// Archives the goal.
    pub(crate) async fn delete(db: &Transaction<'_>, key: Key, user: &User) -> ApiResult<()> {
        Self::require_writable(db, key, user).await?;

        db.execute("update goals set status = $2 where id = $1", &[&key, &Status::Archived]).await?;
        debug!("User '{}' archived goal {key}", user.username);

        Ok(())
    }

    /// Loads the goal without any visibility checks.
    async fn load_by_key(db: &Transaction<'_>, key: Key) -> ApiResult<Self> {
        let query = format!("select {} from {} where goals.id = $1", Self::selection(), Self::FROM);
        db.query_one(&query, &[&key]).await?.pipe(|row| Ok(Self::from_row(&row)))
    }

    /// Loads the goal if `user` can see it and may change it.
    pub(crate) async fn require_writable(
        db: &Transaction<'_>,
        key: Key,
        user: &User,
    ) -> ApiResult<Self> {
        let (goal, role) = Self::load_with_role(db, key, user).await?;
        access::check(role, Action::Write)?;
        Ok(goal)
    }

    /// Loads the goal and the role of `user` on its board. Returns "not found"
    /// if the user cannot see the goal.
    pub(crate) async fn load_with_role(
        db: &Transaction<'_>,
        key: Key,
        user: &User,
    ) -> ApiResult<(Self, Role)> {
        let query = format!(
            "select {}, p.role from {} \
                join board_participants p on p.board = boards.id and p.user_id = $2 \
                where goals.id = $1 \
                and goals.status <> $3 \
                and not goal_categories.is_deleted \
                and not boards.is_deleted",
            Self::selection(),
            Self::FROM,
        );

        db.query_opt(&query, &[&key, &user.id, &Status::Archived])
            .await?
            .map(|row| (Self::from_row(&row), row.get(9 + User::NUM_COLUMNS)))
            .ok_or_else(|| not_found!("Not found."))
    }
}

/// Checks that goals can be put into `category` by `user`.
async fn check_target_category(db: &Transaction<'_>, category: Key, user: &User) -> ApiResult<()> {
    let board: Option<Key> = db
        .query_opt(
            "select goal_categories.board from goal_categories \
                join boards on boards.id = goal_categories.board \
                where goal_categories.id = $1 \
                and not goal_categories.is_deleted \
                and not boards.is_deleted",
            &[&category],
        )
        .await?
        .map(|row| row.get(0));

    let board = board.ok_or_else(|| ApiError::field("category", "Category not found"))?;
    match access::role_of(db, user.id, board).await? {
        Some(role) if role.can_write() => Ok(()),
        _ => Err(permission_denied!("must be owner or writer in project")),
    }
}
