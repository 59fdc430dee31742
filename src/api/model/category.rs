use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_postgres::Row;

use crate::{
    api::err::{ApiError, ApiResult, not_found},
    db::{Transaction, types::{Key, Role, Status}},
    prelude::*,
};
use super::{
    Filter, Listing, Order, Paging,
    access::{self, Action},
    like_pattern,
    user::User,
    validate_title,
};


/// A category of goals, belonging to a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct Category {
    pub(crate) id: Key,
    pub(crate) created: DateTime<Utc>,
    pub(crate) updated: DateTime<Utc>,
    pub(crate) title: String,
    pub(crate) board: Key,
    pub(crate) is_deleted: bool,
    /// The author.
    pub(crate) user: User,
}

#[derive(Debug)]
pub(crate) struct NewCategory {
    pub(crate) title: String,
    pub(crate) board: Key,
}

#[derive(Debug, Default)]
pub(crate) struct CategoryUpdate {
    pub(crate) title: Option<String>,
    pub(crate) board: Option<Key>,
}

/// Filters for listing categories.
#[derive(Debug, Default)]
pub(crate) struct CategoryFilter {
    pub(crate) board: Option<Key>,
    /// Case-insensitive substring of the title.
    pub(crate) search: Option<String>,
}

impl Category {
    pub(crate) const ORDERINGS: &'static [(&'static str, &'static str)] = &[
        ("title", "goal_categories.title"),
        ("created", "goal_categories.created"),
    ];
    pub(crate) const DEFAULT_ORDER: Order = Order::asc("goal_categories.title");

    fn selection() -> String {
        format!(
            "goal_categories.id, goal_categories.created, goal_categories.updated, \
                goal_categories.title, goal_categories.board, goal_categories.is_deleted, {}",
            User::COLUMNS,
        )
    }

    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get(0),
            created: row.get(1),
            updated: row.get(2),
            title: row.get(3),
            board: row.get(4),
            is_deleted: row.get(5),
            user: User::from_row_start(row, 6),
        }
    }

    pub(crate) async fn create(
        db: &Transaction<'_>,
        new: NewCategory,
        user: &User,
    ) -> ApiResult<Self> {
        let title = validate_title(&new.title, "title")?;
        check_target_board(db, new.board, user).await?;

        let key: Key = db
            .query_one(
                "insert into goal_categories (title, user_id, board) \
                    values ($1, $2, $3) \
                    returning id",
                &[&title, &user.id, &new.board],
            )
            .await?
            .get(0);

        debug!("User '{}' created category {key} on board {}", user.username, new.board);
        Self::load_with_role(db, key, user).await.map(|(category, _)| category)
    }

    /// Categories on boards that `user` participates in.
    pub(crate) async fn list(
        db: &Transaction<'_>,
        user: &User,
        filter: CategoryFilter,
        order: Order,
        paging: Option<Paging>,
    ) -> ApiResult<Listing<Self>> {
        let mut sql_filter = Self::visible_to(user);
        if let Some(board) = filter.board {
            sql_filter.add("goal_categories.board = $", board);
        }
        if let Some(search) = filter.search.filter(|s| !s.trim().is_empty()) {
            sql_filter.add("goal_categories.title ilike $", like_pattern(search.trim()));
        }

        sql_filter.fetch(
            db,
            &Self::selection(),
            Self::FROM,
            order,
            "goal_categories.id",
            paging,
            Self::from_row,
        ).await
    }

    /// Categories in which `user` may create goals, ordered by title.
    pub(crate) async fn list_writable(db: &Transaction<'_>, user: &User) -> ApiResult<Vec<Self>> {
        let mut filter = Filter::default();
        filter.add_plain("not goal_categories.is_deleted and not boards.is_deleted");
        filter.add(
            "exists (select from board_participants p \
                where p.board = boards.id and p.user_id = $ and p.role = any(array[1, 2]::smallint[]))",
            user.id,
        );

        filter
            .fetch(
                db,
                &Self::selection(),
                Self::FROM,
                Self::DEFAULT_ORDER,
                "goal_categories.id",
                None,
                Self::from_row,
            )
            .await
            .map(|listing| listing.items)
    }

    pub(crate) async fn load(db: &Transaction<'_>, key: Key, user: &User) -> ApiResult<Self> {
        Self::load_with_role(db, key, user).await.map(|(category, _)| category)
    }

    pub(crate) async fn update(
        db: &Transaction<'_>,
        key: Key,
        user: &User,
        update: CategoryUpdate,
    ) -> ApiResult<Self> {
        let current = Self::require_writable(db, key, user).await?;

        let title = update.title.as_deref()
            .map(|title| validate_title(title, "title"))
            .transpose()?;
        if let Some(board) = update.board.filter(|board| *board != current.board) {
            check_target_board(db, board, user).await?;
        }

        db.execute(
            "update goal_categories set \
                title = coalesce($2, title), \
                board = coalesce($3, board) \
                where id = $1",
            &[&key, &title, &update.board],
        ).await?;

        Self::load_with_role(db, key, user).await.map(|(category, _)| category)
    }

    /// Marks the category as deleted and archives all its goals.
    pub(crate) async fn delete(db: &Transaction<'_>, key: Key, user: &User) -> ApiResult<()> {
        Self::require_writable(db, key, user).await?;

        db.execute("update goal_categories set is_deleted = true where id = $1", &[&key]).await?;
        let archived = db.execute(
            "update goals set status = $2 where category = $1",
            &[&key, &Status::Archived],
        ).await?;

        debug!("User '{}' deleted category {key} (archived {archived} goals)", user.username);
        Ok(())
    }

    const FROM: &'static str = "goal_categories \
        join users on users.id = goal_categories.user_id \
        join boards on boards.id = goal_categories.board";

    fn visible_to(user: &User) -> Filter {
        let mut filter = Filter::default();
        filter.add_plain("not goal_categories.is_deleted and not boards.is_deleted");
        filter.add(
            "exists (select from board_participants p \
                where p.board = boards.id and p.user_id = $)",
            user.id,
        );
        filter
    }

    /// Loads the category if `user` can see it and may change it.
    pub(crate) async fn require_writable(
        db: &Transaction<'_>,
        key: Key,
        user: &User,
    ) -> ApiResult<Self> {
        let (category, role) = Self::load_with_role(db, key, user).await?;
        access::check(role, Action::Write)?;
        Ok(category)
    }

    /// Loads the category and the role of `user` on its board. Returns "not
    /// found" if the user cannot see the category.
    pub(crate) async fn load_with_role(
        db: &Transaction<'_>,
        key: Key,
        user: &User,
    ) -> ApiResult<(Self, Role)> {
        let query = format!(
            "select {}, p.role from {} \
                join board_participants p on p.board = boards.id and p.user_id = $2 \
                where goal_categories.id = $1 \
                and not goal_categories.is_deleted \
                and not boards.is_deleted",
            Self::selection(),
            Self::FROM,
        );

        db.query_opt(&query, &[&key, &user.id])
            .await?
            .map(|row| (Self::from_row(&row), row.get(6 + User::NUM_COLUMNS)))
            .ok_or_else(|| not_found!("Not found."))
    }
}

/// Checks that categories can be put on `board` by `user`.
async fn check_target_board(db: &Transaction<'_>, board: Key, user: &User) -> ApiResult<()> {
    let is_deleted = db.query_opt("select is_deleted from boards where id = $1", &[&board])
        .await?
        .map(|row| row.get::<_, bool>(0))
        .ok_or_else(|| ApiError::field(
            "board",
            format!("Invalid pk \"{board}\" - object does not exist."),
        ))?;

    if is_deleted {
        return Err(ApiError::field("board", "Board is deleted"));
    }

    match access::role_of(db, user.id, board).await? {
        Some(role) if role.can_write() => Ok(()),
        _ => Err(crate::api::err::permission_denied!(
            "You must be owner or writer on the board to do this.",
        )),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orderings() {
        assert_eq!(
            Order::parse(Some("-created"), Category::ORDERINGS, Category::DEFAULT_ORDER),
            Order::desc("goal_categories.created"),
        );
        assert_eq!(
            Order::parse(Some("board"), Category::ORDERINGS, Category::DEFAULT_ORDER),
            Category::DEFAULT_ORDER,
        );
    }

}
