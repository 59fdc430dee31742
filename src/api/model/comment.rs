use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_postgres::Row;

use crate::{
    api::err::{ApiError, ApiResult, not_found, permission_denied},
    db::{Transaction, types::{Key, Status}},
    prelude::*,
};
use super::{Filter, Listing, Order, Paging, access, user::User};


#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct Comment {
    pub(crate) id: Key,
    pub(crate) created: DateTime<Utc>,
    pub(crate) updated: DateTime<Utc>,
    pub(crate) text: String,
    pub(crate) goal: Key,
    /// The author.
    pub(crate) user: User,
}

#[derive(Debug)]
pub(crate) struct NewComment {
    pub(crate) goal: Key,
    pub(crate) text: String,
}

/// Filters for listing comments.
#[derive(Debug, Default)]
pub(crate) struct CommentFilter {
    pub(crate) goal: Option<Key>,
}

impl Comment {
    pub(crate) const ORDERINGS: &'static [(&'static str, &'static str)] = &[
        ("created", "goal_comments.created"),
    ];
    pub(crate) const DEFAULT_ORDER: Order = Order::desc("goal_comments.created");

    const FROM: &'static str = "goal_comments \
        join users on users.id = goal_comments.user_id \
        join goals on goals.id = goal_comments.goal \
        join goal_categories on goal_categories.id = goals.category \
        join boards on boards.id = goal_categories.board";

    fn selection() -> String {
        format!(
            "goal_comments.id, goal_comments.created, goal_comments.updated, \
                goal_comments.text, goal_comments.goal, {}",
            User::COLUMNS,
        )
    }

    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get(0),
            created: row.get(1),
            updated: row.get(2),
            text: row.get(3),
            goal: row.get(4),
            user: User::from_row_start(row, 5),
        }
    }

    fn visible_to(user: &User) -> Filter {
        let mut filter = Filter::default();
        filter.add_plain("not boards.is_deleted");
        filter.add(
            "exists (select from board_participants p \
                where p.board = boards.id and p.user_id = $)",
            user.id,
        );
        filter
    }

    pub(crate) async fn create(
        db: &Transaction<'_>,
        new: NewComment,
        user: &User,
    ) -> ApiResult<Self> {
        let text = validate_text(&new.text)?;

        let board: Key = db
            .query_opt(
                "select goal_categories.board from goals \
                    join goal_categories on goal_categories.id = goals.category \
                    join boards on boards.id = goal_categories.board \
                    where goals.id = $1 and goals.status <> $2 \
                    and not goal_categories.is_deleted and not boards.is_deleted",
                &[&new.goal, &Status::Archived],
            )
            .await?
            .map(|row| row.get(0))
            .ok_or_else(|| ApiError::field("goal", "Goal not found"))?;

        match access::role_of(db, user.id, board).await? {
            Some(role) if role.can_write() => {}
            _ => return Err(permission_denied!("must be owner or writer in project")),
        }

        let key: Key = db
            .query_one(
                "insert into goal_comments (user_id, goal, text) values ($1, $2, $3) returning id",
                &[&user.id, &new.goal, &text],
            )
            .await?
            .get(0);

        debug!("User '{}' commented on goal {} ({key})", user.username, new.goal);
        Self::load(db, key, user).await
    }

    /// Comments on goals of boards that `user` participates in.
    pub(crate) async fn list(
        db: &Transaction<'_>,
        user: &User,
        filter: CommentFilter,
        order: Order,
        paging: Option<Paging>,
    ) -> ApiResult<Listing<Self>> {
        let mut sql_filter = Self::visible_to(user);
        if let Some(goal) = filter.goal {
            sql_filter.add("goal_comments.goal = $", goal);
        }

        sql_filter.fetch(
            db,
            &Self::selection(),
            Self::FROM,
            order,
            "goal_comments.id",
            paging,
            Self::from_row,
        ).await
    }

    pub(crate) async fn load(db: &Transaction<'_>, key: Key, user: &User) -> ApiResult<Self> {
        let mut filter = Self::visible_to(user);
        filter.add("goal_comments.id = $", key);
        filter
            .fetch(
                db,
                &Self::selection(),
                Self::FROM,
                Self::DEFAULT_ORDER,
                "goal_comments.id",
                None,
                Self::from_row,
            )
            .await?
            .items
            .pop()
            .ok_or_else(|| not_found!("Not found."))
    }

    /// Changes the text. Only the author may do that.
    pub(crate) async fn update(
        db: &Transaction<'_>,
        key: Key,
        user: &User,
        text: &str,
    ) -> ApiResult<Self> {
        Self::load_own(db, key, user).await?;
        let text = validate_text(text)?;
        db.execute("update goal_comments set text = $2 where id = $1", &[&key, &text]).await?;

        Self::load(db, key, user).await
    }

    /// Removes the comment. Only the author may do that.
    pub(crate) async fn delete(db: &Transaction<'_>, key: Key, user: &User) -> ApiResult<()> {
        Self::load_own(db, key, user).await?;
        db.execute("delete from goal_comments where id = $1", &[&key]).await?;
        debug!("User '{}' deleted comment {key}", user.username);

        Ok(())
    }

    /// Loads the comment if `user` wrote it. Others get "permission denied".
    pub(crate) async fn load_own(db: &Transaction<'_>, key: Key, user: &User) -> ApiResult<Self> {
        let comment = Self::load(db, key, user).await?;
        if comment.user.id != user.id {
            return Err(permission_denied!("You do not have permission to perform this action."));
        }

        Ok(comment)
    }
}

fn validate_text(text: &str) -> ApiResult<&str> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ApiError::field("text", "This field may not be blank."));
    }

    Ok(text)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_must_not_be_blank() {
        assert_eq!(validate_text("  nice work ").unwrap(), "nice work");
        assert!(validate_text(" \n ").unwrap_err().is_about_field("text"));
    }

    #[test]
    fn default_order_is_newest_first() {
        assert_eq!(
            Order::parse(None, Comment::ORDERINGS, Comment::DEFAULT_ORDER),
            Order::desc("goal_comments.created"),
        );
        assert_eq!(
            Order::parse(Some("created"), Comment::ORDERINGS, Comment::DEFAULT_ORDER),
            Order::asc("goal_comments.created"),
        );
    }
}
