use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;

use crate::{
    api::err::{ApiError, ApiResult, not_found},
    db::{Transaction, types::{Key, Role, Status}},
    prelude::*,
};
use super::{
    Filter, Listing, Order, Paging,
    access::{self, Action},
    user::User,
    validate_title,
};


#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct Board {
    pub(crate) id: Key,
    pub(crate) created: DateTime<Utc>,
    pub(crate) updated: DateTime<Utc>,
    pub(crate) title: String,
    pub(crate) is_deleted: bool,
}

/// A board with all its participants, as returned by the detail endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct BoardDetail {
    #[serde(flatten)]
    pub(crate) board: Board,
    pub(crate) participants: Vec<Participant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct Participant {
    pub(crate) id: Key,
    pub(crate) created: DateTime<Utc>,
    pub(crate) updated: DateTime<Utc>,
    pub(crate) role: Role,
    /// The username of the participant.
    pub(crate) user: String,
    pub(crate) board: Key,
}

/// One entry of the participant list when updating a board.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct ParticipantInput {
    pub(crate) role: Role,
    /// Username of the participant.
    pub(crate) user: String,
}

#[derive(Debug, Default)]
pub(crate) struct BoardUpdate {
    pub(crate) title: Option<String>,
    pub(crate) participants: Option<Vec<ParticipantInput>>,
}

impl Board {
    const COLUMNS: &'static str = "boards.id, boards.created, boards.updated, \
        boards.title, boards.is_deleted";

    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get(0),
            created: row.get(1),
            updated: row.get(2),
            title: row.get(3),
            is_deleted: row.get(4),
        }
    }

    /// Creates a new board with `user` as its owner.
    pub(crate) async fn create(db: &Transaction<'_>, title: &str, user: &User) -> ApiResult<Self> {
        let title = validate_title(title, "title")?;
        let query = format!("insert into boards (title) values ($1) returning {}", Self::COLUMNS);
        let board = Self::from_row(&db.query_one(&query, &[&title]).await?);

        db.execute(
            "insert into board_participants (board, user_id, role) values ($1, $2, $3)",
            &[&board.id, &user.id, &Role::Owner],
        ).await?;

        debug!("User '{}' created board {} '{}'", user.username, board.id, board.title);
        Ok(board)
    }

    /// All boards `user` participates in, ordered by title.
    pub(crate) async fn list(
        db: &Transaction<'_>,
        user: &User,
        paging: Option<Paging>,
    ) -> ApiResult<Listing<Self>> {
        let mut filter = Filter::default();
        filter.add_plain("not boards.is_deleted");
        filter.add(
            "exists (select from board_participants p \
                where p.board = boards.id and p.user_id = $)",
            user.id,
        );

        filter.fetch(
            db,
            Self::COLUMNS,
            "boards",
            Order::asc("boards.title"),
            "boards.id",
            paging,
            Self::from_row,
        ).await
    }

    /// Loads a board with its participants, if `user` may see it.
    pub(crate) async fn load(db: &Transaction<'_>, key: Key, user: &User) -> ApiResult<BoardDetail> {
        Self::require(db, key, user, Action::Read).await?;
        Self::load_detail(db, key).await
    }

    /// Changes title and/or participants. Only the owner may do that.
    pub(crate) async fn update(
        db: &Transaction<'_>,
        key: Key,
        user: &User,
        update: BoardUpdate,
    ) -> ApiResult<BoardDetail> {
        Self::require(db, key, user, Action::Manage).await?;

        let title = update.title.as_deref()
            .map(|title| validate_title(title, "title"))
            .transpose()?;
        if let Some(participants) = &update.participants {
            Self::replace_participants(db, key, user, participants).await?;
        }

        // Touched in any case: `updated` also reflects participant changes.
        db.execute(
            "update boards set title = coalesce($2, title) where id = $1",
            &[&key, &title],
        ).await?;

        Self::load_detail(db, key).await
    }

    /// Marks the board as deleted, together with all its categories, and
    /// archives all goals in these categories. Only the owner may do that.
    pub(crate) async fn delete(db: &Transaction<'_>, key: Key, user: &User) -> ApiResult<()> {
        Self::require(db, key, user, Action::Manage).await?;

        db.execute("update boards set is_deleted = true where id = $1", &[&key]).await?;
        db.execute(
            "update goal_categories set is_deleted = true where board = $1",
            &[&key],
        ).await?;
        let archived = db.execute(
            "update goals set status = $2 \
                where category in (select id from goal_categories where board = $1)",
            &[&key, &Status::Archived],
        ).await?;

        debug!("User '{}' deleted board {key} (archived {archived} goals)", user.username);
        Ok(())
    }

    /// Checks that `user` can see the board and is allowed to perform
    /// `action` on it.
    pub(crate) async fn require(
        db: &Transaction<'_>,
        key: Key,
        user: &User,
        action: Action,
    ) -> ApiResult<Role> {
        let role = access::role_of(db, user.id, key)
            .await?
            .ok_or_else(|| not_found!("Not found."))?;
        access::check(role, action)?;
        Ok(role)
    }

    async fn load_detail(db: &Transaction<'_>, key: Key) -> ApiResult<BoardDetail> {
        let query = format!("select {} from boards where id = $1", Self::COLUMNS);
        let board = db.query_opt(&query, &[&key])
            .await?
            .map(|row| Self::from_row(&row))
            .ok_or_else(|| not_found!("Not found."))?;

        let participants = db
            .query(
                "select p.id, p.created, p.updated, p.role, users.username, p.board \
                    from board_participants p \
                    join users on users.id = p.user_id \
                    where p.board = $1 \
                    order by p.id",
                &[&key],
            )
            .await?
            .iter()
            .map(|row| Participant {
                id: row.get(0),
                created: row.get(1),
                updated: row.get(2),
                role: row.get(3),
                user: row.get(4),
                board: row.get(5),
            })
            .collect();

        Ok(BoardDetail { board, participants })
    }

    /// Removes all participants except `user` and adds the given ones.
    async fn replace_participants(
        db: &Transaction<'_>,
        key: Key,
        user: &User,
        participants: &[ParticipantInput],
    ) -> ApiResult<()> {
        let mut new = Vec::new();
        let mut seen = HashSet::new();
        for participant in participants {
            if !participant.role.is_editable() {
                return Err(ApiError::field(
                    "participants",
                    format!("\"{}\" is not a valid choice.", i16::from(participant.role)),
                ));
            }

            let other = User::load_by_username(db, participant.user.trim())
                .await?
                .ok_or_else(|| ApiError::field(
                    "participants",
                    format!("User '{}' does not exist.", participant.user.trim()),
                ))?;
            if other.id == user.id {
                return Err(ApiError::field("participants", "Failed to change your role"));
            }

            // The first entry for a user wins, duplicates are ignored.
            if seen.insert(other.id) {
                new.push((other.id, participant.role));
            }
        }

        db.execute(
            "delete from board_participants where board = $1 and user_id <> $2",
            &[&key, &user.id],
        ).await?;
        for (user_id, role) in &new {
            db.execute(
                "insert into board_participants (board, user_id, role) values ($1, $2, $3) \
                    on conflict (board, user_id) do nothing",
                &[&key, user_id, role],
            ).await?;
        }

        debug!("Set {} participants on board {key} (besides '{}')", new.len(), user.username);
        Ok(())
    }
}
