//! Role based access checks on boards.

use crate::{
    api::err::{ApiResult, permission_denied},
    db::{Transaction, types::{Key, Role}},
};


/// Something a user wants to do with an object that belongs to a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    /// Reading the object. Every participant can do that.
    Read,

    /// Creating or changing categories, goals and comments.
    Write,

    /// Changing or deleting the board itself.
    Manage,
}

impl Action {
    pub(crate) fn is_allowed_for(self, role: Role) -> bool {
        match self {
            Self::Read => true,
            Self::Write => role.can_write(),
            Self::Manage => role.can_manage(),
        }
    }
}

/// Returns an error if `role` does not allow `action`.
pub(crate) fn check(role: Role, action: Action) -> ApiResult<()> {
    if action.is_allowed_for(role) {
        Ok(())
    } else {
        Err(permission_denied!("You do not have permission to perform this action."))
    }
}

/// Returns the role of `user` on `board`, or `None` if the user does not
/// participate or the board is deleted.
pub(crate) async fn role_of(db: &Transaction<'_>, user: Key, board: Key) -> ApiResult<Option<Role>> {
    let row = db.query_opt(
        "select p.role from board_participants p \
            join boards b on b.id = p.board \
            where p.board = $1 and p.user_id = $2 and not b.is_deleted",
        &[&board, &user],
    ).await?;

    Ok(row.map(|row| row.get(0)))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_per_role() {
        for role in Role::ALL {
            assert!(Action::Read.is_allowed_for(*role));
        }

        assert!(Action::Write.is_allowed_for(Role::Owner));
        assert!(Action::Write.is_allowed_for(Role::Writer));
        assert!(!Action::Write.is_allowed_for(Role::Reader));

        assert!(Action::Manage.is_allowed_for(Role::Owner));
        assert!(!Action::Manage.is_allowed_for(Role::Writer));
        assert!(!Action::Manage.is_allowed_for(Role::Reader));
    }

    #[test]
    fn denied_is_forbidden() {
        assert!(check(Role::Writer, Action::Write).is_ok());
        let err = check(Role::Reader, Action::Write).unwrap_err();
        assert_eq!(err.status(), hyper::StatusCode::FORBIDDEN);
    }
}
