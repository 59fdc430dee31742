//! Texts the bot sends to chats.

pub(crate) const VERIFIED: &str = "Verification successful! You can now use /goals and /create.";
pub(crate) const UNKNOWN_COMMAND: &str = "Unknown command. Available commands: /goals, /create, /cancel";
pub(crate) const NO_GOALS: &str = "You have no goals yet.";
pub(crate) const GOALS_HEADING: &str = "Your goals:";
pub(crate) const NO_CATEGORIES: &str = "There are no categories you can create goals in.";
pub(crate) const SELECT_CATEGORY: &str = "Select a category by sending its number:";
pub(crate) const CATEGORY_DOES_NOT_EXIST: &str = "This category does not exist. Please send one \
    of the numbers above, or /cancel.";
pub(crate) const ENTER_TITLE: &str = "Enter the title of the new goal:";
pub(crate) const INVALID_TITLE: &str = "The title must be between 1 and 255 characters long. \
    Please try again, or /cancel.";
pub(crate) const CATEGORY_GONE: &str = "The selected category does not exist anymore or you \
    cannot create goals in it. Aborted.";
pub(crate) const CANCELLED: &str = "Operation cancelled.";

pub(crate) fn verify_with_code(code: &str) -> String {
    format!("Please confirm your account by entering this code on the website: {code}")
}

pub(crate) fn goal_created(id: impl std::fmt::Display, title: &str) -> String {
    format!("Goal created: {id}) {title}")
}
