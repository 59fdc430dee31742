//! Commands and the per-chat conversation state of the bot.

use std::fmt::Write as _;

use crate::{api::model::MAX_TITLE_LEN, db::types::Key};


/// A `/command` sent to the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Goals,
    Create,
    Cancel,
    Unknown(String),
}

impl Command {
    /// Parses the text of a message. Returns `None` if it's not a command.
    /// In group chats, commands can be addressed like `/goals@SomeBot`, and
    /// anything after the first whitespace is ignored.
    pub(crate) fn parse(text: &str) -> Option<Self> {
        let word = text.trim_start().strip_prefix('/')?.split_whitespace().next().unwrap_or("");
        let name = word.split('@').next().unwrap_or(word);

        let out = match name {
            "goals" => Self::Goals,
            "create" => Self::Create,
            "cancel" => Self::Cancel,
            other => Self::Unknown(other.to_owned()),
        };
        Some(out)
    }
}

/// Where a chat is in the "create goal" dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ChatState {
    /// We sent a list of categories and wait for the user to pick one.
    SelectCategory { offered: Vec<Key> },

    /// We wait for the title of the new goal.
    EnterTitle { category: Key },
}

/// Returns the category the message picks, if it is one of the `offered` ones.
pub(crate) fn pick_category(offered: &[Key], text: &str) -> Option<Key> {
    text.trim()
        .parse::<Key>()
        .ok()
        .filter(|key| offered.contains(key))
}

/// Returns the trimmed title, or `None` if it's empty or too long.
pub(crate) fn goal_title(text: &str) -> Option<&str> {
    let title = text.trim();
    let len = title.chars().count();
    (len > 0 && len <= MAX_TITLE_LEN).then_some(title)
}

/// Formats items as `<id>) <title>`, one per line, below `heading`.
pub(crate) fn numbered_list<'a>(
    heading: &str,
    items: impl IntoIterator<Item = (Key, &'a str)>,
) -> String {
    let mut out = heading.to_owned();
    for (key, title) in items {
        let _ = write!(out, "\n{key}) {title}");
    }
    out
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands() {
        assert_eq!(Command::parse("/goals"), Some(Command::Goals));
        assert_eq!(Command::parse("  /create  "), Some(Command::Create));
        assert_eq!(Command::parse("/cancel@todo_bot"), Some(Command::Cancel));
        assert_eq!(Command::parse("/goals please"), Some(Command::Goals));
        assert_eq!(Command::parse("/start"), Some(Command::Unknown("start".into())));
        assert_eq!(Command::parse("/"), Some(Command::Unknown("".into())));
        assert_eq!(Command::parse("goals"), None);
        assert_eq!(Command::parse("3"), None);
    }

    #[test]
    fn picking_categories() {
        let offered = [Key(3), Key(7)];
        assert_eq!(pick_category(&offered, "7"), Some(Key(7)));
        assert_eq!(pick_category(&offered, " 3\n"), Some(Key(3)));
        assert_eq!(pick_category(&offered, "4"), None);
        assert_eq!(pick_category(&offered, "seven"), None);
        assert_eq!(pick_category(&[], "3"), None);
    }

    #[test]
    fn titles() {
        assert_eq!(goal_title("  Buy milk \n"), Some("Buy milk"));
        assert_eq!(goal_title("   "), None);
        assert_eq!(goal_title(&"x".repeat(MAX_TITLE_LEN + 1)), None);
        assert!(goal_title(&"x".repeat(MAX_TITLE_LEN)).is_some());
    }

    #[test]
    fn lists() {
        let out = numbered_list("Your goals:", [(Key(1), "Run"), (Key(12), "Read")]);
        assert_eq!(out, "Your goals:\n1) Run\n12) Read");
        assert_eq!(numbered_list("Nothing:", []), "Nothing:");
    }
}
