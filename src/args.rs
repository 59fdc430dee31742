//! This module defines the command line arguments we accept.

use std::{io::IsTerminal, path::PathBuf};
use termcolor::ColorChoice;

use crate::db::cmd::DbCommand;


#[derive(Debug, clap::Parser)]
#[clap(about = "Goal tracker backend: HTTP API and Telegram bot.")]
pub(crate) struct Args {
    #[clap(subcommand)]
    pub(crate) cmd: Command,

    /// Whether to use colors in the terminal output.
    #[clap(long, value_enum, default_value_t = ColorMode::Auto, global = true)]
    pub(crate) color: ColorMode,
}

#[derive(Debug, clap::Subcommand)]
pub(crate) enum Command {
    /// Starts the backend HTTP server.
    Serve {
        #[clap(flatten)]
        shared: Shared,
    },

    /// Starts the Telegram bot, polling for new messages.
    Bot {
        #[clap(flatten)]
        shared: Shared,
    },

    /// Database operations.
    Db {
        #[clap(subcommand)]
        cmd: DbCommand,

        #[clap(flatten)]
        shared: Shared,
    },

    /// Checks config, DB connection and the Telegram API to find problems
    /// in the environment. Exits with 0 if everything is Ok, and with 1
    /// otherwise.
    Check {
        #[clap(flatten)]
        shared: Shared,
    },

    /// Outputs a template for the configuration file (which includes
    /// descriptions of all options).
    WriteConfig {
        /// Target file. If not specified, the template is written to stdout.
        target: Option<PathBuf>,
    },
}

impl Command {
    /// Short name of the command, used for the `${cmd}` log file placeholder.
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Serve { .. } => "serve",
            Self::Bot { .. } => "bot",
            Self::Db { .. } => "db",
            Self::Check { .. } => "check",
            Self::WriteConfig { .. } => "other",
        }
    }
}

#[derive(Debug, clap::Args)]
pub(crate) struct Shared {
    /// Path to the configuration file. If this is not specified, we try
    /// `TODOLIST_CONFIG_PATH`, `config.toml` and `/etc/todolist/config.toml`.
    #[clap(short, long)]
    pub(crate) config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum ColorMode {
    Auto,
    Always,
    Never,
}

impl Args {
    pub(crate) fn stdout_color(&self) -> ColorChoice {
        self.color.resolve(std::io::stdout().is_terminal())
    }

    pub(crate) fn stderr_color(&self) -> ColorChoice {
        self.color.resolve(std::io::stderr().is_terminal())
    }
}

impl ColorMode {
    fn resolve(self, is_terminal: bool) -> ColorChoice {
        match self {
            Self::Always => ColorChoice::Always,
            Self::Never => ColorChoice::Never,
            Self::Auto if is_terminal => ColorChoice::Auto,
            Self::Auto => ColorChoice::Never,
        }
    }
}
