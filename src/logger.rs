use std::{
    collections::HashMap,
    fmt::Write as _,
    fs::OpenOptions,
    path::PathBuf,
};
use nu_ansi_term::{Color, Style};
use serde::Deserialize;
use termcolor::ColorChoice;
use tracing::{field::Visit, Level};
use tracing_log::NormalizeEvent;
use tracing_subscriber::{
    filter::{FilterFn, LevelFilter},
    fmt::FormatEvent,
    prelude::*,
};

use crate::prelude::*;


#[derive(Debug, confique::Config)]
pub(crate) struct LogConfig {
    /// Specifies what log messages to emit, based on the module path and log level.
    ///
    /// This is a map where the key specifies a module path prefix, and the
    /// value specifies a minimum log level. For each log message, the map
    /// entry with the longest prefix matching the log's module path is chosen.
    /// If no such entry exists, the log is not emitted. Otherwise, that
    /// entry's level is used to check whether the log message should be
    /// emitted.
    ///
    /// Example: only ≥"info" logs generally, ≥"trace" from the `db` module,
    /// no logs from the bot's Telegram client and ≥"debug" from `hyper`.
    ///
    ///    [log]
    ///    filters.todolist = "info"
    ///    filters."todolist::db" = "trace"
    ///    filters."todolist::bot::client" = "off"
    ///    filters.hyper = "debug"
    #[config(default = { "todolist": "debug" })]
    pub(crate) filters: Filters,

    /// If this is set, log messages are also written to this file. The string
    /// `${cmd}` in this value is replaced by the subcommand name of the
    /// process, e.g. `serve` or `bot`. Example: "/var/log/todolist-${cmd}.log".
    pub(crate) file: Option<PathBuf>,

    /// If this is set to `false`, log messages are not written to stdout.
    #[config(default = true)]
    pub(crate) stdout: bool,

    /// If set to `true`, HTTP header of each incoming request are logged
    /// (with 'trace' level).
    #[config(default = false)]
    pub(crate) log_http_headers: bool,
}

#[derive(Debug, Deserialize)]
#[serde(try_from = "HashMap<String, String>")]
pub(crate) struct Filters(HashMap<String, LevelFilter>);

impl TryFrom<HashMap<String, String>> for Filters {
    type Error = String;
    fn try_from(value: HashMap<String, String>) -> Result<Self, Self::Error> {
        value.into_iter()
            .map(|(target_prefix, level)| {
                let level = parse_level_filter(&level)?;
                Ok((target_prefix, level))
            })
            .collect::<Result<_, _>>()
            .map(Self)
    }
}

impl Filters {
    /// Returns whether a message with the given target and level passes
    /// these filters. The entry with the longest matching prefix decides.
    fn allows(&self, target: &str, level: &Level) -> bool {
        self.0.iter()
            .filter(|(target_prefix, _)| target.starts_with(target_prefix.as_str()))
            .max_by_key(|(target_prefix, _)| target_prefix.len())
            .map(|(_, level_filter)| level <= level_filter)
            .unwrap_or(false)
    }
}

fn parse_level_filter(s: &str) -> Result<LevelFilter, String> {
    match s {
        "off" => Ok(LevelFilter::OFF),
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" => Ok(LevelFilter::WARN),
        "error" => Ok(LevelFilter::ERROR),
        other => Err(format!("invalid log level '{other}'")),
    }
}

/// Installs our own logger globally. Must only be called once!
pub(crate) fn init(config: &LogConfig, color: ColorChoice, cmd: &str) -> Result<()> {
    let filter = {
        let filters = Filters(config.filters.0.clone());
        let max_level = filters.0.values().max().copied().unwrap_or(LevelFilter::OFF);
        FilterFn::new(move |metadata| filters.allows(metadata.target(), metadata.level()))
            .with_max_level_hint(max_level)
    };

    let stdout_output = config.stdout.then(|| {
        tracing_subscriber::fmt::layer()
            .event_format(EventFormatter(color))
            .with_writer(std::io::stdout)
    });

    let file_output = config.file.as_ref()
        .map(|path| -> Result<std::fs::File> {
            use std::io::Write;

            let new_path = path.to_str()
                .ok_or_else(|| anyhow!("log file path is not valid UTF-8"))?
                .replace("${cmd}", cmd);

            let mut file = OpenOptions::new()
                .append(true)
                .create(true)
                .open(new_path)
                .with_context(|| format!("failed to open/create log file '{}'", path.display()))?;

            // Add an empty line separator to see process restarts easier.
            file.write_all(b"\n").context("could not write to log file")?;

            Ok(file)
        })
        .transpose()?
        .map(|file| {
            tracing_subscriber::fmt::layer()
                .event_format(EventFormatter(ColorChoice::Never))
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
        });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_output)
        .with(stdout_output)
        .init();

    Ok(())
}

type TracingWriter<'a> = tracing_subscriber::fmt::format::Writer<'a>;

/// Prints `time level target >  message ~~ key=value key=value`.
#[derive(Clone, Copy)]
struct EventFormatter(ColorChoice);

impl<S, N> FormatEvent<S, N> for EventFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: TracingWriter<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let use_ansi = self.0 == ColorChoice::Always
            || (writer.has_ansi_escapes() && self.0 != ColorChoice::Never);
        let paint = |style: Style, s: &str| -> String {
            if use_ansi { style.paint(s).to_string() } else { s.to_owned() }
        };

        // Events coming from the `log` crate carry their real metadata in fields.
        let normalized_metadata = event.normalized_metadata();
        let metadata = normalized_metadata.as_ref().unwrap_or(event.metadata());

        let dim = Style::new().dimmed();
        let (level_style, body_style) = match *metadata.level() {
            Level::ERROR => (Style::new().fg(Color::Red).bold(), Style::new().fg(Color::Red)),
            Level::WARN => (Style::new().fg(Color::Yellow).bold(), Style::new().fg(Color::Yellow)),
            Level::INFO => (Style::new().fg(Color::Green), Style::new()),
            Level::DEBUG => (Style::new().fg(Color::Blue), Style::new().dimmed()),
            Level::TRACE => (Style::new().fg(Color::Magenta), Style::new().fg(Color::DarkGray)),
        };

        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string();
        write!(writer, "{} ", paint(dim, &now))?;
        write!(writer, "{}", paint(level_style, &format!("{:5}", metadata.level())))?;
        write!(writer, "{}", paint(dim, &format!(" {} >  ", metadata.target())))?;

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        if let Some(message) = &fields.message {
            write!(writer, "{}", paint(body_style, message))?;
        }
        if !fields.rest.is_empty() {
            if fields.message.is_some() {
                write!(writer, "{}", paint(level_style, " ~~ "))?;
            }
            write!(writer, "{}", paint(body_style, &fields.rest))?;
        }

        writeln!(writer)
    }
}

/// Gathers the `message` field and all other fields (as `key=value` pairs)
/// of an event. Fields added by `tracing-log` are skipped.
#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    rest: String,
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let name = field.name();
        if name == "message" {
            self.message = Some(format!("{value:?}"));
        } else if !name.starts_with("log.") {
            if !self.rest.is_empty() {
                self.rest.push(' ');
            }
            let _ = write!(self.rest, "{name}={value:?}");
        }
    }
}
