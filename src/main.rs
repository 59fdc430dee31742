//! The todolist backend: HTTP API, Telegram bot and management commands.

use clap::{FromArgMatches, CommandFactory};
use deadpool_postgres::Pool;
use std::{env, sync::Arc};

use crate::{
    args::{Args, Command},
    config::Config,
    prelude::*,
    util::Never,
};

mod api;
mod args;
mod auth;
mod bot;
mod cmd;
mod config;
mod db;
mod http;
mod logger;
mod prelude;
mod util;
mod version;


#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;


#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // Log error in case stdout is not connected and it is logged into a file.
        error!("{:?}", e);

        // Show a somewhat nice representation of the error
        eprintln!();
        eprintln!();
        bunt::eprintln!("{$red}▶▶▶ {$bold}Error:{/$}{/$} {[yellow+intense]}", e);
        eprintln!();
        if e.chain().len() > 1 {
            bunt::eprintln!("{$red+italic}Caused by:{/$}");
        }

        for (i, cause) in e.chain().skip(1).enumerate() {
            eprint!(" {: >1$}", "", i * 2);
            eprintln!("‣ {cause}");
        }

        std::process::exit(1);
    }
}

/// Main entry point.
async fn run() -> Result<()> {
    // If `RUST_BACKTRACE` wasn't already set, we default to `1`. Backtraces are
    // almost always useful for debugging and we don't expect panics to occur
    // regularly.
    if env::var("RUST_BACKTRACE") == Err(env::VarError::NotPresent) {
        env::set_var("RUST_BACKTRACE", "1");
    }

    // Parse CLI args.
    // This is a bit roundabout because we want to override the version
    // using some runtime code.
    let args = Args::from_arg_matches(
        &Args::command()
            .version(version::full())
            .get_matches(),
    )?;

    // Configure output via `bunt`
    bunt::set_stdout_color_choice(args.stdout_color());
    bunt::set_stderr_color_choice(args.stderr_color());


    // Dispatch subcommand.
    match &args.cmd {
        Command::Serve { shared } => {
            let config = load_config_and_init_logger(shared, &args)?;
            start_server(config).await?;
        }
        Command::Bot { shared } => {
            let config = load_config_and_init_logger(shared, &args)?;
            start_bot(config).await?;
        }
        Command::Db { cmd, shared } => {
            let config = load_config_and_init_logger(shared, &args)?;
            db::cmd::run(cmd, &config).await?;
        }
        Command::Check { shared } => cmd::check::run(shared, &args).await?,
        Command::WriteConfig { target } => config::write_template(target.as_ref())?,
    }

    Ok(())
}

/// Runs the HTTP server and, next to it, the task deleting outdated sessions.
async fn start_server(config: Config) -> Result<()> {
    info!("Starting todolist backend {} ...", version::identifier());
    trace!("Configuration: {:#?}", config);
    let db = connect_and_migrate_db(&config).await?;
    let maintenance_conn = db.get().await?;
    let config = Arc::new(config);

    tokio::select! {
        res = http::serve(Arc::clone(&config), db) => {
            res.context("failed to start HTTP server")
        }
        never = auth::db_maintenance(&maintenance_conn, &config.auth) => { never }
    }
}

async fn start_bot(config: Config) -> Result<Never> {
    info!("Starting todolist bot {} ...", version::identifier());
    let db = connect_and_migrate_db(&config).await?;
    bot::run(&config.bot, db).await
}


fn load_config_and_init_logger(shared: &args::Shared, args: &Args) -> Result<Config> {
    // Load configuration.
    let (config, path) = match &shared.config {
        Some(path) => {
            let config = Config::load_from(path)
                .context(format!("failed to load config from '{}'", path.display()))?;
            (config, path.clone())
        }
        None => Config::from_env_or_default_locations()?,
    };

    // Initialize logger. Unfortunately, we can only do this here
    // after reading the config.
    logger::init(&config.log, args.stdout_color(), args.cmd.name())?;
    info!("Loaded config from '{}'", path.display());

    Ok(config)
}

async fn connect_and_migrate_db(config: &Config) -> Result<Pool> {
    let db = db::create_pool(&config.db).await
        .context("failed to create database connection pool (database not running?)")?;
    db::migrate(&mut db.get().await?).await
        .context("failed to check/run DB migrations")?;
    Ok(db)
}
