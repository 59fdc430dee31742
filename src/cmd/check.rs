//! A subcommand making sure various things are working. Useful after
//! updating the todolist backend or changing its environment, to find
//! problems as early as possible.

use anyhow::Result;

use crate::{
    args,
    bot::TelegramClient,
    config::Config,
    db::{self, MigrationPlan},
    load_config_and_init_logger,
    prelude::*,
};


pub(crate) async fn run(shared: &args::Shared, args: &args::Args) -> Result<()> {
    let config = load_config_and_init_logger(shared, args)
        .context("failed to load config: cannot proceed with `check` command")?;


    // Perform main checks
    info!("Starting to verify various things...");
    let referenced_files = check_referenced_files(&config).await;
    let db = check_db(&config).await;
    let telegram = check_telegram(&config).await;
    info!("Done verifing various things");


    // Print summary after all log output
    let mut any_errors = false;
    println!();
    bunt::println!("{$bold+blue+intense}Summary{/$}");
    println!();
    print_outcome(&mut any_errors, "Load configuration", &Ok(()));
    print_outcome(&mut any_errors, "Checking all referenced files", &referenced_files);
    print_outcome(&mut any_errors, "Connection to DB and migrations", &db);
    print_outcome(&mut any_errors, "Connection to Telegram Bot API", &telegram);

    println!();
    if any_errors {
        bunt::println!("{$red+intense}➡  Errors have occured!{/$}");
        std::process::exit(1);
    } else {
        bunt::println!("{$green+intense}⮕  Everything OK{/$} \
            {$dimmed}(todolist probably works in this environment){/$}");
        println!("   ");
        Ok(())
    }
}

fn print_outcome<T>(any_errors: &mut bool, label: &str, result: &Result<T>) {
    match result {
        Ok(_) => {
            bunt::println!(" ▸ {[bold+intense]}  {$green+bold}✔ ok{/$}", label);
        }
        Err(e) => {
            *any_errors = true;
            bunt::println!(" ▸ {[bold+intense]}  {$red+bold}✘ error{/$}", label);
            bunt::println!("      {$red}▶▶▶ {$bold}Error:{/$}{/$} {[yellow+intense]}", e);
            println!();
            bunt::println!("      {$red+italic}Caused by:{/$}");

            for (i, cause) in e.chain().skip(1).enumerate() {
                print!("       {: >1$}", "", i * 2);
                println!("‣ {cause}");
            }
            println!();
        }
    }
}

async fn check_referenced_files(config: &Config) -> Result<()> {
    if let Some(path) = &config.db.server_cert {
        debug!("Trying to open '{}' for reading...", path.display());
        let _ = tokio::fs::File::open(path)
            .await
            .context(format!("could not open '{}' for reading", path.display()))?;
    }

    Ok(())
}

/// Connects to the DB and reports (but does not apply) pending migrations.
async fn check_db(config: &Config) -> Result<()> {
    let pool = db::create_pool(&config.db).await?;
    let mut connection = pool.get().await?;
    let tx = connection.transaction().await?;
    let plan = MigrationPlan::build(&tx).await?;
    tx.rollback().await?;

    match plan {
        MigrationPlan::UpToDate => Ok(()),
        MigrationPlan::EmptyDb => bail!("database is empty (run `todolist db migrate`)"),
        MigrationPlan::Migrate { new_migrations } => bail!(
            "{new_migrations} migrations have not been applied yet (run `todolist db migrate`)"
        ),
    }
}

async fn check_telegram(config: &Config) -> Result<()> {
    let Some(client) = TelegramClient::from_config(&config.bot)? else {
        info!("No bot token configured, skipping Telegram check");
        return Ok(());
    };

    let me = client.get_me().await?;
    info!("Telegram bot token belongs to '{}'", me.username.as_deref().unwrap_or("<unnamed>"));
    Ok(())
}
