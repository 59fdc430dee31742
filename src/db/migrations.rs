use chrono::{DateTime, Utc};
use deadpool_postgres::Transaction;
use once_cell::sync::Lazy;
use std::{collections::BTreeMap, time::Duration, num::NonZeroU64};
use tokio_postgres::{IsolationLevel, error::SqlState};

use crate::prelude::*;
use super::DbConnection;


/// Describes the actions needed to bring the database into a state that we
/// expect.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum MigrationPlan {
    /// The database is completely empty: we need to create the meta table and
    /// apply all migrations.
    EmptyDb,

    /// The database is completely up to date and all migrations match.
    UpToDate,

    /// The DB can be migrated to the state we expect by applying that many new
    /// migrations.
    Migrate {
        new_migrations: NonZeroU64,
    },
}

/// A migration as recorded in the `__db_migrations` table.
#[derive(Debug)]
struct AppliedMigration {
    name: String,
    applied_on: DateTime<Utc>,
    script: String,
}

impl MigrationPlan {
    /// Builds a migration plan by querying the current state of the DB. If the
    /// DB is in a state that we cannot fix, `Err` is returned. Does not modify
    /// the DB.
    pub(crate) async fn build(tx: &Transaction<'_>) -> Result<Self> {
        if !super::query::does_table_exist(&**tx, "__db_migrations").await? {
            // Any other table in the database would be fishy.
            let tables = super::query::all_table_names(&**tx).await?;
            if !tables.is_empty() {
                bail!(
                    "migration table '__db_migrations' does not exist, but some other \
                        tables ({}) do exist. This should not happen.",
                    tables.join(", "),
                );
            }

            return Ok(Self::EmptyDb);
        }

        debug!("Checking DB migrations");
        let applied = tx
            .query_raw("select id, name, applied_on, script from __db_migrations", dbargs![])
            .await
            .context("failed to query meta migrations table")?
            .map_ok(|row| (
                row.get::<_, i64>("id") as u64,
                AppliedMigration {
                    name: row.get("name"),
                    applied_on: row.get("applied_on"),
                    script: row.get("script"),
                },
            ))
            .try_collect::<BTreeMap<_, _>>()
            .await?;

        Self::compare(&applied, &MIGRATIONS)
    }

    /// Compares the migrations recorded in the DB with the ones known to this
    /// binary.
    fn compare(
        applied: &BTreeMap<u64, AppliedMigration>,
        known: &BTreeMap<u64, Migration>,
    ) -> Result<Self> {
        if !applied.keys().copied().eq(1..applied.len() as u64 + 1) {
            bail!("The IDs of the active migrations are not consecutive. This is unexpected.");
        }

        for (id, actual) in applied {
            let expected = known.get(id).ok_or_else(|| anyhow!(
                "The migration '{}-{}' is active in the database (applied on {}), but no \
                    such migration is known to this application. This is unexpected.",
                id,
                actual.name,
                actual.applied_on,
            ))?;

            if actual.script != expected.script {
                debug!("Expected script for '{}-{}':\n{}", id, expected.name, expected.script);
                debug!("Actual (in database) script for '{}-{}':\n{}", id, actual.name, actual.script);

                bail!(
                    "The script of active migration '{}-{}' (applied on {}) does not match the \
                        expected script for that migration. This is unexpected.",
                    id,
                    actual.name,
                    actual.applied_on,
                );
            }
        }

        // We know that `known` contains at least as many elements as
        // `applied`, therefore we can subtract here.
        match NonZeroU64::new(known.len() as u64 - applied.len() as u64) {
            None => Ok(Self::UpToDate),
            Some(new_migrations) => Ok(Self::Migrate { new_migrations }),
        }
    }

    /// Executes this plan on the database, bringing it into the state we expect.
    pub(crate) async fn execute(&self, tx: &Transaction<'_>) -> Result<()> {
        let new_migrations = match self {
            Self::UpToDate => {
                info!("All migrations are already applied: database schema is up to date.");
                return Ok(());
            }
            Self::EmptyDb => {
                info!("Database is empty. Creating table '__db_migrations'...");
                tx.batch_execute(include_str!("db-migrations.sql"))
                    .await
                    .context("could not create migrations meta table")?;
                MIGRATIONS.len() as u64
            }
            Self::Migrate { new_migrations } => new_migrations.get(),
        };

        info!("The database is missing {new_migrations} migrations. Applying them now.");
        for (id, migration) in MIGRATIONS.range(MIGRATIONS.len() as u64 - new_migrations + 1..) {
            debug!("Applying migration '{}-{}' ...", id, migration.name);
            trace!("Executing:\n{}", migration.script);

            tx.batch_execute(migration.script)
                .await
                .context(format!("failed to run script for '{}-{}'", id, migration.name))?;

            let query = "insert into __db_migrations (id, name, applied_on, script) \
                values ($1, $2, now(), $3)";
            tx.execute(query, &[&(*id as i64), &migration.name, &migration.script])
                .await
                .context("failed to update __db_migrations")?;
        }

        info!("Applied {new_migrations} migrations. DB is up to date now.");

        Ok(())
    }
}


/// Makes sure the database schema is up to date by checking the active
/// migrations and applying all missing ones.
///
/// If anything unexpected is noticed, an error is returned to notify the user
/// they have to manually deal with it.
pub(crate) async fn migrate(db: &mut DbConnection) -> Result<()> {
    // The whole migration process is wrapped in one serializable transaction,
    // so that only one node ever does the migrations. Serializable
    // transactions can fail when committing them, so we retry. On the second
    // attempt we expect to see the result of the other node's transaction.
    loop {
        let tx = db.build_transaction()
            .isolation_level(IsolationLevel::Serializable)
            .start()
            .await?;

        let plan = MigrationPlan::build(&tx).await?;
        plan.execute(&tx).await?;

        match tx.commit().await {
            Ok(_) => return Ok(()),

            Err(e) if e.code() == Some(&SqlState::T_R_SERIALIZATION_FAILURE) => {
                let backoff_duration = Duration::from_millis(500);
                warn!(
                    "Database migration transaction failed to commit. This is likely because \
                    of another node which has executed the same transaction concurrently. \
                    Will try again in {:?}.",
                    backoff_duration,
                );

                tokio::time::sleep(backoff_duration).await;
                continue;
            }

            Err(e) => Err(e)?,
        }
    }
}

// Includes migrations from the `migrations` folder and adds them to a map.
macro_rules! include_migrations {
    ( $( $id:literal : $name:literal ,)+ ) => {
        Lazy::new(|| {
            let mut m = BTreeMap::new();
            $(
                let prev = m.insert($id, Migration {
                    name: $name,
                    script: include_str!(
                        concat!("migrations/", stringify!($id), "-", $name, ".sql")
                    ),
                });

                assert!(prev.is_none(), "duplicate key in `include_migrations!`");
            )+

            if !m.keys().copied().eq(1..m.len() as u64 + 1) {
                panic!("migration IDs in `include_migrations!` are not consecutive");
            }

            m
        })
    };
}

#[derive(Debug)]
struct Migration {
    name: &'static str,
    script: &'static str,
}

static MIGRATIONS: Lazy<BTreeMap<u64, Migration>> = include_migrations![
    01: "users",
    02: "user-sessions",
    03: "boards",
    04: "goal-categories",
    05: "goals",
    06: "goal-comments",
    07: "tg-users",
];
