use std::sync::Arc;

use bytes::Bytes;
use deadpool_postgres::Pool;
use hyper::Method;
use secrecy::{ExposeSecret, SecretString};
use tokio_postgres::{Client, NoTls};

use crate::{
    api::{self, Reply, Route, err::ApiResult, model::user::{NewUser, User}},
    auth::{AuthContext, SessionId},
    config::Config,
    db::{DbConnection, Transaction},
    prelude::*,
};
use super::super::{DbConfig, create_pool};


/// Environment variable pointing to a config file whose `db` section is used
/// to create temporary test databases. DB tests are skipped if it's unset.
const CONFIG_ENV: &str = "TODOLIST_TEST_CONFIG";

async fn conn(config: &DbConfig) -> Result<Client> {
    let (client, connection) = tokio_postgres::config::Config::new()
        .user(&config.user)
        .password(config.password.expose_secret())
        .dbname(&config.database)
        .host(&config.host)
        .port(config.port)
        .application_name("todolist DB tests")
        .connect(NoTls)
        .await
        .context("could not connect to DB in test")?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            panic!("PG connection error: {e}");
        }
    });

    Ok(client)
}

/// A temporary DB used for a single unit test. Is removed on drop.
///
/// Be sure to use the multi threaded Tokio runtime or else `drop` will hang
/// indefinitely!
pub(super) struct TestDb {
    pool: Option<Pool>,
    controller: Client,
    db_name: String,
    config: Arc<Config>,
}

impl TestDb {
    /// Creates a new temporary database with all migrations applied. Returns
    /// `None` if no test config is specified.
    pub(super) async fn new() -> Result<Option<Self>> {
        let Some(path) = std::env::var_os(CONFIG_ENV) else {
            eprintln!("`{CONFIG_ENV}` not set, skipping DB test");
            return Ok(None);
        };
        let mut config = Config::load_from(&path)
            .context("failed to load config")?;

        // Create connection to original database and create a new temporary one.
        let controller = conn(&config.db).await?;
        let db_name = format!("todolist_test_{}", rand::random::<u64>());
        controller.execute(&format!("create database {db_name}"), &[]).await
            .context("failed to create temporary test DB")?;

        config.db.database = db_name.clone();
        config.db.max_connections = 2;
        let pool = create_pool(&config.db).await?;
        crate::db::migrate(&mut pool.get().await?).await
            .context("failed to run migrations on test DB")?;

        Ok(Some(Self {
            controller,
            pool: Some(pool),
            db_name,
            config: Arc::new(config),
        }))
    }

    pub(super) async fn conn(&self) -> Result<DbConnection> {
        let pool = self.pool.as_ref().ok_or_else(|| anyhow!("pool already dropped"))?;
        Ok(pool.get().await?)
    }

    /// Sends one API request as `user` and returns its result. Like in the
    /// HTTP handler, the request runs in its own transaction, which is only
    /// committed on success.
    pub(super) async fn api(
        &self,
        user: Option<&User>,
        method: Method,
        uri: &str,
        body: &str,
    ) -> Result<ApiResult<Reply>> {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, Some(query.to_owned())),
            None => (uri, None),
        };
        let route = Route::from_path(path).ok_or_else(|| anyhow!("no route for '{path}'"))?;
        let request = api::Request {
            method,
            route,
            path: path.to_owned(),
            query,
            body: Bytes::from(body.to_owned()),
        };

        let mut conn = self.conn().await?;
        let ctx = api::Context {
            db: Transaction::new(conn.transaction().await?),
            auth: match user {
                Some(user) => AuthContext::User { user: user.clone(), session: SessionId::new() },
                None => AuthContext::Anonymous,
            },
            config: Arc::clone(&self.config),
            telegram: None,
        };

        let result = api::handle(&request, &ctx).await;
        match result {
            Ok(_) => ctx.db.commit().await?,
            Err(_) => ctx.db.rollback().await?,
        }

        Ok(result)
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        // Since there is no "async drop" in Rust yet, this is a bit annoying.
        // First we need to drop the pool to close all connections to the
        // temporary database. Then we drop the database within `block_on`.
        //
        // This code requires the multi threaded Tokio runtime! :(
        if let Some(pool) = self.pool.take() {
            pool.close();
        }
        futures::executor::block_on(async move {
            self.controller
                .execute(&format!("drop database {} with (force)", self.db_name), &[])
                .await
                .expect("failed to drop temporary test DB");
        });
    }
}

/// Registers a user with a valid password.
pub(super) async fn add_user(tx: &Transaction<'_>, username: &str) -> Result<User> {
    let password = || SecretString::from("correct horse battery staple".to_owned());
    let user = User::create(tx, NewUser {
        username: username.into(),
        password: password(),
        password_repeat: password(),
        first_name: String::new(),
        last_name: String::new(),
        email: format!("{username}@example.org"),
    }).await?;

    Ok(user)
}
