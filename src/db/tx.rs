use std::{ops::Deref, sync::atomic::{AtomicU32, Ordering}};
use postgres_types::ToSql;
use tokio_postgres::{Error, Row};

use crate::prelude::*;


/// A database transaction that has been started for one unit of work: one
/// API request or one bot message.
pub(crate) struct Transaction<'a> {
    inner: deadpool_postgres::Transaction<'a>,
    num_queries: AtomicU32,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(inner: deadpool_postgres::Transaction<'a>) -> Self {
        Self { inner, num_queries: AtomicU32::new(0) }
    }

    pub(crate) fn num_queries(&self) -> u32 {
        self.num_queries.load(Ordering::Relaxed)
    }

    fn increase_num_queries(&self) {
        self.num_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) async fn commit(self) -> Result<(), Error> {
        self.inner.commit().await
    }

    pub(crate) async fn rollback(self) -> Result<(), Error> {
        self.inner.rollback().await
    }

    // The following methods shadow the ones from `deadpool_postgres::Transaction`
    // and automatically use the statement cache. Every query additionally
    // incurs a lock and a hashmap lookup, but that's a lot cheaper than
    // preparing the statement each time.

    pub(crate) async fn query(
        &self,
        query: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, Error> {
        trace!("Executing SQL query: \"{}\" with {:?}", query, params);
        let statement = self.inner.prepare_cached(query).await?;
        self.increase_num_queries();
        self.inner.query(&statement, params).await
    }

    pub(crate) async fn query_one(
        &self,
        query: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Row, Error> {
        trace!("Executing SQL query: \"{}\" with {:?}", query, params);
        let statement = self.inner.prepare_cached(query).await?;
        self.increase_num_queries();
        self.inner.query_one(&statement, params).await
    }

    pub(crate) async fn query_opt(
        &self,
        query: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, Error> {
        trace!("Executing SQL query: \"{}\" with {:?}", query, params);
        let statement = self.inner.prepare_cached(query).await?;
        self.increase_num_queries();
        self.inner.query_opt(&statement, params).await
    }

    pub(crate) async fn execute(
        &self,
        query: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, Error> {
        trace!("Executing SQL query: \"{}\" with {:?}", query, params);
        let statement = self.inner.prepare_cached(query).await?;
        self.increase_num_queries();
        self.inner.execute(&statement, params).await
    }
}

impl<'a> Deref for Transaction<'a> {
    type Target = deadpool_postgres::Transaction<'a>;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
