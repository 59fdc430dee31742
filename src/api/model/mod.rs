//! The domain types of the API and their database operations.
//!
//! All operations take the transaction of the current unit of work (one API
//! request or one bot message) and the acting user. Visibility is always
//! checked before permissions: objects the user cannot see result in "not
//! found", objects they can see but not change in "permission denied".

use postgres_types::ToSql;
use tokio_postgres::Row;

use crate::{
    api::err::{ApiError, ApiResult},
    db::Transaction,
};


pub(crate) mod access;
pub(crate) mod board;
pub(crate) mod category;
pub(crate) mod comment;
pub(crate) mod goal;
pub(crate) mod tg_user;
pub(crate) mod user;


/// Maximum length of titles of boards, categories and goals.
pub(crate) const MAX_TITLE_LEN: usize = 255;

/// Trims the given title and checks its length. Errors refer to `field`.
pub(crate) fn validate_title(title: &str, field: &'static str) -> ApiResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ApiError::field(field, "This field may not be blank."));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::field(
            field,
            format!("Ensure this field has no more than {MAX_TITLE_LEN} characters."),
        ));
    }

    Ok(title.to_owned())
}


// ===== Listing helpers =========================================================================

/// Sort order for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Order {
    /// The SQL expression to sort by.
    pub(crate) column: &'static str,
    pub(crate) desc: bool,
}

impl Order {
    pub(crate) const fn asc(column: &'static str) -> Self {
        Self { column, desc: false }
    }

    pub(crate) const fn desc(column: &'static str) -> Self {
        Self { column, desc: true }
    }

    /// Parses a `?ordering=` value like `-created`. `allowed` maps public
    /// field names to SQL expressions. Unknown fields fall back to `default`.
    pub(crate) fn parse(
        input: Option<&str>,
        allowed: &[(&str, &'static str)],
        default: Self,
    ) -> Self {
        let Some(input) = input.map(str::trim).filter(|s| !s.is_empty()) else {
            return default;
        };

        let (name, desc) = match input.strip_prefix('-') {
            Some(name) => (name, true),
            None => (input, false),
        };

        allowed.iter()
            .find(|(public, _)| *public == name)
            .map(|(_, column)| Self { column: *column, desc })
            .unwrap_or(default)
    }

    /// SQL for `order by`. The table's primary key is used as tie breaker so
    /// that pagination is stable.
    fn sql(&self, tie_breaker: &str) -> String {
        let dir = if self.desc { "desc" } else { "asc" };
        format!("{} {dir}, {tie_breaker} {dir}", self.column)
    }
}

/// The requested page for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Paging {
    pub(crate) limit: i64,
    pub(crate) offset: i64,
}

/// Result of a list query.
#[derive(Debug)]
pub(crate) struct Listing<T> {
    pub(crate) items: Vec<T>,

    /// Total number of items matching the query, ignoring paging.
    pub(crate) total: i64,
}

/// SQL conditions and their parameters for list queries.
#[derive(Default)]
pub(crate) struct Filter {
    conditions: Vec<String>,
    params: Vec<Box<dyn ToSql + Sync + Send>>,
}

impl Filter {
    /// Adds a condition with one parameter. Every `$` in `sql` is replaced by
    /// the placeholder of that parameter.
    pub(crate) fn add(&mut self, sql: &str, param: impl ToSql + Sync + Send + 'static) {
        self.params.push(Box::new(param));
        let placeholder = format!("${}", self.params.len());
        self.conditions.push(sql.replace('$', &placeholder));
    }

    /// Adds a condition without parameters.
    pub(crate) fn add_plain(&mut self, sql: &str) {
        self.conditions.push(sql.to_owned());
    }

    fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            "true".into()
        } else {
            self.conditions.join(" and ")
        }
    }

    fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.iter().map(|p| &**p as &(dyn ToSql + Sync)).collect()
    }

    /// Runs the list query `select {selection} from {from} where ...` and, if
    /// paging is requested, an additional count query.
    pub(crate) async fn fetch<T>(
        &self,
        db: &Transaction<'_>,
        selection: &str,
        from: &str,
        order: Order,
        tie_breaker: &str,
        paging: Option<Paging>,
        from_row: impl Fn(&Row) -> T,
    ) -> ApiResult<Listing<T>> {
        let where_clause = self.where_clause();
        let params = self.params();
        let mut query = format!(
            "select {selection} from {from} where {where_clause} order by {}",
            order.sql(tie_breaker),
        );

        if let Some(paging) = paging {
            query += &format!(" limit {} offset {}", paging.limit, paging.offset);
        }

        let items = db.query(&query, &params).await?
            .iter()
            .map(from_row)
            .collect::<Vec<_>>();

        let total = match paging {
            None => items.len() as i64,
            Some(_) => {
                let count_query = format!("select count(*) from {from} where {where_clause}");
                db.query_one(&count_query, &params).await?.get::<_, i64>(0)
            }
        };

        Ok(Listing { items, total })
    }
}

/// Escapes `%`, `_` and `\` for use in `ilike` patterns and wraps the input
/// in `%` for substring search.
pub(crate) fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', r"\\")
        .replace('%', r"\%")
        .replace('_', r"\_");
    format!("%{escaped}%")
}
