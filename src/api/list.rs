//! Query string handling of the list endpoints: filters, ordering and
//! pagination.

use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;

use crate::db::types::Key;
use super::{
    Reply,
    err::{ApiError, ApiResult},
    model::{Listing, Order, Paging},
};


/// The maximum `limit` for paginated lists. Larger values are clamped.
pub(crate) const MAX_LIMIT: i64 = 1000;

/// The parsed query string of a list request.
#[derive(Debug, Default)]
pub(crate) struct ListQuery {
    params: Vec<(String, String)>,
}

impl ListQuery {
    pub(crate) fn parse(query: Option<&str>) -> Self {
        let params = query
            .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        Self { params }
    }

    /// The value of the parameter. If it is given multiple times, the last
    /// one is used. Empty values are treated as missing.
    pub(crate) fn get(&self, name: &str) -> Option<&str> {
        self.params.iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Pagination is only used if `limit` is a positive number. Invalid
    /// offsets are treated as 0.
    pub(crate) fn paging(&self) -> Option<Paging> {
        let limit = self.get("limit")?.parse::<i64>().ok().filter(|l| *l > 0)?;
        let offset = self.get("offset")
            .and_then(|o| o.parse::<i64>().ok())
            .filter(|o| *o >= 0)
            .unwrap_or(0);

        Some(Paging { limit: limit.min(MAX_LIMIT), offset })
    }

    pub(crate) fn order(&self, allowed: &[(&str, &'static str)], default: Order) -> Order {
        Order::parse(self.get("ordering"), allowed, default)
    }

    pub(crate) fn search(&self) -> Option<String> {
        self.get("search").map(ToOwned::to_owned)
    }

    pub(crate) fn key(&self, name: &'static str) -> ApiResult<Option<Key>> {
        self.get(name)
            .map(|value| value.parse::<Key>().map_err(|_| invalid_choice(name)))
            .transpose()
    }

    /// A comma separated list of values, like `?status__in=1,2`.
    pub(crate) fn list<T: FromStr>(&self, name: &'static str) -> ApiResult<Option<Vec<T>>> {
        let Some(value) = self.get(name) else {
            return Ok(None);
        };

        value.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| part.parse::<T>().map_err(|_| invalid_choice(name)))
            .collect::<ApiResult<Vec<_>>>()
            .map(Some)
    }

    /// A date in the format `YYYY-MM-DD`.
    pub(crate) fn date(&self, name: &'static str) -> ApiResult<Option<NaiveDate>> {
        self.get(name)
            .map(|value| {
                NaiveDate::parse_from_str(value, "%Y-%m-%d")
                    .map_err(|_| ApiError::field(name, "Enter a valid date."))
            })
            .transpose()
    }

    /// A relative URL to the same list with a different offset.
    fn url_with_offset(&self, path: &str, offset: i64) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.params.iter().filter(|(key, _)| key != "offset") {
            query.append_pair(key, value);
        }
        if offset > 0 {
            query.append_pair("offset", &offset.to_string());
        }

        let query = query.finish();
        if query.is_empty() {
            path.to_owned()
        } else {
            format!("{path}?{query}")
        }
    }
}

fn invalid_choice(field: &'static str) -> ApiError {
    ApiError::field(field, "Select a valid choice. That choice is not one of the available choices.")
}

/// One page of a paginated list.
#[derive(Debug, Serialize)]
struct Page<T> {
    count: i64,
    next: Option<String>,
    previous: Option<String>,
    results: Vec<T>,
}

/// Replies with a plain JSON array, or with a page object if pagination was
/// requested.
pub(crate) fn reply<T: Serialize>(
    listing: Listing<T>,
    paging: Option<Paging>,
    path: &str,
    query: &ListQuery,
) -> ApiResult<Reply> {
    let Some(paging) = paging else {
        return Reply::ok(&listing.items);
    };

    let next_offset = paging.offset.saturating_add(paging.limit);
    let page = Page {
        count: listing.total,
        next: (next_offset < listing.total).then(|| query.url_with_offset(path, next_offset)),
        previous: (paging.offset > 0).then(|| {
            query.url_with_offset(path, (paging.offset - paging.limit).max(0))
        }),
        results: listing.items,
    };

    Reply::ok(&page)
}


#[cfg(test)]
mod tests {
    use crate::db::types::Status;
    use super::*;

    #[test]
    fn paging() {
        assert_eq!(ListQuery::parse(None).paging(), None);
        assert_eq!(
            ListQuery::parse(Some("limit=10")).paging(),
            Some(Paging { limit: 10, offset: 0 }),
        );
        assert_eq!(
            ListQuery::parse(Some("limit=10&offset=30")).paging(),
            Some(Paging { limit: 10, offset: 30 }),
        );
        assert_eq!(
            ListQuery::parse(Some("limit=5000")).paging(),
            Some(Paging { limit: MAX_LIMIT, offset: 0 }),
        );
        assert_eq!(
            ListQuery::parse(Some("limit=5&offset=-3")).paging(),
            Some(Paging { limit: 5, offset: 0 }),
        );
        assert_eq!(ListQuery::parse(Some("limit=0")).paging(), None);
        assert_eq!(ListQuery::parse(Some("limit=ten")).paging(), None);
        assert_eq!(ListQuery::parse(Some("offset=10")).paging(), None);
    }

    #[test]
    fn filters() {
        let query = ListQuery::parse(Some(
            "status__in=1,%202&category__in=&due_date__lte=2024-02-29&board=4&search=milk+bread",
        ));
        assert_eq!(
            query.list::<Status>("status__in").unwrap(),
            Some(vec![Status::ToDo, Status::InProgress]),
        );
        assert_eq!(query.list::<Key>("category__in").unwrap(), None);
        assert_eq!(query.date("due_date__lte").unwrap(), NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(query.date("due_date__gte").unwrap(), None);
        assert_eq!(query.key("board").unwrap(), Some(Key(4)));
        assert_eq!(query.search().as_deref(), Some("milk bread"));
    }

    #[test]
    fn invalid_filters() {
        let query = ListQuery::parse(Some("status__in=1,9&due_date__gte=tomorrow&board=x"));
        assert!(query.list::<Status>("status__in").unwrap_err().is_about_field("status__in"));
        assert!(query.date("due_date__gte").unwrap_err().is_about_field("due_date__gte"));
        assert!(query.key("board").unwrap_err().is_about_field("board"));
    }

    #[test]
    fn last_value_wins() {
        let query = ListQuery::parse(Some("ordering=title&ordering=-created"));
        assert_eq!(query.get("ordering"), Some("-created"));
    }

    #[test]
    fn page_links() {
        let query = ListQuery::parse(Some("limit=2&offset=2&search=x"));
        let paging = query.paging();
        let listing = Listing { items: vec![3, 4], total: 5 };

        let reply = reply(listing, paging, "/goals/goal/list", &query).unwrap();
        assert_eq!(reply.body.unwrap(), serde_json::json!({
            "count": 5,
            "next": "/goals/goal/list?limit=2&search=x&offset=4",
            "previous": "/goals/goal/list?limit=2&search=x",
            "results": [3, 4],
        }));
    }

    #[test]
    fn last_page_has_no_next() {
        let query = ListQuery::parse(Some("limit=2&offset=4"));
        let listing = Listing { items: vec![5], total: 5 };

        let reply = reply(listing, query.paging(), "/goals/board/list", &query).unwrap();
        let body = reply.body.unwrap();
        assert_eq!(body["next"], serde_json::Value::Null);
        assert_eq!(body["previous"], "/goals/board/list?limit=2&offset=2");
    }

    #[test]
    fn huge_offset() {
        let query = ListQuery::parse(Some("limit=10&offset=9223372036854775807"));
        let paging = query.paging();
        assert_eq!(paging, Some(Paging { limit: 10, offset: i64::MAX }));

        let listing = Listing { items: Vec::<i32>::new(), total: 3 };
        let body = reply(listing, paging, "/goals/goal/list", &query).unwrap().body.unwrap();
        assert_eq!(body["next"], serde_json::Value::Null);
        assert_eq!(
            body["previous"],
            format!("/goals/goal/list?limit=10&offset={}", i64::MAX - 10),
        );
    }

    #[test]
    fn unpaginated_is_plain_array() {
        let query = ListQuery::parse(None);
        let listing = Listing { items: vec!["a", "b"], total: 2 };
        let reply = reply(listing, None, "/goals/board/list", &query).unwrap();
        assert_eq!(reply.body.unwrap(), serde_json::json!(["a", "b"]));
    }
}
