use std::{fmt, time::Duration};

use cookie::{Cookie, SameSite};
use hyper::{HeaderMap, header};
use postgres_types::ToSql;
use secrecy::{ExposeSecret, SecretBox};

use crate::{db::Transaction, prelude::*, util::gen_random_bytes_crypto};
use super::{AuthConfig, SESSION_COOKIE, base64decode, base64encode};


/// A session ID (random bytes).
///
/// We use 18 bytes = 144bits of entropy. Most guides recommend using at least
/// 64 bits. 128 bits is more than enough, but we round up to have a number of
/// bytes that can perfectly be encoded as base64 (a multiple of 6).
pub(crate) struct SessionId(pub(crate) SecretBox<[u8; 18]>);

impl SessionId {
    /// Creates a new, random session ID.
    pub(crate) fn new() -> Self {
        Self(gen_random_bytes_crypto())
    }

    /// Tries to read the session ID from the `Cookie` headers. Returns `None`
    /// if there is no session cookie or if it is malformed.
    pub(crate) fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let value = headers.get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(Cookie::split_parse)
            .filter_map(Result::ok)
            .find(|cookie| cookie.name() == SESSION_COOKIE)?;

        let bytes = base64decode(value.value())
            .map_err(|e| debug!("Session cookie is not valid base64: {e}"))
            .ok()?;
        let bytes: [u8; 18] = bytes.try_into()
            .map_err(|v: Vec<u8>| debug!("Session cookie has wrong length ({} bytes)", v.len()))
            .ok()?;

        Some(Self(SecretBox::new(Box::new(bytes))))
    }

    /// The cookie that stores this session in the browser.
    pub(crate) fn set_cookie(&self, config: &AuthConfig) -> Cookie<'static> {
        Self::cookie(base64encode(self.0.expose_secret()), config.session_duration, config)
    }

    /// A cookie that removes the session cookie from the browser.
    pub(crate) fn unset_cookie(config: &AuthConfig) -> Cookie<'static> {
        Self::cookie(String::new(), Duration::ZERO, config)
    }

    fn cookie(value: String, max_age: Duration, config: &AuthConfig) -> Cookie<'static> {
        let max_age = cookie::time::Duration::seconds(max_age.as_secs() as i64);
        Cookie::build((SESSION_COOKIE, value))
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(config.secure_cookie)
            .path("/")
            .max_age(max_age)
            .build()
    }

    /// Removes this session from the DB. Returns the username of the session
    /// owner or `None` if the session did not exist.
    pub(crate) async fn remove_from_db(
        &self,
        db: &Transaction<'_>,
    ) -> Result<Option<String>, tokio_postgres::Error> {
        let query = "delete from user_sessions \
            using users \
            where user_sessions.id = $1 and users.id = user_sessions.user_id \
            returning users.username";
        db.query_opt(query, &[self])
            .await?
            .map(|row| row.get::<_, String>(0))
            .pipe(Ok)
    }
}

impl ToSql for SessionId {
    fn to_sql(
        &self,
        ty: &postgres_types::Type,
        out: &mut bytes::BytesMut,
    ) -> Result<postgres_types::IsNull, Box<dyn std::error::Error + Sync + Send>> {
        (self.0.expose_secret() as &[u8]).to_sql(ty, out)
    }

    fn accepts(ty: &postgres_types::Type) -> bool {
        <&[u8] as ToSql>::accepts(ty)
    }

    postgres_types::to_sql_checked!();
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("SessionId(REDACTED)")
    }
}


#[cfg(test)]
mod tests {
    use hyper::header::HeaderValue;
    use super::*;

    fn config(secure_cookie: bool) -> AuthConfig {
        AuthConfig {
            session_duration: Duration::from_secs(60 * 60 * 24),
            secure_cookie,
        }
    }

    #[test]
    fn cookie_attributes() {
        let id = SessionId::new();
        let cookie = id.set_cookie(&config(true));
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value().len(), 24);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(cookie::time::Duration::seconds(86400)));

        let insecure = id.set_cookie(&config(false));
        assert_eq!(insecure.secure(), Some(false));
    }

    #[test]
    fn unset_cookie_expires_immediately() {
        let cookie = SessionId::unset_cookie(&config(true));
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(cookie::time::Duration::ZERO));
    }

    #[test]
    fn read_from_headers() {
        let id = SessionId::new();
        let encoded = base64encode(id.0.expose_secret());

        let mut headers = HeaderMap::new();
        let value = format!("theme=dark; {SESSION_COOKIE}={encoded}; lang=de");
        headers.append(header::COOKIE, HeaderValue::from_str(&value).unwrap());

        let parsed = SessionId::from_headers(&headers).unwrap();
        assert_eq!(parsed.0.expose_secret(), id.0.expose_secret());
    }

    #[test]
    fn malformed_cookies_are_ignored() {
        let mut headers = HeaderMap::new();
        assert!(SessionId::from_headers(&headers).is_none());

        headers.append(header::COOKIE, HeaderValue::from_static("todolist-session=a!b"));
        assert!(SessionId::from_headers(&headers).is_none());

        headers.insert(header::COOKIE, HeaderValue::from_static("todolist-session=AAAA"));
        assert!(SessionId::from_headers(&headers).is_none());

        headers.insert(header::COOKIE, HeaderValue::from_static("other=AAAA"));
        assert!(SessionId::from_headers(&headers).is_none());
    }
}
