//! Definition of the JSON API: routes and the dispatching of requests to the
//! endpoints.

use bytes::Bytes;
use hyper::Method;
use serde::de::DeserializeOwned;

use crate::{auth, db::types::Key, prelude::*};
use self::{
    err::{ApiResult, api_err, invalid_input},
    util::UpdateMode,
};

pub(crate) mod err;
pub(crate) mod model;
pub(crate) mod util;

mod context;
mod endpoints;
mod list;
mod reply;

pub(crate) use self::{
    context::Context,
    list::ListQuery,
    reply::Reply,
};


/// The kinds of objects that have the usual create/list/detail routes below
/// `/goals/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resource {
    Board,
    Category,
    Goal,
    Comment,
}

impl Resource {
    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "board" => Some(Self::Board),
            "goal_category" => Some(Self::Category),
            "goal" => Some(Self::Goal),
            "goal_comment" => Some(Self::Comment),
            _ => None,
        }
    }
}

/// All routes of the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Route {
    Signup,
    Login,
    Profile,
    UpdatePassword,
    BotVerify,
    Create(Resource),
    List(Resource),
    Detail(Resource, Key),
}

impl Route {
    /// Parses the path of a request. Trailing slashes are ignored. Returns
    /// `None` if there is no such route.
    pub(crate) fn from_path(path: &str) -> Option<Self> {
        let segments = path.trim_end_matches('/')
            .strip_prefix('/')?
            .split('/')
            .collect::<Vec<_>>();

        let route = match segments.as_slice() {
            ["core", "signup"] => Self::Signup,
            ["core", "login"] => Self::Login,
            ["core", "profile"] => Self::Profile,
            ["core", "update_password"] => Self::UpdatePassword,
            ["bot", "verify"] => Self::BotVerify,
            ["goals", resource, action] => {
                let resource = Resource::from_segment(resource)?;
                match *action {
                    "create" => Self::Create(resource),
                    "list" => Self::List(resource),
                    id if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) => {
                        Self::Detail(resource, id.parse().ok()?)
                    }
                    _ => return None,
                }
            }
            _ => return None,
        };

        Some(route)
    }

    /// Whether only logged in users can use this route.
    pub(crate) fn requires_user(&self) -> bool {
        !matches!(self, Self::Signup | Self::Login)
    }
}

/// An API request, with the body already read.
#[derive(Debug)]
pub(crate) struct Request {
    pub(crate) method: Method,
    pub(crate) route: Route,
    pub(crate) path: String,
    pub(crate) query: Option<String>,
    pub(crate) body: Bytes,
}

impl Request {
    /// Deserializes the JSON body. An empty body is treated like `{}`.
    pub(crate) fn json_body<T: DeserializeOwned>(&self) -> ApiResult<T> {
        let body: &[u8] = if self.body.trim_ascii().is_empty() { b"{}" } else { &self.body };
        serde_json::from_slice(body).map_err(|e| invalid_input!("JSON parse error - {}", e))
    }

    pub(crate) fn list_query(&self) -> ListQuery {
        ListQuery::parse(self.query.as_deref())
    }
}


/// Handles one API request. Everything happens inside the transaction of
/// `ctx`, which is committed by the caller only if this returns `Ok`.
pub(crate) async fn handle(req: &Request, ctx: &Context<'_>) -> ApiResult<Reply> {
    // Authentication is checked before the method, like for any other
    // request to the route.
    if req.route.requires_user() {
        ctx.auth.require_user()?;
    }

    match (req.route, &req.method) {
        (Route::Signup, &Method::POST) => auth::signup(req, ctx).await,
        (Route::Login, &Method::POST) => auth::login(req, ctx).await,
        (Route::Profile, &Method::GET) => auth::profile(ctx),
        (Route::Profile, &Method::PUT) => auth::update_profile(req, ctx, UpdateMode::Put).await,
        (Route::Profile, &Method::PATCH) => auth::update_profile(req, ctx, UpdateMode::Patch).await,
        (Route::Profile, &Method::DELETE) => auth::logout(ctx).await,
        (Route::UpdatePassword, &Method::PUT | &Method::PATCH) => {
            auth::update_password(req, ctx).await
        }
        (Route::BotVerify, &Method::PATCH) => endpoints::verify_bot(req, ctx).await,

        (Route::Create(resource), &Method::POST) => endpoints::create(resource, req, ctx).await,
        (Route::List(resource), &Method::GET) => endpoints::list(resource, req, ctx).await,
        (Route::Detail(resource, key), &Method::GET) => endpoints::get(resource, key, ctx).await,
        (Route::Detail(resource, key), &Method::PUT) => {
            endpoints::update(resource, key, req, ctx, UpdateMode::Put).await
        }
        (Route::Detail(resource, key), &Method::PATCH) => {
            endpoints::update(resource, key, req, ctx, UpdateMode::Patch).await
        }
        (Route::Detail(resource, key), &Method::DELETE) => {
            endpoints::delete(resource, key, ctx).await
        }

        (route, method) => {
            debug!("Method {method} not allowed for {route:?}");
            Err(api_err!(MethodNotAllowed, "Method \"{}\" not allowed.", method))
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_routes() {
        assert_eq!(Route::from_path("/core/signup"), Some(Route::Signup));
        assert_eq!(Route::from_path("/core/login/"), Some(Route::Login));
        assert_eq!(Route::from_path("/core/profile"), Some(Route::Profile));
        assert_eq!(Route::from_path("/core/update_password"), Some(Route::UpdatePassword));
        assert_eq!(Route::from_path("/bot/verify/"), Some(Route::BotVerify));
    }

    #[test]
    fn resource_routes() {
        assert_eq!(Route::from_path("/goals/board/create"), Some(Route::Create(Resource::Board)));
        assert_eq!(
            Route::from_path("/goals/goal_category/list/"),
            Some(Route::List(Resource::Category)),
        );
        assert_eq!(
            Route::from_path("/goals/goal/17"),
            Some(Route::Detail(Resource::Goal, Key(17))),
        );
        assert_eq!(
            Route::from_path("/goals/goal_comment/3/"),
            Some(Route::Detail(Resource::Comment, Key(3))),
        );
    }

    #[test]
    fn unknown_routes() {
        assert_eq!(Route::from_path(""), None);
        assert_eq!(Route::from_path("/"), None);
        assert_eq!(Route::from_path("/core"), None);
        assert_eq!(Route::from_path("/core/signup/extra"), None);
        assert_eq!(Route::from_path("/goals/project/list"), None);
        assert_eq!(Route::from_path("/goals/goal/-3"), None);
        assert_eq!(Route::from_path("/goals/goal/+3"), None);
        assert_eq!(Route::from_path("/goals/goal/abc"), None);
        assert_eq!(Route::from_path("/goals/goal/99999999999999999999"), None);
        assert_eq!(Route::from_path("/goals/goal//"), None);
    }

    #[test]
    fn only_signup_and_login_are_public() {
        assert!(!Route::Signup.requires_user());
        assert!(!Route::Login.requires_user());
        assert!(Route::Profile.requires_user());
        assert!(Route::BotVerify.requires_user());
        assert!(Route::List(Resource::Board).requires_user());
    }

    #[test]
    fn json_bodies() {
        #[derive(Debug, serde::Deserialize)]
        struct Body {
            title: Option<String>,
        }

        let request = |body: &'static str| Request {
            method: Method::POST,
            route: Route::Create(Resource::Board),
            path: "/goals/board/create".into(),
            query: None,
            body: Bytes::from_static(body.as_bytes()),
        };

        assert_eq!(request("").json_body::<Body>().unwrap().title, None);
        assert_eq!(
            request(r#"{"title": "Home"}"#).json_body::<Body>().unwrap().title.as_deref(),
            Some("Home"),
        );

        let err = request("{title").json_body::<Body>().unwrap_err();
        assert_eq!(err.status(), hyper::StatusCode::BAD_REQUEST);
        assert!(err.msg.starts_with("JSON parse error"));
    }
}
