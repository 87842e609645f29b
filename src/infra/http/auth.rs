//! Identity gate: session cookie, login and logout, and the login redirect.

use std::convert::Infallible;

use axum::{
    Form,
    extract::{FromRequestParts, Query, State},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use tracing::info;
use url::form_urlencoded;

use crate::application::sessions::Identity;
use crate::presentation::views::{
    LayoutChrome, LayoutContext, LoginContext, LoginTemplate, render_template_response,
};

use super::found;
use super::public::HttpState;

pub const SESSION_COOKIE: &str = "yatube_session";
pub const LOGIN_PATH: &str = "/auth/login/";

const INVALID_TOKEN: &str = "Please enter a correct session token.";

/// The possibly anonymous viewer of the current request.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<Identity>);

impl Viewer {
    pub fn username(&self) -> Option<&str> {
        self.0.as_ref().map(|identity| identity.username.as_str())
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Viewer>().cloned().unwrap_or_default())
    }
}

/// An authenticated viewer; anonymous requests are redirected to the login page.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Viewer>() {
            Some(Viewer(Some(identity))) => Ok(CurrentUser(identity.clone())),
            _ => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|value| value.as_str())
                    .unwrap_or("/");
                Err(found(&login_redirect_location(next)))
            }
        }
    }
}

/// `/auth/login/?next=<path>`, keeping `/` readable in the target path.
pub fn login_redirect_location(next: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("{LOGIN_PATH}?next={}", encoded.replace("%2F", "/"))
}

/// Only same-site absolute paths are followed after login.
fn is_local_path(candidate: &str) -> bool {
    candidate.starts_with('/') && !candidate.starts_with("//") && !candidate.contains('\\')
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct NextQuery {
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct LoginForm {
    token: String,
    next: String,
}

pub(super) async fn login_form(Viewer(viewer): Viewer, Query(query): Query<NextQuery>) -> Response {
    let next = query.next.unwrap_or_default();
    render_login(viewer.as_ref(), next, None, StatusCode::OK)
}

pub(super) async fn login(
    State(state): State<HttpState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let identity = match state.sessions.authenticate(&form.token).await {
        Ok(identity) => identity,
        Err(_) => {
            return render_login(None, form.next, Some(INVALID_TOKEN), StatusCode::OK);
        }
    };

    info!(
        target = "yatube::http::auth",
        username = %identity.username,
        "viewer signed in"
    );

    let cookie = Cookie::build((SESSION_COOKIE, form.token.trim().to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.cookie_secure);
    let target = if is_local_path(&form.next) {
        form.next.as_str()
    } else {
        "/"
    };
    (jar.add(cookie), found(target)).into_response()
}

pub(super) async fn logout(jar: CookieJar) -> Response {
    let removal = Cookie::build(SESSION_COOKIE).path("/");
    (jar.remove(removal), found("/")).into_response()
}

fn render_login(
    viewer: Option<&Identity>,
    next: String,
    error: Option<&str>,
    status: StatusCode,
) -> Response {
    let next = if is_local_path(&next) { next } else { String::new() };
    let content = LoginContext {
        next,
        error: error.map(str::to_string),
    };
    let view = LayoutContext::new(LayoutChrome::for_viewer(viewer), content);
    render_template_response(LoginTemplate { view }, status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_redirect_keeps_path_separators() {
        assert_eq!(login_redirect_location("/create/"), "/auth/login/?next=/create/");
        assert_eq!(
            login_redirect_location("/posts/1/comment/"),
            "/auth/login/?next=/posts/1/comment/"
        );
        assert_eq!(
            login_redirect_location("/follow/?page=2"),
            "/auth/login/?next=/follow/%3Fpage%3D2"
        );
    }

    #[test]
    fn only_local_paths_are_followed() {
        assert!(is_local_path("/posts/1/"));
        assert!(!is_local_path("//evil.example"));
        assert!(!is_local_path("https://evil.example/"));
        assert!(!is_local_path("/\\evil"));
        assert!(!is_local_path(""));
    }
}
