use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::error;

use crate::{
    application::{
        error::HttpError, follows::FollowService, listing::ListingService, posts::PostService,
        sessions::SessionService,
    },
    cache::{IndexCacheState, index_cache_layer},
    infra::uploads::{MediaStorage, UploadStorageError},
    presentation::views::{
        GroupContext, GroupTemplate, IndexTemplate, LayoutChrome, LayoutContext, ListingContext,
        ProfileContext, ProfileTemplate, render_not_found_response, render_template_response,
    },
};

use super::{
    auth::{self, Viewer},
    follows,
    middleware::{log_responses, resolve_identity, set_request_context},
    posts,
};

#[derive(Clone)]
pub struct HttpState {
    pub listing: Arc<ListingService>,
    pub posts: Arc<PostService>,
    pub follows: Arc<FollowService>,
    pub sessions: Arc<SessionService>,
    pub media: Arc<MediaStorage>,
    pub index_cache: IndexCacheState,
    pub cookie_secure: bool,
    pub upload_limit_bytes: usize,
}

pub fn build_router(state: HttpState) -> Router {
    // Only the index goes through the page cache.
    let cached_routes = Router::new().route("/", get(index)).route_layer(
        middleware::from_fn_with_state(state.index_cache.clone(), index_cache_layer),
    );

    let routes = Router::new()
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route(
            "/profile/{username}/follow/",
            get(follows::profile_follow),
        )
        .route("/profile/{username}/follow", get(follows::profile_follow))
        .route(
            "/profile/{username}/unfollow/",
            get(follows::profile_unfollow),
        )
        .route(
            "/profile/{username}/unfollow",
            get(follows::profile_unfollow),
        )
        .route("/posts/{id}/", get(posts::post_detail))
        .route(
            "/posts/{id}/edit/",
            get(posts::edit_form).post(posts::edit),
        )
        .route("/posts/{id}/comment/", post(posts::add_comment))
        .route("/create/", get(posts::create_form).post(posts::create))
        .route("/follow/", get(follows::follow_index))
        .route("/auth/login/", get(auth::login_form).post(auth::login))
        .route("/auth/logout/", get(auth::logout))
        .route("/media/{*path}", get(serve_media))
        .fallback(not_found);

    let upload_limit = state.upload_limit_bytes;
    cached_routes
        .merge(routes)
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            resolve_identity,
        ))
        .layer(middleware::from_fn(set_request_context))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct PageQuery {
    pub page: Option<String>,
}

async fn index(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    Query(query): Query<PageQuery>,
) -> Result<Response, HttpError> {
    let request = state.listing.page_request(query.page.as_deref());
    let page = state.listing.index(request).await?;
    let view = LayoutContext::new(
        LayoutChrome::for_viewer(viewer.as_ref()),
        ListingContext::new("Latest posts", &page),
    );
    Ok(render_template_response(IndexTemplate { view }, StatusCode::OK))
}

async fn group_posts(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Response, HttpError> {
    let request = state.listing.page_request(query.page.as_deref());
    let listing = state.listing.group(&slug, request).await?;
    let view = LayoutContext::new(
        LayoutChrome::for_viewer(viewer.as_ref()),
        GroupContext::new(&listing.group, &listing.page),
    );
    Ok(render_template_response(GroupTemplate { view }, StatusCode::OK))
}

async fn profile(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Response, HttpError> {
    let request = state.listing.page_request(query.page.as_deref());
    let listing = state
        .listing
        .profile(&username, request, viewer.as_ref())
        .await?;
    let content = ProfileContext::new(
        &listing.author,
        listing.post_count,
        listing.following,
        listing.can_follow,
        &listing.page,
    );
    let view = LayoutContext::new(LayoutChrome::for_viewer(viewer.as_ref()), content);
    Ok(render_template_response(
        ProfileTemplate { view },
        StatusCode::OK,
    ))
}

async fn not_found() -> Response {
    render_not_found_response()
}

async fn serve_media(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::serve_media";

    match state.media.read(&path).await {
        Ok(bytes) => build_media_response(&path, bytes),
        Err(UploadStorageError::InvalidPath | UploadStorageError::NotFound) => {
            HttpError::not_found(SOURCE, "The requested media is not available").into_response()
        }
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored media"
            );
            HttpError::internal(SOURCE, &err).into_response()
        }
    }
}

fn build_media_response(path: &str, bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}
