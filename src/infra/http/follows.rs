use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
};

use crate::application::error::HttpError;
use crate::presentation::views::{
    FollowTemplate, LayoutChrome, LayoutContext, ListingContext, profile_href,
    render_template_response,
};

use super::auth::CurrentUser;
use super::found;
use super::public::{HttpState, PageQuery};

pub(super) async fn follow_index(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<PageQuery>,
) -> Result<Response, HttpError> {
    let request = state.listing.page_request(query.page.as_deref());
    let page = state.listing.follow_feed(&user, request).await?;
    let view = LayoutContext::new(
        LayoutChrome::for_viewer(Some(&user)),
        ListingContext::new("Posts by authors you follow", &page),
    );
    Ok(render_template_response(
        FollowTemplate { view },
        StatusCode::OK,
    ))
}

pub(super) async fn profile_follow(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Result<Response, HttpError> {
    let author = state.follows.follow(&user, &username).await?;
    Ok(found(&profile_href(&author.username)))
}

pub(super) async fn profile_unfollow(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Result<Response, HttpError> {
    let author = state.follows.unfollow(&user, &username).await?;
    Ok(found(&profile_href(&author.username)))
}
