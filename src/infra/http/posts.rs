use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::application::error::HttpError;
use crate::application::posts::{EditAccess, EditOutcome, PostError};
use crate::presentation::views::{
    LayoutChrome, LayoutContext, PostDetailContext, PostDetailTemplate, PostFormContext,
    PostFormTemplate, profile_href, render_template_response,
};

use super::auth::{CurrentUser, Viewer};
use super::forms::{CommentForm, PostForm};
use super::found;
use super::public::HttpState;

const SOURCE: &str = "infra::http::posts";

/// Post ids that do not parse are unknown posts.
fn parse_post_id(raw: &str) -> Result<i64, HttpError> {
    raw.parse::<i64>()
        .map_err(|_| HttpError::not_found(SOURCE, format!("post `{raw}` not found")))
}

fn detail_href(id: i64) -> String {
    format!("/posts/{id}/")
}

pub(super) async fn post_detail(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    Path(raw_id): Path<String>,
) -> Result<Response, HttpError> {
    let id = parse_post_id(&raw_id)?;
    let detail = state.posts.detail(id).await?;
    let content = PostDetailContext::new(&detail, viewer.as_ref());
    let view = LayoutContext::new(LayoutChrome::for_viewer(viewer.as_ref()), content);
    Ok(render_template_response(
        PostDetailTemplate { view },
        StatusCode::OK,
    ))
}

pub(super) async fn create_form(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
) -> Result<Response, HttpError> {
    let groups = state.posts.groups().await?;
    let view = LayoutContext::new(
        LayoutChrome::for_viewer(Some(&user)),
        PostFormContext::create(&groups),
    );
    Ok(render_template_response(
        PostFormTemplate { view },
        StatusCode::OK,
    ))
}

pub(super) async fn create(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    form: PostForm,
) -> Result<Response, HttpError> {
    let text = form.text.clone();
    let group = form.group.clone();

    match state.posts.create(&user, form.into_draft()).await {
        Ok(_) => Ok(found(&profile_href(&user.username))),
        Err(PostError::Invalid(errors)) => {
            let groups = state.posts.groups().await?;
            let content = PostFormContext::create(&groups).with_errors(
                &text,
                group.as_deref(),
                errors,
                &groups,
            );
            let view = LayoutContext::new(LayoutChrome::for_viewer(Some(&user)), content);
            Ok(render_template_response(
                PostFormTemplate { view },
                StatusCode::OK,
            ))
        }
        Err(err) => Err(err.into()),
    }
}

pub(super) async fn edit_form(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    Path(raw_id): Path<String>,
) -> Result<Response, HttpError> {
    let id = parse_post_id(&raw_id)?;
    match state.posts.edit_form(&user, id).await? {
        EditAccess::Author(post) => {
            let groups = state.posts.groups().await?;
            let view = LayoutContext::new(
                LayoutChrome::for_viewer(Some(&user)),
                PostFormContext::edit(&post, &groups),
            );
            Ok(render_template_response(
                PostFormTemplate { view },
                StatusCode::OK,
            ))
        }
        EditAccess::NotAuthor(id) => Ok(found(&detail_href(id))),
    }
}

pub(super) async fn edit(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    Path(raw_id): Path<String>,
    form: PostForm,
) -> Result<Response, HttpError> {
    let id = parse_post_id(&raw_id)?;
    let text = form.text.clone();
    let group = form.group.clone();

    match state.posts.edit(&user, id, form.into_draft()).await {
        Ok(EditOutcome::Updated(post)) => Ok(found(&detail_href(post.id))),
        Ok(EditOutcome::NotAuthor(id)) => Ok(found(&detail_href(id))),
        Err(PostError::Invalid(errors)) => {
            let post = match state.posts.edit_form(&user, id).await? {
                EditAccess::Author(post) => post,
                EditAccess::NotAuthor(id) => return Ok(found(&detail_href(id))),
            };
            let groups = state.posts.groups().await?;
            let content = PostFormContext::edit(&post, &groups).with_errors(
                &text,
                group.as_deref(),
                errors,
                &groups,
            );
            let view = LayoutContext::new(LayoutChrome::for_viewer(Some(&user)), content);
            Ok(render_template_response(
                PostFormTemplate { view },
                StatusCode::OK,
            ))
        }
        Err(err) => Err(err.into()),
    }
}

pub(super) async fn add_comment(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    Path(raw_id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Response {
    let id = match parse_post_id(&raw_id) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };
    match state.posts.add_comment(&user, id, &form.text).await {
        Ok(_) => found(&detail_href(id)),
        Err(err) => HttpError::from(err).into_response(),
    }
}
