use crate::application::{
    error::{ErrorReport, HttpError},
    pagination::Page,
    posts::{FieldErrors, PostDetail},
    sessions::Identity,
};
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339, macros::format_description};

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

/// The 404 page, rendered with anonymous chrome.
pub fn render_not_found_response() -> Response {
    let view = LayoutContext::new(LayoutChrome::for_viewer(None), ErrorPageView::not_found());
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

#[derive(Clone)]
pub struct BrandView {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct NavigationLinkView {
    pub label: String,
    pub href: String,
}

#[derive(Clone)]
pub struct NavigationView {
    pub entries: Vec<NavigationLinkView>,
}

#[derive(Clone)]
pub struct LayoutChrome {
    pub brand: BrandView,
    pub navigation: NavigationView,
    pub viewer: Option<String>,
}

impl LayoutChrome {
    /// Header links differ for signed-in and anonymous visitors.
    pub fn for_viewer(viewer: Option<&Identity>) -> Self {
        let link = |label: &str, href: &str| NavigationLinkView {
            label: label.to_string(),
            href: href.to_string(),
        };

        let entries = match viewer {
            Some(_) => vec![
                link("Home", "/"),
                link("Following", "/follow/"),
                link("New post", "/create/"),
                link("Log out", "/auth/logout/"),
            ],
            None => vec![link("Home", "/"), link("Log in", "/auth/login/")],
        };

        Self {
            brand: BrandView {
                title: "Yatube".to_string(),
                href: "/".to_string(),
            },
            navigation: NavigationView { entries },
            viewer: viewer.map(|identity| identity.username.clone()),
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub brand: BrandView,
    pub navigation: NavigationView,
    pub viewer: Option<String>,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            brand: chrome.brand,
            navigation: chrome.navigation,
            viewer: chrome.viewer,
            content,
        }
    }
}

#[derive(Clone)]
pub struct GroupBadge {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct PostCard {
    pub id: i64,
    pub text: String,
    pub author: String,
    pub author_href: String,
    pub published: String,
    pub iso_date: String,
    pub group: Option<GroupBadge>,
    pub image_url: Option<String>,
    pub detail_href: String,
}

impl PostCard {
    pub fn from_record(post: &PostRecord) -> Self {
        Self {
            id: post.id,
            text: post.text.clone(),
            author: post.author.username.clone(),
            author_href: profile_href(&post.author.username),
            published: format_date(post.created_at),
            iso_date: post.created_at.format(&Rfc3339).unwrap_or_default(),
            group: post.group.as_ref().map(|group| GroupBadge {
                title: group.title.clone(),
                href: format!("/group/{}/", group.slug),
            }),
            image_url: post.image.as_deref().map(media_url),
            detail_href: format!("/posts/{}/", post.id),
        }
    }
}

#[derive(Clone)]
pub struct PageLinkView {
    pub number: u32,
    pub href: String,
    pub is_current: bool,
}

#[derive(Clone)]
pub struct PaginatorView {
    pub number: u32,
    pub total_pages: u32,
    pub previous_href: Option<String>,
    pub next_href: Option<String>,
    pub pages: Vec<PageLinkView>,
}

impl PaginatorView {
    pub fn from_page<T>(page: &Page<T>) -> Self {
        Self {
            number: page.number,
            total_pages: page.total_pages,
            previous_href: page.previous_number().map(page_href),
            next_href: page.next_number().map(page_href),
            pages: page
                .page_numbers()
                .into_iter()
                .map(|number| PageLinkView {
                    number,
                    href: page_href(number),
                    is_current: number == page.number,
                })
                .collect(),
        }
    }

    pub fn is_paginated(&self) -> bool {
        self.total_pages > 1
    }
}

pub struct ListingContext {
    pub heading: String,
    pub posts: Vec<PostCard>,
    pub paginator: PaginatorView,
}

impl ListingContext {
    pub fn new(heading: impl Into<String>, page: &Page<PostRecord>) -> Self {
        Self {
            heading: heading.into(),
            posts: page.items.iter().map(PostCard::from_record).collect(),
            paginator: PaginatorView::from_page(page),
        }
    }
}

#[derive(Template)]
#[template(path = "posts/index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<ListingContext>,
}

#[derive(Template)]
#[template(path = "posts/follow.html")]
pub struct FollowTemplate {
    pub view: LayoutContext<ListingContext>,
}

pub struct GroupContext {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub posts: Vec<PostCard>,
    pub paginator: PaginatorView,
}

impl GroupContext {
    pub fn new(group: &GroupRecord, page: &Page<PostRecord>) -> Self {
        Self {
            title: group.title.clone(),
            slug: group.slug.clone(),
            description: group.description.clone(),
            posts: page.items.iter().map(PostCard::from_record).collect(),
            paginator: PaginatorView::from_page(page),
        }
    }
}

#[derive(Template)]
#[template(path = "posts/group_list.html")]
pub struct GroupTemplate {
    pub view: LayoutContext<GroupContext>,
}

pub struct ProfileContext {
    pub username: String,
    pub display_name: String,
    pub post_count: u64,
    pub following: bool,
    pub can_follow: bool,
    pub follow_href: String,
    pub unfollow_href: String,
    pub posts: Vec<PostCard>,
    pub paginator: PaginatorView,
}

impl ProfileContext {
    pub fn new(
        author: &UserRecord,
        post_count: u64,
        following: bool,
        can_follow: bool,
        page: &Page<PostRecord>,
    ) -> Self {
        let base = profile_href(&author.username);
        Self {
            username: author.username.clone(),
            display_name: author.display_name(),
            post_count,
            following,
            can_follow,
            follow_href: format!("{base}follow/"),
            unfollow_href: format!("{base}unfollow/"),
            posts: page.items.iter().map(PostCard::from_record).collect(),
            paginator: PaginatorView::from_page(page),
        }
    }
}

#[derive(Template)]
#[template(path = "posts/profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileContext>,
}

pub struct CommentView {
    pub author: String,
    pub author_href: String,
    pub text: String,
    pub published: String,
}

impl CommentView {
    fn from_record(comment: &CommentRecord) -> Self {
        Self {
            author: comment.author.username.clone(),
            author_href: profile_href(&comment.author.username),
            text: comment.text.clone(),
            published: format_date(comment.created_at),
        }
    }
}

pub struct PostDetailContext {
    pub post: PostCard,
    pub author_post_count: u64,
    pub comments: Vec<CommentView>,
    pub can_edit: bool,
    pub can_comment: bool,
    pub edit_href: String,
    pub comment_action: String,
}

impl PostDetailContext {
    pub fn new(detail: &PostDetail, viewer: Option<&Identity>) -> Self {
        let post = PostCard::from_record(&detail.post);
        let can_edit = viewer.is_some_and(|identity| identity.user_id == detail.post.author.id);
        Self {
            edit_href: format!("/posts/{}/edit/", post.id),
            comment_action: format!("/posts/{}/comment/", post.id),
            post,
            author_post_count: detail.author_post_count,
            comments: detail.comments.iter().map(CommentView::from_record).collect(),
            can_edit,
            can_comment: viewer.is_some(),
        }
    }
}

#[derive(Template)]
#[template(path = "posts/post_detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailContext>,
}

pub struct GroupOptionView {
    pub value: String,
    pub title: String,
    pub selected: bool,
}

/// Create and edit share one form template.
pub struct PostFormContext {
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOptionView>,
    pub current_image: Option<String>,
    pub text_errors: Vec<String>,
    pub group_errors: Vec<String>,
    pub image_errors: Vec<String>,
}

impl PostFormContext {
    pub fn create(groups: &[GroupRecord]) -> Self {
        Self::build(false, "/create/".to_string(), String::new(), None, groups, None)
    }

    pub fn edit(post: &PostRecord, groups: &[GroupRecord]) -> Self {
        let selected = post.group.as_ref().map(|group| group.id.to_string());
        Self::build(
            true,
            format!("/posts/{}/edit/", post.id),
            post.text.clone(),
            selected.as_deref(),
            groups,
            post.image.as_deref(),
        )
    }

    /// Re-render submitted values with their validation messages.
    pub fn with_errors(
        mut self,
        text: &str,
        group: Option<&str>,
        errors: FieldErrors,
        groups: &[GroupRecord],
    ) -> Self {
        self.text = text.to_string();
        self.groups = group_options(groups, group);
        self.text_errors = errors.text;
        self.group_errors = errors.group;
        self.image_errors = errors.image;
        self
    }

    fn build(
        is_edit: bool,
        action: String,
        text: String,
        selected: Option<&str>,
        groups: &[GroupRecord],
        current_image: Option<&str>,
    ) -> Self {
        Self {
            is_edit,
            action,
            text,
            groups: group_options(groups, selected),
            current_image: current_image.map(media_url),
            text_errors: Vec::new(),
            group_errors: Vec::new(),
            image_errors: Vec::new(),
        }
    }
}

fn group_options(groups: &[GroupRecord], selected: Option<&str>) -> Vec<GroupOptionView> {
    groups
        .iter()
        .map(|group| {
            let value = group.id.to_string();
            GroupOptionView {
                selected: selected.is_some_and(|current| current.trim() == value),
                value,
                title: group.title.clone(),
            }
        })
        .collect()
}

#[derive(Template)]
#[template(path = "posts/create_post.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormContext>,
}

pub struct LoginContext {
    pub next: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub view: LayoutContext<LoginContext>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
    pub path: String,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page not found".to_string(),
            message: "The page you requested does not exist.".to_string(),
            path: "/".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "core/404.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

pub fn profile_href(username: &str) -> String {
    format!("/profile/{username}/")
}

pub fn media_url(path: &str) -> String {
    format!("/media/{}", path.trim_start_matches('/'))
}

fn page_href(number: u32) -> String {
    format!("?page={number}")
}

fn format_date(value: OffsetDateTime) -> String {
    value
        .format(format_description!("[day] [month repr:short] [year]"))
        .unwrap_or_default()
}
