//! In-memory repositories and a router harness shared by the integration tests.
#![allow(dead_code)]

use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use tempfile::TempDir;
use time::{Duration, OffsetDateTime, macros::datetime};
use tokio::sync::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

use yatube::application::follows::FollowService;
use yatube::application::listing::ListingService;
use yatube::application::pagination::{Page, PageRequest, paginate};
use yatube::application::posts::PostService;
use yatube::application::repos::{
    CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams, CreateSessionParams,
    CreateUserParams, FollowsRepo, GroupsRepo, HealthRepo, PostScope, PostsRepo, PostsWriteRepo,
    RepoError, SessionsRepo, UpdatePostParams, UsersRepo,
};
use yatube::application::sessions::SessionService;
use yatube::cache::{CacheConfig, IndexCacheState};
use yatube::domain::entities::{
    AuthorRef, CommentRecord, GroupRecord, GroupRef, PostRecord, SessionRecord, UserRecord,
};
use yatube::infra::http::{AdminState, HttpState, SESSION_COOKIE, build_admin_router, build_router};
use yatube::infra::uploads::MediaStorage;

pub const PAGE_SIZE: u32 = 10;

/// A 1x1 transparent GIF.
pub const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
    0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
];

const EPOCH: OffsetDateTime = datetime!(2026-01-01 00:00 UTC);

#[derive(Default)]
struct State {
    next_id: i64,
    users: Vec<UserRecord>,
    groups: Vec<GroupRecord>,
    posts: Vec<PostRecord>,
    comments: Vec<CommentRecord>,
    follows: Vec<(i64, i64)>,
    sessions: Vec<SessionRecord>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Strictly increasing timestamps keep the newest-first ordering deterministic.
    fn next_timestamp(&mut self) -> (i64, OffsetDateTime) {
        let id = self.next_id();
        (id, EPOCH + Duration::seconds(id))
    }

    fn author_ref(&self, user_id: i64) -> Result<AuthorRef, RepoError> {
        self.users
            .iter()
            .find(|user| user.id == user_id)
            .map(|user| AuthorRef {
                id: user.id,
                username: user.username.clone(),
            })
            .ok_or_else(|| RepoError::InvalidInput {
                message: format!("unknown user {user_id}"),
            })
    }

    fn group_ref(&self, group_id: Option<i64>) -> Result<Option<GroupRef>, RepoError> {
        match group_id {
            None => Ok(None),
            Some(id) => self
                .groups
                .iter()
                .find(|group| group.id == id)
                .map(|group| {
                    Some(GroupRef {
                        id: group.id,
                        slug: group.slug.clone(),
                        title: group.title.clone(),
                    })
                })
                .ok_or_else(|| RepoError::InvalidInput {
                    message: format!("unknown group {id}"),
                }),
        }
    }

    fn scoped_posts(&self, scope: PostScope) -> Vec<PostRecord> {
        let mut posts: Vec<PostRecord> = self
            .posts
            .iter()
            .filter(|post| match scope {
                PostScope::All => true,
                PostScope::Group(group_id) => {
                    post.group.as_ref().is_some_and(|group| group.id == group_id)
                }
                PostScope::Author(author_id) => post.author.id == author_id,
                PostScope::FollowedBy(user_id) => self
                    .follows
                    .iter()
                    .any(|(follower, author)| *follower == user_id && *author == post.author.id),
            })
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        posts
    }
}

/// Every repository trait over one in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub async fn add_user(&self, username: &str) -> UserRecord {
        self.create_user(CreateUserParams {
            username: username.to_string(),
            first_name: String::new(),
            last_name: String::new(),
        })
        .await
        .expect("user created")
    }

    pub async fn add_group(&self, title: &str, slug: &str) -> GroupRecord {
        self.create_group(CreateGroupParams {
            title: title.to_string(),
            slug: slug.to_string(),
            description: format!("About {title}"),
        })
        .await
        .expect("group created")
    }

    pub async fn add_post(&self, author: &UserRecord, text: &str, group: Option<&GroupRecord>) -> PostRecord {
        self.create_post(CreatePostParams {
            author_id: author.id,
            text: text.to_string(),
            group_id: group.map(|group| group.id),
            image: None,
        })
        .await
        .expect("post created")
    }

    pub async fn post(&self, id: i64) -> Option<PostRecord> {
        self.state
            .lock()
            .await
            .posts
            .iter()
            .find(|post| post.id == id)
            .cloned()
    }

    pub async fn post_count(&self) -> usize {
        self.state.lock().await.posts.len()
    }

    pub async fn latest_post(&self) -> Option<PostRecord> {
        self.state.lock().await.scoped_posts(PostScope::All).into_iter().next()
    }

    pub async fn comment_count(&self) -> usize {
        self.state.lock().await.comments.len()
    }

    pub async fn follow_count(&self) -> usize {
        self.state.lock().await.follows.len()
    }

    pub async fn delete_all_posts(&self) {
        let mut state = self.state.lock().await;
        state.posts.clear();
        state.comments.clear();
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|user| user.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut state = self.state.lock().await;
        if state.users.iter().any(|user| user.username == params.username) {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }
        let (id, created_at) = state.next_timestamp();
        let user = UserRecord {
            id,
            username: params.username,
            first_name: params.first_name,
            last_name: params.last_name,
            created_at,
        };
        state.users.push(user.clone());
        Ok(user)
    }
}

#[async_trait]
impl GroupsRepo for MemoryStore {
    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let mut groups = self.state.lock().await.groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(groups)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<GroupRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.groups.iter().find(|group| group.id == id).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.groups.iter().find(|group| group.slug == slug).cloned())
    }

    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut state = self.state.lock().await;
        if state.groups.iter().any(|group| group.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "groups_slug_key".to_string(),
            });
        }
        let id = state.next_id();
        let group = GroupRecord {
            id,
            title: params.title,
            slug: params.slug,
            description: params.description,
        };
        state.groups.push(group.clone());
        Ok(group)
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn list_posts(
        &self,
        scope: PostScope,
        page: PageRequest,
    ) -> Result<Page<PostRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(paginate(state.scoped_posts(scope), page))
    }

    async fn count_posts(&self, scope: PostScope) -> Result<u64, RepoError> {
        let state = self.state.lock().await;
        Ok(state.scoped_posts(scope).len() as u64)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        Ok(self.post(id).await)
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.state.lock().await;
        let author = state.author_ref(params.author_id)?;
        let group = state.group_ref(params.group_id)?;
        let (id, created_at) = state.next_timestamp();
        let post = PostRecord {
            id,
            text: params.text,
            created_at,
            author,
            group,
            image: params.image,
        };
        state.posts.push(post.clone());
        Ok(post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.state.lock().await;
        let group = state.group_ref(params.group_id)?;
        let post = state
            .posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.text = params.text;
        post.group = group;
        post.image = params.image;
        Ok(post.clone())
    }
}

#[async_trait]
impl CommentsRepo for MemoryStore {
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut comments: Vec<CommentRecord> = state
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(comments)
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut state = self.state.lock().await;
        let author = state.author_ref(params.author_id)?;
        let (id, created_at) = state.next_timestamp();
        let comment = CommentRecord {
            id,
            post_id: params.post_id,
            author,
            text: params.text,
            created_at,
        };
        state.comments.push(comment.clone());
        Ok(comment)
    }
}

#[async_trait]
impl FollowsRepo for MemoryStore {
    async fn follow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let mut state = self.state.lock().await;
        if user_id == author_id {
            return Err(RepoError::Integrity {
                message: "follows_no_self_follow".to_string(),
            });
        }
        if state.follows.contains(&(user_id, author_id)) {
            return Ok(false);
        }
        state.follows.push((user_id, author_id));
        Ok(true)
    }

    async fn unfollow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let mut state = self.state.lock().await;
        let before = state.follows.len();
        state.follows.retain(|edge| *edge != (user_id, author_id));
        Ok(state.follows.len() < before)
    }

    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        Ok(self.state.lock().await.follows.contains(&(user_id, author_id)))
    }
}

#[async_trait]
impl SessionsRepo for MemoryStore {
    async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<SessionRecord, RepoError> {
        let mut state = self.state.lock().await;
        let record = SessionRecord {
            id: Uuid::new_v4(),
            user_id: params.user_id,
            prefix: params.prefix,
            hashed_secret: params.hashed_secret,
            created_at: OffsetDateTime::now_utc(),
            expires_at: params.expires_at,
            revoked_at: None,
        };
        state.sessions.push(record.clone());
        Ok(record)
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<SessionRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .sessions
            .iter()
            .find(|session| session.prefix == prefix)
            .cloned())
    }

    async fn revoke_session(
        &self,
        prefix: &str,
        revoked_at: OffsetDateTime,
    ) -> Result<bool, RepoError> {
        let mut state = self.state.lock().await;
        match state
            .sessions
            .iter_mut()
            .find(|session| session.prefix == prefix && session.revoked_at.is_none())
        {
            Some(session) => {
                session.revoked_at = Some(revoked_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl HealthRepo for MemoryStore {
    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

/// A response with its body collected.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub set_cookie: Option<String>,
    pub body: String,
}

impl TestResponse {
    /// Value of the `data-template` marker on the page.
    pub fn template(&self) -> Option<&str> {
        let marker = "data-template=\"";
        let start = self.body.find(marker)? + marker.len();
        let end = self.body[start..].find('"')?;
        Some(&self.body[start..start + end])
    }

    /// Number of posts listed on the page.
    pub fn post_cards(&self) -> usize {
        self.body.matches("class=\"post-card\"").count()
    }
}

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub router: Router,
    pub admin: Router,
    pub index_cache: IndexCacheState,
    sessions: Arc<SessionService>,
    media: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_cache(CacheConfig::default())
    }

    pub fn with_cache(cache: CacheConfig) -> Self {
        let store = Arc::new(MemoryStore::default());
        let media = tempfile::tempdir().expect("media dir");
        let storage =
            Arc::new(MediaStorage::new(media.path().to_path_buf()).expect("media storage"));

        let users: Arc<dyn UsersRepo> = store.clone();
        let groups: Arc<dyn GroupsRepo> = store.clone();
        let posts: Arc<dyn PostsRepo> = store.clone();
        let writer: Arc<dyn PostsWriteRepo> = store.clone();
        let comments: Arc<dyn CommentsRepo> = store.clone();
        let follows: Arc<dyn FollowsRepo> = store.clone();
        let sessions_repo: Arc<dyn SessionsRepo> = store.clone();
        let health: Arc<dyn HealthRepo> = store.clone();

        let page_size = NonZeroU32::new(PAGE_SIZE).expect("page size");
        let sessions = Arc::new(SessionService::new(sessions_repo, users.clone()));
        let index_cache = IndexCacheState::new(cache);

        let state = HttpState {
            listing: Arc::new(ListingService::new(
                posts.clone(),
                groups.clone(),
                users.clone(),
                follows.clone(),
                page_size,
            )),
            posts: Arc::new(PostService::new(
                posts,
                writer,
                comments,
                groups,
                storage.clone(),
            )),
            follows: Arc::new(FollowService::new(follows, users)),
            sessions: sessions.clone(),
            media: storage,
            index_cache: index_cache.clone(),
            cookie_secure: false,
            upload_limit_bytes: 1024 * 1024,
        };
        let admin = build_admin_router(AdminState {
            index_cache: index_cache.clone(),
            health,
        });

        Self {
            store,
            router: build_router(state),
            admin,
            index_cache,
            sessions,
            media,
        }
    }

    pub fn media_root(&self) -> &std::path::Path {
        self.media.path()
    }

    /// Issue a session for `username` and return the matching `Cookie` header value.
    pub async fn login(&self, username: &str) -> String {
        let issued = self
            .sessions
            .issue(username, None)
            .await
            .expect("session issued");
        format!("{SESSION_COOKIE}={}", issued.token)
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        send(&self.router, builder.body(Body::empty()).expect("request")).await
    }

    pub async fn post_form(&self, uri: &str, cookie: Option<&str>, body: &str) -> TestResponse {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        send(
            &self.router,
            builder.body(Body::from(body.to_string())).expect("request"),
        )
        .await
    }

    /// Submit a multipart form with text fields and an optional `image` file.
    pub async fn post_multipart(
        &self,
        uri: &str,
        cookie: Option<&str>,
        fields: &[(&str, &str)],
        image: Option<(&str, &[u8])>,
    ) -> TestResponse {
        const BOUNDARY: &str = "yatube-test-boundary";
        let mut body: Vec<u8> = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((filename, data)) = image {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\nContent-Type: image/gif\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            );
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        send(&self.router, builder.body(Body::from(body)).expect("request")).await
    }

    pub async fn admin_request(&self, method: Method, uri: &str) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request");
        send(&self.admin, request).await
    }
}

async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let header_value = |name: header::HeaderName| {
        response
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    let location = header_value(header::LOCATION);
    let set_cookie = header_value(header::SET_COOKIE);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    TestResponse {
        status,
        location,
        set_cookie,
        body: String::from_utf8_lossy(&bytes).into_owned(),
    }
}
