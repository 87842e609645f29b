mod support;

use std::time::Duration;

use axum::http::{Method, StatusCode};
use support::TestApp;
use yatube::cache::CacheConfig;

const TOTAL_POSTS: usize = 11;

async fn seeded() -> TestApp {
    let app = TestApp::new();
    let author = app.store.add_user("leo").await;
    let group = app.store.add_group("Test group", "test-slug").await;
    for n in 0..TOTAL_POSTS {
        app.store
            .add_post(&author, &format!("Post number {n}"), Some(&group))
            .await;
    }
    app
}

#[tokio::test]
async fn listings_split_into_pages_of_ten() {
    let app = seeded().await;
    for base in ["/", "/group/test-slug/", "/profile/leo/"] {
        let first = app.get(base, None).await;
        assert_eq!(first.status, StatusCode::OK, "GET {base}");
        assert_eq!(first.post_cards(), 10, "GET {base}");

        let second = app.get(&format!("{base}?page=2"), None).await;
        assert_eq!(second.status, StatusCode::OK, "GET {base}?page=2");
        assert_eq!(second.post_cards(), TOTAL_POSTS - 10, "GET {base}?page=2");
    }
}

#[tokio::test]
async fn out_of_range_and_garbage_page_numbers() {
    let app = seeded().await;

    let beyond = app.get("/profile/leo/?page=9", None).await;
    assert_eq!(beyond.status, StatusCode::OK);
    assert_eq!(beyond.post_cards(), 0);

    let garbage = app.get("/group/test-slug/?page=abc", None).await;
    assert_eq!(garbage.status, StatusCode::OK);
    assert_eq!(garbage.post_cards(), 10);
}

#[tokio::test]
async fn listings_are_newest_first() {
    let app = seeded().await;
    let page = app.get("/group/test-slug/", None).await;

    let newest = page.body.find("Post number 10").expect("newest post listed");
    let older = page.body.find("Post number 9").expect("older post listed");
    assert!(newest < older);
    assert!(!page.body.contains("Post number 0<"));
}

#[tokio::test]
async fn post_cards_carry_author_group_and_text() {
    let app = TestApp::new();
    let author = app.store.add_user("leo").await;
    let group = app.store.add_group("Test group", "test-slug").await;
    let post = app.store.add_post(&author, "Test post text", Some(&group)).await;

    for uri in ["/", "/group/test-slug/", "/profile/leo/"] {
        let page = app.get(uri, None).await;
        assert!(page.body.contains("Test post text"), "GET {uri}");
        assert!(page.body.contains("href=\"/profile/leo/\""), "GET {uri}");
        assert!(page.body.contains("href=\"/group/test-slug/\""), "GET {uri}");
        assert!(
            page.body.contains(&format!("href=\"/posts/{}/\"", post.id)),
            "GET {uri}"
        );
    }

    let group_page = app.get("/group/test-slug/", None).await;
    assert!(group_page.body.contains("About Test group"));

    let profile = app.get("/profile/leo/", None).await;
    assert!(profile.body.contains("Posts: 1"));
}

#[tokio::test]
async fn post_in_another_group_stays_out_of_this_group() {
    let app = TestApp::new();
    let author = app.store.add_user("leo").await;
    let first = app.store.add_group("First", "first").await;
    app.store.add_group("Second", "second").await;
    app.store.add_post(&author, "Only in first", Some(&first)).await;

    let second = app.get("/group/second/", None).await;
    assert_eq!(second.post_cards(), 0);
    let first_page = app.get("/group/first/", None).await;
    assert_eq!(first_page.post_cards(), 1);
}

#[tokio::test]
async fn detail_shows_post_and_author_count() {
    let app = seeded().await;
    let post = app.store.latest_post().await.expect("post");

    let page = app.get(&format!("/posts/{}/", post.id), None).await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains(&post.text));
    assert!(page.body.contains(&format!(
        "<span class=\"author-post-count\">{TOTAL_POSTS}</span>"
    )));
    // Guests see neither the edit link nor the comment form.
    assert!(!page.body.contains("class=\"edit-link\""));
    assert!(!page.body.contains("/comment/\""));
}

#[tokio::test]
async fn follow_feed_lists_only_followed_authors() {
    let app = TestApp::new();
    let author = app.store.add_user("leo").await;
    app.store.add_user("reader").await;
    app.store.add_user("stranger").await;
    app.store.add_post(&author, "Worth following", None).await;

    let reader = app.login("reader").await;
    let stranger = app.login("stranger").await;

    let follow = app.get("/profile/leo/follow/", Some(reader.as_str())).await;
    assert_eq!(follow.status, StatusCode::FOUND);
    assert_eq!(follow.location.as_deref(), Some("/profile/leo/"));

    let feed = app.get("/follow/", Some(reader.as_str())).await;
    assert_eq!(feed.template(), Some("posts/follow.html"));
    assert_eq!(feed.post_cards(), 1);
    assert!(feed.body.contains("Worth following"));

    let empty = app.get("/follow/", Some(stranger.as_str())).await;
    assert_eq!(empty.post_cards(), 0);
}

#[tokio::test]
async fn follow_and_unfollow_toggle_one_edge() {
    let app = TestApp::new();
    app.store.add_user("leo").await;
    app.store.add_user("reader").await;
    let reader = app.login("reader").await;

    app.get("/profile/leo/follow/", Some(reader.as_str())).await;
    app.get("/profile/leo/follow/", Some(reader.as_str())).await;
    assert_eq!(app.store.follow_count().await, 1);

    let profile = app.get("/profile/leo/", Some(reader.as_str())).await;
    assert!(profile.body.contains("class=\"unfollow\""));

    let unfollow = app.get("/profile/leo/unfollow", Some(reader.as_str())).await;
    assert_eq!(unfollow.status, StatusCode::FOUND);
    assert_eq!(app.store.follow_count().await, 0);
}

#[tokio::test]
async fn following_yourself_creates_nothing() {
    let app = TestApp::new();
    app.store.add_user("leo").await;
    let cookie = app.login("leo").await;

    let response = app.get("/profile/leo/follow/", Some(cookie.as_str())).await;
    assert_eq!(response.status, StatusCode::FOUND);
    assert_eq!(app.store.follow_count().await, 0);

    let profile = app.get("/profile/leo/", Some(cookie.as_str())).await;
    assert!(!profile.body.contains("class=\"follow\""));
}

#[tokio::test]
async fn index_is_cached_until_cleared() {
    let app = seeded().await;

    let before = app.get("/", None).await;
    assert_eq!(before.post_cards(), 10);

    app.store.delete_all_posts().await;
    let cached = app.get("/", None).await;
    assert_eq!(cached.body, before.body);

    let cleared = app.admin_request(Method::POST, "/cache/clear").await;
    assert_eq!(cleared.status, StatusCode::NO_CONTENT);

    let fresh = app.get("/", None).await;
    assert_ne!(fresh.body, before.body);
    assert_eq!(fresh.post_cards(), 0);
}

#[tokio::test]
async fn signed_in_index_is_cached_until_cleared() {
    let app = seeded().await;
    let cookie = app.login("leo").await;

    let before = app.get("/", Some(cookie.as_str())).await;
    assert_eq!(before.post_cards(), 10);
    assert!(before.body.contains("Signed in as leo"));

    app.store.delete_all_posts().await;
    let cached = app.get("/", Some(cookie.as_str())).await;
    assert_eq!(cached.body, before.body);

    let cleared = app.admin_request(Method::POST, "/cache/clear").await;
    assert_eq!(cleared.status, StatusCode::NO_CONTENT);

    let fresh = app.get("/", Some(cookie.as_str())).await;
    assert_ne!(fresh.body, before.body);
    assert_eq!(fresh.post_cards(), 0);
    assert!(fresh.body.contains("Signed in as leo"));
}

#[tokio::test]
async fn expired_index_is_rendered_again() {
    let app = TestApp::with_cache(CacheConfig {
        enabled: true,
        index_ttl: Duration::from_millis(50),
    });
    let author = app.store.add_user("leo").await;
    app.store.add_post(&author, "Short lived", None).await;

    let before = app.get("/", None).await;
    assert_eq!(before.post_cards(), 1);

    app.store.delete_all_posts().await;
    tokio::time::sleep(Duration::from_millis(120)).await;

    let after = app.get("/", None).await;
    assert_eq!(after.post_cards(), 0);
}

#[tokio::test]
async fn other_listings_are_never_cached() {
    let app = seeded().await;

    let before = app.get("/group/test-slug/", None).await;
    assert_eq!(before.post_cards(), 10);

    app.store.delete_all_posts().await;
    let after = app.get("/group/test-slug/", None).await;
    assert_eq!(after.post_cards(), 0);
}

#[tokio::test]
async fn admin_health_reports_ok() {
    let app = TestApp::new();
    let response = app.admin_request(Method::GET, "/_health/db").await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
}
