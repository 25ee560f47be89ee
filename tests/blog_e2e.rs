//! End-to-end tests that drive the full router over real HTTP.

use std::net::SocketAddr;

use reqwest::multipart;
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode};
use tempfile::TempDir;

use yatube::auth::password::{self, MIN_BCRYPT_COST};
use yatube::config::Config;
use yatube::db::posts::{self, PostChanges};
use yatube::db::{self, comments, follows, groups, users};
use yatube::state::{AppState, DbPool};

const PASSWORD: &str = "correct-horse-42";

struct TestServer {
    addr: SocketAddr,
    pool: DbPool,
    state: AppState,
    _data_dir: TempDir,
}

impl TestServer {
    async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    async fn start_with(tweak: impl FnOnce(&mut Config)) -> Self {
        let data_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.auth.bcrypt_cost = MIN_BCRYPT_COST;
        config.resolve_paths(data_dir.path());
        tweak(&mut config);
        std::fs::create_dir_all(config.uploads_path()).unwrap();

        let pool = db::create_pool(&config.db_path()).expect("Failed to create test database");
        db::run_migrations(&pool).expect("Failed to run migrations");

        let state = AppState::new(pool.clone(), config);
        let app = yatube::routes::app(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            pool,
            state,
            _data_dir: data_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    fn user(&self, username: &str) -> i64 {
        let hash = password::hash_password(PASSWORD, MIN_BCRYPT_COST).unwrap();
        let conn = self.pool.get().unwrap();
        users::create(
            &conn,
            &users::NewUser {
                username,
                password_hash: &hash,
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn group(&self, title: &str, slug: &str) -> i64 {
        let conn = self.pool.get().unwrap();
        groups::create(&conn, title, slug, "").unwrap()
    }

    fn post(&self, author_id: i64, text: &str, group_id: Option<i64>) -> i64 {
        let conn = self.pool.get().unwrap();
        posts::create(
            &conn,
            author_id,
            &PostChanges {
                text: text.to_string(),
                group_id,
                image: None,
            },
        )
        .unwrap()
    }

    /// A cookie-keeping client that does not follow redirects.
    async fn client(&self) -> Client {
        Client::builder()
            .cookie_store(true)
            .redirect(Policy::none())
            .build()
            .unwrap()
    }

    async fn login(&self, username: &str) -> Client {
        let client = self.client().await;
        let response = client
            .post(self.url("/auth/login/"))
            .form(&[("username", username), ("password", PASSWORD), ("next", "")])
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "login should redirect");
        client
    }
}

fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .expect("redirect without Location")
        .to_str()
        .unwrap()
        .to_string()
}

fn card_count(body: &str) -> usize {
    body.matches(r#"class="card post""#).count()
}

async fn get_text(client: &Client, url: String) -> (StatusCode, String) {
    let response = client.get(url).send().await.unwrap();
    let status = response.status();
    (status, response.text().await.unwrap())
}

#[tokio::test]
async fn anonymous_pages_render() {
    let server = TestServer::start().await;
    let author = server.user("leo");
    server.group("Test group", "test");
    let post_id = server.post(author, "hello world", None);
    let client = server.client().await;

    for path in [
        "/".to_string(),
        "/group/test/".to_string(),
        "/profile/leo/".to_string(),
        format!("/posts/{}/", post_id),
        "/auth/login/".to_string(),
        "/auth/signup/".to_string(),
    ] {
        let (status, _) = get_text(&client, server.url(&path)).await;
        assert_eq!(status, StatusCode::OK, "GET {}", path);
    }
}

#[tokio::test]
async fn unknown_resources_are_404() {
    let server = TestServer::start().await;
    let client = server.client().await;

    for path in [
        "/unexisting_page/",
        "/group/nope/",
        "/profile/nobody/",
        "/posts/999/",
        "/posts/abc/",
    ] {
        let (status, body) = get_text(&client, server.url(path)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "GET {}", path);
        assert!(body.contains("Page not found"));
    }
}

#[tokio::test]
async fn anonymous_user_is_sent_to_login_with_next() {
    let server = TestServer::start().await;
    let author = server.user("leo");
    let post_id = server.post(author, "hello", None);
    let client = server.client().await;

    let response = client.get(server.url("/create/")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login/?next=%2Fcreate%2F");

    let edit = format!("/posts/{}/edit/", post_id);
    let response = client.get(server.url(&edit)).send().await.unwrap();
    assert_eq!(
        location(&response),
        format!("/auth/login/?next=%2Fposts%2F{}%2Fedit%2F", post_id)
    );

    let response = client.get(server.url("/follow/")).send().await.unwrap();
    assert_eq!(location(&response), "/auth/login/?next=%2Ffollow%2F");
}

#[tokio::test]
async fn login_follows_next_and_rejects_bad_password() {
    let server = TestServer::start().await;
    server.user("leo");
    let client = server.client().await;

    let response = client
        .post(server.url("/auth/login/"))
        .form(&[("username", "leo"), ("password", "wrong"), ("next", "/create/")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.unwrap().contains("Please enter a correct username"));

    let response = client
        .post(server.url("/auth/login/"))
        .form(&[("username", "leo"), ("password", PASSWORD), ("next", "/create/")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/create/");

    let (status, _) = get_text(&client, server.url("/create/")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn signup_logs_in_and_logout_ends_session() {
    let server = TestServer::start().await;
    let client = server.client().await;

    let response = client
        .post(server.url("/auth/signup/"))
        .form(&[
            ("first_name", "Ada"),
            ("last_name", "Lovelace"),
            ("username", "ada"),
            ("email", "ada@example.com"),
            ("password1", PASSWORD),
            ("password2", PASSWORD),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let (status, _) = get_text(&client, server.url("/create/")).await;
    assert_eq!(status, StatusCode::OK);

    let response = client.post(server.url("/auth/logout/")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = client.get(server.url("/create/")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn signup_with_taken_username_rerenders_form() {
    let server = TestServer::start().await;
    server.user("ada");
    let client = server.client().await;

    let response = client
        .post(server.url("/auth/signup/"))
        .form(&[
            ("username", "ada"),
            ("password1", PASSWORD),
            ("password2", PASSWORD),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.unwrap().contains("already exists"));
}

#[tokio::test]
async fn listings_paginate_ten_then_three() {
    let server = TestServer::start().await;
    let author = server.user("leo");
    let group = server.group("Test group", "test");
    for i in 0..13 {
        server.post(author, &format!("post {}", i), Some(group));
    }
    let fan = server.user("fan");
    {
        let conn = server.pool.get().unwrap();
        follows::create(&conn, fan, author).unwrap();
    }
    let client = server.client().await;
    let follower = server.login("fan").await;

    for path in ["/", "/group/test/", "/profile/leo/"] {
        let (_, first) = get_text(&client, server.url(path)).await;
        let (_, second) = get_text(&client, server.url(&format!("{}?page=2", path))).await;
        assert_eq!(card_count(&first), 10, "first page of {}", path);
        assert_eq!(card_count(&second), 3, "second page of {}", path);
    }

    let (_, first) = get_text(&follower, server.url("/follow/")).await;
    let (_, second) = get_text(&follower, server.url("/follow/?page=2")).await;
    assert_eq!(card_count(&first), 10);
    assert_eq!(card_count(&second), 3);
}

#[tokio::test]
async fn garbage_and_out_of_range_pages_are_clamped() {
    let server = TestServer::start().await;
    let author = server.user("leo");
    for i in 0..13 {
        server.post(author, &format!("post {}", i), None);
    }
    let client = server.client().await;

    let (_, body) = get_text(&client, server.url("/profile/leo/?page=abc")).await;
    assert!(body.contains("Page 1 of 2"));
    let (_, body) = get_text(&client, server.url("/profile/leo/?page=99")).await;
    assert!(body.contains("Page 2 of 2"));
    assert_eq!(card_count(&body), 3);
}

#[tokio::test]
async fn created_post_appears_on_every_listing() {
    let server = TestServer::start_with(|c| c.cache.index_ttl_secs = 0).await;
    server.user("alice");
    let test_group = server.group("Test group", "test");
    server.group("Other group", "other");
    let client = server.login("alice").await;

    let form = multipart::Form::new()
        .text("text", "fresh post")
        .text("group", test_group.to_string());
    let response = client
        .post(server.url("/create/"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile/alice/");

    for path in ["/", "/group/test/", "/profile/alice/"] {
        let (_, body) = get_text(&client, server.url(path)).await;
        assert!(body.contains("fresh post"), "missing from {}", path);
    }
    let (_, other) = get_text(&client, server.url("/group/other/")).await;
    assert!(!other.contains("fresh post"));
}

#[tokio::test]
async fn create_with_empty_text_shows_errors() {
    let server = TestServer::start().await;
    server.user("alice");
    let client = server.login("alice").await;

    let form = multipart::Form::new().text("text", "   ").text("group", "");
    let response = client
        .post(server.url("/create/"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.unwrap().contains("field-error"));

    let conn = server.pool.get().unwrap();
    assert_eq!(posts::count(&conn, posts::PostFilter::All).unwrap(), 0);
}

#[tokio::test]
async fn uploaded_image_is_served_from_media() {
    const GIF: &[u8] = &[
        0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
        0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
        0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
    ];

    let server = TestServer::start().await;
    let author = server.user("alice");
    let client = server.login("alice").await;

    let image = multipart::Part::bytes(GIF.to_vec())
        .file_name("small.gif")
        .mime_str("image/gif")
        .unwrap();
    let form = multipart::Form::new()
        .text("text", "with picture")
        .part("image", image);
    let response = client
        .post(server.url("/create/"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let stored = {
        let conn = server.pool.get().unwrap();
        posts::list(&conn, posts::PostFilter::Author(author), 1, 0).unwrap()
    };
    let rel = stored[0].image.clone().expect("image should be stored");
    assert!(rel.starts_with("posts/"));

    let response = client
        .get(server.url(&format!("/media/{}", rel)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.bytes().await.unwrap().as_ref(), GIF);
}

#[tokio::test]
async fn author_can_edit_but_others_cannot() {
    let server = TestServer::start().await;
    let author = server.user("alice");
    server.user("mallory");
    let group = server.group("Test group", "test");
    let post_id = {
        let conn = server.pool.get().unwrap();
        posts::create(
            &conn,
            author,
            &PostChanges {
                text: "original".to_string(),
                group_id: Some(group),
                image: Some("posts/original.gif".to_string()),
            },
        )
        .unwrap()
    };
    let edit = format!("/posts/{}/edit/", post_id);
    let detail = format!("/posts/{}/", post_id);

    let intruder = server.login("mallory").await;
    let response = intruder.get(server.url(&edit)).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), detail);
    assert!(!response.text().await.unwrap().contains("<form"));

    let response = intruder
        .post(server.url(&edit))
        .multipart(multipart::Form::new().text("text", "defaced"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), detail);

    let response = intruder
        .post(server.url(&edit))
        .form(&[("text", "defaced again"), ("group", ""), ("image-clear", "on")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), detail);

    {
        let conn = server.pool.get().unwrap();
        let post = posts::find(&conn, post_id).unwrap().unwrap();
        assert_eq!(post.text, "original");
        assert_eq!(post.group.map(|g| g.id), Some(group));
        assert_eq!(post.image.as_deref(), Some("posts/original.gif"));
        assert_eq!(post.author, "alice");
    }

    let (status, body) = get_text(&intruder, server.url(&detail)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("@alice"));
    assert!(body.contains("original"));
    assert!(!body.contains(&edit));

    let owner = server.login("alice").await;
    let (status, form) = get_text(&owner, server.url(&edit)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(form.contains("original"));

    let response = owner
        .post(server.url(&edit))
        .multipart(
            multipart::Form::new()
                .text("text", "revised")
                .text("group", group.to_string()),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(location(&response), detail);

    let conn = server.pool.get().unwrap();
    let post = posts::find(&conn, post_id).unwrap().unwrap();
    assert_eq!(post.text, "revised");
    assert_eq!(post.author, "alice");
    assert_eq!(post.group.map(|g| g.id), Some(group));
    assert_eq!(post.image.as_deref(), Some("posts/original.gif"));
}

#[tokio::test]
async fn plain_form_posts_create_and_edit() {
    let server = TestServer::start_with(|c| c.cache.index_ttl_secs = 0).await;
    let author = server.user("alice");
    let group = server.group("Test group", "test");
    let client = server.login("alice").await;
    let group_value = group.to_string();

    let response = client
        .post(server.url("/create/"))
        .form(&[("text", "typed by hand"), ("group", group_value.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile/alice/");

    let post_id = {
        let conn = server.pool.get().unwrap();
        let stored = posts::list(&conn, posts::PostFilter::Author(author), 1, 0).unwrap();
        assert_eq!(stored[0].text, "typed by hand");
        assert_eq!(stored[0].group.as_ref().map(|g| g.id), Some(group));
        stored[0].id
    };

    let (_, body) = get_text(&client, server.url(&format!("/posts/{}/", post_id))).await;
    assert!(body.contains("@alice"));
    let (_, listing) = get_text(&client, server.url("/group/test/")).await;
    assert!(listing.contains("typed by hand"));

    let response = client
        .post(server.url(&format!("/posts/{}/edit/", post_id)))
        .form(&[("text", "edited by hand"), ("group", "")])
        .send()
        .await
        .unwrap();
    assert_eq!(location(&response), format!("/posts/{}/", post_id));

    let conn = server.pool.get().unwrap();
    let post = posts::find(&conn, post_id).unwrap().unwrap();
    assert_eq!(post.text, "edited by hand");
    assert!(post.group.is_none());
}

#[tokio::test]
async fn junk_page_values_share_one_index_cache_entry() {
    let server = TestServer::start().await;
    let author = server.user("leo");
    server.post(author, "only post", None);
    let client = server.client().await;

    for i in 0..50 {
        let (status, body) = get_text(&client, server.url(&format!("/?page=x{}", i))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(card_count(&body), 1);
    }
    get_text(&client, server.url("/")).await;
    get_text(&client, server.url("/?page=1")).await;
    assert_eq!(server.state.index_cache.lock().await.len(), 1);

    let (_, clamped) = get_text(&client, server.url("/?page=2")).await;
    assert_eq!(card_count(&clamped), 1);
    assert_eq!(server.state.index_cache.lock().await.len(), 2);
}

#[tokio::test]
async fn comments_need_login_and_show_on_detail() {
    let server = TestServer::start().await;
    let author = server.user("alice");
    server.user("bob");
    let post_id = server.post(author, "discuss", None);
    let comment_url = server.url(&format!("/posts/{}/comment/", post_id));

    let anonymous = server.client().await;
    let response = anonymous
        .post(&comment_url)
        .form(&[("text", "drive-by")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("/auth/login/?next="));

    let bob = server.login("bob").await;
    let response = bob
        .post(&comment_url)
        .form(&[("text", "nice post")])
        .send()
        .await
        .unwrap();
    assert_eq!(location(&response), format!("/posts/{}/", post_id));

    let (_, body) = get_text(&anonymous, server.url(&format!("/posts/{}/", post_id))).await;
    assert!(body.contains("nice post"));
    assert!(!body.contains("drive-by"));
}

#[tokio::test]
async fn deleting_post_removes_its_comments() {
    let server = TestServer::start().await;
    let author = server.user("alice");
    let post_id = server.post(author, "short lived", None);
    {
        let conn = server.pool.get().unwrap();
        comments::create(&conn, post_id, author, "first").unwrap();
    }

    let client = server.login("alice").await;
    let response = client
        .post(server.url(&format!("/posts/{}/delete/", post_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(location(&response), "/profile/alice/");

    let conn = server.pool.get().unwrap();
    assert!(posts::find(&conn, post_id).unwrap().is_none());
    assert!(comments::for_post(&conn, post_id).unwrap().is_empty());
}

#[tokio::test]
async fn follow_and_unfollow_change_the_feed() {
    let server = TestServer::start().await;
    let author = server.user("leo");
    server.user("fan");
    server.user("stranger");
    server.post(author, "for followers", None);

    let fan = server.login("fan").await;
    let stranger = server.login("stranger").await;

    let response = fan
        .get(server.url("/profile/leo/follow/"))
        .send()
        .await
        .unwrap();
    assert_eq!(location(&response), "/profile/leo/");

    let (_, feed) = get_text(&fan, server.url("/follow/")).await;
    assert!(feed.contains("for followers"));
    let (_, other) = get_text(&stranger, server.url("/follow/")).await;
    assert!(!other.contains("for followers"));

    fan.get(server.url("/profile/leo/unfollow/"))
        .send()
        .await
        .unwrap();
    let (_, feed) = get_text(&fan, server.url("/follow/")).await;
    assert!(!feed.contains("for followers"));
}

#[tokio::test]
async fn self_and_repeat_follows_are_ignored() {
    let server = TestServer::start().await;
    let author = server.user("leo");
    let fan_id = server.user("fan");

    let leo = server.login("leo").await;
    let response = leo
        .get(server.url("/profile/leo/follow/"))
        .send()
        .await
        .unwrap();
    assert_eq!(location(&response), "/profile/leo/");

    let fan = server.login("fan").await;
    for _ in 0..2 {
        let response = fan
            .get(server.url("/profile/leo/follow/"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    let conn = server.pool.get().unwrap();
    assert!(!follows::exists(&conn, author, author).unwrap());
    assert!(follows::exists(&conn, fan_id, author).unwrap());
    assert_eq!(follows::follower_count(&conn, author).unwrap(), 1);
}

#[tokio::test]
async fn index_is_cached_until_ttl() {
    let server = TestServer::start().await;
    let author = server.user("leo");
    for i in 0..3 {
        server.post(author, &format!("cached {}", i), None);
    }
    let client = server.client().await;

    let (_, before) = get_text(&client, server.url("/")).await;
    assert_eq!(card_count(&before), 3);

    {
        let conn = server.pool.get().unwrap();
        conn.execute("DELETE FROM posts", []).unwrap();
    }

    let (_, cached) = get_text(&client, server.url("/")).await;
    assert_eq!(card_count(&cached), 3);

    let (_, profile) = get_text(&client, server.url("/profile/leo/")).await;
    assert_eq!(card_count(&profile), 0);
}

#[tokio::test]
async fn expired_index_cache_is_rebuilt() {
    let server = TestServer::start_with(|c| c.cache.index_ttl_secs = 0).await;
    let author = server.user("leo");
    server.post(author, "soon gone", None);
    let client = server.client().await;

    let (_, before) = get_text(&client, server.url("/")).await;
    assert_eq!(card_count(&before), 1);

    {
        let conn = server.pool.get().unwrap();
        conn.execute("DELETE FROM posts", []).unwrap();
    }

    let (_, after) = get_text(&client, server.url("/")).await;
    assert_eq!(card_count(&after), 0);
}

#[tokio::test]
async fn stylesheet_is_served() {
    let server = TestServer::start().await;
    let client = server.client().await;
    let response = client
        .get(server.url("/assets/css/style.css"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
