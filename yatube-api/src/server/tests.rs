use crate::{
    blob::FsBlobStore,
    cache::{
        PageCache,
        tests::{self as cache_tests, ManualClock},
    },
    handlers::{admin, testing},
    render::JsonRenderer,
    server::{self, ServerState, auth::AdminToken},
};
use axum::{
    Router,
    body::{Body, Bytes},
    http::{Request, Response, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use time::Duration;
use tower::ServiceExt;
use yatube_common::model::{post::PostFilter, user::User};
use yatube_db::{Store, memory::MemoryStore};

const ADMIN_TOKEN: &str = "let-me-in";
const BOUNDARY: &str = "yatube-test-boundary";

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    media: TempDir,
}

impl TestApp {
    fn new(admin_token: Option<&str>) -> Self {
        let store = Arc::new(MemoryStore::default());
        let clock = Arc::new(ManualClock::new());
        let media = tempfile::tempdir().unwrap();
        let cache = PageCache::new(
            cache_tests::ttl(),
            cache_tests::capacity(64),
            clock.clone(),
        );
        let state = ServerState::new(
            store.clone(),
            Arc::new(cache),
            Arc::new(JsonRenderer),
            Arc::new(FsBlobStore::new(media.path())),
            admin_token.map(AdminToken::new),
        );

        Self {
            router: server::routes().with_state(state),
            store,
            clock,
            media,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> Response<Body> {
        let mut request = Request::get(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }

    async fn post_multipart(&self, uri: &str, token: &str, parts: &[Part<'_>]) -> Response<Body> {
        let request = Request::post(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        self.send(request).await
    }

    async fn post_form(&self, uri: &str, token: &str, body: &'static str) -> Response<Body> {
        let request = Request::post(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    async fn admin(&self, method: &str, uri: &str, token: &str, json: Option<Value>) -> Response<Body> {
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"));
        let body = match json {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.send(request.body(body).unwrap()).await
    }

    async fn user_with_token(&self, name: &str) -> (User, String) {
        let user = testing::user(&self.store, name).await;
        let issued = admin::issue_token(&*self.store, name, None).await.unwrap();
        (user, issued.token)
    }
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                        .as_bytes(),
                );
            }
            Part::File(name, file_name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn bytes(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

async fn json(response: Response<Body>) -> Value {
    serde_json::from_slice(&bytes(response).await).unwrap()
}

fn location(response: &Response<Body>) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

#[tokio::test]
async fn anonymous_users_are_sent_to_login() {
    let app = TestApp::new(None);
    let author = testing::user(&app.store, "leo").await;
    let post = testing::post(&app.store, &author, "hello", None).await;

    for uri in [
        "/create/".to_owned(),
        "/follow/".to_owned(),
        format!("/posts/{}/edit/", post.id),
    ] {
        let response = app.get(&uri, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(location(&response), format!("/auth/login/?next={uri}"));
    }

    let request = Request::post("/profile/leo/follow/").body(Body::empty()).unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login/?next=/profile/leo/follow/");
}

#[tokio::test]
async fn public_pages_render_their_views() {
    let app = TestApp::new(None);
    let author = testing::user(&app.store, "leo").await;
    let group = testing::group(&app.store, "cats").await;
    let post = testing::post(&app.store, &author, "meow", Some(&group)).await;

    for (uri, view) in [
        ("/".to_owned(), "posts/index.html"),
        ("/group/cats/".to_owned(), "posts/group_list.html"),
        ("/profile/leo/".to_owned(), "posts/profile.html"),
        (format!("/posts/{}/", post.id), "posts/post_detail.html"),
    ] {
        let response = app.get(&uri, None).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(json(response).await["view"], view, "{uri}");
    }

    let profile = json(app.get("/profile/leo/", None).await).await;
    assert_eq!(profile["context"]["following"], false);
    assert_eq!(profile["context"]["post_count"], 1);
    assert_eq!(profile["context"]["page"]["items"][0]["text"], "meow");
}

#[tokio::test]
async fn missing_things_are_404() {
    let app = TestApp::new(None);

    for uri in [
        "/group/nope/",
        "/profile/ghost/",
        "/posts/12345/",
        "/posts/not-a-number/",
        "/no/such/route",
    ] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(json(response).await["status"], 404);
    }
}

#[tokio::test]
async fn bad_tokens_are_refused() {
    let app = TestApp::new(None);
    let (_, token) = app.user_with_token("leo").await;

    assert_eq!(app.get("/follow/", Some(&token)).await.status(), StatusCode::OK);

    let response = app.get("/follow/", Some("garbage")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (user, _) = app.user_with_token("ann").await;
    app.store.delete_user(user.id).await.unwrap();
    let (_, other) = app.user_with_token("ann").await;
    let forged = format!("{}:{}", user.id, other.split_once(':').unwrap().1);
    let response = app.get("/", Some(&forged)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn creating_a_post_redirects_to_the_profile() {
    let app = TestApp::new(None);
    let (author, token) = app.user_with_token("leo").await;
    let group = testing::group(&app.store, "cats").await;
    let group_id = group.id.to_string();

    let response = app
        .post_multipart(
            "/create/",
            &token,
            &[
                Part::Text("text", "Posted through the form"),
                Part::Text("group", &group_id),
                Part::File("image", "small.gif", b"GIF89a"),
            ],
        )
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile/leo/");

    let posts = app
        .store
        .list_posts(
            PostFilter::Author(author.id),
            yatube_common::pagination::Paginator::new(1, 10).window(None),
        )
        .await
        .unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].text.get(), "Posted through the form");
    assert_eq!(posts[0].group, Some(group));

    let image = posts[0].image.as_ref().unwrap();
    assert_eq!(image.get(), "posts/small.gif");
    assert_eq!(std::fs::read(app.media.path().join(image.get())).unwrap(), b"GIF89a");
}

#[tokio::test]
async fn invalid_posts_rerender_the_form() {
    let app = TestApp::new(None);
    let (_, token) = app.user_with_token("leo").await;

    let response = app
        .post_multipart("/create/", &token, &[Part::Text("text", "  ")])
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let document = json(response).await;
    assert_eq!(document["view"], "posts/create_post.html");
    assert_eq!(document["context"]["errors"]["text"][0], "This field is required.");
    assert_eq!(document["context"]["is_edit"], false);
    assert_eq!(app.store.count_posts(PostFilter::All).await.unwrap(), 0);
}

#[tokio::test]
async fn only_the_author_may_edit() {
    let app = TestApp::new(None);
    let (author, author_token) = app.user_with_token("leo").await;
    let (_, intruder_token) = app.user_with_token("mallory").await;
    let post = testing::post(&app.store, &author, "Original", None).await;
    let edit_uri = format!("/posts/{}/edit/", post.id);
    let detail_uri = format!("/posts/{}/", post.id);

    let response = app.get(&edit_uri, Some(&intruder_token)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), detail_uri);

    let response = app
        .post_multipart(&edit_uri, &intruder_token, &[Part::Text("text", "Defaced")])
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), detail_uri);
    assert_eq!(app.store.fetch_post(post.id).await.unwrap().unwrap(), post);

    let form = json(app.get(&edit_uri, Some(&author_token)).await).await;
    assert_eq!(form["context"]["is_edit"], true);
    assert_eq!(form["context"]["form"]["text"], "Original");

    let response = app
        .post_multipart(&edit_uri, &author_token, &[Part::Text("text", "Improved")])
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), detail_uri);
    let edited = app.store.fetch_post(post.id).await.unwrap().unwrap();
    assert_eq!(edited.text.get(), "Improved");
}

#[tokio::test]
async fn comments_always_redirect_to_the_post() {
    let app = TestApp::new(None);
    let (author, token) = app.user_with_token("leo").await;
    let post = testing::post(&app.store, &author, "Discuss", None).await;
    let uri = format!("/posts/{}/comment/", post.id);

    let response = app.post_form(&uri, &token, "text=").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{}/", post.id));
    assert!(app.store.list_comments(post.id).await.unwrap().is_empty());

    let response = app.post_form(&uri, &token, "text=Nice+one").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let comments = app.store.list_comments(post.id).await.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].text.get(), "Nice one");

    let detail = json(app.get(&format!("/posts/{}/", post.id), None).await).await;
    assert_eq!(detail["context"]["comments"][0]["text"], "Nice one");

    let response = app.post_form("/posts/12345/comment/", &token, "text=hi").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn follow_and_unfollow_through_the_profile() {
    let app = TestApp::new(None);
    let (_, token) = app.user_with_token("ann").await;
    let author = testing::user(&app.store, "leo").await;
    testing::post(&app.store, &author, "From leo", None).await;

    let empty = json(app.get("/follow/", Some(&token)).await).await;
    assert_eq!(empty["view"], "posts/follow.html");
    assert_eq!(empty["context"]["page"]["items"], Value::Array(Vec::new()));

    for _ in 0..2 {
        let response = app.post_form("/profile/leo/follow/", &token, "").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/profile/leo/");
    }

    let feed = json(app.get("/follow/", Some(&token)).await).await;
    assert_eq!(feed["context"]["page"]["items"][0]["text"], "From leo");
    let profile = json(app.get("/profile/leo/", Some(&token)).await).await;
    assert_eq!(profile["context"]["following"], true);

    let response = app.post_form("/profile/leo/unfollow/", &token, "").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let response = app.post_form("/profile/leo/unfollow/", &token, "").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn index_is_served_from_cache_until_cleared() {
    let app = TestApp::new(Some(ADMIN_TOKEN));
    let author = testing::user(&app.store, "leo").await;
    testing::post(&app.store, &author, "Before", None).await;

    let first = bytes(app.get("/", None).await).await;
    testing::post(&app.store, &author, "After", None).await;
    app.clock.advance(Duration::seconds(5));

    let cached = bytes(app.get("/", None).await).await;
    assert_eq!(cached, first);

    let response = app.admin("DELETE", "/admin/cache", ADMIN_TOKEN, None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let fresh = bytes(app.get("/", None).await).await;
    assert_ne!(fresh, first);
    assert!(String::from_utf8_lossy(&fresh).contains("After"));
}

#[tokio::test]
async fn admin_routes_need_a_configured_token() {
    let disabled = TestApp::new(None);
    let response = disabled
        .admin("DELETE", "/admin/cache", ADMIN_TOKEN, None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let app = TestApp::new(Some(ADMIN_TOKEN));
    let response = app.admin("DELETE", "/admin/cache", "wrong", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_manages_users_groups_and_tokens() {
    let app = TestApp::new(Some(ADMIN_TOKEN));

    let response = app
        .admin("POST", "/admin/users", ADMIN_TOKEN, Some(serde_json::json!({"username": "leo"})))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(json(response).await["username"], "leo");

    let response = app
        .admin("POST", "/admin/users", ADMIN_TOKEN, Some(serde_json::json!({"username": "leo"})))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .admin("POST", "/admin/users", ADMIN_TOKEN, Some(serde_json::json!({"username": "no spaces"})))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .admin(
            "POST",
            "/admin/users/leo/tokens",
            ADMIN_TOKEN,
            Some(serde_json::json!({"expires_in_seconds": 3600})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let issued = json(response).await;
    let token = issued["token"].as_str().unwrap().to_owned();
    assert!(issued["expires_at"].is_string());
    assert_eq!(app.get("/follow/", Some(&token)).await.status(), StatusCode::OK);

    let response = app
        .admin(
            "POST",
            "/admin/users/leo/tokens",
            ADMIN_TOKEN,
            Some(serde_json::json!({"expires_in_seconds": 0})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .admin("POST", "/admin/groups", ADMIN_TOKEN, Some(serde_json::json!({"slug": "cats"})))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(json(response).await["title"], "default title");
    assert_eq!(app.get("/group/cats/", None).await.status(), StatusCode::OK);

    let response = app.admin("DELETE", "/admin/groups/cats", ADMIN_TOKEN, None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.get("/group/cats/", None).await.status(), StatusCode::NOT_FOUND);

    let response = app.admin("DELETE", "/admin/users/leo", ADMIN_TOKEN, None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.get("/follow/", Some(&token)).await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.get("/profile/leo/", None).await.status(), StatusCode::NOT_FOUND);
}
