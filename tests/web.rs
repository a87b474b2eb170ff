//! HTTP routes exercised through the router without a listener

use std::sync::Arc;

use alohomora::auth::AuthConfig;
use alohomora::config::{Config, HttpConfig};
use alohomora::database::WhitelistStore;
use alohomora::web::{router, AppState};
use alohomora::Alohomora;
use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

const TOKEN: &str = "open-sesame";

struct Harness {
    _dir: TempDir,
    app: Arc<Alohomora>,
    router: Router,
}

fn harness(token: Option<&str>) -> Harness {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.general.allow_conf_path = dir.path().join("allow.conf").to_string_lossy().to_string();

    let app = Arc::new(Alohomora::with_store(
        config,
        WhitelistStore::open_memory().unwrap(),
    ));
    let state = Arc::new(AppState::new(
        app.clone(),
        AuthConfig::new(token.map(String::from)),
        &HttpConfig::default(),
    ));
    let router = router(state, dir.path());

    Harness {
        _dir: dir,
        app,
        router,
    }
}

fn form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn login(h: &Harness) -> String {
    let response = h
        .router
        .clone()
        .oneshot(form("/login", &format!("token={}", TOKEN), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("session cookie");
    assert!(set_cookie.contains("HttpOnly"));
    set_cookie.split(';').next().unwrap().to_string()
}

#[tokio::test]
async fn protected_routes_redirect_to_login() {
    let h = harness(Some(TOKEN));

    for uri in ["/", "/allow.conf", "/delete/1"] {
        let response = h.router.clone().oneshot(get(uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{}", uri);
        assert_eq!(location(&response), "/login", "{}", uri);
    }

    let response = h
        .router
        .clone()
        .oneshot(form("/add", "ip=10.0.0.1", Some("alohomora_session=forged")))
        .await
        .unwrap();
    assert_eq!(location(&response), "/login");
    assert!(h.app.list().unwrap().is_empty());
}

#[tokio::test]
async fn login_page_is_public() {
    let h = harness(Some(TOKEN));
    let response = h.router.clone().oneshot(get("/login", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("name=\"token\""));
}

#[tokio::test]
async fn wrong_token_is_rejected() {
    let h = harness(Some(TOKEN));
    let response = h
        .router
        .clone()
        .oneshot(form("/login", "token=guess", None))
        .await
        .unwrap();

    assert_eq!(location(&response), "/login");
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn unset_token_fails_closed() {
    let h = harness(None);

    for body in ["token=", "token=anything"] {
        let response = h.router.clone().oneshot(form("/login", body, None)).await.unwrap();
        assert_eq!(location(&response), "/login");
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    let response = h.router.clone().oneshot(get("/login", None)).await.unwrap();
    assert!(body_text(response).await.contains("Login is disabled"));
}

#[tokio::test]
async fn add_list_download_and_delete() {
    let h = harness(Some(TOKEN));
    let cookie = login(&h).await;

    let response = h
        .router
        .clone()
        .oneshot(form(
            "/add",
            "ip=10.0.0.5&label=lab%3Cb%3E&expiration=forever",
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let entries = h.app.list().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].ip, "10.0.0.5");
    assert_eq!(entries[0].label, "labb");
    assert!(entries[0].is_permanent());

    let request = Request::get("/")
        .header(header::COOKIE, &cookie)
        .header("x-forwarded-for", "198.51.100.4, 10.0.0.1")
        .body(Body::empty())
        .unwrap();
    let response = h.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("198.51.100.4"));
    assert!(page.contains("<td>10.0.0.5</td>"));

    let response = h
        .router
        .clone()
        .oneshot(get("/allow.conf", Some(&cookie)))
        .await
        .unwrap();
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    assert!(body_text(response).await.starts_with("allow 10.0.0.5;"));

    let response = h
        .router
        .clone()
        .oneshot(get("/allow.conf?dl", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/force-download"
    );

    let id = entries[0].id;
    let response = h
        .router
        .clone()
        .oneshot(get(&format!("/delete/{}", id), Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(location(&response), "/");
    assert!(h.app.list().unwrap().is_empty());

    let on_disk = std::fs::read_to_string(h.app.allow_conf_path()).unwrap();
    assert!(!on_disk.contains("10.0.0.5"));
}

#[tokio::test]
async fn invalid_address_is_ignored() {
    let h = harness(Some(TOKEN));
    let cookie = login(&h).await;

    for ip in ["not-an-ip", "10.0.0", "1.2.3.4.5"] {
        let response = h
            .router
            .clone()
            .oneshot(form("/add", &format!("ip={}&expiration=1+day", ip), Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(location(&response), "/");
    }
    assert!(h.app.list().unwrap().is_empty());
}

#[tokio::test]
async fn logout_ends_session() {
    let h = harness(Some(TOKEN));
    let cookie = login(&h).await;

    let response = h.router.clone().oneshot(get("/logout", Some(&cookie))).await.unwrap();
    assert_eq!(location(&response), "/login");

    let response = h.router.clone().oneshot(get("/", Some(&cookie))).await.unwrap();
    assert_eq!(location(&response), "/login");
}
