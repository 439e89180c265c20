use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::auth::{self, AppState};
use crate::cities;
use crate::messages;
use crate::middleware::require_session;

/// All routes. Chat and city routes sit behind the access gate; signup, login,
/// logout and whoami do their own session handling.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/ping", get(ping))
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/whoami", get(auth::whoami))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/chat", post(messages::post_chat).get(messages::get_thread))
        .route("/chat/{message_id}", get(messages::get_message))
        .route("/cities/{city_name}", get(cities::get_city))
        .layer(middleware::from_fn_with_state(state.clone(), require_session))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}

async fn ping() -> &'static str {
    "pong"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
        response::Response,
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::testing::{test_state, test_state_with_db};

    fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_json(resp: Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// The `name=value` part of the Set-Cookie header.
    fn session_cookie(resp: &Response) -> String {
        let set_cookie = resp.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.contains("HttpOnly"));
        set_cookie.split(';').next().unwrap().to_string()
    }

    async fn signup_and_login(app: &Router, username: &str, password: &str) -> String {
        let creds = json!({ "username": username, "password": password });
        let resp = app.clone().oneshot(json_request("POST", "/signup", None, creds.clone())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = app.clone().oneshot(json_request("POST", "/login", None, creds)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        session_cookie(&resp)
    }

    #[tokio::test]
    async fn test_ping() {
        let app = router(test_state());
        let resp = app.oneshot(get_request("/ping", None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"pong");
    }

    #[tokio::test]
    async fn test_end_to_end_session() {
        let app = router(test_state());
        let cookie = signup_and_login(&app, "alice", "secret1").await;

        let resp = app.clone().oneshot(get_request("/whoami", Some(&cookie))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!({ "username": "alice" }));

        let resp = app
            .clone()
            .oneshot(json_request("POST", "/chat", Some(&cookie), json!({ "contents": "hello", "time": "12:00" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!({ "id": 1 }));

        let resp = app.clone().oneshot(get_request("/chat/1", Some(&cookie))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let message = body_json(resp).await;
        assert_eq!(message["author"], "alice");
        assert_eq!(message["contents"], "hello");
        assert_eq!(message["time"], "12:00");

        let resp = app.clone().oneshot(get_request("/logout", Some(&cookie))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app.clone().oneshot(get_request("/whoami", Some(&cookie))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(resp).await, json!({ "error": "forbidden" }));

        let resp = app
            .oneshot(json_request("POST", "/chat", Some(&cookie), json!({ "contents": "after logout" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_signup_errors() {
        let app = router(test_state());
        signup_and_login(&app, "alice", "secret1").await;

        let resp = app
            .clone()
            .oneshot(json_request("POST", "/signup", None, json!({ "username": "alice", "password": "other" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = app
            .oneshot(json_request("POST", "/signup", None, json!({ "username": "bo", "password": "secret1" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await, json!({ "error": "invalid_input" }));
    }

    #[tokio::test]
    async fn test_login_failures_look_alike() {
        let app = router(test_state());
        signup_and_login(&app, "alice", "secret1").await;

        let wrong = app
            .clone()
            .oneshot(json_request("POST", "/login", None, json!({ "username": "alice", "password": "nope" })))
            .await
            .unwrap();
        let unknown = app
            .oneshot(json_request("POST", "/login", None, json!({ "username": "zed", "password": "nope" })))
            .await
            .unwrap();

        assert_eq!(wrong.status(), StatusCode::FORBIDDEN);
        assert_eq!(unknown.status(), StatusCode::FORBIDDEN);
        assert!(wrong.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(body_json(wrong).await, body_json(unknown).await);
    }

    #[tokio::test]
    async fn test_chat_requires_session() {
        let app = router(test_state());
        for req in [get_request("/chat", None), get_request("/chat/1", Some("natter_session=bogus"))] {
            let resp = app.clone().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        }
    }

    #[tokio::test]
    async fn test_chat_validation_and_lookup() {
        let app = router(test_state());
        let cookie = signup_and_login(&app, "alice", "secret1").await;

        let long = "x".repeat(201);
        for (contents, code) in [("", "empty"), (long.as_str(), "too_long")] {
            let resp = app
                .clone()
                .oneshot(json_request("POST", "/chat", Some(&cookie), json!({ "contents": contents })))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_json(resp).await, json!({ "error": code }));
        }

        let resp = app.clone().oneshot(get_request("/chat/42", Some(&cookie))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        for body in ["one", "two", "three"] {
            app.clone()
                .oneshot(json_request("POST", "/chat", Some(&cookie), json!({ "contents": body })))
                .await
                .unwrap();
        }
        let resp = app.oneshot(get_request("/chat?after=1", Some(&cookie))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let page = body_json(resp).await;
        let ids: Vec<u64> = page
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["id"].as_u64().unwrap())
            .collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_bearer_token_accepted() {
        let app = router(test_state());
        let cookie = signup_and_login(&app, "alice", "secret1").await;
        let token = cookie.trim_start_matches("natter_session=");

        let req = Request::builder()
            .uri("/whoami")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_logout_always_succeeds() {
        let app = router(test_state());
        for cookie in [None, Some("natter_session=never-issued")] {
            let resp = app.clone().oneshot(get_request("/logout", cookie)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_city_lookup() {
        let (state, db) = test_state_with_db();
        db.insert_city(Some("Tokyo"), Some("JPN"), Some("Tokyo-to"), Some(7_980_230))
            .unwrap();
        db.insert_city(Some("Nowhere"), None, None, None).unwrap();
        let app = router(state);

        let resp = app.clone().oneshot(get_request("/cities/Tokyo", None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let cookie = signup_and_login(&app, "alice", "secret1").await;

        let resp = app.clone().oneshot(get_request("/cities/Tokyo", Some(&cookie))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let city = body_json(resp).await;
        assert_eq!(city["name"], "Tokyo");
        assert_eq!(city["countryCode"], "JPN");
        assert_eq!(city["population"], 7_980_230);

        // Missing columns are left out, not rendered as sentinels.
        let resp = app.clone().oneshot(get_request("/cities/Nowhere", Some(&cookie))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let city = body_json(resp).await;
        assert!(city.get("countryCode").is_none());
        assert!(city.get("population").is_none());

        let resp = app.oneshot(get_request("/cities/Atlantis", Some(&cookie))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await, json!({ "error": "not_found" }));
    }
}
