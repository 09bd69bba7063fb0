use crate::core::error;
use crate::core::state::AppState;
use crate::routes::{auth, health, post, user};
use crate::utils;
use axum::error_handling::HandleErrorLayer;
use axum::{
    Router,
    extract::{MatchedPath, Request},
    http::{Method, header},
    middleware,
    routing::get,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{self, CorsLayer},
    trace::TraceLayer,
};
use tracing::info_span;

pub(crate) fn routes(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/users/me", get(user::me).put(user::update_me))
        .route("/posts", get(post::list).post(post::create))
        .route(
            "/posts/{id}",
            get(post::get).put(post::update).delete(post::delete),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            utils::auth::authenticate,
        ));

    let api = Router::new()
        .route("/health", get(health::health))
        .route("/users", axum::routing::post(auth::register))
        .route("/auth/token", axum::routing::post(auth::sign_in))
        .merge(protected_routes);

    Router::new()
        .nest("/api/v1", api)
        // every request is counted, including ones that end up unauthenticated
        .layer(middleware::from_fn_with_state(
            state.clone(),
            utils::ratelimiter::rate_limit,
        ))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                        let matched_path = request
                            .extensions()
                            .get::<MatchedPath>()
                            .map(MatchedPath::as_str);

                        info_span!(
                            "request",
                            method = ?request.method(),
                            matched_path,
                        )
                    }),
                )
                .layer(HandleErrorLayer::new(error::handle_middleware_errors))
                .timeout(Duration::from_secs(60))
                .layer(
                    CorsLayer::new()
                        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
                        .allow_origin(cors::Any)
                        .expose_headers([header::RETRY_AFTER]),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::{MockPostStore, MockUserStore};
    use crate::test_support::{self, bearer, post, user};
    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::Response;
    use mockall::predicate::eq;
    use std::net::SocketAddr;
    use tower::ServiceExt;

    fn request(method: Method, uri: &str, headers: HeaderMap, body: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().method(method).uri(uri);

        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_owned())
            }
            None => Body::empty(),
        };

        let mut request = builder.body(body).unwrap();
        request.headers_mut().extend(headers);
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([203, 0, 113, 9], 40000))));
        request
    }

    async fn json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn active_users() -> MockUserStore {
        let mut users = MockUserStore::new();
        users
            .expect_get_by_id()
            .returning(|id| Ok(Some(user(id, id != 13))));
        users
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let app = routes(test_support::state(
            MockUserStore::new(),
            MockPostStore::new(),
            100,
        ));

        let response = app
            .oneshot(request(Method::GET, "/api/v1/health", HeaderMap::new(), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["data"]["status"], "available");
    }

    #[tokio::test]
    async fn test_me_requires_token() {
        let app = routes(test_support::state(active_users(), MockPostStore::new(), 100));

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/v1/users/me", HeaderMap::new(), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(request(Method::GET, "/api/v1/users/me", bearer(42), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["data"]["id"], 42);
    }

    #[tokio::test]
    async fn test_forged_and_unknown_identities_look_the_same() {
        let mut users = MockUserStore::new();
        users.expect_get_by_id().returning(|_| Ok(None));
        let app = routes(test_support::state(users, MockPostStore::new(), 100));

        let mut forged = HeaderMap::new();
        forged.insert(
            header::AUTHORIZATION,
            "Bearer eyJhbGciOiJIUzI1NiJ9.e30.c2lnbmF0dXJl".parse().unwrap(),
        );

        let unknown = app
            .clone()
            .oneshot(request(Method::GET, "/api/v1/users/me", bearer(77), None))
            .await
            .unwrap();
        let forged = app
            .oneshot(request(Method::GET, "/api/v1/users/me", forged, None))
            .await
            .unwrap();

        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json(unknown).await, json(forged).await);
    }

    #[tokio::test]
    async fn test_inactive_account_is_forbidden() {
        let app = routes(test_support::state(active_users(), MockPostStore::new(), 100));

        let response = app
            .oneshot(request(Method::GET, "/api/v1/users/me", bearer(13), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_rate_limit_applies_before_authentication() {
        let app = routes(test_support::state(
            MockUserStore::new(),
            MockPostStore::new(),
            2,
        ));

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(request(Method::GET, "/api/v1/users/me", HeaderMap::new(), None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/v1/users/me", HeaderMap::new(), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let retry_after: u64 = response
            .headers()
            .get(header::RETRY_AFTER)
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!(retry_after > 0 && retry_after <= 60);

        // a different forwarded client still gets through
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "198.51.100.20".parse().unwrap());
        let response = app
            .oneshot(request(Method::GET, "/api/v1/health", headers, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_register_validation() {
        let mut users = MockUserStore::new();
        users.expect_create().never();
        let app = routes(test_support::state(users, MockPostStore::new(), 100));

        let response = app
            .oneshot(request(
                Method::POST,
                "/api/v1/users",
                HeaderMap::new(),
                Some(r#"{"username":"ab","email":"ferris@example.com","password":"password123"}"#),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json(response).await["errors"][0]["field"], "username");
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let app = routes(test_support::state(
            MockUserStore::new(),
            MockPostStore::new(),
            100,
        ));

        let response = app
            .oneshot(request(
                Method::POST,
                "/api/v1/auth/token",
                HeaderMap::new(),
                Some("{not json"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_post_routes() {
        let mut posts = MockPostStore::new();
        posts
            .expect_get_by_id()
            .with(eq(3))
            .returning(|id| Ok(Some(post(id, 42))));
        posts
            .expect_list()
            .returning(|_, _| Ok((vec![post(3, 42)], 1)));
        let app = routes(test_support::state(active_users(), posts, 100));

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/v1/posts/3", bearer(42), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["data"]["user"]["id"], 42);

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/v1/posts/abc", bearer(42), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(request(
                Method::GET,
                "/api/v1/posts?page_size=5&sort=asc",
                bearer(42),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        assert_eq!(body["meta"]["page_size"], 5);
        assert_eq!(body["meta"]["total_records"], 1);
    }

    #[tokio::test]
    async fn test_malformed_query_is_json_bad_request() {
        let mut posts = MockPostStore::new();
        posts.expect_list().never();
        let app = routes(test_support::state(active_users(), posts, 100));

        let response = app
            .oneshot(request(
                Method::GET,
                "/api/v1/posts?page=1&page=2",
                bearer(42),
                None,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_non_owner_cannot_update() {
        let mut posts = MockPostStore::new();
        posts
            .expect_get_by_id()
            .returning(|id| Ok(Some(post(id, 1))));
        posts.expect_update().never();
        let app = routes(test_support::state(active_users(), posts, 100));

        let response = app
            .oneshot(request(
                Method::PUT,
                "/api/v1/posts/3",
                bearer(42),
                Some(r#"{"title":"Not yours"}"#),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_owner_can_delete() {
        let mut posts = MockPostStore::new();
        posts
            .expect_get_by_id()
            .returning(|id| Ok(Some(post(id, 42))));
        posts.expect_delete().with(eq(3)).returning(|_| Ok(true));
        let app = routes(test_support::state(active_users(), posts, 100));

        let response = app
            .oneshot(request(Method::DELETE, "/api/v1/posts/3", bearer(42), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
