use crate::middleware::auth::auth_middleware;
use crate::state::AppState;
use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod payment;
pub mod report;
pub mod student;

async fn ping() -> &'static str {
    "pong"
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/ping", get(ping))
        .merge(auth::router())
        .merge(student::router())
        .merge(payment::router())
        .merge(report::router())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::init_pool_with_options;
    use crate::middleware::auth::issue_token;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use sqlx::postgres::PgConnectOptions;
    use tower::ServiceExt;

    // The pool is lazy; none of these requests reach the database.
    fn app() -> Router {
        let pool = init_pool_with_options(PgConnectOptions::new());
        create_router(AppState::new(pool, AppConfig::for_tests()))
    }

    fn bearer(role: &str) -> String {
        let token = issue_token(&AppConfig::for_tests().jwt_secret, 1, "tester", role).unwrap();
        format!("Bearer {}", token)
    }

    #[tokio::test]
    async fn ping_is_public() {
        let res = app()
            .oneshot(Request::get("/api/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = res.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"pong");
    }

    #[tokio::test]
    async fn api_requires_a_bearer_token() {
        let res = app()
            .oneshot(Request::get("/api/students").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = app()
            .oneshot(
                Request::get("/api/students")
                    .header(header::AUTHORIZATION, "Bearer not-a-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn import_template_lists_expected_headers() {
        let res = app()
            .oneshot(
                Request::get("/api/students/import/template")
                    .header(header::AUTHORIZATION, bearer("operator"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = res.into_body().collect().await.unwrap().to_bytes();
        let rows: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let row = rows[0].as_object().unwrap();
        for key in ["NISN", "Nama", "Nama Wali", "Kelas", "Angkatan", "No HP", "Jenis_Kelamin"] {
            assert!(row.contains_key(key), "missing {}", key);
        }
    }

    #[tokio::test]
    async fn user_listing_is_admin_only() {
        let res = app()
            .oneshot(
                Request::get("/api/users")
                    .header(header::AUTHORIZATION, bearer("operator"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        let body = res.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn receipt_for_monthly_fee_needs_months() {
        let res = app()
            .oneshot(
                Request::post("/api/receipts/preview")
                    .header(header::AUTHORIZATION, bearer("operator"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"nisn": "1234567890", "fee_type": "SPP", "year": 2024, "months": []}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn monthly_report_rejects_yearly_fee() {
        let res = app()
            .oneshot(
                Request::get("/api/reports/students/1234567890/monthly?fee_type=LKS&year=2024")
                    .header(header::AUTHORIZATION, bearer("admin"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
