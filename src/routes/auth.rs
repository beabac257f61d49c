use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users/login", post(commands::user::login_axum))
        .route(
            "/api/users",
            get(commands::user::get_users_axum).post(commands::user::create_user_axum),
        )
}
