use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/students",
            get(commands::student::get_students_axum).post(commands::student::create_student_axum),
        )
        .route(
            "/api/students/import",
            post(commands::student::import::import_students_axum),
        )
        .route(
            "/api/students/import/template",
            get(commands::student::import::import_template_axum),
        )
        .route(
            "/api/students/:nisn",
            get(commands::student::get_student_axum)
                .put(commands::student::update_student_axum)
                .delete(commands::student::delete_student_axum),
        )
}
