use crate::commands;
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/reports/students/:nisn/monthly",
            get(commands::report::student_monthly_axum),
        )
        .route(
            "/api/reports/students/:nisn/history",
            get(commands::report::student_history_axum),
        )
        .route(
            "/api/reports/classes",
            get(commands::report::class_rollup_axum),
        )
        .route(
            "/api/reports/export",
            get(commands::report::export_workbook_axum),
        )
        .route(
            "/api/reports/export/csv",
            get(commands::report::export_csv_axum),
        )
}
