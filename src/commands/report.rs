pub mod aggregate;
pub mod export;

use crate::commands::payment::{list_all_payments, payments_for_student};
use crate::commands::student::{find_student, list_students};
use crate::db::{Payment, Student};
use crate::error::{SipesdaError, SipesdaResult};
use crate::fee::{FeeType, Month};
use crate::state::AppState;
use aggregate::{
    class_rollup, monthly_status, split_history, total_amount, CohortReport, MonthStatus,
    PeriodFilter,
};
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use export::{build_workbook, Workbook, SUMMARY_SHEET};
use serde::{Deserialize, Serialize};

fn current_year() -> i32 {
    chrono::Datelike::year(&chrono::Local::now().date_naive())
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize)]
pub struct MonthlyQuery {
    pub fee_type: Option<FeeType>,
    pub year: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct StudentMonthlyReport {
    pub student: Student,
    pub fee_type: FeeType,
    pub year: i32,
    pub months: Vec<MonthStatus>,
    pub paid_months: usize,
    pub total_paid: i64,
}

pub async fn student_monthly_axum(
    State(state): State<AppState>,
    Path(nisn): Path<String>,
    Query(params): Query<MonthlyQuery>,
) -> SipesdaResult<Json<Option<StudentMonthlyReport>>> {
    let fee_type = params.fee_type.unwrap_or(FeeType::Spp);
    if !fee_type.is_monthly() {
        return Err(SipesdaError::Validation(format!(
            "{} bukan pembayaran bulanan",
            fee_type.label_name()
        )));
    }
    let year = params.year.unwrap_or_else(current_year);

    let Some(student) = find_student(&state.pool, &nisn).await? else {
        return Ok(Json(None));
    };
    let payments = payments_for_student(&state.pool, &nisn).await?;
    let months = monthly_status(&student, &payments, fee_type, year);

    let paid_months = months.iter().filter(|m| m.payment_count > 0).count();
    let total_paid = total_amount(months.iter().map(|m| m.paid_amount));
    for m in months.iter().filter(|m| m.duplicate) {
        tracing::warn!(
            "Student {} has {} payments for {} {}",
            nisn,
            m.payment_count,
            m.month,
            year
        );
    }

    Ok(Json(Some(StudentMonthlyReport {
        student,
        fee_type,
        year,
        months,
        paid_months,
        total_paid,
    })))
}

#[derive(Debug, Serialize)]
pub struct StudentHistory {
    pub student: Student,
    pub spp: Vec<Payment>,
    pub other: Vec<Payment>,
    pub total_paid: i64,
}

pub async fn student_history_axum(
    State(state): State<AppState>,
    Path(nisn): Path<String>,
) -> SipesdaResult<Json<Option<StudentHistory>>> {
    let Some(student) = find_student(&state.pool, &nisn).await? else {
        return Ok(Json(None));
    };
    let payments = payments_for_student(&state.pool, &nisn).await?;
    let total_paid = total_amount(payments.iter().map(|p| p.nominal));
    let (spp, other) = split_history(payments);

    Ok(Json(Some(StudentHistory {
        student,
        spp,
        other,
        total_paid,
    })))
}

#[derive(Debug, Deserialize)]
pub struct RollupQuery {
    pub fee_type: Option<FeeType>,
    pub year: Option<i32>,
    pub month: Option<Month>,
    pub cohort: Option<String>,
    pub sheet: Option<String>,
}

impl RollupQuery {
    fn filter(&self) -> PeriodFilter {
        PeriodFilter::new(
            self.fee_type.unwrap_or(FeeType::Spp),
            self.year.unwrap_or_else(current_year),
            self.month,
        )
    }
}

async fn load_all(state: &AppState) -> SipesdaResult<(Vec<Student>, Vec<Payment>)> {
    let students = list_students(&state.pool).await?;
    let payments = list_all_payments(&state.pool).await?;
    Ok((students, payments))
}

pub async fn class_rollup_axum(
    State(state): State<AppState>,
    Query(params): Query<RollupQuery>,
) -> SipesdaResult<Json<CohortReport>> {
    let filter = params.filter();
    let cohort = blank_to_none(params.cohort);
    let (students, payments) = load_all(&state).await?;

    let report = class_rollup(&students, &payments, filter, cohort.as_deref());
    tracing::debug!(
        "Rollup {} {}: {} students, paid {}",
        filter.fee_type,
        filter.year,
        report.total_students,
        report.total_paid
    );
    Ok(Json(report))
}

pub async fn export_workbook_axum(
    State(state): State<AppState>,
    Query(params): Query<RollupQuery>,
) -> SipesdaResult<Json<Workbook>> {
    let filter = params.filter();
    let cohort = blank_to_none(params.cohort);
    let (students, payments) = load_all(&state).await?;
    Ok(Json(build_workbook(
        &students,
        &payments,
        filter,
        cohort.as_deref(),
    )))
}

pub async fn export_csv_axum(
    State(state): State<AppState>,
    Query(params): Query<RollupQuery>,
) -> SipesdaResult<Response> {
    let filter = params.filter();
    let cohort = blank_to_none(params.cohort.clone());
    let sheet_name = blank_to_none(params.sheet.clone()).unwrap_or_else(|| SUMMARY_SHEET.to_string());
    let (students, payments) = load_all(&state).await?;

    let workbook = build_workbook(&students, &payments, filter, cohort.as_deref());
    let sheet = workbook
        .sheet(&sheet_name)
        .ok_or_else(|| SipesdaError::Validation(format!("Sheet tidak ditemukan: {}", sheet_name)))?;

    let file_name = format!(
        "{}-{}.csv",
        workbook.title.replace(' ', "_"),
        sheet.name.replace(' ', "_")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        sheet.to_csv(),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollup_query_defaults_to_spp() {
        let q: RollupQuery = serde_json::from_str(r#"{"year": 2024, "month": "mar"}"#).unwrap();
        let f = q.filter();
        assert_eq!(f.fee_type, FeeType::Spp);
        assert_eq!(f.year, 2024);
        assert_eq!(f.month, Some(Month::Maret));
    }

    #[test]
    fn blank_cohort_means_all_students() {
        assert_eq!(blank_to_none(Some("  ".to_string())), None);
        assert_eq!(
            blank_to_none(Some(" 2024 ".to_string())),
            Some("2024".to_string())
        );
    }
}
