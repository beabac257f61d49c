use crate::commands::receipt::{new_receipt_id, validate_months, Receipt, ReceiptDocument, ReceiptInput};
use crate::commands::report::aggregate::PeriodFilter;
use crate::commands::student::find_student;
use crate::db::{DbPool, Payment, Student};
use crate::error::{SipesdaError, SipesdaResult};
use crate::fee::{format_label, parse_label, FeeType, Month};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const STATUS_LUNAS: &str = "lunas";
pub const STATUS_BELUM_LUNAS: &str = "belum_lunas";

/// Upper bound for a single payment, well above any school fee. Keeps report sums in range.
pub const MAX_NOMINAL: i64 = 1_000_000_000;

fn validate_nominal(nominal: i64) -> SipesdaResult<()> {
    if nominal < 0 {
        return Err(SipesdaError::Validation(
            "Nominal tidak boleh negatif".to_string(),
        ));
    }
    if nominal > MAX_NOMINAL {
        return Err(SipesdaError::Validation(format!(
            "Nominal melebihi batas Rp {}",
            crate::fee::format_rupiah(MAX_NOMINAL)
        )));
    }
    Ok(())
}

fn validate_status(status: &str) -> SipesdaResult<()> {
    if status == STATUS_LUNAS || status == STATUS_BELUM_LUNAS {
        Ok(())
    } else {
        Err(SipesdaError::Validation(format!(
            "Status harus '{}' atau '{}'",
            STATUS_LUNAS, STATUS_BELUM_LUNAS
        )))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentInput {
    #[serde(alias = "studentNisn")]
    pub student_nisn: String,
    pub fee_type: Option<FeeType>,
    pub period_month: Option<Month>,
    pub period_year: Option<i32>,
    pub jenis_pembayaran: Option<String>,
    pub nominal: Option<i64>,
    pub tanggal_pembayaran: Option<NaiveDate>,
    pub status: Option<String>,
    pub keterangan: Option<String>,
    pub catatan: Option<String>,
    pub petugas: Option<String>,
    pub receipt_id: Option<String>,
}

/// A payment with every period field resolved, ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub student_nisn: String,
    pub fee_type: Option<FeeType>,
    pub period_month: Option<Month>,
    pub period_year: Option<i32>,
    pub jenis_pembayaran: String,
    pub nominal: i64,
    pub tanggal_pembayaran: NaiveDate,
    pub status: String,
    pub keterangan: Option<String>,
    pub catatan: Option<String>,
    pub petugas: Option<String>,
    pub receipt_id: Option<String>,
}

impl NewPayment {
    pub fn period_filter(&self) -> Option<PeriodFilter> {
        let fee = self.fee_type?;
        let year = if fee.is_monthly() {
            self.period_year?
        } else {
            chrono::Datelike::year(&self.tanggal_pembayaran)
        };
        Some(PeriodFilter::new(fee, year, self.period_month))
    }
}

impl PaymentInput {
    /// Fills structured period fields from the label (and the label from the fields).
    pub fn resolve(self, today: NaiveDate) -> SipesdaResult<NewPayment> {
        let student_nisn = self.student_nisn.trim().to_string();
        if student_nisn.is_empty() {
            return Err(SipesdaError::Validation("NISN siswa harus diisi".to_string()));
        }

        let label = self
            .jenis_pembayaran
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());
        let parsed = label.as_deref().map(parse_label).unwrap_or_default();

        let fee_type = self.fee_type.or(parsed.fee_type);
        let tanggal_pembayaran = self.tanggal_pembayaran.unwrap_or(today);
        let period_year = self.period_year.or(parsed.year);
        let period_month = self.period_month.or(parsed.month);

        if let Some(fee) = fee_type {
            if fee.is_monthly() && (period_month.is_none() || period_year.is_none()) {
                return Err(SipesdaError::Validation(format!(
                    "Pembayaran {} harus menyebutkan bulan dan tahun",
                    fee.label_name()
                )));
            }
        }
        let period_year = match fee_type {
            Some(fee) if !fee.is_monthly() => {
                let paid_year = chrono::Datelike::year(&tanggal_pembayaran);
                Some(billed_year(fee, period_year.unwrap_or(paid_year), tanggal_pembayaran)?)
            }
            _ => period_year,
        };

        let jenis_pembayaran = match (label, fee_type) {
            (Some(l), _) => l,
            (None, Some(fee)) => format_label(
                fee,
                period_month,
                period_year.unwrap_or_else(|| chrono::Datelike::year(&tanggal_pembayaran)),
            ),
            (None, None) => {
                return Err(SipesdaError::Validation(
                    "Jenis pembayaran harus diisi".to_string(),
                ))
            }
        };

        let nominal = match (self.nominal, fee_type) {
            (Some(n), _) => n,
            (None, Some(fee)) => fee.amount_per_period(),
            (None, None) => {
                return Err(SipesdaError::Validation("Nominal harus diisi".to_string()))
            }
        };
        validate_nominal(nominal)?;

        let status = self.status.unwrap_or_else(|| STATUS_LUNAS.to_string());
        validate_status(&status)?;

        Ok(NewPayment {
            student_nisn,
            fee_type,
            period_month,
            period_year,
            jenis_pembayaran,
            nominal,
            tanggal_pembayaran,
            status,
            keterangan: self.keterangan,
            catatan: self.catatan,
            petugas: self.petugas,
            receipt_id: self.receipt_id,
        })
    }
}

pub async fn payments_for_student(pool: &DbPool, nisn: &str) -> SipesdaResult<Vec<Payment>> {
    Ok(sqlx::query_as::<_, Payment>(
        "SELECT * FROM payments WHERE student_nisn = $1 ORDER BY tanggal_pembayaran, id",
    )
    .bind(nisn)
    .fetch_all(pool)
    .await?)
}

pub async fn list_all_payments(pool: &DbPool) -> SipesdaResult<Vec<Payment>> {
    Ok(
        sqlx::query_as::<_, Payment>("SELECT * FROM payments ORDER BY tanggal_pembayaran, id")
            .fetch_all(pool)
            .await?,
    )
}

async fn period_payments(
    pool: &DbPool,
    nisn: &str,
    filter: &PeriodFilter,
) -> SipesdaResult<Vec<Payment>> {
    Ok(payments_for_student(pool, nisn)
        .await?
        .into_iter()
        .filter(|p| filter.matches(p))
        .collect())
}

pub async fn insert_payment(pool: &DbPool, payment: &NewPayment) -> SipesdaResult<i32> {
    let (id,): (i32,) = sqlx::query_as(
        "INSERT INTO payments (
            student_nisn, fee_type, period_month, period_year, jenis_pembayaran, nominal,
            tanggal_pembayaran, status, keterangan, catatan, petugas, receipt_id
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING id",
    )
    .bind(&payment.student_nisn)
    .bind(payment.fee_type.map(|f| f.code()))
    .bind(payment.period_month.map(|m| m.number() as i16))
    .bind(payment.period_year)
    .bind(&payment.jenis_pembayaran)
    .bind(payment.nominal)
    .bind(payment.tanggal_pembayaran)
    .bind(&payment.status)
    .bind(&payment.keterangan)
    .bind(&payment.catatan)
    .bind(&payment.petugas)
    .bind(&payment.receipt_id)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Warns about, but never blocks, a second payment for an already paid period.
async fn duplicate_warning(pool: &DbPool, payment: &NewPayment) -> SipesdaResult<Option<String>> {
    let Some(filter) = payment.period_filter() else {
        return Ok(None);
    };
    let existing = period_payments(pool, &payment.student_nisn, &filter).await?;
    if existing.is_empty() {
        return Ok(None);
    }
    tracing::warn!(
        "Duplicate payment for {} '{}' ({} existing)",
        payment.student_nisn,
        payment.jenis_pembayaran,
        existing.len()
    );
    Ok(Some(format!(
        "{} untuk siswa {} sudah tercatat {} kali sebelumnya",
        payment.jenis_pembayaran,
        payment.student_nisn,
        existing.len()
    )))
}

async fn ensure_student(pool: &DbPool, nisn: &str) -> SipesdaResult<Student> {
    find_student(pool, nisn)
        .await?
        .ok_or_else(|| SipesdaError::Validation(format!("Siswa {} tidak ditemukan", nisn)))
}

#[derive(Debug, Deserialize)]
pub struct PaymentListQuery {
    #[serde(alias = "studentNisn")]
    pub student_nisn: Option<String>,
}

pub async fn get_payments_axum(
    State(state): State<AppState>,
    Query(params): Query<PaymentListQuery>,
) -> SipesdaResult<Json<Vec<Payment>>> {
    let payments = match params.student_nisn.as_deref().map(str::trim) {
        Some(nisn) if !nisn.is_empty() => payments_for_student(&state.pool, nisn).await?,
        _ => list_all_payments(&state.pool).await?,
    };
    Ok(Json(payments))
}

#[derive(Debug, Deserialize)]
pub struct ByMonthQuery {
    #[serde(rename = "studentNisn", alias = "student_nisn")]
    pub student_nisn: String,
    pub month: Month,
    pub year: i32,
}

pub async fn get_payments_by_month_axum(
    State(state): State<AppState>,
    Query(params): Query<ByMonthQuery>,
) -> SipesdaResult<Json<Vec<Payment>>> {
    let filter = PeriodFilter::new(FeeType::Spp, params.year, Some(params.month));
    Ok(Json(
        period_payments(&state.pool, &params.student_nisn, &filter).await?,
    ))
}

#[derive(Debug, Serialize)]
pub struct CreatedPayment {
    pub message: String,
    pub id: i32,
    pub warning: Option<String>,
}

pub async fn create_payment_axum(
    State(state): State<AppState>,
    Json(input): Json<PaymentInput>,
) -> SipesdaResult<Json<CreatedPayment>> {
    let payment = input.resolve(chrono::Local::now().date_naive())?;
    ensure_student(&state.pool, &payment.student_nisn).await?;

    let warning = duplicate_warning(&state.pool, &payment).await?;
    let id = insert_payment(&state.pool, &payment).await?;
    tracing::info!(
        "Payment {} recorded for {}: {} ({})",
        id,
        payment.student_nisn,
        payment.jenis_pembayaran,
        payment.nominal
    );

    Ok(Json(CreatedPayment {
        message: "Pembayaran ditambahkan".to_string(),
        id,
        warning,
    }))
}

#[derive(Debug, Deserialize)]
pub struct BatchPaymentRequest {
    #[serde(alias = "studentNisn")]
    pub student_nisn: String,
    pub fee_type: FeeType,
    pub year: i32,
    #[serde(default)]
    pub months: Vec<Month>,
    pub tanggal_pembayaran: Option<NaiveDate>,
    pub keterangan: Option<String>,
    pub catatan: Option<String>,
    pub petugas: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PeriodOutcome {
    pub month: Option<Month>,
    pub jenis_pembayaran: String,
    pub payment_id: Option<i32>,
    pub error: Option<String>,
    pub duplicate: bool,
}

#[derive(Debug, Serialize)]
pub struct BatchPaymentResponse {
    pub receipt_id: String,
    pub all_succeeded: bool,
    pub outcomes: Vec<PeriodOutcome>,
    /// Covers only the periods that were stored.
    pub receipt: Option<ReceiptDocument>,
}

/// Non-monthly fees are counted by the year they were paid in, so the billed year must match.
fn billed_year(fee: FeeType, year: i32, tanggal: NaiveDate) -> SipesdaResult<i32> {
    let paid_year = chrono::Datelike::year(&tanggal);
    if !fee.is_monthly() && year != paid_year {
        return Err(SipesdaError::Validation(format!(
            "Pembayaran {} tahun {} harus bertanggal di tahun {} (tanggal: {})",
            fee.label_name(),
            year,
            year,
            tanggal
        )));
    }
    Ok(year)
}

/// Expands a batch request into one payment per billed period, all under one receipt.
pub fn expand_batch(
    req: &BatchPaymentRequest,
    receipt_id: &str,
    tanggal: NaiveDate,
) -> SipesdaResult<Vec<NewPayment>> {
    let year = billed_year(req.fee_type, req.year, tanggal)?;
    let periods: Vec<Option<Month>> = if req.fee_type.is_monthly() {
        req.months.iter().copied().map(Some).collect()
    } else {
        vec![None]
    };
    Ok(periods
        .into_iter()
        .map(|month| NewPayment {
            student_nisn: req.student_nisn.trim().to_string(),
            fee_type: Some(req.fee_type),
            period_month: month,
            period_year: Some(year),
            jenis_pembayaran: format_label(req.fee_type, month, year),
            nominal: req.fee_type.amount_per_period(),
            tanggal_pembayaran: tanggal,
            status: STATUS_LUNAS.to_string(),
            keterangan: req.keterangan.clone(),
            catatan: req.catatan.clone(),
            petugas: req.petugas.clone(),
            receipt_id: Some(receipt_id.to_string()),
        })
        .collect())
}

/// Per-period results of a batch, in request order.
#[derive(Debug)]
pub struct BatchSummary {
    pub outcomes: Vec<PeriodOutcome>,
    pub all_succeeded: bool,
    pub stored_months: Vec<Month>,
    pub any_stored: bool,
}

impl BatchSummary {
    /// Receipt for the stored periods only; `None` when nothing was stored.
    pub fn receipt(&self, student: &Student, template: ReceiptInput) -> Option<Receipt> {
        self.any_stored.then(|| {
            Receipt::new(
                student,
                ReceiptInput {
                    months: self.stored_months.clone(),
                    ..template
                },
            )
        })
    }
}

pub fn summarize_batch(
    planned: &[NewPayment],
    results: Vec<SipesdaResult<i32>>,
    existing: &[Payment],
) -> BatchSummary {
    let mut outcomes = Vec::with_capacity(planned.len());
    let mut stored_months = Vec::new();
    let mut any_stored = false;
    for (payment, result) in planned.iter().zip(results) {
        let duplicate = payment
            .period_filter()
            .map_or(false, |f| existing.iter().any(|e| f.matches(e)));
        if duplicate {
            tracing::warn!(
                "Duplicate payment for {} '{}' in batch {:?}",
                payment.student_nisn,
                payment.jenis_pembayaran,
                payment.receipt_id
            );
        }
        let (payment_id, error) = match result {
            Ok(id) => {
                any_stored = true;
                if let Some(m) = payment.period_month {
                    stored_months.push(m);
                }
                (Some(id), None)
            }
            Err(e) => {
                tracing::error!(
                    "Batch {:?}: failed to store '{}': {}",
                    payment.receipt_id,
                    payment.jenis_pembayaran,
                    e
                );
                (None, Some(e.to_string()))
            }
        };
        outcomes.push(PeriodOutcome {
            month: payment.period_month,
            jenis_pembayaran: payment.jenis_pembayaran.clone(),
            payment_id,
            error,
            duplicate,
        });
    }

    BatchSummary {
        all_succeeded: outcomes.iter().all(|o| o.error.is_none()),
        outcomes,
        stored_months,
        any_stored,
    }
}

/// Records several periods at once. Each insert stands alone: a failure leaves the others
/// in place and is reported per period instead of being rolled back.
pub async fn create_payment_batch_axum(
    State(state): State<AppState>,
    Json(req): Json<BatchPaymentRequest>,
) -> SipesdaResult<Json<BatchPaymentResponse>> {
    validate_months(req.fee_type, &req.months)?;
    let tanggal = req
        .tanggal_pembayaran
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let receipt_id = new_receipt_id(req.fee_type, tanggal);
    let planned = expand_batch(&req, &receipt_id, tanggal)?;

    let student = ensure_student(&state.pool, req.student_nisn.trim()).await?;
    let existing = payments_for_student(&state.pool, &student.nisn).await?;

    let pool = &state.pool;
    let results = join_all(planned.iter().map(|p| insert_payment(pool, p))).await;
    let summary = summarize_batch(&planned, results, &existing);

    let receipt = summary
        .receipt(
            &student,
            ReceiptInput {
                receipt_id: receipt_id.clone(),
                tanggal,
                fee_type: req.fee_type,
                year: req.year,
                months: Vec::new(),
                keterangan: req.keterangan.clone(),
                catatan: req.catatan.clone(),
                petugas: req.petugas.clone(),
            },
        )
        .map(|receipt| {
            let text = receipt.render_text(&state.config.school);
            ReceiptDocument { receipt, text }
        });

    Ok(Json(BatchPaymentResponse {
        receipt_id,
        all_succeeded: summary.all_succeeded,
        outcomes: summary.outcomes,
        receipt,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentUpdate {
    pub fee_type: Option<FeeType>,
    pub period_month: Option<Month>,
    pub period_year: Option<i32>,
    pub jenis_pembayaran: Option<String>,
    pub nominal: Option<i64>,
    pub tanggal_pembayaran: Option<NaiveDate>,
    pub status: Option<String>,
    pub keterangan: Option<String>,
    pub catatan: Option<String>,
    pub petugas: Option<String>,
}

impl PaymentUpdate {
    fn validate(&self) -> SipesdaResult<()> {
        if let Some(status) = self.status.as_deref() {
            validate_status(status)?;
        }
        if let Some(nominal) = self.nominal {
            validate_nominal(nominal)?;
        }
        Ok(())
    }

    /// A new label without explicit period fields re-derives them.
    fn with_label_periods(mut self) -> Self {
        if let Some(label) = self.jenis_pembayaran.as_deref() {
            let parsed = parse_label(label);
            self.fee_type = self.fee_type.or(parsed.fee_type);
            self.period_month = self.period_month.or(parsed.month);
            self.period_year = self.period_year.or(parsed.year);
        }
        self
    }
}

pub async fn update_payment_axum(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(update): Json<PaymentUpdate>,
) -> SipesdaResult<Json<Value>> {
    update.validate()?;
    let update = update.with_label_periods();

    let result = sqlx::query(
        "UPDATE payments SET
            fee_type = COALESCE($1, fee_type),
            period_month = COALESCE($2, period_month),
            period_year = COALESCE($3, period_year),
            jenis_pembayaran = COALESCE($4, jenis_pembayaran),
            nominal = COALESCE($5, nominal),
            tanggal_pembayaran = COALESCE($6, tanggal_pembayaran),
            status = COALESCE($7, status),
            keterangan = COALESCE($8, keterangan),
            catatan = COALESCE($9, catatan),
            petugas = COALESCE($10, petugas),
            updated_at = NOW()
         WHERE id = $11",
    )
    .bind(update.fee_type.map(|f| f.code()))
    .bind(update.period_month.map(|m| m.number() as i16))
    .bind(update.period_year)
    .bind(update.jenis_pembayaran)
    .bind(update.nominal)
    .bind(update.tanggal_pembayaran)
    .bind(update.status)
    .bind(update.keterangan)
    .bind(update.catatan)
    .bind(update.petugas)
    .bind(id)
    .execute(&state.pool)
    .await?;

    Ok(Json(json!({
        "message": "Pembayaran diperbarui",
        "updated": result.rows_affected(),
    })))
}

pub async fn delete_payment_axum(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> SipesdaResult<Json<Value>> {
    let result = sqlx::query("DELETE FROM payments WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;
    tracing::info!("Payment {} deleted ({} rows)", id, result.rows_affected());

    Ok(Json(json!({
        "message": "Pembayaran dihapus",
        "deleted": result.rows_affected(),
    })))
}
