//! Kwitansi (payment receipt) numbering and rendering.
//!
//! Receipt numbers are `<FEE><YYMMDD><NNN>` with a pseudo-random three digit suffix. They
//! are neither sequential nor guaranteed unique; two receipts issued on the same day can
//! collide and nothing downstream relies on uniqueness.

pub mod pdf;

use crate::config::SchoolProfile;
use crate::db::Student;
use crate::error::{SipesdaError, SipesdaResult};
use crate::fee::{format_rupiah, FeeType, Month};
use crate::state::AppState;
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub fn generate_receipt_id<R: Rng + ?Sized>(fee: FeeType, date: NaiveDate, rng: &mut R) -> String {
    let suffix: u32 = rng.random_range(0..1000);
    format!("{}{}{:03}", fee.code(), date.format("%y%m%d"), suffix)
}

pub fn new_receipt_id(fee: FeeType, date: NaiveDate) -> String {
    generate_receipt_id(fee, date, &mut rand::rng())
}

#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub receipt_id: String,
    pub tanggal: NaiveDate,
    pub nisn: String,
    pub nama: String,
    pub kelas: String,
    pub angkatan: String,
    pub fee_type: FeeType,
    pub year: i32,
    pub months: Vec<Month>,
    pub amount_per_period: i64,
    pub total: i64,
    pub keterangan: Option<String>,
    pub catatan: Option<String>,
    pub petugas: String,
}

#[derive(Debug, Clone)]
pub struct ReceiptInput {
    pub receipt_id: String,
    pub tanggal: NaiveDate,
    pub fee_type: FeeType,
    pub year: i32,
    pub months: Vec<Month>,
    pub keterangan: Option<String>,
    pub catatan: Option<String>,
    pub petugas: Option<String>,
}

impl Receipt {
    pub fn new(student: &Student, input: ReceiptInput) -> Self {
        let mut months = input.months;
        months.sort();
        let amount_per_period = input.fee_type.amount_per_period();
        let period_count = period_count(input.fee_type, &months) as i64;
        Self {
            receipt_id: input.receipt_id,
            tanggal: input.tanggal,
            nisn: student.nisn.clone(),
            nama: student.nama.clone(),
            kelas: student.kelas.clone(),
            angkatan: student.angkatan.clone(),
            fee_type: input.fee_type,
            year: input.year,
            months,
            amount_per_period,
            total: period_count * amount_per_period,
            keterangan: input.keterangan.filter(|s| !s.trim().is_empty()),
            catatan: input.catatan.filter(|s| !s.trim().is_empty()),
            petugas: input
                .petugas
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "Admin".to_string()),
        }
    }

    pub fn period_count(&self) -> usize {
        period_count(self.fee_type, &self.months)
    }

    /// `SPP Bulan Januari, Februari 2024` or `Buku LKS 2024`.
    pub fn description(&self) -> String {
        if self.fee_type.is_monthly() {
            let names: Vec<&str> = self.months.iter().map(|m| m.name()).collect();
            format!(
                "{} Bulan {} {}",
                self.fee_type.label_name(),
                names.join(", "),
                self.year
            )
        } else {
            format!("{} {}", self.fee_type.label_name(), self.year)
        }
    }

    /// Labeled fields in print order.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("No. Kwitansi", self.receipt_id.clone()),
            ("Tanggal", self.tanggal.format("%d/%m/%Y").to_string()),
            ("NISN", self.nisn.clone()),
            ("Nama Siswa", self.nama.clone()),
            ("Kelas", self.kelas.clone()),
            ("Angkatan", self.angkatan.clone()),
            ("Pembayaran", self.description()),
            ("Jumlah Periode", self.period_count().to_string()),
            (
                "Nominal per Periode",
                format!("Rp {}", format_rupiah(self.amount_per_period)),
            ),
            ("Total Pembayaran", format!("Rp {}", format_rupiah(self.total))),
            (
                "Keterangan",
                self.keterangan.clone().unwrap_or_else(|| "-".to_string()),
            ),
            (
                "Catatan",
                self.catatan.clone().unwrap_or_else(|| "-".to_string()),
            ),
            ("Petugas", self.petugas.clone()),
        ]
    }

    pub fn title(&self) -> String {
        format!("BUKTI PEMBAYARAN {}", self.fee_type.label_name().to_uppercase())
    }

    pub fn render_text(&self, school: &SchoolProfile) -> String {
        let fields = self.fields();
        let width = fields.iter().map(|(l, _)| l.len()).max().unwrap_or(0);

        let mut out = String::new();
        out.push_str(&school.name);
        out.push('\n');
        out.push_str(&school.address);
        out.push('\n');
        out.push_str(&school.contact);
        out.push_str("\n\n");
        out.push_str(&self.title());
        out.push_str("\n\n");
        for (label, value) in fields {
            out.push_str(&format!("{:<width$} : {}\n", label, value, width = width));
        }
        out
    }
}

/// Monthly fees bill one period per month; other fees are a single period.
fn period_count(fee: FeeType, months: &[Month]) -> usize {
    if fee.is_monthly() {
        months.len()
    } else {
        1
    }
}

pub fn validate_months(fee: FeeType, months: &[Month]) -> SipesdaResult<()> {
    if !fee.is_monthly() {
        return Ok(());
    }
    if months.is_empty() {
        return Err(SipesdaError::Validation(
            "Pilih minimal satu bulan pembayaran.".to_string(),
        ));
    }
    let mut seen = months.to_vec();
    seen.sort();
    seen.dedup();
    if seen.len() != months.len() {
        return Err(SipesdaError::Validation(
            "Bulan yang sama dipilih lebih dari sekali.".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct ReceiptRequest {
    pub nisn: String,
    pub fee_type: FeeType,
    pub year: i32,
    #[serde(default)]
    pub months: Vec<Month>,
    pub receipt_id: Option<String>,
    pub tanggal: Option<NaiveDate>,
    pub keterangan: Option<String>,
    pub catatan: Option<String>,
    pub petugas: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReceiptDocument {
    pub receipt: Receipt,
    pub text: String,
}

async fn build_receipt(state: &AppState, req: ReceiptRequest) -> SipesdaResult<Receipt> {
    validate_months(req.fee_type, &req.months)?;

    let student = crate::commands::student::find_student(&state.pool, &req.nisn)
        .await?
        .ok_or_else(|| SipesdaError::Validation(format!("Siswa {} tidak ditemukan", req.nisn)))?;

    let tanggal = req
        .tanggal
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let receipt_id = req
        .receipt_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| new_receipt_id(req.fee_type, tanggal));

    Ok(Receipt::new(
        &student,
        ReceiptInput {
            receipt_id,
            tanggal,
            fee_type: req.fee_type,
            year: req.year,
            months: req.months,
            keterangan: req.keterangan,
            catatan: req.catatan,
            petugas: req.petugas,
        },
    ))
}

pub async fn preview_receipt_axum(
    State(state): State<AppState>,
    Json(req): Json<ReceiptRequest>,
) -> SipesdaResult<Json<ReceiptDocument>> {
    let receipt = build_receipt(&state, req).await?;
    let text = receipt.render_text(&state.config.school);
    Ok(Json(ReceiptDocument { receipt, text }))
}

pub async fn receipt_pdf_axum(
    State(state): State<AppState>,
    Json(req): Json<ReceiptRequest>,
) -> SipesdaResult<Response> {
    let receipt = build_receipt(&state, req).await?;
    let school = state.config.school.clone();
    let file_name = format!("kwitansi-{}.pdf", receipt.receipt_id);

    let bytes = tokio::task::spawn_blocking(move || pdf::render_receipt_pdf(&receipt, &school))
        .await
        .map_err(|e| SipesdaError::Internal(e.to_string()))??;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response())
}
