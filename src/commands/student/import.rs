//! Bulk student import from spreadsheet rows.
//!
//! Rows arrive already decoded from the sheet, keyed by the template headers. A bad row is
//! skipped and reported by its sheet row number; it never aborts the rest of the batch.

use super::{
    cohort_year, insert_student, required_field, NewStudent, Sex, KELAS_MAX, NAME_MAX, NISN_MAX,
    NO_HP_MAX,
};
use crate::error::SipesdaResult;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::{json, Map, Value};

pub const INVALID_ROW_REASON: &str = "incomplete or invalid fields";
pub const SAVE_FAILED_REASON: &str = "could not be saved";

pub const COL_NISN: &str = "NISN";
pub const COL_NAMA: &str = "Nama";
pub const COL_NAMA_WALI: &str = "Nama Wali";
pub const COL_KELAS: &str = "Kelas";
pub const COL_ANGKATAN: &str = "Angkatan";
pub const COL_NO_HP: &str = "No HP";
pub const COL_JENIS_KELAMIN: &str = "Jenis_Kelamin";
pub const COL_ALAMAT: &str = "Alamat";

/// The sheet header occupies row 1, so data row `i` (0-based) sits on row `i + 2`.
pub fn sheet_row_number(index: usize) -> usize {
    index + 2
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRow {
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub created: usize,
    pub skipped: Vec<SkippedRow>,
}

/// Spreadsheet cells come through as strings or numbers depending on formatting.
fn cell(row: &Map<String, Value>, key: &str) -> String {
    match row.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn numeric_year(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    // 2024 may have been typed as 2024.0 in the sheet.
    let value: f64 = raw.parse().ok()?;
    if value.fract() != 0.0 || value < 0.0 {
        return None;
    }
    Some(format!("{}", value as i64))
}

pub fn validate_row(row: &Value) -> Option<NewStudent> {
    let row = row.as_object()?;

    let nisn = required_field("NISN", &cell(row, COL_NISN), NISN_MAX).ok()?;
    let nama = required_field("Nama", &cell(row, COL_NAMA), NAME_MAX).ok()?;
    let nama_wali = required_field("Nama wali", &cell(row, COL_NAMA_WALI), NAME_MAX).ok()?;
    let kelas = required_field("Kelas", &cell(row, COL_KELAS), KELAS_MAX).ok()?;
    let no_hp = required_field("No HP", &cell(row, COL_NO_HP), NO_HP_MAX).ok()?;
    let angkatan = cohort_year(&numeric_year(&cell(row, COL_ANGKATAN))?).ok()?;
    // Must be exactly L or P, untrimmed.
    let jenis_kelamin = row
        .get(COL_JENIS_KELAMIN)
        .and_then(Value::as_str)
        .and_then(Sex::parse)?;

    let alamat = Some(cell(row, COL_ALAMAT)).filter(|a| !a.is_empty());

    Some(NewStudent {
        nisn,
        nama,
        nama_wali,
        kelas,
        angkatan,
        alamat,
        no_hp,
        jenis_kelamin,
    })
}

/// Splits a batch into insertable students (with their row numbers) and rejected rows.
pub fn validate_rows(rows: &[Value]) -> (Vec<(usize, NewStudent)>, Vec<SkippedRow>) {
    let mut valid = Vec::new();
    let mut skipped = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let row_number = sheet_row_number(i);
        match validate_row(row) {
            Some(student) => valid.push((row_number, student)),
            None => skipped.push(SkippedRow {
                row: row_number,
                reason: INVALID_ROW_REASON.to_string(),
            }),
        }
    }
    (valid, skipped)
}

pub async fn import_students_axum(
    State(state): State<AppState>,
    Json(rows): Json<Vec<Value>>,
) -> SipesdaResult<Json<ImportReport>> {
    let (valid, mut skipped) = validate_rows(&rows);
    let mut report = ImportReport::default();

    for (row_number, student) in valid {
        match insert_student(&state.pool, &student).await {
            Ok(()) => report.created += 1,
            Err(e) => {
                tracing::warn!("Import row {} ({}) failed: {}", row_number, student.nisn, e);
                skipped.push(SkippedRow {
                    row: row_number,
                    reason: SAVE_FAILED_REASON.to_string(),
                });
            }
        }
    }

    skipped.sort_by_key(|s| s.row);
    report.skipped = skipped;
    tracing::info!(
        "Student import finished: {} created, {} skipped",
        report.created,
        report.skipped.len()
    );

    Ok(Json(report))
}

pub async fn import_template_axum() -> Json<Value> {
    Json(json!([{
        COL_NISN: "1234567890",
        COL_NAMA: "Nama Siswa",
        COL_NAMA_WALI: "Nama Orang Tua",
        COL_KELAS: "1A",
        COL_ANGKATAN: 2024,
        COL_NO_HP: "08123456789",
        COL_JENIS_KELAMIN: "L",
        COL_ALAMAT: "",
    }]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(nisn: &str) -> Value {
        json!({
            "NISN": nisn,
            "Nama": "Siswa",
            "Nama Wali": "Wali",
            "Kelas": "2A",
            "Angkatan": 2024,
            "No HP": "0812",
            "Jenis_Kelamin": "P",
        })
    }

    #[test]
    fn accepts_numeric_cells() {
        let mut r = row("1");
        r["NISN"] = json!(1234567890u64);
        r["Angkatan"] = json!("2023");
        let s = validate_row(&r).unwrap();
        assert_eq!(s.nisn, "1234567890");
        assert_eq!(s.angkatan, "2023");
        assert_eq!(s.jenis_kelamin, Sex::P);
    }

    #[test]
    fn rejects_bad_sex_and_year() {
        let mut r = row("1");
        r["Jenis_Kelamin"] = json!("l");
        assert!(validate_row(&r).is_none());

        let mut r = row("1");
        r["Angkatan"] = json!("dua ribu");
        assert!(validate_row(&r).is_none());

        let mut r = row("1");
        r["Angkatan"] = json!(2024.5);
        assert!(validate_row(&r).is_none());

        assert!(validate_row(&json!("not an object")).is_none());
    }

    #[test]
    fn missing_cohort_year_skips_only_that_row() {
        let mut middle = row("2");
        middle.as_object_mut().unwrap().remove("Angkatan");
        let rows = vec![row("1"), middle, row("3")];

        let (valid, skipped) = validate_rows(&rows);
        assert_eq!(valid.len(), 2);
        assert_eq!(valid[0].0, 2);
        assert_eq!(valid[1].0, 4);
        assert_eq!(
            skipped,
            vec![SkippedRow {
                row: 3,
                reason: INVALID_ROW_REASON.to_string()
            }]
        );
    }

    #[test]
    fn cohort_year_and_column_limits_follow_form_rules() {
        let mut r = row("1");
        r["Angkatan"] = json!(20245);
        assert!(validate_row(&r).is_none());

        let mut r = row("1");
        r["Kelas"] = json!("KELAS-TERLALU-PANJANG");
        assert!(validate_row(&r).is_none());

        let mut r = row("1");
        r["Angkatan"] = json!(2024.0);
        assert_eq!(validate_row(&r).unwrap().angkatan, "2024");
    }

    #[test]
    fn blank_required_text_is_rejected() {
        let mut r = row("1");
        r["Nama Wali"] = json!("   ");
        assert!(validate_row(&r).is_none());
    }
}
