pub mod import;

use crate::db::{DbPool, Student};
use crate::error::{SipesdaError, SipesdaResult};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    L,
    P,
}

impl Sex {
    pub fn parse(s: &str) -> Option<Sex> {
        match s {
            "L" => Some(Sex::L),
            "P" => Some(Sex::P),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::L => "L",
            Sex::P => "P",
        }
    }
}

pub const NISN_MAX: usize = 20;
pub const NAME_MAX: usize = 255;
pub const KELAS_MAX: usize = 10;
pub const NO_HP_MAX: usize = 30;

/// Trims and length-checks a free-text field. Limits mirror the column sizes.
pub fn optional_field(label: &str, value: &str, max: usize) -> SipesdaResult<String> {
    let value = value.trim();
    if value.chars().count() > max {
        return Err(SipesdaError::Validation(format!(
            "{} maksimal {} karakter",
            label, max
        )));
    }
    Ok(value.to_string())
}

pub fn required_field(label: &str, value: &str, max: usize) -> SipesdaResult<String> {
    let value = optional_field(label, value, max)?;
    if value.is_empty() {
        return Err(SipesdaError::Validation(format!("{} harus diisi", label)));
    }
    Ok(value)
}

/// Cohort years are four digits, e.g. `2024`.
pub fn cohort_year(value: &str) -> SipesdaResult<String> {
    let value = value.trim();
    if value.len() == 4 && value.chars().all(|c| c.is_ascii_digit()) {
        Ok(value.to_string())
    } else {
        Err(SipesdaError::Validation(
            "Angkatan harus berupa tahun 4 digit".to_string(),
        ))
    }
}

pub fn parse_sex(value: &str) -> SipesdaResult<Sex> {
    Sex::parse(value.trim())
        .ok_or_else(|| SipesdaError::Validation("Jenis kelamin harus L atau P".to_string()))
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudentInput {
    pub nisn: String,
    pub nama: String,
    pub nama_wali: Option<String>,
    pub kelas: String,
    pub angkatan: Option<String>,
    pub alamat: Option<String>,
    pub no_hp: Option<String>,
    pub jenis_kelamin: Option<String>,
}

/// Partial update. The older form field names are still accepted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentUpdate {
    pub nisn: Option<String>,
    pub nama: Option<String>,
    #[serde(alias = "nama_orang_tua")]
    pub nama_wali: Option<String>,
    pub kelas: Option<String>,
    pub angkatan: Option<String>,
    pub alamat: Option<String>,
    #[serde(alias = "no_telepon")]
    pub no_hp: Option<String>,
    pub jenis_kelamin: Option<String>,
}

impl StudentUpdate {
    fn is_empty(&self) -> bool {
        self.nisn.is_none()
            && self.nama.is_none()
            && self.nama_wali.is_none()
            && self.kelas.is_none()
            && self.angkatan.is_none()
            && self.alamat.is_none()
            && self.no_hp.is_none()
            && self.jenis_kelamin.is_none()
    }

    /// Applies the create-time rules to every field present.
    pub fn validate(self) -> SipesdaResult<StudentUpdate> {
        Ok(StudentUpdate {
            nisn: self
                .nisn
                .map(|v| required_field("NISN", &v, NISN_MAX))
                .transpose()?,
            nama: self
                .nama
                .map(|v| required_field("Nama", &v, NAME_MAX))
                .transpose()?,
            nama_wali: self
                .nama_wali
                .map(|v| optional_field("Nama wali", &v, NAME_MAX))
                .transpose()?,
            kelas: self
                .kelas
                .map(|v| required_field("Kelas", &v, KELAS_MAX))
                .transpose()?,
            angkatan: self.angkatan.map(|v| cohort_year(&v)).transpose()?,
            alamat: self.alamat,
            no_hp: self
                .no_hp
                .map(|v| optional_field("No HP", &v, NO_HP_MAX))
                .transpose()?,
            jenis_kelamin: self
                .jenis_kelamin
                .map(|v| parse_sex(&v).map(|sex| sex.as_str().to_string()))
                .transpose()?,
        })
    }
}

/// Validated row ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStudent {
    pub nisn: String,
    pub nama: String,
    pub nama_wali: String,
    pub kelas: String,
    pub angkatan: String,
    pub alamat: Option<String>,
    pub no_hp: String,
    pub jenis_kelamin: Sex,
}

impl StudentInput {
    pub fn validate(self) -> SipesdaResult<NewStudent> {
        let nisn = required_field("NISN", &self.nisn, NISN_MAX)?;
        let nama = required_field("Nama", &self.nama, NAME_MAX)?;
        let kelas = required_field("Kelas", &self.kelas, KELAS_MAX)?;

        let jenis_kelamin = match self.jenis_kelamin.as_deref().map(str::trim) {
            None | Some("") => Sex::L,
            Some(s) => parse_sex(s)?,
        };

        let angkatan = match self.angkatan.as_deref().map(str::trim) {
            None | Some("") => chrono::Local::now().format("%Y").to_string(),
            Some(a) => cohort_year(a)?,
        };

        Ok(NewStudent {
            nisn,
            nama,
            nama_wali: optional_field(
                "Nama wali",
                self.nama_wali.as_deref().unwrap_or_default(),
                NAME_MAX,
            )?,
            kelas,
            angkatan,
            alamat: self.alamat.filter(|a| !a.trim().is_empty()),
            no_hp: optional_field("No HP", self.no_hp.as_deref().unwrap_or_default(), NO_HP_MAX)?,
            jenis_kelamin,
        })
    }
}

pub async fn find_student(pool: &DbPool, nisn: &str) -> SipesdaResult<Option<Student>> {
    Ok(
        sqlx::query_as::<_, Student>("SELECT * FROM students WHERE nisn = $1")
            .bind(nisn)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn list_students(pool: &DbPool) -> SipesdaResult<Vec<Student>> {
    Ok(
        sqlx::query_as::<_, Student>("SELECT * FROM students ORDER BY kelas, nama")
            .fetch_all(pool)
            .await?,
    )
}

pub async fn insert_student(pool: &DbPool, student: &NewStudent) -> SipesdaResult<()> {
    let result = sqlx::query(
        "INSERT INTO students (nisn, nama, nama_wali, kelas, angkatan, alamat, no_hp, jenis_kelamin)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(&student.nisn)
    .bind(&student.nama)
    .bind(&student.nama_wali)
    .bind(&student.kelas)
    .bind(&student.angkatan)
    .bind(&student.alamat)
    .bind(&student.no_hp)
    .bind(student.jenis_kelamin.as_str())
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(SipesdaError::Conflict(
            format!("NISN {} sudah terdaftar", student.nisn),
        )),
        Err(e) => Err(e.into()),
    }
}

pub async fn get_students_axum(State(state): State<AppState>) -> SipesdaResult<Json<Vec<Student>>> {
    Ok(Json(list_students(&state.pool).await?))
}

pub async fn get_student_axum(
    State(state): State<AppState>,
    Path(nisn): Path<String>,
) -> SipesdaResult<Json<Option<Student>>> {
    Ok(Json(find_student(&state.pool, &nisn).await?))
}

pub async fn create_student_axum(
    State(state): State<AppState>,
    Json(input): Json<StudentInput>,
) -> SipesdaResult<Json<Value>> {
    let student = input.validate()?;
    insert_student(&state.pool, &student).await?;
    tracing::info!("Student {} created", student.nisn);

    Ok(Json(json!({
        "message": "Siswa berhasil ditambahkan",
        "nisn": student.nisn,
    })))
}

pub async fn update_student_axum(
    State(state): State<AppState>,
    Path(nisn): Path<String>,
    Json(update): Json<StudentUpdate>,
) -> SipesdaResult<Json<Value>> {
    if update.is_empty() {
        return Err(SipesdaError::Validation(
            "Tidak ada data yang diperbarui".to_string(),
        ));
    }
    let update = update.validate()?;

    let result = sqlx::query(
        "UPDATE students SET
            nisn = COALESCE($1, nisn),
            nama = COALESCE($2, nama),
            nama_wali = COALESCE($3, nama_wali),
            kelas = COALESCE($4, kelas),
            angkatan = COALESCE($5, angkatan),
            alamat = COALESCE($6, alamat),
            no_hp = COALESCE($7, no_hp),
            jenis_kelamin = COALESCE($8, jenis_kelamin),
            updated_at = NOW()
         WHERE nisn = $9",
    )
    .bind(update.nisn.as_deref())
    .bind(update.nama.as_deref())
    .bind(update.nama_wali.as_deref())
    .bind(update.kelas.as_deref())
    .bind(update.angkatan.as_deref())
    .bind(update.alamat.as_deref())
    .bind(update.no_hp.as_deref())
    .bind(update.jenis_kelamin.as_deref())
    .bind(&nisn)
    .execute(&state.pool)
    .await;

    let updated = match result {
        Ok(r) => r.rows_affected(),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(SipesdaError::Conflict("NISN sudah terdaftar".to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Json(json!({
        "message": "Siswa diperbarui",
        "updated": updated,
    })))
}

pub async fn delete_student_axum(
    State(state): State<AppState>,
    Path(nisn): Path<String>,
) -> SipesdaResult<Json<Value>> {
    let result = sqlx::query("DELETE FROM students WHERE nisn = $1")
        .bind(&nisn)
        .execute(&state.pool)
        .await?;
    tracing::info!("Student {} deleted ({} rows)", nisn, result.rows_affected());

    Ok(Json(json!({
        "message": "Siswa dihapus",
        "deleted": result.rows_affected(),
    })))
}
