use crate::commands::payment::MAX_NOMINAL;
use crate::db::PaymentType;
use crate::error::{SipesdaError, SipesdaResult};
use crate::fee::Recurrence;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct PaymentTypeInput {
    pub nama: String,
    pub nominal: i64,
    pub periode: String,
    #[serde(default = "default_aktif")]
    pub aktif: bool,
}

fn default_aktif() -> bool {
    true
}

impl PaymentTypeInput {
    fn validate(&self) -> SipesdaResult<()> {
        if self.nama.trim().is_empty() {
            return Err(SipesdaError::Validation(
                "Nama jenis pembayaran harus diisi".to_string(),
            ));
        }
        if !(0..=MAX_NOMINAL).contains(&self.nominal) {
            return Err(SipesdaError::Validation(
                "Nominal di luar batas yang diizinkan".to_string(),
            ));
        }
        let known = [Recurrence::Monthly, Recurrence::Yearly, Recurrence::Once]
            .iter()
            .any(|r| r.label() == self.periode.trim());
        if !known {
            return Err(SipesdaError::Validation(format!(
                "Periode tidak dikenal: {}",
                self.periode
            )));
        }
        Ok(())
    }
}

pub async fn get_payment_types_axum(
    State(state): State<AppState>,
) -> SipesdaResult<Json<Vec<PaymentType>>> {
    let rows = sqlx::query_as::<_, PaymentType>(
        "SELECT * FROM payment_types WHERE aktif = TRUE ORDER BY id",
    )
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows))
}

pub async fn create_payment_type_axum(
    State(state): State<AppState>,
    Json(input): Json<PaymentTypeInput>,
) -> SipesdaResult<Json<Value>> {
    input.validate()?;

    let result: Result<(i32,), sqlx::Error> = sqlx::query_as(
        "INSERT INTO payment_types (nama, nominal, periode, aktif) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(input.nama.trim())
    .bind(input.nominal)
    .bind(input.periode.trim())
    .bind(input.aktif)
    .fetch_one(&state.pool)
    .await;

    match result {
        Ok((id,)) => Ok(Json(json!({ "message": "Jenis pembayaran ditambahkan", "id": id }))),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(SipesdaError::Conflict(
            format!("Jenis pembayaran {} sudah ada", input.nama.trim()),
        )),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periode_must_be_a_known_recurrence() {
        let input: PaymentTypeInput =
            serde_json::from_str(r#"{"nama": "Infaq", "nominal": 10000, "periode": "Bulanan"}"#)
                .unwrap();
        assert!(input.aktif);
        assert!(input.validate().is_ok());

        let bad: PaymentTypeInput =
            serde_json::from_str(r#"{"nama": "Infaq", "nominal": 10000, "periode": "Mingguan"}"#)
                .unwrap();
        assert!(bad.validate().is_err());

        let too_big: PaymentTypeInput = serde_json::from_str(
            r#"{"nama": "Gedung", "nominal": 9000000000000, "periode": "Sekali"}"#,
        )
        .unwrap();
        assert!(too_big.validate().is_err());
    }
}
