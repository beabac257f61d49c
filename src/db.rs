use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{FromRow, Pool, Postgres};
use std::str::FromStr;

use crate::config::AppConfig;
use crate::error::{SipesdaError, SipesdaResult};
use crate::fee::FeeType;

pub type DbPool = Pool<Postgres>;

pub fn init_pool_with_options(opts: PgConnectOptions) -> DbPool {
    // connect_lazy_with hands back the pool without touching the server.
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .idle_timeout(std::time::Duration::from_secs(120))
        .max_lifetime(std::time::Duration::from_secs(300))
        .connect_lazy_with(opts)
}

pub fn init_pool(database_url: &str) -> SipesdaResult<DbPool> {
    let opts = PgConnectOptions::from_str(database_url)
        .map_err(|e| SipesdaError::Internal(format!("Invalid DB URL: {}", e)))?
        .ssl_mode(PgSslMode::Prefer);

    Ok(init_pool_with_options(opts))
}

pub async fn init_database(pool: &DbPool, config: &AppConfig) -> SipesdaResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;

    ensure_seeds(pool, config).await?;
    tracing::info!("Database schema ready");

    Ok(())
}

async fn ensure_seeds(pool: &DbPool, config: &AppConfig) -> SipesdaResult<()> {
    let admin_exists: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = $1")
        .bind(&config.admin_username)
        .fetch_one(pool)
        .await?;
    if admin_exists.0 == 0 {
        let hash = bcrypt::hash(&config.admin_password, bcrypt::DEFAULT_COST)?;
        sqlx::query(
            "INSERT INTO users (username, password_hash, role) VALUES ($1, $2, 'admin') ON CONFLICT DO NOTHING",
        )
        .bind(&config.admin_username)
        .bind(hash)
        .execute(pool)
        .await?;
        tracing::info!("Seeded admin account '{}'", config.admin_username);
    }

    for fee in FeeType::ALL {
        sqlx::query(
            "INSERT INTO payment_types (nama, nominal, periode, aktif) VALUES ($1, $2, $3, TRUE) ON CONFLICT (nama) DO NOTHING",
        )
        .bind(fee.display_name())
        .bind(fee.amount_per_period())
        .bind(fee.recurrence().label())
        .execute(pool)
        .await?;
    }

    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub nisn: String,
    pub nama: String,
    pub nama_wali: String,
    pub kelas: String,
    pub angkatan: String,
    pub alamat: Option<String>,
    pub no_hp: String,
    pub jenis_kelamin: String,
    #[sqlx(default)]
    pub created_at: Option<NaiveDateTime>,
    #[sqlx(default)]
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: i32,
    pub student_nisn: String,
    pub fee_type: Option<String>,
    pub period_month: Option<i16>,
    pub period_year: Option<i32>,
    pub jenis_pembayaran: String,
    pub nominal: i64,
    pub tanggal_pembayaran: NaiveDate,
    pub status: String,
    pub keterangan: Option<String>,
    pub catatan: Option<String>,
    pub petugas: Option<String>,
    #[sqlx(default)]
    pub receipt_id: Option<String>,
    #[sqlx(default)]
    pub created_at: Option<NaiveDateTime>,
    #[sqlx(default)]
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentType {
    pub id: i32,
    pub nama: String,
    pub nominal: i64,
    pub periode: String,
    pub aktif: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: String,
    #[sqlx(default)]
    pub created_at: Option<NaiveDateTime>,
}
