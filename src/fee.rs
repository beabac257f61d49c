//! Fee catalog, the canonical months and the legacy payment-label parser.
//!
//! Payments carry a structured `(fee_type, period_month, period_year)` triple. Older rows
//! only have a free-text label such as `SPP Januari 2024`; [`parse_label`] recovers the
//! triple from those.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recurrence {
    Monthly,
    Yearly,
    Once,
}

impl Recurrence {
    pub fn label(&self) -> &'static str {
        match self {
            Recurrence::Monthly => "Bulanan",
            Recurrence::Yearly => "Tahunan",
            Recurrence::Once => "Sekali",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum FeeType {
    #[serde(rename = "SPP")]
    Spp,
    #[serde(rename = "LKS")]
    Lks,
    #[serde(rename = "SERAGAM")]
    Seragam,
    #[serde(rename = "EKSKUL")]
    Ekskul,
    #[serde(rename = "KEGIATAN")]
    Kegiatan,
}

impl FeeType {
    pub const ALL: [FeeType; 5] = [
        FeeType::Spp,
        FeeType::Lks,
        FeeType::Seragam,
        FeeType::Ekskul,
        FeeType::Kegiatan,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            FeeType::Spp => "SPP",
            FeeType::Lks => "LKS",
            FeeType::Seragam => "SERAGAM",
            FeeType::Ekskul => "EKSKUL",
            FeeType::Kegiatan => "KEGIATAN",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            FeeType::Spp => "Pembayaran SPP",
            FeeType::Lks => "Pembayaran LKS",
            FeeType::Seragam => "Pembayaran Seragam",
            FeeType::Ekskul => "Pembayaran Ekstrakurikuler",
            FeeType::Kegiatan => "Pembayaran Kegiatan",
        }
    }

    /// Leading words used in payment labels.
    pub fn label_name(&self) -> &'static str {
        match self {
            FeeType::Spp => "SPP",
            FeeType::Lks => "Buku LKS",
            FeeType::Seragam => "Seragam",
            FeeType::Ekskul => "Ekstrakulikuler",
            FeeType::Kegiatan => "Kegiatan",
        }
    }

    /// Fixed expected amount per student per period, in rupiah.
    ///
    /// Reports and receipts use this constant rather than the `payment_types` table so
    /// that a receipt total always agrees with the class rollup.
    pub fn amount_per_period(&self) -> i64 {
        match self {
            FeeType::Spp => 100_000,
            FeeType::Lks => 250_000,
            FeeType::Seragam => 300_000,
            FeeType::Ekskul => 150_000,
            FeeType::Kegiatan => 200_000,
        }
    }

    pub fn recurrence(&self) -> Recurrence {
        match self {
            FeeType::Spp => Recurrence::Monthly,
            FeeType::Lks | FeeType::Ekskul | FeeType::Kegiatan => Recurrence::Yearly,
            FeeType::Seragam => Recurrence::Once,
        }
    }

    pub fn is_monthly(&self) -> bool {
        self.recurrence() == Recurrence::Monthly
    }

    fn from_word(word: &str) -> Option<FeeType> {
        match word.to_lowercase().as_str() {
            "spp" => Some(FeeType::Spp),
            "lks" | "buku" => Some(FeeType::Lks),
            "seragam" => Some(FeeType::Seragam),
            "ekskul" | "ekstrakulikuler" | "ekstrakurikuler" => Some(FeeType::Ekskul),
            "kegiatan" => Some(FeeType::Kegiatan),
            _ => None,
        }
    }
}

impl fmt::Display for FeeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for FeeType {
    type Err = String;

    /// Accepts a code (`SPP`), a label (`Buku LKS`) or a display name (`Pembayaran Seragam`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        words(s)
            .find_map(FeeType::from_word)
            .ok_or_else(|| format!("Jenis pembayaran tidak dikenal: {}", s))
    }
}

impl TryFrom<String> for FeeType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "MonthInput")]
pub enum Month {
    Januari = 1,
    Februari,
    Maret,
    April,
    Mei,
    Juni,
    Juli,
    Agustus,
    September,
    Oktober,
    November,
    Desember,
}

impl Month {
    pub const ALL: [Month; 12] = [
        Month::Januari,
        Month::Februari,
        Month::Maret,
        Month::April,
        Month::Mei,
        Month::Juni,
        Month::Juli,
        Month::Agustus,
        Month::September,
        Month::Oktober,
        Month::November,
        Month::Desember,
    ];

    pub fn number(&self) -> u32 {
        *self as u32
    }

    pub fn from_number(n: u32) -> Option<Month> {
        if (1..=12).contains(&n) {
            Some(Month::ALL[(n - 1) as usize])
        } else {
            None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Month::Januari => "Januari",
            Month::Februari => "Februari",
            Month::Maret => "Maret",
            Month::April => "April",
            Month::Mei => "Mei",
            Month::Juni => "Juni",
            Month::Juli => "Juli",
            Month::Agustus => "Agustus",
            Month::September => "September",
            Month::Oktober => "Oktober",
            Month::November => "November",
            Month::Desember => "Desember",
        }
    }

    /// Three-letter code used by the old dashboard.
    pub fn code(&self) -> &'static str {
        match self {
            Month::Januari => "JAN",
            Month::Februari => "FEB",
            Month::Maret => "MAR",
            Month::April => "APR",
            Month::Mei => "MEI",
            Month::Juni => "JUN",
            Month::Juli => "JUL",
            Month::Agustus => "AUG",
            Month::September => "SEP",
            Month::Oktober => "OKT",
            Month::November => "NOV",
            Month::Desember => "DES",
        }
    }

    fn from_word(word: &str) -> Option<Month> {
        let lower = word.to_lowercase();
        if lower == "agu" || lower == "ags" {
            return Some(Month::Agustus);
        }
        Month::ALL
            .into_iter()
            .find(|m| m.name().to_lowercase() == lower || m.code().to_lowercase() == lower)
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Month {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(n) = trimmed.parse::<u32>() {
            return Month::from_number(n).ok_or_else(|| format!("Bulan tidak valid: {}", s));
        }
        Month::from_word(trimmed).ok_or_else(|| format!("Bulan tidak valid: {}", s))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MonthInput {
    Number(u32),
    Text(String),
}

impl TryFrom<MonthInput> for Month {
    type Error = String;

    fn try_from(value: MonthInput) -> Result<Self, Self::Error> {
        match value {
            MonthInput::Number(n) => {
                Month::from_number(n).ok_or_else(|| format!("Bulan tidak valid: {}", n))
            }
            MonthInput::Text(s) => s.parse(),
        }
    }
}

/// Period triple recovered from a free-text label. Any part may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParsedLabel {
    pub fee_type: Option<FeeType>,
    pub month: Option<Month>,
    pub year: Option<i32>,
}

pub fn parse_label(label: &str) -> ParsedLabel {
    let mut parsed = ParsedLabel::default();
    for word in words(label) {
        if parsed.fee_type.is_none() {
            if let Some(fee) = FeeType::from_word(word) {
                parsed.fee_type = Some(fee);
                continue;
            }
        }
        if parsed.year.is_none() && word.len() == 4 {
            if let Ok(year) = word.parse::<i32>() {
                parsed.year = Some(year);
                continue;
            }
        }
        if parsed.month.is_none() {
            parsed.month = Month::from_word(word);
        }
    }
    parsed
}

/// `SPP Januari 2024` for monthly fees, `Buku LKS 2024` otherwise.
pub fn format_label(fee: FeeType, month: Option<Month>, year: i32) -> String {
    match month {
        Some(m) if fee.is_monthly() => format!("{} {} {}", fee.label_name(), m.name(), year),
        _ => format!("{} {}", fee.label_name(), year),
    }
}

fn words(s: &str) -> impl Iterator<Item = &str> {
    s.split(|c: char| c.is_whitespace() || c == '-' || c == '/' || c == ',' || c == '_')
        .filter(|w| !w.is_empty())
}

/// Formats an amount the way receipts print it: `200.000`.
pub fn format_rupiah(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    if amount < 0 {
        format!("-{}", out)
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_month_labels() {
        let parsed = parse_label("SPP Januari 2024");
        assert_eq!(parsed.fee_type, Some(FeeType::Spp));
        assert_eq!(parsed.month, Some(Month::Januari));
        assert_eq!(parsed.year, Some(2024));
    }

    #[test]
    fn parses_legacy_month_codes() {
        let parsed = parse_label("SPP AUG 2023");
        assert_eq!(parsed.month, Some(Month::Agustus));
        assert_eq!(parsed.year, Some(2023));

        assert_eq!(parse_label("spp des 2022").month, Some(Month::Desember));
    }

    #[test]
    fn non_monthly_labels_have_no_month() {
        let parsed = parse_label("Buku LKS 2024");
        assert_eq!(parsed.fee_type, Some(FeeType::Lks));
        assert_eq!(parsed.month, None);
        assert_eq!(parsed.year, Some(2024));

        assert_eq!(parse_label("Seragam").fee_type, Some(FeeType::Seragam));
        assert_eq!(parse_label("Uang gedung 2024").fee_type, None);
    }

    #[test]
    fn fee_type_accepts_codes_and_names() {
        assert_eq!("spp".parse::<FeeType>(), Ok(FeeType::Spp));
        assert_eq!("SPP Bulanan".parse::<FeeType>(), Ok(FeeType::Spp));
        assert_eq!("Ekstrakulikuler".parse::<FeeType>(), Ok(FeeType::Ekskul));
        assert_eq!("Pembayaran Kegiatan".parse::<FeeType>(), Ok(FeeType::Kegiatan));
        assert!("Infaq".parse::<FeeType>().is_err());
    }

    #[test]
    fn month_parses_numbers_names_and_codes() {
        assert_eq!("3".parse::<Month>(), Ok(Month::Maret));
        assert_eq!("oktober".parse::<Month>(), Ok(Month::Oktober));
        assert_eq!("MEI".parse::<Month>(), Ok(Month::Mei));
        assert!("13".parse::<Month>().is_err());
        assert!("Smarch".parse::<Month>().is_err());
    }

    #[test]
    fn month_deserializes_from_json_number_or_text() {
        let months: Vec<Month> = serde_json::from_str(r#"[1, "Februari", "MAR"]"#).unwrap();
        assert_eq!(months, vec![Month::Januari, Month::Februari, Month::Maret]);
    }

    #[test]
    fn label_round_trips_through_parser() {
        let label = format_label(FeeType::Spp, Some(Month::Juli), 2024);
        assert_eq!(label, "SPP Juli 2024");
        let parsed = parse_label(&label);
        assert_eq!(parsed.month, Some(Month::Juli));

        assert_eq!(format_label(FeeType::Kegiatan, Some(Month::Juli), 2024), "Kegiatan 2024");
    }

    #[test]
    fn rupiah_grouping() {
        assert_eq!(format_rupiah(0), "0");
        assert_eq!(format_rupiah(100000), "100.000");
        assert_eq!(format_rupiah(1250000), "1.250.000");
        assert_eq!(format_rupiah(-5000), "-5.000");
    }
}
