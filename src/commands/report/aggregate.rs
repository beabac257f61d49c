//! Payment status aggregation.
//!
//! Status is never stored: every report recomputes it from the payment rows. A period is
//! `lunas` as soon as one matching payment exists, while money totals add up every matching
//! payment, so a duplicated month reads as paid once but is counted twice in rupiah.

use crate::db::{Payment, Student};
use crate::fee::{parse_label, FeeType, Month, ParsedLabel};
use chrono::Datelike;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

pub const GRADES: std::ops::RangeInclusive<u8> = 1..=6;
pub const SECTIONS: [char; 4] = ['A', 'B', 'C', 'D'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodStatus {
    Lunas,
    BelumLunas,
}

impl PeriodStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PeriodStatus::Lunas => "Lunas",
            PeriodStatus::BelumLunas => "Belum Lunas",
        }
    }
}

/// Sums amounts, saturating instead of overflowing on corrupt rows.
pub fn total_amount<I: IntoIterator<Item = i64>>(amounts: I) -> i64 {
    amounts.into_iter().fold(0, i64::saturating_add)
}

/// Structured period fields win; the label fills whatever is missing.
pub fn resolve_period(payment: &Payment) -> ParsedLabel {
    let from_label = parse_label(&payment.jenis_pembayaran);
    ParsedLabel {
        fee_type: payment
            .fee_type
            .as_deref()
            .and_then(|code| code.parse().ok())
            .or(from_label.fee_type),
        month: payment
            .period_month
            .and_then(|m| u32::try_from(m).ok())
            .and_then(Month::from_number)
            .or(from_label.month),
        year: payment.period_year.or(from_label.year),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodFilter {
    pub fee_type: FeeType,
    pub year: i32,
    pub month: Option<Month>,
}

impl PeriodFilter {
    pub fn new(fee_type: FeeType, year: i32, month: Option<Month>) -> Self {
        Self {
            fee_type,
            year,
            month,
        }
    }

    /// Monthly fees match on the billed period, everything else on the payment date's year.
    pub fn matches(&self, payment: &Payment) -> bool {
        let period = resolve_period(payment);
        if period.fee_type != Some(self.fee_type) {
            return false;
        }
        if self.fee_type.is_monthly() {
            period.year == Some(self.year)
                && match self.month {
                    Some(m) => period.month == Some(m),
                    None => true,
                }
        } else {
            payment.tanggal_pembayaran.year() == self.year
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthStatus {
    pub month: Month,
    pub month_number: u32,
    pub year: i32,
    pub kelas: String,
    pub expected_amount: i64,
    pub paid_amount: i64,
    pub payment_count: usize,
    pub status: PeriodStatus,
    /// More than one payment recorded for the same period.
    pub duplicate: bool,
}

pub fn monthly_status(
    student: &Student,
    payments: &[Payment],
    fee_type: FeeType,
    year: i32,
) -> Vec<MonthStatus> {
    Month::ALL
        .into_iter()
        .map(|month| {
            let filter = PeriodFilter::new(fee_type, year, Some(month));
            let matching: Vec<&Payment> = payments.iter().filter(|p| filter.matches(p)).collect();
            let payment_count = matching.len();
            MonthStatus {
                month,
                month_number: month.number(),
                year,
                kelas: student.kelas.clone(),
                expected_amount: fee_type.amount_per_period(),
                paid_amount: total_amount(matching.iter().map(|p| p.nominal)),
                payment_count,
                status: if payment_count > 0 {
                    PeriodStatus::Lunas
                } else {
                    PeriodStatus::BelumLunas
                },
                duplicate: payment_count > 1,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassSummary {
    pub kelas: String,
    pub grade: Option<u8>,
    pub total_students: usize,
    pub paid_students: usize,
    pub unpaid_students: usize,
    pub total_paid: i64,
    pub total_unpaid: i64,
    pub paid_percent: f64,
    pub unpaid_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CohortReport {
    pub fee_type: FeeType,
    pub year: i32,
    pub month: Option<Month>,
    pub cohort: Option<String>,
    pub male_students: usize,
    pub female_students: usize,
    pub total_students: usize,
    pub total_paid: i64,
    pub total_unpaid: i64,
    pub classes: Vec<ClassSummary>,
}

/// One student's standing for a fee period, used by the detail sheet.
#[derive(Debug, Clone, Serialize)]
pub struct StudentStanding {
    pub nisn: String,
    pub nama: String,
    pub kelas: String,
    pub angkatan: String,
    pub payment_count: usize,
    pub paid_amount: i64,
    pub status: PeriodStatus,
}

pub fn canonical_classes() -> Vec<String> {
    GRADES
        .flat_map(|grade| SECTIONS.iter().map(move |s| format!("{}{}", grade, s)))
        .collect()
}

/// Leading grade digit of a class label, `5` for `5C`.
pub fn grade_of(kelas: &str) -> Option<u8> {
    kelas
        .chars()
        .next()
        .and_then(|c| c.to_digit(10))
        .and_then(|d| u8::try_from(d).ok())
        .filter(|g| GRADES.contains(g))
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

pub fn in_cohort(student: &Student, cohort: Option<&str>) -> bool {
    cohort.map_or(true, |c| student.angkatan.trim() == c.trim())
}

/// Groups matching payments by student key.
fn matching_by_student<'a>(
    payments: &'a [Payment],
    filter: &PeriodFilter,
) -> HashMap<&'a str, Vec<&'a Payment>> {
    let mut map: HashMap<&str, Vec<&Payment>> = HashMap::new();
    for payment in payments.iter().filter(|p| filter.matches(p)) {
        map.entry(payment.student_nisn.as_str())
            .or_default()
            .push(payment);
    }
    map
}

pub fn student_standings(
    students: &[Student],
    payments: &[Payment],
    filter: PeriodFilter,
    cohort: Option<&str>,
) -> Vec<StudentStanding> {
    let by_student = matching_by_student(payments, &filter);
    students
        .iter()
        .filter(|s| in_cohort(s, cohort))
        .map(|s| {
            let matching = by_student.get(s.nisn.as_str());
            let payment_count = matching.map_or(0, |v| v.len());
            StudentStanding {
                nisn: s.nisn.clone(),
                nama: s.nama.clone(),
                kelas: s.kelas.clone(),
                angkatan: s.angkatan.clone(),
                payment_count,
                paid_amount: matching.map_or(0, |v| total_amount(v.iter().map(|p| p.nominal))),
                status: if payment_count > 0 {
                    PeriodStatus::Lunas
                } else {
                    PeriodStatus::BelumLunas
                },
            }
        })
        .collect()
}

pub fn class_rollup(
    students: &[Student],
    payments: &[Payment],
    filter: PeriodFilter,
    cohort: Option<&str>,
) -> CohortReport {
    let standings = student_standings(students, payments, filter, cohort);

    let mut labels = canonical_classes();
    let extra: BTreeSet<&str> = standings
        .iter()
        .map(|s| s.kelas.as_str())
        .filter(|k| !labels.iter().any(|l| l == k))
        .collect();
    labels.extend(extra.into_iter().map(str::to_string));

    let classes: Vec<ClassSummary> = labels
        .into_iter()
        .map(|kelas| {
            let members: Vec<&StudentStanding> =
                standings.iter().filter(|s| s.kelas == kelas).collect();
            let total_students = members.len();
            let paid_students = members
                .iter()
                .filter(|s| s.status == PeriodStatus::Lunas)
                .count();
            let unpaid_students = total_students - paid_students;
            let total_paid = total_amount(members.iter().map(|s| s.paid_amount));
            let total_unpaid = if filter.fee_type.is_monthly() {
                0
            } else {
                let expected = (total_students as i64).saturating_mul(filter.fee_type.amount_per_period());
                (expected - total_paid).max(0)
            };
            ClassSummary {
                grade: grade_of(&kelas),
                kelas,
                total_students,
                paid_students,
                unpaid_students,
                total_paid,
                total_unpaid,
                paid_percent: percent(paid_students, total_students),
                unpaid_percent: percent(unpaid_students, total_students),
            }
        })
        .collect();

    let cohort_students = students.iter().filter(|s| in_cohort(s, cohort));
    let (male_students, female_students) =
        cohort_students.fold((0, 0), |(l, p), s| match s.jenis_kelamin.as_str() {
            "L" => (l + 1, p),
            "P" => (l, p + 1),
            _ => (l, p),
        });

    CohortReport {
        fee_type: filter.fee_type,
        year: filter.year,
        month: filter.month,
        cohort: cohort.map(str::to_string),
        male_students,
        female_students,
        total_students: standings.len(),
        total_paid: total_amount(classes.iter().map(|c| c.total_paid)),
        total_unpaid: total_amount(classes.iter().map(|c| c.total_unpaid)),
        classes,
    }
}

/// Splits a history into SPP payments and everything else.
pub fn split_history(payments: Vec<Payment>) -> (Vec<Payment>, Vec<Payment>) {
    payments
        .into_iter()
        .partition(|p| resolve_period(p).fee_type == Some(FeeType::Spp))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::db::{Payment, Student};
    use chrono::NaiveDate;

    pub fn student(nisn: &str, kelas: &str, angkatan: &str, jenis_kelamin: &str) -> Student {
        Student {
            nisn: nisn.to_string(),
            nama: format!("Siswa {}", nisn),
            nama_wali: "Wali".to_string(),
            kelas: kelas.to_string(),
            angkatan: angkatan.to_string(),
            alamat: None,
            no_hp: "08123456789".to_string(),
            jenis_kelamin: jenis_kelamin.to_string(),
            created_at: None,
            updated_at: None,
        }
    }

    /// A legacy row: only the free-text label carries the period.
    pub fn legacy_payment(id: i32, nisn: &str, label: &str, nominal: i64, date: &str) -> Payment {
        Payment {
            id,
            student_nisn: nisn.to_string(),
            fee_type: None,
            period_month: None,
            period_year: None,
            jenis_pembayaran: label.to_string(),
            nominal,
            tanggal_pembayaran: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            status: "lunas".to_string(),
            keterangan: None,
            catatan: None,
            petugas: Some("Admin".to_string()),
            receipt_id: None,
            created_at: None,
            updated_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn zero_payments_means_every_month_unpaid() {
        let s = student("1", "1A", "2024", "L");
        let status = monthly_status(&s, &[], FeeType::Spp, 2024);
        assert_eq!(status.len(), 12);
        assert!(status.iter().all(|m| m.status == PeriodStatus::BelumLunas));
        assert!(status.iter().all(|m| m.paid_amount == 0));
    }

    #[test]
    fn structured_fields_take_precedence_over_label() {
        let mut p = legacy_payment(1, "1", "SPP Januari 2024", 100_000, "2024-01-05");
        p.fee_type = Some("SPP".to_string());
        p.period_month = Some(3);
        p.period_year = Some(2024);

        let period = resolve_period(&p);
        assert_eq!(period.month, Some(Month::Maret));
        assert!(PeriodFilter::new(FeeType::Spp, 2024, Some(Month::Maret)).matches(&p));
        assert!(!PeriodFilter::new(FeeType::Spp, 2024, Some(Month::Januari)).matches(&p));
    }

    #[test]
    fn monthly_fee_matches_billed_year_not_payment_date() {
        // December 2023 tuition paid in January 2024.
        let p = legacy_payment(1, "1", "SPP Desember 2023", 100_000, "2024-01-03");
        assert!(PeriodFilter::new(FeeType::Spp, 2023, Some(Month::Desember)).matches(&p));
        assert!(!PeriodFilter::new(FeeType::Spp, 2024, None).matches(&p));
    }

    #[test]
    fn yearly_fee_matches_payment_date_year() {
        let p = legacy_payment(1, "1", "Buku LKS", 250_000, "2024-07-15");
        assert!(PeriodFilter::new(FeeType::Lks, 2024, None).matches(&p));
        assert!(!PeriodFilter::new(FeeType::Lks, 2023, None).matches(&p));
        assert!(!PeriodFilter::new(FeeType::Seragam, 2024, None).matches(&p));
    }

    #[test]
    fn empty_class_has_zero_progress() {
        let report = class_rollup(&[], &[], PeriodFilter::new(FeeType::Seragam, 2024, None), None);
        assert_eq!(report.classes.len(), 24);
        for class in &report.classes {
            assert_eq!(class.total_students, 0);
            assert_eq!(class.paid_percent, 0.0);
            assert_eq!(class.unpaid_percent, 0.0);
            assert_eq!(class.total_unpaid, 0);
        }
    }

    #[test]
    fn non_recurring_unpaid_amount_is_clamped() {
        let students = vec![student("1", "2B", "2024", "P")];
        // Overpaid: two uniform payments against one expected.
        let payments = vec![
            legacy_payment(1, "1", "Seragam 2024", 300_000, "2024-07-01"),
            legacy_payment(2, "1", "Seragam 2024", 300_000, "2024-07-02"),
        ];
        let report = class_rollup(
            &students,
            &payments,
            PeriodFilter::new(FeeType::Seragam, 2024, None),
            None,
        );
        let class = report.classes.iter().find(|c| c.kelas == "2B").unwrap();
        assert_eq!(class.total_paid, 600_000);
        assert_eq!(class.total_unpaid, 0);
    }

    #[test]
    fn non_recurring_unpaid_amount_counts_missing_students() {
        let students = vec![
            student("1", "3C", "2024", "L"),
            student("2", "3C", "2024", "P"),
            student("3", "3C", "2024", "P"),
        ];
        let payments = vec![legacy_payment(1, "2", "Kegiatan 2024", 200_000, "2024-08-01")];
        let report = class_rollup(
            &students,
            &payments,
            PeriodFilter::new(FeeType::Kegiatan, 2024, None),
            None,
        );
        let class = report.classes.iter().find(|c| c.kelas == "3C").unwrap();
        assert_eq!(class.paid_students, 1);
        assert_eq!(class.unpaid_students, 2);
        assert_eq!(class.total_unpaid, 400_000);
        assert_eq!(report.male_students, 1);
        assert_eq!(report.female_students, 2);
        assert_eq!(report.total_unpaid, 400_000);
    }

    #[test]
    fn cohort_filter_limits_students() {
        let students = vec![
            student("1", "1A", "2024", "L"),
            student("2", "1A", "2023", "L"),
        ];
        let report = class_rollup(
            &students,
            &[],
            PeriodFilter::new(FeeType::Spp, 2024, None),
            Some("2024"),
        );
        assert_eq!(report.total_students, 1);
        assert_eq!(report.male_students, 1);
    }

    #[test]
    fn non_standard_class_labels_are_kept() {
        let students = vec![student("1", "Inklusi", "2024", "L")];
        let report = class_rollup(
            &students,
            &[],
            PeriodFilter::new(FeeType::Spp, 2024, None),
            None,
        );
        assert_eq!(report.classes.len(), 25);
        let extra = report.classes.last().unwrap();
        assert_eq!(extra.kelas, "Inklusi");
        assert_eq!(extra.grade, None);
        assert_eq!(extra.total_students, 1);
    }

    #[test]
    fn history_split_separates_spp() {
        let payments = vec![
            legacy_payment(1, "1", "SPP Januari 2024", 100_000, "2024-01-05"),
            legacy_payment(2, "1", "Buku LKS 2024", 250_000, "2024-01-05"),
        ];
        let (spp, other) = split_history(payments);
        assert_eq!(spp.len(), 1);
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].id, 2);
    }

    #[test]
    fn oversized_amounts_saturate_instead_of_overflowing() {
        let students = vec![student("1", "1A", "2024", "L")];
        let huge = i64::MAX / 2 + 1;
        let payments = vec![
            legacy_payment(1, "1", "Seragam 2024", huge, "2024-07-01"),
            legacy_payment(2, "1", "Seragam 2024", huge, "2024-07-02"),
        ];
        let report = class_rollup(
            &students,
            &payments,
            PeriodFilter::new(FeeType::Seragam, 2024, None),
            None,
        );
        assert_eq!(report.total_paid, i64::MAX);
        assert_eq!(report.total_unpaid, 0);
        assert!(report.classes.iter().all(|c| c.total_paid >= 0));
        assert_eq!(total_amount([i64::MAX, 1]), i64::MAX);
    }
}
