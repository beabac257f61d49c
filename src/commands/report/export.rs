use super::aggregate::{
    class_rollup, in_cohort, monthly_status, student_standings, PeriodFilter, PeriodStatus,
};
use crate::db::{Payment, Student};
use crate::fee::Month;
use serde::Serialize;

pub const SUMMARY_SHEET: &str = "Ringkasan";
pub const DETAIL_SHEET: &str = "Detail Siswa";
pub const MONTHLY_SHEET: &str = "Riwayat Bulanan";

#[derive(Debug, Clone, Serialize)]
pub struct Sheet {
    pub name: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    fn new(name: &str, header: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        push_record(&mut out, &self.header);
        for row in &self.rows {
            push_record(&mut out, row);
        }
        out
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Workbook {
    pub title: String,
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name.trim()))
    }
}

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn push_record(out: &mut String, cells: &[String]) {
    let line = cells
        .iter()
        .map(|c| csv_quote(c))
        .collect::<Vec<_>>()
        .join(",");
    out.push_str(&line);
    out.push('\n');
}

pub fn build_workbook(
    students: &[Student],
    payments: &[Payment],
    filter: PeriodFilter,
    cohort: Option<&str>,
) -> Workbook {
    let report = class_rollup(students, payments, filter, cohort);

    let mut summary = Sheet::new(
        SUMMARY_SHEET,
        &[
            "Kelas",
            "Jumlah Siswa",
            "Sudah Bayar",
            "Belum Bayar",
            "Total Terbayar",
            "Total Tunggakan",
        ],
    );
    for class in report.classes.iter().filter(|c| c.total_students > 0) {
        summary.rows.push(vec![
            class.kelas.clone(),
            class.total_students.to_string(),
            class.paid_students.to_string(),
            class.unpaid_students.to_string(),
            class.total_paid.to_string(),
            class.total_unpaid.to_string(),
        ]);
    }
    summary.rows.push(vec![
        "TOTAL".to_string(),
        report.total_students.to_string(),
        report
            .classes
            .iter()
            .map(|c| c.paid_students)
            .sum::<usize>()
            .to_string(),
        report
            .classes
            .iter()
            .map(|c| c.unpaid_students)
            .sum::<usize>()
            .to_string(),
        report.total_paid.to_string(),
        report.total_unpaid.to_string(),
    ]);

    let mut detail = Sheet::new(
        DETAIL_SHEET,
        &[
            "NISN",
            "Nama",
            "Kelas",
            "Angkatan",
            "Jumlah Pembayaran",
            "Total Terbayar",
            "Status",
        ],
    );
    for standing in student_standings(students, payments, filter, cohort) {
        detail.rows.push(vec![
            standing.nisn,
            standing.nama,
            standing.kelas,
            standing.angkatan,
            standing.payment_count.to_string(),
            standing.paid_amount.to_string(),
            standing.status.label().to_string(),
        ]);
    }

    let mut sheets = vec![summary, detail];

    if filter.fee_type.is_monthly() {
        let mut header = vec!["NISN", "Nama", "Kelas"];
        header.extend(Month::ALL.iter().map(|m| m.name()));
        let mut monthly = Sheet::new(MONTHLY_SHEET, &header);
        for student in students.iter().filter(|s| in_cohort(s, cohort)) {
            let own: Vec<Payment> = payments
                .iter()
                .filter(|p| p.student_nisn == student.nisn)
                .cloned()
                .collect();
            let mut row = vec![
                student.nisn.clone(),
                student.nama.clone(),
                student.kelas.clone(),
            ];
            row.extend(
                monthly_status(student, &own, filter.fee_type, filter.year)
                    .into_iter()
                    .map(|m| match m.status {
                        PeriodStatus::Lunas => "Lunas".to_string(),
                        PeriodStatus::BelumLunas => "-".to_string(),
                    }),
            );
            monthly.rows.push(row);
        }
        sheets.push(monthly);
    }

    Workbook {
        title: format!(
            "Laporan {} {}",
            filter.fee_type.label_name(),
            filter.year
        ),
        sheets,
    }
}
