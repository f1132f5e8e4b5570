use std::fs;
use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use serde::Serialize;

use crate::config::CycleConfig;
use crate::error::Result;
use crate::schedule::{DeclineReason, Evaluation, Outcome, RunResult};

pub const ASSIGNED_HEADERS: [&str; 6] = ["Name", "Teacher", "Month", "Duration", "Attendance", "Eligibility"];
pub const DECLINED_HEADERS: [&str; 7] = [
    "Name",
    "Teacher",
    "Requested Month",
    "Requested Duration",
    "Eligibility",
    "Attendance",
    "Comment",
];
pub const MONTH_HEADERS: [&str; 5] = ["Name", "Teacher", "Duration", "Attendance", "Eligibility"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignedRow {
    pub name: String,
    pub teacher: String,
    pub month: String,
    pub duration: u32,
    pub attendance: f64,
    pub eligibility: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeclinedRow {
    pub name: String,
    pub teacher: String,
    pub requested_month: String,
    pub requested_duration: String,
    pub eligibility: String,
    pub attendance: f64,
    pub comment: String,
}

/// An assigned row without the month, which the report itself implies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthRow {
    pub name: String,
    pub teacher: String,
    pub duration: u32,
    pub attendance: f64,
    pub eligibility: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthReport {
    pub month: String,
    pub label: String,
    pub rows: Vec<MonthRow>,
}

/// All tabular output of one run.
#[derive(Debug, Clone, Serialize)]
pub struct Reports {
    pub assigned: Vec<AssignedRow>,
    pub declined: Vec<DeclinedRow>,
    pub months: Vec<MonthReport>,
}

/// One declined row per requested month, reasons repeated in turn.
fn declined_rows(evaluation: &Evaluation, reasons: &[DeclineReason]) -> Vec<DeclinedRow> {
    let performer = &evaluation.performer;
    [&performer.first_choice, &performer.second_choice]
        .into_iter()
        .zip(reasons.iter().cycle())
        .map(|(month, reason)| DeclinedRow {
            name: performer.name.clone(),
            teacher: performer.school.clone(),
            requested_month: month.to_string(),
            requested_duration: performer.requested.to_string(),
            eligibility: performer.eligibility.clone(),
            attendance: performer.attendance,
            comment: reason.to_string(),
        })
        .collect()
}

impl Reports {
    pub fn build(run: &RunResult, config: &CycleConfig) -> Self {
        let mut assigned = Vec::new();
        let mut declined = Vec::new();
        let mut months: Vec<MonthReport> = config
            .planned_months
            .iter()
            .map(|&month| MonthReport {
                month: month.name().to_string(),
                label: config.month_label(month),
                rows: Vec::new(),
            })
            .collect();

        for evaluation in &run.evaluations {
            let performer = &evaluation.performer;
            match &evaluation.outcome {
                Outcome::Assigned { month, minutes } => {
                    assigned.push(AssignedRow {
                        name: performer.name.clone(),
                        teacher: performer.school.clone(),
                        month: month.name().to_string(),
                        duration: *minutes,
                        attendance: performer.attendance,
                        eligibility: performer.eligibility.clone(),
                    });
                    if let Some(report) = months.iter_mut().find(|r| r.month == month.name()) {
                        report.rows.push(MonthRow {
                            name: performer.name.clone(),
                            teacher: performer.school.clone(),
                            duration: *minutes,
                            attendance: performer.attendance,
                            eligibility: performer.eligibility.clone(),
                        });
                    }
                }
                Outcome::Declined { reasons } => declined.extend(declined_rows(evaluation, reasons)),
            }
        }

        Self {
            assigned,
            declined,
            months,
        }
    }

    pub fn month(&self, name: &str) -> Option<&MonthReport> {
        self.months.iter().find(|r| r.month.eq_ignore_ascii_case(name))
    }
}

/// Writes a table with its header, then optionally a blank row and a count row.
fn write_table<P: AsRef<Path>>(
    path: P,
    headers: &[&str],
    rows: Vec<Vec<String>>,
    with_count: bool,
) -> Result<()> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_path(path)?;
    wtr.write_record(headers)?;

    let count = rows.len();
    for row in rows {
        wtr.write_record(&row)?;
    }

    if with_count {
        let blank = vec![String::new(); headers.len()];
        wtr.write_record(&blank)?;
        let mut summary = blank;
        summary[0] = format!("Count: {}", count);
        wtr.write_record(&summary)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Writes `assigned.csv`, `declined.csv` and one file per planned month.
pub fn write_reports<P: AsRef<Path>>(dir: P, reports: &Reports) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    let path = dir.join("assigned.csv");
    let rows = reports
        .assigned
        .iter()
        .map(|r| {
            vec![
                r.name.clone(),
                r.teacher.clone(),
                r.month.clone(),
                r.duration.to_string(),
                r.attendance.to_string(),
                r.eligibility.clone(),
            ]
        })
        .collect();
    write_table(&path, &ASSIGNED_HEADERS, rows, true)?;
    written.push(path);

    let path = dir.join("declined.csv");
    let rows = reports
        .declined
        .iter()
        .map(|r| {
            vec![
                r.name.clone(),
                r.teacher.clone(),
                r.requested_month.clone(),
                r.requested_duration.clone(),
                r.eligibility.clone(),
                r.attendance.to_string(),
                r.comment.clone(),
            ]
        })
        .collect();
    write_table(&path, &DECLINED_HEADERS, rows, true)?;
    written.push(path);

    for month in &reports.months {
        let path = dir.join(format!("{}.csv", month.label));
        let rows = month
            .rows
            .iter()
            .map(|r| {
                vec![
                    r.name.clone(),
                    r.teacher.clone(),
                    r.duration.to_string(),
                    r.attendance.to_string(),
                    r.eligibility.clone(),
                ]
            })
            .collect();
        write_table(&path, &MONTH_HEADERS, rows, false)?;
        written.push(path);
    }

    Ok(written)
}

/// Prints totals and each month's remaining capacity.
pub fn print_run_summary(run: &RunResult, config: &CycleConfig) {
    println!("\n=== Assignment Summary ===");
    println!("Performers evaluated: {}", run.evaluations.len());
    println!("Assigned: {}", run.assigned_count());
    println!("Declined: {}", run.declined_count());

    println!("\nRemaining capacity by month:");
    for &month in &config.planned_months {
        if let Some(capacity) = run.context.ledger.remaining(month) {
            let slots: Vec<String> = capacity
                .remaining_slots
                .iter()
                .map(|(minutes, left)| format!("{}m x{}", minutes, left))
                .collect();
            println!(
                "  {} -> {} of {} minutes left [{}]",
                config.month_label(month),
                capacity.remaining_time,
                config.time_budget,
                slots.join(", ")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{assign, MonthChoice, PerformerRecord, RequestedTime, SchoolExceptions};

    fn performer(name: &str, school: &str, attendance: f64, first: &str, second: &str, eligibility: &str) -> PerformerRecord {
        PerformerRecord {
            name: name.to_string(),
            school: school.to_string(),
            attendance,
            eligibility: eligibility.to_string(),
            first_choice: MonthChoice::parse(first, "None"),
            second_choice: MonthChoice::parse(second, "None"),
            requested: RequestedTime::Minutes(10),
        }
    }

    fn sample_run(config: &CycleConfig) -> RunResult {
        assign(
            config,
            SchoolExceptions::new(),
            vec![
                performer("Ada", "North", 9.0, "March", "April", "Y"),
                performer("Ben", "North", 8.0, "March", "Smarch", "Y"),
                performer("Cy", "South", 7.0, "April", "May", "NS"),
                performer("Di", "West", 6.0, "None", "None", "Y"),
            ],
        )
    }

    #[test]
    fn builds_all_report_families() {
        let config = CycleConfig::from_json(r#"{"cycle_year": 2021}"#).unwrap();
        let run = sample_run(&config);
        let reports = Reports::build(&run, &config);

        assert_eq!(reports.assigned.len(), 1);
        assert_eq!(reports.assigned[0].name, "Ada");
        assert_eq!(reports.assigned[0].month, "March");

        // Three declined performers, two rows each.
        assert_eq!(reports.declined.len(), 6);
        let ben: Vec<&str> = reports.declined.iter().filter(|r| r.name == "Ben").map(|r| r.comment.as_str()).collect();
        assert_eq!(ben, vec!["school limit for North reached for March", "Smarch is not a valid request"]);

        let cy: Vec<(&str, &str)> = reports
            .declined
            .iter()
            .filter(|r| r.name == "Cy")
            .map(|r| (r.requested_month.as_str(), r.comment.as_str()))
            .collect();
        assert_eq!(
            cy,
            vec![
                ("April", "ability to perform in this half is uncertain"),
                ("May", "ability to perform in this half is uncertain"),
            ]
        );

        let di: Vec<&str> = reports.declined.iter().filter(|r| r.name == "Di").map(|r| r.comment.as_str()).collect();
        assert_eq!(di, vec!["no request, deferring to manual assignment"; 2]);

        assert_eq!(reports.months.len(), 5);
        let march = reports.month("march").unwrap();
        assert_eq!(march.label, "March 2021");
        assert_eq!(march.rows.len(), 1);
        assert!(reports.month("April").unwrap().rows.is_empty());
    }

    #[test]
    fn writes_csv_files_with_counts() {
        let config = CycleConfig::from_json(r#"{"cycle_year": 2021}"#).unwrap();
        let reports = Reports::build(&sample_run(&config), &config);

        let dir = std::env::temp_dir().join(format!("recital_assigner_reports_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        let written = write_reports(&dir, &reports).unwrap();
        assert_eq!(written.len(), 7);

        let assigned = fs::read_to_string(dir.join("assigned.csv")).unwrap();
        let lines: Vec<&str> = assigned.lines().collect();
        assert_eq!(lines[0], "Name,Teacher,Month,Duration,Attendance,Eligibility");
        assert_eq!(lines[1], "Ada,North,March,10,9,Y");
        assert_eq!(lines[2], ",,,,,");
        assert_eq!(lines[3], "Count: 1,,,,,");

        let declined = fs::read_to_string(dir.join("declined.csv")).unwrap();
        assert!(declined.lines().any(|l| l == "Count: 6,,,,,,"));

        let march = fs::read_to_string(dir.join("March 2021.csv")).unwrap();
        assert_eq!(march.lines().nth(1), Some("Ada,North,10,9,Y"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn declined_rows_show_months_as_written() {
        let config = CycleConfig::from_json(r#"{"no_request": "N/A"}"#).unwrap();
        let mut lower = performer("Eve", "East", 5.0, "mar", "N/A", "Y");
        lower.first_choice = MonthChoice::parse("mar", "N/A");
        lower.second_choice = MonthChoice::parse("N/A", "N/A");
        let run = assign(&config, SchoolExceptions::new(), vec![lower]);
        let reports = Reports::build(&run, &config);

        let rows: Vec<(&str, &str)> = reports
            .declined
            .iter()
            .map(|r| (r.requested_month.as_str(), r.comment.as_str()))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("mar", "mar is not a valid request"),
                ("N/A", "no request, deferring to manual assignment"),
            ]
        );
    }

    #[test]
    fn rows_serialize_to_json() {
        let config = CycleConfig::default();
        let reports = Reports::build(&sample_run(&config), &config);
        let value = serde_json::to_value(&reports.assigned[0]).unwrap();
        assert_eq!(value["name"], "Ada");
        assert_eq!(value["duration"], 10);
    }
}
