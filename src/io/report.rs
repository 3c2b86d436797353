use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::Serialize;

use crate::model::integrator::{DayRecord, Trajectory};
use crate::model::state::{age_label, HealthStage, StateTensor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrivalType {
    /// People in the cell on that day.
    Current,
    /// Cumulative gross inflow into the cell since day 0.
    New,
}

/// One row of the long-form output table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub timestamp: NaiveDate,
    pub day: usize,
    pub arrival_type: ArrivalType,
    pub age_group: String,
    pub health_stage: &'static str,
    pub iso_state: &'static str,
    pub test_state: &'static str,
    pub value: f64,
}

/// Same table collapsed over isolation and test state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStageRow {
    pub timestamp: NaiveDate,
    pub day: usize,
    pub arrival_type: ArrivalType,
    pub age_group: String,
    pub health_stage: &'static str,
    pub value: f64,
}

fn labels_for(labels: Option<&[String]>, n_age: usize) -> Vec<String> {
    match labels {
        Some(l) if l.len() == n_age => l.to_vec(),
        _ => (0..n_age).map(|a| age_label(a, n_age)).collect(),
    }
}

fn halves(record: &DayRecord) -> [(ArrivalType, &StateTensor); 2] {
    [
        (ArrivalType::Current, &record.current),
        (ArrivalType::New, &record.new_cumulative),
    ]
}

/// Flatten a trajectory into one row per (day, arrival type, age, compartment).
/// Age labels fall back to the built-in names when absent or of the wrong length.
pub fn long_form_rows(trajectory: &Trajectory, start: NaiveDate, labels: Option<&[String]>) -> Vec<ReportRow> {
    let mut rows = Vec::new();
    for record in &trajectory.records {
        let timestamp = start + chrono::Duration::days(record.day as i64);
        for (arrival_type, tensor) in halves(record) {
            let ages = labels_for(labels, tensor.n_age());
            for (age, c, value) in tensor.iter() {
                rows.push(ReportRow {
                    timestamp,
                    day: record.day,
                    arrival_type,
                    age_group: ages[age].clone(),
                    health_stage: c.health.label(),
                    iso_state: c.iso.label(),
                    test_state: c.test.label(),
                    value,
                });
            }
        }
    }
    rows
}

pub fn by_health_stage(trajectory: &Trajectory, start: NaiveDate, labels: Option<&[String]>) -> Vec<HealthStageRow> {
    let mut rows = Vec::new();
    for record in &trajectory.records {
        let timestamp = start + chrono::Duration::days(record.day as i64);
        for (arrival_type, tensor) in halves(record) {
            let ages = labels_for(labels, tensor.n_age());
            for (age, age_group) in ages.iter().enumerate() {
                for health in HealthStage::ALL {
                    let value = tensor.sum_where(|a, c| a == age && c.health == health);
                    rows.push(HealthStageRow {
                        timestamp,
                        day: record.day,
                        arrival_type,
                        age_group: age_group.clone(),
                        health_stage: health.label(),
                        value,
                    });
                }
            }
        }
    }
    rows
}

/// Write serialisable rows to `path` as CSV with a header line.
pub fn write_csv<T: Serialize>(path: impl AsRef<Path>, rows: &[T]) -> anyhow::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("create output dir failed ({})", parent.display()))?;
    }
    let mut w = csv::Writer::from_path(path).with_context(|| format!("create output CSV failed ({})", path.display()))?;
    for row in rows {
        w.serialize(row)
            .with_context(|| format!("write row to {} failed", path.display()))?;
    }
    w.flush().with_context(|| format!("flush {} failed", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::state::{Compartment, IsolationState, TestState};

    fn tiny() -> Trajectory {
        let mut current = StateTensor::zeros(1);
        let s = Compartment::new(HealthStage::Susceptible, IsolationState::Unrestricted, TestState::Untested);
        current[(0, s)] = 90.0;
        current[(0, s.with_health(HealthStage::Exposed))] = 10.0;
        let mut new_cumulative = StateTensor::zeros(1);
        new_cumulative[(0, s.with_health(HealthStage::Exposed))] = 12.0;
        Trajectory {
            records: vec![DayRecord {
                day: 1,
                current,
                new_cumulative,
            }],
        }
    }

    #[test]
    fn long_form_has_one_row_per_cell_and_half() {
        let start = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        let rows = long_form_rows(&tiny(), start, None);
        assert_eq!(rows.len(), 2 * Compartment::COUNT);
        assert!(rows.iter().all(|r| r.timestamp == NaiveDate::from_ymd_opt(2020, 3, 2).unwrap()));
        let new_exposed: f64 = rows
            .iter()
            .filter(|r| r.arrival_type == ArrivalType::New && r.health_stage == "exposed")
            .map(|r| r.value)
            .sum();
        assert_eq!(new_exposed, 12.0);
        assert_eq!(rows[0].age_group, "age0");
    }

    #[test]
    fn health_stage_rows_are_sums() {
        let start = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        let labels = vec!["all".to_string()];
        let rows = by_health_stage(&tiny(), start, Some(&labels));
        assert_eq!(rows.len(), 2 * HealthStage::COUNT);
        let current_s = rows
            .iter()
            .find(|r| r.arrival_type == ArrivalType::Current && r.health_stage == "susceptible")
            .unwrap();
        assert_eq!(current_s.value, 90.0);
        assert_eq!(current_s.age_group, "all");
    }

    #[test]
    fn csv_header_uses_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/report.csv");
        let start = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        write_csv(&path, &by_health_stage(&tiny(), start, None)).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("timestamp,day,arrival_type,age_group,health_stage,value")
        );
        assert_eq!(lines.next(), Some("2020-03-02,1,current,age0,susceptible,90.0"));
    }
}
