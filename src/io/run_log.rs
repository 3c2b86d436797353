use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;

use crate::model::integrator::Trajectory;
use crate::model::state::{HealthStage, IsolationState};

/// Run header written above the per-day summary.
#[derive(Debug, Clone)]
pub struct RunSummary<'a> {
    pub run_id: &'a str,
    pub start: NaiveDate,
    pub days: usize,
    pub solver: String,
    pub age_groups: usize,
}

/// Write a plain-text log of a run: `key=value` header lines, a blank line,
/// then one CSV line per recorded day with population, infected,
/// hospitalised and deceased totals.
pub fn write_run_log(out_dir: impl AsRef<Path>, summary: &RunSummary<'_>, trajectory: &Trajectory) -> anyhow::Result<PathBuf> {
    let out_dir = out_dir.as_ref();
    std::fs::create_dir_all(out_dir).context("create logs dir failed")?;
    let path = out_dir.join(format!("run_{}.txt", summary.run_id));
    let mut f = std::fs::File::create(&path).with_context(|| format!("create run log file failed (path={:?})", path))?;

    writeln!(f, "run_id={}", summary.run_id)?;
    writeln!(f, "start={}", summary.start)?;
    writeln!(f, "days={}", summary.days)?;
    writeln!(f, "solver={}", summary.solver)?;
    writeln!(f, "age_groups={}", summary.age_groups)?;
    writeln!(f)?;
    writeln!(f, "day,date,population,infected,hospitalised,deceased,new_infections")?;

    for record in &trajectory.records {
        let s = &record.current;
        let date = summary.start + chrono::Duration::days(record.day as i64);
        let infected: f64 = HealthStage::INFECTIOUS.iter().map(|h| s.health_total(*h)).sum();
        writeln!(
            f,
            "{},{},{:.0},{:.0},{:.0},{:.0},{:.0}",
            record.day,
            date,
            s.living_total(),
            infected,
            s.iso_total(IsolationState::Hospitalized),
            s.health_total(HealthStage::Deceased),
            record.new_cumulative.health_total(HealthStage::Exposed),
        )?;
    }

    Ok(path)
}
