use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;

use super::contact::load_mixing_matrix_csv;
use super::population::load_population_csv;
use crate::model::config::ModelConfig;
use crate::model::scenario::{AgeParameters, ScenarioInputs};

/// Everything read from a scenario directory.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub age_labels: Vec<String>,
    pub inputs: ScenarioInputs,
    pub config: ModelConfig,
}

/// Read a scenario directory:
///
/// - `population.csv` (`age_group,pop`)
/// - `mixing_baseline.csv`, `mixing_distancing.csv` and optionally
///   `mixing_isolation.csv`
/// - `age_parameters.json` ([`AgeParameters`])
/// - optionally `settings.json` ([`ModelConfig`], defaults when absent)
/// - optionally `historical_tests.csv` (`date,<one count per age group>`)
///
/// The result has been validated.
pub fn load_scenario(dir: impl AsRef<Path>) -> anyhow::Result<Scenario> {
    let dir = dir.as_ref();
    let (age_labels, population) = load_population_csv(dir.join("population.csv"))?;
    let mixing_baseline = load_mixing_matrix_csv(dir.join("mixing_baseline.csv"))?;
    let mixing_distancing = load_mixing_matrix_csv(dir.join("mixing_distancing.csv"))?;
    let isolation_path = dir.join("mixing_isolation.csv");
    let mixing_isolation = if isolation_path.exists() {
        Some(load_mixing_matrix_csv(&isolation_path)?)
    } else {
        None
    };
    let ages: AgeParameters = read_json(&dir.join("age_parameters.json"))?;

    let settings_path = dir.join("settings.json");
    let config: ModelConfig = if settings_path.exists() {
        read_json(&settings_path)?
    } else {
        ModelConfig::default()
    };

    let history_path = dir.join("historical_tests.csv");
    let historical_pcr_tests = if history_path.exists() {
        load_historical_tests_csv(&history_path)?
    } else {
        BTreeMap::new()
    };

    let inputs = ScenarioInputs {
        population,
        ages,
        mixing_baseline,
        mixing_distancing,
        mixing_isolation,
        historical_pcr_tests,
    };
    inputs
        .check()
        .with_context(|| format!("invalid scenario in {}", dir.display()))?;
    config
        .check(inputs.n_age())
        .with_context(|| format!("invalid settings in {}", settings_path.display()))?;

    Ok(Scenario {
        age_labels,
        inputs,
        config,
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

/// Administered PCR tests per age group, keyed by date.
pub fn load_historical_tests_csv(path: impl AsRef<Path>) -> anyhow::Result<BTreeMap<NaiveDate, Vec<f64>>> {
    let path = path.as_ref();
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open historical tests CSV: {}", path.display()))?;
    let mut out = BTreeMap::new();
    for (line, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("{}: bad record {}", path.display(), line + 2))?;
        let mut fields = record.iter();
        let date_field = fields.next().unwrap_or_default().trim();
        let date: NaiveDate = date_field
            .parse()
            .with_context(|| format!("{}: bad date {:?} on line {}", path.display(), date_field, line + 2))?;
        let counts = fields
            .map(|f| f.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("{}: bad count on line {}", path.display(), line + 2))?;
        out.insert(date, counts);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    fn minimal(dir: &Path) {
        write(dir, "population.csv", "age_group,pop\n0-49,60000\n50+,40000\n");
        write(dir, "mixing_baseline.csv", "age,0-49,50+\n0-49,8,2\n50+,2,4\n");
        write(dir, "mixing_distancing.csv", "age,0-49,50+\n0-49,2,0.5\n50+,0.5,1\n");
        write(
            dir,
            "age_parameters.json",
            r#"{
                "yearly_baseline_admissions": [3000, 9000],
                "hospital_mean_length_of_stay": [3, 8],
                "clinical_staff_ratio": [0.02, 0.01],
                "ae_attendance_risk": [0.3, 0.4],
                "admitted_fraction": [0.001, 0.02],
                "deaths": [2, 150]
            }"#,
        );
    }

    #[test]
    fn loads_a_minimal_scenario_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        minimal(dir.path());
        let s = load_scenario(dir.path()).unwrap();
        assert_eq!(s.age_labels, vec!["0-49", "50+"]);
        assert_eq!(s.inputs.n_age(), 2);
        assert!(s.inputs.mixing_isolation.is_none());
        assert!(s.inputs.historical_pcr_tests.is_empty());
        assert_eq!(s.config.quarantine.home_isolation_days, 14.0);
    }

    #[test]
    fn reads_settings_and_history() {
        let dir = tempfile::tempdir().unwrap();
        minimal(dir.path());
        write(dir.path(), "settings.json", r#"{ "quarantine": { "isolation_lag": 1.0 } }"#);
        write(dir.path(), "historical_tests.csv", "date,0-49,50+\n2020-03-02,10,25\n");
        let s = load_scenario(dir.path()).unwrap();
        assert_eq!(s.config.quarantine.isolation_lag, 1.0);
        let day = NaiveDate::from_ymd_opt(2020, 3, 2).unwrap();
        assert_eq!(s.inputs.historical_pcr_tests[&day], vec![10.0, 25.0]);
    }

    #[test]
    fn wrong_length_parameters_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        minimal(dir.path());
        write(
            dir.path(),
            "age_parameters.json",
            r#"{
                "yearly_baseline_admissions": [3000],
                "hospital_mean_length_of_stay": [3, 8],
                "clinical_staff_ratio": [0.02, 0.01],
                "ae_attendance_risk": [0.3, 0.4],
                "admitted_fraction": [0.001, 0.02],
                "deaths": [2, 150]
            }"#,
        );
        let err = format!("{:#}", load_scenario(dir.path()).unwrap_err());
        assert!(err.contains("yearly_baseline_admissions"), "{}", err);
    }

    #[test]
    fn missing_file_is_named() {
        let dir = tempfile::tempdir().unwrap();
        let err = format!("{:#}", load_scenario(dir.path()).unwrap_err());
        assert!(err.contains("population.csv"), "{}", err);
    }
}
