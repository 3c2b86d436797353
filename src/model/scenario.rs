use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::age_adjust::relative_to_mean;
use crate::math::linalg::{is_square, weighted_contact_total};

/// Per-age epidemiological and hospital data, one entry per age group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgeParameters {
    /// Non-COVID hospital admissions per year.
    pub yearly_baseline_admissions: Vec<f64>,
    /// Mean length of a hospital stay, days.
    pub hospital_mean_length_of_stay: Vec<f64>,
    /// Share of each age group working as clinical hospital staff.
    pub clinical_staff_ratio: Vec<f64>,
    /// Relative risk of attending A&E, multiplies the COVID admission risk.
    pub ae_attendance_risk: Vec<f64>,
    /// Share of each age group admitted to hospital with COVID.
    pub admitted_fraction: Vec<f64>,
    /// COVID deaths per age group.
    pub deaths: Vec<f64>,
}

/// Everything the core consumes from the input layer, already parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioInputs {
    pub population: Vec<f64>,
    pub ages: AgeParameters,
    /// Symmetric contact matrices, `[a][b]` contacts per day.
    pub mixing_baseline: Vec<Vec<f64>>,
    pub mixing_distancing: Vec<Vec<f64>>,
    /// Mixing between home-isolated and everyone else; zero when absent.
    #[serde(default)]
    pub mixing_isolation: Option<Vec<Vec<f64>>>,
    /// Administered PCR tests per age group on days where real counts exist.
    #[serde(default)]
    pub historical_pcr_tests: BTreeMap<NaiveDate, Vec<f64>>,
}

impl ScenarioInputs {
    pub fn n_age(&self) -> usize {
        self.population.len()
    }

    pub fn check(&self) -> anyhow::Result<()> {
        let n = self.n_age();
        anyhow::ensure!(n > 0, "population is empty");
        anyhow::ensure!(
            self.population.iter().all(|p| p.is_finite() && *p > 0.0),
            "population must be finite and > 0 for every age group"
        );
        let ages = &self.ages;
        for (name, v) in [
            ("yearly_baseline_admissions", &ages.yearly_baseline_admissions),
            ("hospital_mean_length_of_stay", &ages.hospital_mean_length_of_stay),
            ("clinical_staff_ratio", &ages.clinical_staff_ratio),
            ("ae_attendance_risk", &ages.ae_attendance_risk),
            ("admitted_fraction", &ages.admitted_fraction),
            ("deaths", &ages.deaths),
        ] {
            anyhow::ensure!(v.len() == n, "{}.len ({}) != n_age ({})", name, v.len(), n);
            anyhow::ensure!(
                v.iter().all(|x| x.is_finite() && *x >= 0.0),
                "{} must be finite and >= 0",
                name
            );
        }
        anyhow::ensure!(
            ages.hospital_mean_length_of_stay.iter().all(|x| *x > 0.0),
            "hospital_mean_length_of_stay must be > 0"
        );
        anyhow::ensure!(
            ages.clinical_staff_ratio.iter().all(|x| *x <= 1.0),
            "clinical_staff_ratio must be <= 1"
        );
        anyhow::ensure!(
            ages.admitted_fraction.iter().all(|x| *x > 0.0),
            "admitted_fraction must be > 0"
        );
        for a in 0..n {
            let cfr = ages.deaths[a] / (ages.admitted_fraction[a] * self.population[a]);
            anyhow::ensure!(
                cfr < 1.0,
                "deaths[{}] imply a hospital case-fatality ratio of {} (must be < 1)",
                a,
                cfr
            );
        }

        for (name, m) in [
            ("mixing_baseline", Some(&self.mixing_baseline)),
            ("mixing_distancing", Some(&self.mixing_distancing)),
            ("mixing_isolation", self.mixing_isolation.as_ref()),
        ] {
            if let Some(m) = m {
                anyhow::ensure!(is_square(m, n), "{} must be square n_age x n_age", name);
                anyhow::ensure!(
                    m.iter().flatten().all(|x| x.is_finite() && *x >= 0.0),
                    "{} must be finite and >= 0",
                    name
                );
            }
        }

        for (date, counts) in &self.historical_pcr_tests {
            anyhow::ensure!(
                counts.len() == n,
                "historical_pcr_tests[{}].len ({}) != n_age ({})",
                date,
                counts.len(),
                n
            );
        }
        Ok(())
    }
}

/// Quantities derived once per run from [`ScenarioInputs`].
#[derive(Debug, Clone)]
pub struct AgeProfile {
    /// Population share per age group (sums to 1).
    pub weights: Vec<f64>,
    pub relative_admission_risk: Vec<f64>,
    pub relative_death_risk: Vec<f64>,
    pub case_fatality_hospital: Vec<f64>,
    /// Non-COVID admissions per person per day.
    pub baseline_admission_rate: Vec<f64>,
    /// Non-COVID discharges per patient per day.
    pub baseline_discharge_rate: Vec<f64>,
    /// Share of the general pool in hospital at the non-COVID equilibrium.
    pub occupancy_ratio: Vec<f64>,
}

impl AgeProfile {
    pub fn derive(inputs: &ScenarioInputs) -> Self {
        let pop = &inputs.population;
        let ages = &inputs.ages;
        let total: f64 = pop.iter().sum();
        let weights: Vec<f64> = pop.iter().map(|p| p / total).collect();

        let death_per_capita: Vec<f64> = ages.deaths.iter().zip(pop).map(|(d, p)| d / p).collect();
        let case_fatality_hospital = ages
            .deaths
            .iter()
            .zip(&ages.admitted_fraction)
            .zip(pop)
            .map(|((d, f), p)| d / (f * p))
            .collect();

        let baseline_admission_rate: Vec<f64> = ages
            .yearly_baseline_admissions
            .iter()
            .zip(pop)
            .map(|(adm, p)| adm / (365.0 * p))
            .collect();
        let baseline_discharge_rate: Vec<f64> = ages
            .hospital_mean_length_of_stay
            .iter()
            .map(|los| 1.0 / los)
            .collect();
        let occupancy_ratio = baseline_admission_rate
            .iter()
            .zip(&baseline_discharge_rate)
            .map(|(adm, dis)| adm / (adm + dis))
            .collect();

        Self {
            weights,
            relative_admission_risk: relative_to_mean(&ages.admitted_fraction),
            relative_death_risk: relative_to_mean(&death_per_capita),
            case_fatality_hospital,
            baseline_admission_rate,
            baseline_discharge_rate,
            occupancy_ratio,
        }
    }

    pub fn n_age(&self) -> usize {
        self.weights.len()
    }

    /// Flat within-hospital contact rate: `ratio` times the average number of
    /// baseline contacts per person.
    pub fn hospital_mixing(&self, mixing_baseline: &[Vec<f64>], elevated_ratio: f64) -> f64 {
        elevated_ratio * weighted_contact_total(&self.weights, mixing_baseline)
    }
}
