use serde::{Deserialize, Serialize};

use super::age_adjust::adjust_rate_by_age;
use super::scenario::{AgeProfile, ScenarioInputs};
use super::state::{Compartment, HealthStage, IsolationState, TestState};
use super::transition::TransitionTensor;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionParams {
    /// Extra admissions per day caused by infection, one per infectious
    /// stage (exposed, asymptomatic, early and late symptomatic).
    pub covid_excess_rate: [f64; 4],
}

impl Default for AdmissionParams {
    fn default() -> Self {
        Self {
            covid_excess_rate: [1e-4, 1e-3, 2.9e-2, 1e-2],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DischargeParams {
    /// Recovered patients leave this many times faster than baseline.
    pub covid_discharge_multiplier: f64,
}

impl Default for DischargeParams {
    fn default() -> Self {
        Self {
            covid_discharge_multiplier: 3.0,
        }
    }
}

/// Per-age, per-stage rates, `rates[age][stage]`.
pub type StageRates = Vec<[f64; HealthStage::COUNT]>;

/// Admission of unrestricted and home-isolated people into hospital.
#[derive(Debug, Clone)]
pub struct HospitalAdmission {
    pub rates: StageRates,
}

impl HospitalAdmission {
    pub fn build(
        params: &AdmissionParams,
        inputs: &ScenarioInputs,
        profile: &AgeProfile,
        max_rate: f64,
    ) -> Self {
        let n_age = profile.n_age();
        let adjustment: Vec<f64> = profile
            .relative_admission_risk
            .iter()
            .zip(&inputs.ages.ae_attendance_risk)
            .map(|(r, ae)| r * ae)
            .collect();

        let mut rates = vec![[0.0; HealthStage::COUNT]; n_age];
        for stage in HealthStage::living() {
            for (a, row) in rates.iter_mut().enumerate() {
                row[stage.index()] = profile.baseline_admission_rate[a];
            }
        }
        for (i, stage) in HealthStage::INFECTIOUS.iter().enumerate() {
            let excess = adjust_rate_by_age(
                params.covid_excess_rate[i],
                &adjustment,
                &profile.weights,
                max_rate,
            );
            for (a, row) in rates.iter_mut().enumerate() {
                row[stage.index()] += excess[a];
            }
        }
        Self { rates }
    }

    pub fn apply(&self, tensor: &mut TransitionTensor) {
        for (age, row) in self.rates.iter().enumerate() {
            for from_iso in [IsolationState::Unrestricted, IsolationState::HomeIsolated] {
                for stage in HealthStage::ALL {
                    let rate = row[stage.index()];
                    if rate == 0.0 {
                        continue;
                    }
                    for test in TestState::ALL {
                        let from = Compartment::new(stage, from_iso, test);
                        tensor.add(age, from, from.with_iso(IsolationState::Hospitalized), rate);
                    }
                }
            }
        }
    }
}

/// Discharge of hospitalised patients back to unrestricted status.
#[derive(Debug, Clone)]
pub struct HospitalDischarge {
    pub rates: StageRates,
}

impl HospitalDischarge {
    pub fn build(params: &DischargeParams, profile: &AgeProfile) -> Self {
        use HealthStage::*;
        let rates = profile
            .baseline_discharge_rate
            .iter()
            .map(|base| {
                let mut row = [0.0; HealthStage::COUNT];
                for stage in [Susceptible, Exposed, Asymptomatic] {
                    row[stage.index()] = *base;
                }
                // Symptomatic patients stay until they progress.
                for stage in [RecoveredIgM, RecoveredIgG] {
                    row[stage.index()] = params.covid_discharge_multiplier * base;
                }
                row
            })
            .collect();
        Self { rates }
    }

    pub fn apply(&self, tensor: &mut TransitionTensor) {
        for (age, row) in self.rates.iter().enumerate() {
            for stage in HealthStage::ALL {
                let rate = row[stage.index()];
                if rate == 0.0 {
                    continue;
                }
                for test in TestState::ALL {
                    let from = Compartment::new(stage, IsolationState::Hospitalized, test);
                    tensor.add(age, from, from.with_iso(IsolationState::Unrestricted), rate);
                }
            }
        }
    }
}
