use serde::{Deserialize, Serialize};

use super::age_adjust::adjust_rate_by_age;
use super::scenario::AgeProfile;
use super::state::{Compartment, HealthStage, IsolationState, TestState};
use super::transition::TransitionTensor;

/// Mean durations (days) and splits of the disease course.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionParams {
    /// Share of infections that never develop symptoms.
    pub nonsymptomatic_ratio: f64,
    pub infect_to_symptoms: f64,
    pub symptom_to_recovery: f64,
    /// Time spent in early symptoms before late symptoms.
    pub early_to_late_symptoms: f64,
    pub nonsymptomatic_to_recovery: f64,
    pub igg_formation: f64,
    /// Per-age relative recovery speed; all zero when absent.
    pub relative_recovery_speed: Option<Vec<f64>>,
}

impl Default for ProgressionParams {
    fn default() -> Self {
        Self {
            nonsymptomatic_ratio: 0.86,
            infect_to_symptoms: 5.0,
            symptom_to_recovery: 10.0,
            early_to_late_symptoms: 4.0,
            nonsymptomatic_to_recovery: 15.0,
            igg_formation: 15.0,
            relative_recovery_speed: None,
        }
    }
}

impl ProgressionParams {
    pub fn check(&self, n_age: usize) -> anyhow::Result<()> {
        anyhow::ensure!(
            (0.0..1.0).contains(&self.nonsymptomatic_ratio),
            "progression.nonsymptomatic_ratio must be in [0, 1)"
        );
        for (name, v) in [
            ("infect_to_symptoms", self.infect_to_symptoms),
            ("early_to_late_symptoms", self.early_to_late_symptoms),
            ("nonsymptomatic_to_recovery", self.nonsymptomatic_to_recovery),
            ("igg_formation", self.igg_formation),
        ] {
            anyhow::ensure!(v > 0.0, "progression.{} must be > 0", name);
        }
        anyhow::ensure!(
            self.symptom_to_recovery > self.early_to_late_symptoms,
            "progression.symptom_to_recovery must exceed early_to_late_symptoms"
        );
        if let Some(v) = &self.relative_recovery_speed {
            anyhow::ensure!(v.len() == n_age, "progression.relative_recovery_speed.len != n_age");
        }
        Ok(())
    }

    /// Stage-to-stage rates before any age adjustment, `[from][to]`.
    pub fn base_matrix(&self) -> StageMatrix {
        use HealthStage::*;
        let e_to_symptomatic = 1.0 / self.infect_to_symptoms;
        let e_to_asymptomatic =
            self.nonsymptomatic_ratio / (1.0 - self.nonsymptomatic_ratio) * e_to_symptomatic;

        let mut m = StageMatrix::default();
        m.set(Exposed, Asymptomatic, e_to_asymptomatic);
        m.set(Exposed, SymptomaticEarly, e_to_symptomatic);
        m.set(Asymptomatic, RecoveredIgM, 1.0 / self.nonsymptomatic_to_recovery);
        m.set(SymptomaticEarly, SymptomaticLate, 1.0 / self.early_to_late_symptoms);
        m.set(
            SymptomaticLate,
            RecoveredIgM,
            1.0 / (self.symptom_to_recovery - self.early_to_late_symptoms),
        );
        m.set(RecoveredIgM, RecoveredIgG, 1.0 / self.igg_formation);
        m
    }
}

/// Health-stage transition rates for one age group, `rates[from][to]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageMatrix {
    rates: [[f64; HealthStage::COUNT]; HealthStage::COUNT],
}

impl StageMatrix {
    pub fn get(&self, from: HealthStage, to: HealthStage) -> f64 {
        self.rates[from.index()][to.index()]
    }

    pub fn set(&mut self, from: HealthStage, to: HealthStage, rate: f64) {
        self.rates[from.index()][to.index()] = rate;
    }

    pub fn outflow(&self, from: HealthStage) -> f64 {
        HealthStage::ALL
            .iter()
            .filter(|to| **to != from)
            .map(|to| self.get(from, *to))
            .sum()
    }
}

/// Age-adjusted disease progression, one variant outside hospital and one
/// inside where deaths follow the hospital case-fatality ratio.
#[derive(Debug, Clone)]
pub struct DiseaseProgression {
    pub community: Vec<StageMatrix>,
    pub hospital: Vec<StageMatrix>,
}

impl DiseaseProgression {
    pub fn build(params: &ProgressionParams, profile: &AgeProfile, max_rate: f64) -> Self {
        let n_age = profile.n_age();
        let base = params.base_matrix();
        let recovery_speed = params
            .relative_recovery_speed
            .clone()
            .unwrap_or_else(|| vec![0.0; n_age]);

        let mut community = vec![base; n_age];
        for from in HealthStage::ALL {
            let deaths = adjust_rate_by_age(
                base.get(from, HealthStage::Deceased),
                &profile.relative_death_risk,
                &profile.weights,
                max_rate,
            );
            let recoveries = adjust_rate_by_age(
                base.get(from, HealthStage::RecoveredIgM),
                &recovery_speed,
                &profile.weights,
                max_rate,
            );
            for a in 0..n_age {
                community[a].set(from, HealthStage::Deceased, deaths[a]);
                community[a].set(from, HealthStage::RecoveredIgM, recoveries[a]);
            }
        }

        let mut hospital = community.clone();
        for (a, m) in hospital.iter_mut().enumerate() {
            let cfr = profile.case_fatality_hospital[a];
            let recovery = m.get(HealthStage::SymptomaticLate, HealthStage::RecoveredIgM);
            m.set(
                HealthStage::SymptomaticLate,
                HealthStage::Deceased,
                recovery * cfr / (1.0 - cfr),
            );
        }

        Self { community, hospital }
    }

    pub fn matrix(&self, age: usize, iso: IsolationState) -> &StageMatrix {
        match iso {
            IsolationState::Hospitalized => &self.hospital[age],
            _ => &self.community[age],
        }
    }

    /// Health-stage moves that keep isolation and test state.
    pub fn apply(&self, tensor: &mut TransitionTensor) {
        for age in 0..tensor.n_age() {
            for iso in IsolationState::ALL {
                let m = self.matrix(age, iso);
                for test in TestState::ALL {
                    for from in HealthStage::ALL {
                        for to in HealthStage::ALL {
                            let rate = m.get(from, to);
                            if rate != 0.0 && from != to {
                                tensor.add(
                                    age,
                                    Compartment::new(from, iso, test),
                                    Compartment::new(to, iso, test),
                                    rate,
                                );
                            }
                        }
                    }
                }
            }
        }
    }
}
