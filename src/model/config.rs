use serde::{Deserialize, Serialize};

use super::hospital::{AdmissionParams, DischargeParams};
use super::policy::PolicySchedule;
use super::progression::ProgressionParams;
use super::quarantine::QuarantineParams;
use super::testing::TestingParams;
use super::transmission::TransmissionParams;
use super::travel::TravelParams;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgeAdjustParams {
    /// Ceiling for any single age-adjusted rate.
    pub max_rate: f64,
}

impl Default for AgeAdjustParams {
    fn default() -> Self {
        Self { max_rate: 1e20 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SolverMethod {
    /// Bogacki-Shampine RK23 with error control, sampled at whole days.
    Adaptive { rtol: f64, atol: f64 },
    /// Explicit Euler with `steps_per_day` equal steps.
    Euler { steps_per_day: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub method: SolverMethod,
    /// Most negative value a cell may take before the run is aborted, as a
    /// share of its age group's population.
    pub negative_tolerance: f64,
    /// Smallest adaptive step before giving up.
    pub min_step: f64,
    /// Adaptive step attempts allowed per simulated day.
    pub max_steps_per_day: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            method: SolverMethod::Adaptive { rtol: 1e-3, atol: 1e-3 },
            negative_tolerance: 1e-6,
            min_step: 1e-8,
            max_steps_per_day: 100_000,
        }
    }
}

impl SolverConfig {
    pub fn check(&self) -> anyhow::Result<()> {
        match self.method {
            SolverMethod::Adaptive { rtol, atol } => {
                anyhow::ensure!(rtol > 0.0 && atol > 0.0, "solver rtol and atol must be > 0");
            }
            SolverMethod::Euler { steps_per_day } => {
                anyhow::ensure!(steps_per_day >= 1, "solver.steps_per_day must be >= 1");
            }
        }
        anyhow::ensure!(self.negative_tolerance >= 0.0, "solver.negative_tolerance must be >= 0");
        anyhow::ensure!(self.min_step > 0.0, "solver.min_step must be > 0");
        anyhow::ensure!(self.max_steps_per_day >= 1, "solver.max_steps_per_day must be >= 1");
        Ok(())
    }
}

/// Every tunable of the model, one section per rate builder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub progression: ProgressionParams,
    pub transmission: TransmissionParams,
    pub travel: TravelParams,
    pub admission: AdmissionParams,
    pub discharge: DischargeParams,
    pub testing: TestingParams,
    pub quarantine: QuarantineParams,
    pub policies: PolicySchedule,
    pub age_adjustment: AgeAdjustParams,
    pub solver: SolverConfig,
}

impl ModelConfig {
    pub fn check(&self, n_age: usize) -> anyhow::Result<()> {
        self.progression.check(n_age)?;
        anyhow::ensure!(
            self.transmission.infectiousness.iter().all(|v| *v >= 0.0),
            "transmission.infectiousness must be >= 0"
        );
        anyhow::ensure!(
            self.transmission.elevated_hospital_mixing_ratio >= 0.0,
            "transmission.elevated_hospital_mixing_ratio must be >= 0"
        );
        self.travel.check()?;
        anyhow::ensure!(
            self.admission.covid_excess_rate.iter().all(|v| *v >= 0.0),
            "admission.covid_excess_rate must be >= 0"
        );
        anyhow::ensure!(
            self.discharge.covid_discharge_multiplier >= 0.0,
            "discharge.covid_discharge_multiplier must be >= 0"
        );
        self.testing.check()?;
        self.quarantine.check()?;
        for (name, window) in [
            ("social_distancing", &self.policies.social_distancing),
            ("immunity_passports", &self.policies.immunity_passports),
            ("case_isolation", &self.policies.case_isolation),
        ] {
            if let Some(w) = window {
                anyhow::ensure!(w.start <= w.stop, "policies.{} starts after it stops", name);
            }
        }
        anyhow::ensure!(self.age_adjustment.max_rate > 0.0, "age_adjustment.max_rate must be > 0");
        self.solver.check()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: ModelConfig = serde_json::from_str(
            r#"{
                "travel": { "base_rate": 1e-3 },
                "solver": { "method": { "kind": "euler", "steps_per_day": 4 } },
                "policies": {
                    "case_isolation": { "start": "2020-03-01", "stop": "2020-06-01" }
                },
                "testing": { "policy": { "kind": "symptomatic_only", "antibody": "none" } }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.travel.base_rate, 1e-3);
        assert_eq!(cfg.travel.horizon_days, 200);
        assert_eq!(cfg.solver.method, SolverMethod::Euler { steps_per_day: 4 });
        assert!(cfg.policies.case_isolation.is_some());
        assert!(cfg.policies.social_distancing.is_none());
        assert_eq!(cfg.progression.nonsymptomatic_ratio, 0.86);
        cfg.check(9).unwrap();
    }

    #[test]
    fn check_rejects_zero_euler_steps() {
        let mut cfg = ModelConfig::default();
        cfg.solver.method = SolverMethod::Euler { steps_per_day: 0 };
        let err = cfg.check(9).unwrap_err().to_string();
        assert!(err.contains("steps_per_day"), "{}", err);
    }
}
