use serde::{Deserialize, Serialize};

use super::age_adjust::adjust_rate_by_age;
use super::scenario::AgeProfile;
use super::state::{Compartment, HealthStage, IsolationState, TestState};
use super::testing::TestTransitions;
use super::transition::TransitionTensor;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuarantineParams {
    pub home_isolation_days: f64,
    /// Days from a positive result to actually being isolated.
    pub isolation_lag: f64,
    /// Share of symptomatic positives sent to hospital rather than home,
    /// population average before age adjustment.
    pub mean_hospitalised_fraction: f64,
}

impl Default for QuarantineParams {
    fn default() -> Self {
        Self {
            home_isolation_days: 14.0,
            isolation_lag: 0.5,
            mean_hospitalised_fraction: 0.3,
        }
    }
}

impl QuarantineParams {
    pub fn check(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.home_isolation_days > 0.0, "quarantine.home_isolation_days must be > 0");
        anyhow::ensure!(self.isolation_lag > 0.0, "quarantine.isolation_lag must be > 0");
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.mean_hospitalised_fraction),
            "quarantine.mean_hospitalised_fraction must be in [0, 1]"
        );
        Ok(())
    }
}

/// Test state an unisolated person lands in after a fresh virus-positive
/// result, keyed by the test state they start from.
const FRESH_POSITIVE: [(TestState, TestState); 4] = [
    (TestState::Untested, TestState::VirusPositive),
    (TestState::VirusPositive, TestState::VirusPositive),
    (TestState::AntibodyPositive, TestState::BothPositive),
    (TestState::BothPositive, TestState::BothPositive),
];

/// Case isolation: unrestricted people who test virus-positive are moved to
/// home isolation or hospital instead of staying unrestricted.
///
/// Hospital staff are not isolated.
#[derive(Debug, Clone)]
pub struct CaseIsolation {
    /// Per-age share of symptomatic positives that go to hospital, in `[0, 1]`.
    hospitalised_fraction: Vec<f64>,
    isolation_rate: f64,
    release_rate: f64,
}

impl CaseIsolation {
    pub fn build(params: &QuarantineParams, profile: &AgeProfile, max_rate: f64) -> Self {
        let fraction = adjust_rate_by_age(
            params.mean_hospitalised_fraction,
            &profile.relative_admission_risk,
            &profile.weights,
            max_rate,
        );
        Self::new(fraction, params)
    }

    /// Explicit per-age hospitalisation shares, clipped to `[0, 1]`.
    pub fn new(hospitalised_fraction: Vec<f64>, params: &QuarantineParams) -> Self {
        Self {
            hospitalised_fraction: hospitalised_fraction.into_iter().map(|f| f.clamp(0.0, 1.0)).collect(),
            isolation_rate: 1.0 / params.isolation_lag,
            release_rate: 1.0 / params.home_isolation_days,
        }
    }

    pub fn hospitalised_fraction(&self) -> &[f64] {
        &self.hospitalised_fraction
    }

    /// Returns a full replacement for `tensor`, with fresh positives redirected
    /// to isolation and home releases set.
    pub fn reallocate(&self, tensor: &TransitionTensor, tests: &TestTransitions) -> TransitionTensor {
        let mut out = tensor.clone();
        for age in 0..tensor.n_age() {
            let to_hospital = self.hospitalised_fraction[age];
            for health in HealthStage::living() {
                for (from_test, to_test) in FRESH_POSITIVE {
                    let from = Compartment::new(health, IsolationState::Unrestricted, from_test);
                    if from_test != to_test {
                        out.set(age, from, from.with_test(to_test), 0.0);
                    }

                    let rate = self.isolation_rate * tests.get(age, from, to_test);
                    if rate == 0.0 {
                        continue;
                    }
                    let hospital = if health.is_symptomatic() { to_hospital * rate } else { 0.0 };
                    let home = rate - hospital;
                    let moved = from.with_test(to_test);
                    if home != 0.0 {
                        out.add(age, from, moved.with_iso(IsolationState::HomeIsolated), home);
                    }
                    if hospital != 0.0 {
                        out.add(age, from, moved.with_iso(IsolationState::Hospitalized), hospital);
                    }
                }

                // Released after a fixed period, whatever their test results.
                for test in TestState::ALL {
                    let home = Compartment::new(health, IsolationState::HomeIsolated, test);
                    out.set(age, home, home.with_iso(IsolationState::Unrestricted), self.release_rate);
                }
            }
        }
        out
    }
}
