use serde::{Deserialize, Serialize};

use super::policy::PolicyFlags;
use super::scenario::{AgeProfile, ScenarioInputs};
use super::state::{Compartment, HealthStage, IsolationState, StateTensor, TestState};
use super::transition::TransitionTensor;
use crate::math::linalg::{mat_sub, mat_vec};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransmissionParams {
    /// Infection probability per contact for each infectious stage
    /// (exposed, asymptomatic, early and late symptomatic).
    pub infectiousness: [f64; 4],
    /// Contact intensity inside hospitals relative to average baseline contacts.
    pub elevated_hospital_mixing_ratio: f64,
}

impl Default for TransmissionParams {
    fn default() -> Self {
        Self {
            infectiousness: [0.001, 0.1, 0.6, 0.5],
            elevated_hospital_mixing_ratio: 3.0,
        }
    }
}

/// Per-capita infection pressure on susceptibles, `[age][iso][test]`.
pub type InfectionRates = Vec<[[f64; TestState::COUNT]; IsolationState::COUNT]>;

/// Force-of-infection builder.
///
/// Unrestricted people and hospital staff mix with each other through the
/// baseline (or distancing) matrix; home-isolated people mix only with those
/// two groups through the isolation matrix; everyone inside a hospital mixes
/// at a flat rate with all infectious people inside hospitals.
#[derive(Debug, Clone)]
pub struct Transmission {
    infectiousness: [f64; 4],
    baseline: Vec<Vec<f64>>,
    distancing: Vec<Vec<f64>>,
    isolation: Vec<Vec<f64>>,
    /// `baseline - distancing`, added back for antibody-positive people
    /// under immunity passports.
    passport_correction: Vec<Vec<f64>>,
    hospital_mixing: f64,
}

const COMMUNITY: [IsolationState; 2] = [IsolationState::Unrestricted, IsolationState::HospitalStaff];

impl Transmission {
    pub fn build(params: &TransmissionParams, inputs: &ScenarioInputs, profile: &AgeProfile) -> Self {
        let n = inputs.n_age();
        Self {
            infectiousness: params.infectiousness,
            baseline: inputs.mixing_baseline.clone(),
            distancing: inputs.mixing_distancing.clone(),
            isolation: inputs
                .mixing_isolation
                .clone()
                .unwrap_or_else(|| vec![vec![0.0; n]; n]),
            passport_correction: mat_sub(&inputs.mixing_baseline, &inputs.mixing_distancing),
            hospital_mixing: profile
                .hospital_mixing(&inputs.mixing_baseline, params.elevated_hospital_mixing_ratio),
        }
    }

    /// Infectiousness-weighted infectious people per age group and test state
    /// within isolation state `iso`, `[age][test]`.
    fn infectious_load(&self, state: &StateTensor, iso: IsolationState) -> Vec<[f64; TestState::COUNT]> {
        let mut load = vec![[0.0; TestState::COUNT]; state.n_age()];
        for (a, row) in load.iter_mut().enumerate() {
            for (i, stage) in HealthStage::INFECTIOUS.iter().enumerate() {
                for test in TestState::ALL {
                    row[test.index()] +=
                        self.infectiousness[i] * state[(a, Compartment::new(*stage, iso, test))];
                }
            }
        }
        load
    }

    pub fn infection_rates(&self, state: &StateTensor, flags: PolicyFlags) -> InfectionRates {
        let n_age = state.n_age();
        let mut rates: InfectionRates = vec![[[0.0; TestState::COUNT]; IsolationState::COUNT]; n_age];

        let loads: Vec<Vec<[f64; TestState::COUNT]>> = IsolationState::ALL
            .iter()
            .map(|iso| self.infectious_load(state, *iso))
            .collect();
        let total_over_tests =
            |iso: IsolationState| -> Vec<f64> { loads[iso.index()].iter().map(|r| r.iter().sum()).collect() };

        let community_load: Vec<f64> = {
            let u = total_over_tests(IsolationState::Unrestricted);
            let s = total_over_tests(IsolationState::HospitalStaff);
            u.iter().zip(&s).map(|(a, b)| a + b).collect()
        };
        let isolated_load = total_over_tests(IsolationState::HomeIsolated);

        let mixing = if flags.social_distancing { &self.distancing } else { &self.baseline };

        // Community with community, plus community with the home-isolated.
        let from_community = mat_vec(mixing, &community_load);
        let from_isolated = mat_vec(&self.isolation, &isolated_load);
        for iso in COMMUNITY {
            for (a, r) in rates.iter_mut().enumerate() {
                for test in TestState::ALL {
                    r[iso.index()][test.index()] += from_community[a] + from_isolated[a];
                }
            }
        }

        // Antibody-positive people with passports mix at baseline among
        // themselves. Without distancing the correction is zero.
        if flags.immunity_passports && flags.social_distancing {
            for test in [TestState::AntibodyPositive, TestState::BothPositive] {
                let load: Vec<f64> = (0..n_age)
                    .map(|a| {
                        COMMUNITY
                            .iter()
                            .map(|iso| loads[iso.index()][a][test.index()])
                            .sum()
                    })
                    .collect();
                let extra = mat_vec(&self.passport_correction, &load);
                for iso in COMMUNITY {
                    for (a, r) in rates.iter_mut().enumerate() {
                        r[iso.index()][test.index()] += extra[a];
                    }
                }
            }
        }

        // Home-isolated people catch it from the community only.
        let isolated_from_community = mat_vec(&self.isolation, &community_load);
        for (a, r) in rates.iter_mut().enumerate() {
            for test in TestState::ALL {
                r[IsolationState::HomeIsolated.index()][test.index()] += isolated_from_community[a];
            }
        }

        // Flat mixing inside hospitals, patients and staff together.
        let hospital_load: f64 = [IsolationState::Hospitalized, IsolationState::HospitalStaff]
            .iter()
            .flat_map(|iso| total_over_tests(*iso))
            .sum();
        for r in rates.iter_mut() {
            for iso in [IsolationState::Hospitalized, IsolationState::HospitalStaff] {
                for test in TestState::ALL {
                    r[iso.index()][test.index()] += self.hospital_mixing * hospital_load;
                }
            }
        }

        let living = state.living_total();
        if living > 0.0 {
            for r in rates.iter_mut() {
                for row in r.iter_mut() {
                    for v in row.iter_mut() {
                        *v /= living;
                    }
                }
            }
        }
        rates
    }

    /// Susceptible → Exposed, keeping isolation and test state.
    pub fn apply(&self, tensor: &mut TransitionTensor, state: &StateTensor, flags: PolicyFlags) {
        let rates = self.infection_rates(state, flags);
        for (age, r) in rates.iter().enumerate() {
            for iso in IsolationState::ALL {
                for test in TestState::ALL {
                    let rate = r[iso.index()][test.index()];
                    if rate != 0.0 {
                        let from = Compartment::new(HealthStage::Susceptible, iso, test);
                        tensor.add(age, from, from.with_health(HealthStage::Exposed), rate);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::scenario::tests::{uniform_inputs, uniform_profile};

    fn setup() -> (Transmission, StateTensor) {
        let inputs = uniform_inputs(2);
        let profile = uniform_profile(2);
        let t = Transmission::build(&TransmissionParams::default(), &inputs, &profile);
        let mut s = StateTensor::zeros(2);
        let sus = Compartment::new(HealthStage::Susceptible, IsolationState::Unrestricted, TestState::Untested);
        s[(0, sus)] = 9_000.0;
        s[(1, sus)] = 900.0;
        (t, s)
    }

    #[test]
    fn no_infectious_people_means_no_infection() {
        let (t, s) = setup();
        let rates = t.infection_rates(&s, PolicyFlags::default());
        assert!(rates.iter().flatten().flatten().all(|r| *r == 0.0));
    }

    #[test]
    fn community_infection_uses_active_matrix() {
        let (t, mut s) = setup();
        let inf = Compartment::new(HealthStage::SymptomaticEarly, IsolationState::Unrestricted, TestState::Untested);
        s[(1, inf)] = 100.0;
        let living = s.living_total();

        let base = t.infection_rates(&s, PolicyFlags::default());
        let expected = 2.0 * 0.6 * 100.0 / living;
        assert!((base[0][IsolationState::Unrestricted.index()][0] - expected).abs() < 1e-12);
        assert!((base[0][IsolationState::HospitalStaff.index()][0] - expected).abs() < 1e-12);
        // zero isolation matrix: the home-isolated are shielded
        assert_eq!(base[0][IsolationState::HomeIsolated.index()][0], 0.0);

        let distancing = PolicyFlags {
            social_distancing: true,
            ..PolicyFlags::default()
        };
        let dist = t.infection_rates(&s, distancing);
        assert!((dist[0][0][0] - 0.5 * 0.6 * 100.0 / living).abs() < 1e-12);
    }

    #[test]
    fn passports_restore_baseline_for_antibody_positive() {
        let (t, mut s) = setup();
        let inf = Compartment::new(HealthStage::Asymptomatic, IsolationState::Unrestricted, TestState::AntibodyPositive);
        s[(0, inf)] = 50.0;
        let living = s.living_total();
        let flags = PolicyFlags {
            social_distancing: true,
            immunity_passports: true,
            case_isolation: false,
        };
        let rates = t.infection_rates(&s, flags);
        let iso = IsolationState::Unrestricted.index();
        let untested = rates[1][iso][TestState::Untested.index()];
        let immune = rates[1][iso][TestState::AntibodyPositive.index()];
        assert!((untested - 0.5 * 0.1 * 50.0 / living).abs() < 1e-12);
        assert!((immune - 2.0 * 0.1 * 50.0 / living).abs() < 1e-12);
    }

    #[test]
    fn hospital_mixing_is_age_independent() {
        let (t, mut s) = setup();
        let inf = Compartment::new(HealthStage::SymptomaticLate, IsolationState::Hospitalized, TestState::Untested);
        s[(0, inf)] = 10.0;
        let rates = t.infection_rates(&s, PolicyFlags::default());
        let h = IsolationState::Hospitalized.index();
        let staff = IsolationState::HospitalStaff.index();
        assert!(rates[0][h][0] > 0.0);
        assert_eq!(rates[0][h][0], rates[1][h][0]);
        assert_eq!(rates[1][staff][3], rates[1][h][0]);
        assert_eq!(rates[0][IsolationState::Unrestricted.index()][0], 0.0);
    }
}
