//! How the day's tests are shared out over the population.
//!
//! Each policy is a fixed sequence of passes. A pass offers one kind of test
//! to a selection of cells, covering as large a fraction of the eligible
//! people as the remaining capacity allows, and draws the used tests from the
//! shared [`CapacityCounter`].

use serde::{Deserialize, Serialize};

use super::capacity::CapacityCounter;
use super::TestKind;
use crate::model::state::{Compartment, HealthStage, IsolationState, StateTensor, TestState};

const PEOPLE_EPS: f64 = 1e-6;
const ELIGIBLE_EPS: f64 = 1e-6;

/// Share of people showing COVID-like symptoms for other reasons.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SymptomParams {
    /// Outside hospital (seasonal ILI rate).
    pub general: f64,
    /// Among hospital patients (respiratory episodes).
    pub hospital: f64,
}

impl Default for SymptomParams {
    fn default() -> Self {
        Self {
            general: 15e-5,
            hospital: 1.1 / 17.1,
        }
    }
}

/// Share of a stage that would seek a test: everyone when symptomatic,
/// otherwise the non-COVID symptom ratio.
pub fn symptom_weight(stage: HealthStage, noncovid_ratio: f64) -> f64 {
    if stage.is_symptomatic() {
        1.0
    } else {
        noncovid_ratio
    }
}

/// Per-capita testing rate, `[age][compartment][kind]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TestAllocation {
    n_age: usize,
    rates: Vec<f64>,
}

impl TestAllocation {
    pub fn zeros(n_age: usize) -> Self {
        Self {
            n_age,
            rates: vec![0.0; n_age * Compartment::COUNT * TestKind::COUNT],
        }
    }

    pub fn n_age(&self) -> usize {
        self.n_age
    }

    fn offset(age: usize, c: Compartment, kind: TestKind) -> usize {
        (age * Compartment::COUNT + c.index()) * TestKind::COUNT + kind.index()
    }

    pub fn get(&self, age: usize, c: Compartment, kind: TestKind) -> f64 {
        self.rates[Self::offset(age, c, kind)]
    }

    pub fn add(&mut self, age: usize, c: Compartment, kind: TestKind, rate: f64) {
        self.rates[Self::offset(age, c, kind)] += rate;
    }

    /// Tests per day implied by these rates on `state`.
    pub fn tests_used(&self, state: &StateTensor, kind: TestKind) -> f64 {
        state
            .iter()
            .map(|(a, c, people)| people * self.get(a, c, kind))
            .sum()
    }

    /// One priority pass. Returns the number of tests handed out.
    fn distribute(&mut self, state: &StateTensor, pass: &Pass, budget: f64) -> f64 {
        let mut eligible = Vec::new();
        for age in 0..state.n_age() {
            for health in HealthStage::living() {
                for iso in pass.isos {
                    for test in pass.tests {
                        let c = Compartment::new(health, *iso, *test);
                        let people = state[(age, c)];
                        let already: f64 = pass.subtract.iter().map(|k| self.get(age, c, *k)).sum();
                        let e = (people * (symptom_weight(health, pass.symptom_ratio) - already)).max(0.0);
                        eligible.push((age, c, people, e));
                    }
                }
            }
        }

        let total: f64 = eligible.iter().map(|(_, _, _, e)| e).sum();
        if total < ELIGIBLE_EPS {
            return 0.0;
        }
        let fraction = (budget.max(0.0) / total).min(1.0);
        for (age, c, people, e) in eligible {
            if e > 0.0 {
                self.add(age, c, pass.kind, fraction * e / (people + PEOPLE_EPS));
            }
        }
        fraction * total
    }

    fn run(&mut self, state: &StateTensor, counter: &mut CapacityCounter, pass: &Pass) {
        self.run_with_share(state, counter, pass, 1.0);
    }

    /// Like [`Self::run`], but only `share` of the remaining capacity is offered.
    fn run_with_share(&mut self, state: &StateTensor, counter: &mut CapacityCounter, pass: &Pass, share: f64) {
        let budget = counter.remaining(pass.kind) * share;
        let used = self.distribute(state, pass, budget);
        counter.consume(pass.kind, used);
    }
}

/// One allocation pass over a selection of cells (all ages, deceased excluded).
struct Pass<'a> {
    kind: TestKind,
    isos: &'a [IsolationState],
    tests: &'a [TestState],
    /// Symptom ratio of non-symptomatic stages; 1 offers the test regardless of symptoms.
    symptom_ratio: f64,
    /// Rates of these kinds already allocated to a cell reduce its eligibility.
    subtract: &'a [TestKind],
}

const HOSPITALIZED: &[IsolationState] = &[IsolationState::Hospitalized];
const STAFF: &[IsolationState] = &[IsolationState::HospitalStaff];
const GENERAL: &[IsolationState] = &[IsolationState::Unrestricted, IsolationState::HomeIsolated];
const NOT_STAFF: &[IsolationState] = &[
    IsolationState::Unrestricted,
    IsolationState::HomeIsolated,
    IsolationState::Hospitalized,
];
const UNRESTRICTED: &[IsolationState] = &[IsolationState::Unrestricted];
const ANY_ISO: &[IsolationState] = &IsolationState::ALL;

const UNTESTED: &[TestState] = &[TestState::Untested];
const NO_ANTIBODY: &[TestState] = &[TestState::Untested, TestState::VirusPositive];
const VIRUS_POSITIVE: &[TestState] = &[TestState::VirusPositive];
const IMMUNE: &[TestState] = &[TestState::AntibodyPositive, TestState::BothPositive];
const ANY_POSITIVE: &[TestState] = &[
    TestState::VirusPositive,
    TestState::AntibodyPositive,
    TestState::BothPositive,
];

/// Who receives antibody tests under the symptomatic-only policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AntibodyPolicy {
    None,
    /// Hospital staff first, then everyone else at random.
    HospitalStaffThenRandom,
    VirusPositiveOnly,
    VirusPositiveOnlyStaffFirst,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SymptomaticPolicy {
    pub antibody: AntibodyPolicy,
    /// Spread PCR and antigen tests left after the symptomatic passes
    /// uniformly over untested people.
    pub distribute_remaining_to_random: bool,
}

impl Default for SymptomaticPolicy {
    fn default() -> Self {
        Self {
            antibody: AntibodyPolicy::HospitalStaffThenRandom,
            distribute_remaining_to_random: true,
        }
    }
}

impl SymptomaticPolicy {
    fn allocate(
        &self,
        state: &StateTensor,
        symptoms: SymptomParams,
        counter: &mut CapacityCounter,
        out: &mut TestAllocation,
    ) {
        for kind in [TestKind::Pcr, TestKind::Antigen] {
            let subtract: &[TestKind] = match kind {
                TestKind::Pcr => &[],
                _ => &[TestKind::Pcr],
            };
            // hospital patients, then staff, then everyone else
            for (isos, ratio) in [
                (HOSPITALIZED, symptoms.hospital),
                (STAFF, symptoms.general),
                (GENERAL, symptoms.general),
            ] {
                let pass = Pass {
                    kind,
                    isos,
                    tests: UNTESTED,
                    symptom_ratio: ratio,
                    subtract,
                };
                out.run(state, counter, &pass);
            }
            if self.distribute_remaining_to_random {
                let subtract: &[TestKind] = match kind {
                    TestKind::Pcr => &[TestKind::Pcr],
                    _ => &TestKind::ALL,
                };
                let pass = Pass {
                    kind,
                    isos: ANY_ISO,
                    tests: UNTESTED,
                    symptom_ratio: 1.0,
                    subtract,
                };
                out.run(state, counter, &pass);
            }
        }

        let antibody_passes: &[(&[IsolationState], &[TestState])] = match self.antibody {
            AntibodyPolicy::None => &[],
            AntibodyPolicy::HospitalStaffThenRandom => &[(STAFF, NO_ANTIBODY), (NOT_STAFF, NO_ANTIBODY)],
            AntibodyPolicy::VirusPositiveOnlyStaffFirst => {
                &[(STAFF, VIRUS_POSITIVE), (NOT_STAFF, VIRUS_POSITIVE)]
            }
            AntibodyPolicy::VirusPositiveOnly => &[(ANY_ISO, VIRUS_POSITIVE)],
        };
        for (isos, tests) in antibody_passes {
            let pass = Pass {
                kind: TestKind::Antibody,
                isos,
                tests,
                symptom_ratio: 1.0,
                subtract: &[],
            };
            out.run(state, counter, &pass);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetestingPolicy {
    /// Runs first, with its random remainder disabled.
    pub base: SymptomaticPolicy,
    /// Share of remaining antigen tests used on antibody-positive people.
    pub antigen_immune_positive_ratio: f64,
    /// Share of remaining antibody tests used on already-positive people.
    pub antibody_immune_positive_ratio: f64,
}

impl Default for RetestingPolicy {
    fn default() -> Self {
        Self {
            base: SymptomaticPolicy::default(),
            antigen_immune_positive_ratio: 0.05,
            antibody_immune_positive_ratio: 1.0,
        }
    }
}

impl RetestingPolicy {
    fn allocate(
        &self,
        state: &StateTensor,
        symptoms: SymptomParams,
        counter: &mut CapacityCounter,
        out: &mut TestAllocation,
    ) {
        let base = SymptomaticPolicy {
            distribute_remaining_to_random: false,
            ..self.base.clone()
        };
        base.allocate(state, symptoms, counter, out);

        // Catch false immunity.
        let retest = Pass {
            kind: TestKind::Antigen,
            isos: ANY_ISO,
            tests: IMMUNE,
            symptom_ratio: 1.0,
            subtract: &[],
        };
        out.run_with_share(state, counter, &retest, self.antigen_immune_positive_ratio);
        let rest = Pass {
            kind: TestKind::Antigen,
            isos: UNRESTRICTED,
            tests: NO_ANTIBODY,
            symptom_ratio: 1.0,
            subtract: &[TestKind::Pcr, TestKind::Antigen],
        };
        out.run(state, counter, &rest);

        let retest = Pass {
            kind: TestKind::Antibody,
            isos: ANY_ISO,
            tests: ANY_POSITIVE,
            symptom_ratio: 1.0,
            subtract: &[TestKind::Antibody],
        };
        out.run_with_share(state, counter, &retest, self.antibody_immune_positive_ratio);
        let rest = Pass {
            kind: TestKind::Antibody,
            isos: ANY_ISO,
            tests: NO_ANTIBODY,
            symptom_ratio: 1.0,
            subtract: &[TestKind::Antibody],
        };
        out.run(state, counter, &rest);
    }
}

/// Test distribution policy, selected in configuration by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TestingPolicy {
    SymptomaticOnly(SymptomaticPolicy),
    MassTestingWithRetesting(RetestingPolicy),
}

impl Default for TestingPolicy {
    fn default() -> Self {
        TestingPolicy::MassTestingWithRetesting(RetestingPolicy::default())
    }
}

impl TestingPolicy {
    pub fn check(&self) -> anyhow::Result<()> {
        if let TestingPolicy::MassTestingWithRetesting(p) = self {
            for (name, v) in [
                ("antigen_immune_positive_ratio", p.antigen_immune_positive_ratio),
                ("antibody_immune_positive_ratio", p.antibody_immune_positive_ratio),
            ] {
                anyhow::ensure!((0.0..=1.0).contains(&v), "testing.policy.{} must be in [0, 1]", name);
            }
        }
        Ok(())
    }

    /// Share `counter` out over `state`, leaving what is unused in `counter`.
    pub fn allocate(
        &self,
        state: &StateTensor,
        symptoms: SymptomParams,
        counter: &mut CapacityCounter,
    ) -> TestAllocation {
        let mut out = TestAllocation::zeros(state.n_age());
        match self {
            TestingPolicy::SymptomaticOnly(p) => p.allocate(state, symptoms, counter, &mut out),
            TestingPolicy::MassTestingWithRetesting(p) => p.allocate(state, symptoms, counter, &mut out),
        }
        out
    }
}

/// Real PCR counts for one day: spread over hospitalised, untested people of
/// each age in proportion to how many of them have symptoms.
pub fn allocate_historical_pcr(state: &StateTensor, counts: &[f64], hospital_ratio: f64) -> TestAllocation {
    let mut out = TestAllocation::zeros(state.n_age());
    for (age, count) in counts.iter().enumerate().take(state.n_age()) {
        let cells: Vec<(Compartment, f64, f64)> = HealthStage::living()
            .map(|h| {
                let c = Compartment::new(h, IsolationState::Hospitalized, TestState::Untested);
                let people = state[(age, c)];
                (c, people, people * symptom_weight(h, hospital_ratio))
            })
            .collect();
        let symptomatic: f64 = cells.iter().map(|(_, _, s)| s).sum();
        if symptomatic <= 0.0 {
            continue;
        }
        for (c, people, s) in cells {
            out.add(age, c, TestKind::Pcr, count * s / symptomatic / (people + 1e-10));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(h: HealthStage, iso: IsolationState, test: TestState) -> Compartment {
        Compartment::new(h, iso, test)
    }

    fn hospital_state() -> StateTensor {
        let mut s = StateTensor::zeros(1);
        s[(0, cell(HealthStage::Susceptible, IsolationState::Hospitalized, TestState::Untested))] = 1000.0;
        s[(0, cell(HealthStage::SymptomaticEarly, IsolationState::Hospitalized, TestState::Untested))] = 100.0;
        s[(0, cell(HealthStage::Susceptible, IsolationState::Unrestricted, TestState::Untested))] = 50_000.0;
        s[(0, cell(HealthStage::Asymptomatic, IsolationState::HospitalStaff, TestState::Untested))] = 10.0;
        s
    }

    fn symptomatic_only(random: bool) -> TestingPolicy {
        TestingPolicy::SymptomaticOnly(SymptomaticPolicy {
            antibody: AntibodyPolicy::None,
            distribute_remaining_to_random: random,
        })
    }

    #[test]
    fn scarce_pcr_goes_to_hospital_patients_first() {
        let s = hospital_state();
        let symptoms = SymptomParams { general: 0.1, hospital: 0.5 };
        let mut counter = CapacityCounter::new([300.0, 0.0, 0.0]);
        let alloc = symptomatic_only(true).allocate(&s, symptoms, &mut counter);

        // eligible in hospital: 1000 * 0.5 + 100 * 1 = 600, budget covers half
        let sym = cell(HealthStage::SymptomaticEarly, IsolationState::Hospitalized, TestState::Untested);
        assert!((alloc.get(0, sym, TestKind::Pcr) - 0.5 * 100.0 / (100.0 + 1e-6)).abs() < 1e-9);
        let general = cell(HealthStage::Susceptible, IsolationState::Unrestricted, TestState::Untested);
        assert_eq!(alloc.get(0, general, TestKind::Pcr), 0.0);
        assert!((alloc.tests_used(&s, TestKind::Pcr) - 300.0).abs() < 1e-3);
        assert!(counter.remaining(TestKind::Pcr).abs() < 1e-9);
    }

    #[test]
    fn allocation_never_exceeds_capacity() {
        let s = hospital_state();
        for capacity in [0.0, 1e-9, 3.0, 7_000.0, 1e9] {
            let mut counter = CapacityCounter::new([capacity; 3]);
            let alloc = TestingPolicy::default().allocate(&s, SymptomParams::default(), &mut counter);
            for kind in TestKind::ALL {
                let used = alloc.tests_used(&s, kind);
                assert!(used <= capacity + 1e-6, "{:?}: {} > {}", kind, used, capacity);
                assert!(counter.remaining(kind) >= 0.0);
            }
        }
    }

    #[test]
    fn random_remainder_covers_everyone_when_capacity_is_ample() {
        let s = hospital_state();
        let mut counter = CapacityCounter::new([1e9, 0.0, 0.0]);
        let alloc = symptomatic_only(true).allocate(&s, SymptomParams::default(), &mut counter);
        let general = cell(HealthStage::Susceptible, IsolationState::Unrestricted, TestState::Untested);
        // symptomatic pass plus the remainder add up to one test per person
        assert!((alloc.get(0, general, TestKind::Pcr) - 1.0).abs() < 1e-6);

        let mut counter = CapacityCounter::new([1e9, 0.0, 0.0]);
        let alloc = symptomatic_only(false).allocate(&s, SymptomParams::default(), &mut counter);
        assert!(alloc.get(0, general, TestKind::Pcr) < 1e-3);
    }

    #[test]
    fn retesting_targets_antibody_positive_people() {
        let mut s = StateTensor::zeros(1);
        let immune = cell(HealthStage::RecoveredIgG, IsolationState::Unrestricted, TestState::AntibodyPositive);
        s[(0, immune)] = 1_000.0;
        let mut counter = CapacityCounter::new([0.0, 100.0, 100.0]);
        let alloc = TestingPolicy::default().allocate(&s, SymptomParams::default(), &mut counter);
        // 5% of antigen capacity, then all antibody capacity
        assert!((alloc.tests_used(&s, TestKind::Antigen) - 5.0).abs() < 1e-6);
        assert!((alloc.tests_used(&s, TestKind::Antibody) - 100.0).abs() < 1e-6);
    }

    #[test]
    fn historical_counts_follow_symptomatic_share() {
        let s = hospital_state();
        let alloc = allocate_historical_pcr(&s, &[60.0], 0.5);
        let sus = cell(HealthStage::Susceptible, IsolationState::Hospitalized, TestState::Untested);
        let sym = sus.with_health(HealthStage::SymptomaticEarly);
        // symptomatic weights 500 and 100 out of 600
        assert!((alloc.get(0, sus, TestKind::Pcr) * 1000.0 - 50.0).abs() < 1e-6);
        assert!((alloc.get(0, sym, TestKind::Pcr) * 100.0 - 10.0).abs() < 1e-6);
        assert!((alloc.tests_used(&s, TestKind::Pcr) - 60.0).abs() < 1e-6);
    }
}
