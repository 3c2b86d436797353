use anyhow::Context;

use super::config::ModelConfig;
use super::hospital::{HospitalAdmission, HospitalDischarge};
use super::policy::{PolicyFlags, PolicySchedule};
use super::progression::DiseaseProgression;
use super::quarantine::CaseIsolation;
use super::scenario::{AgeProfile, ScenarioInputs};
use super::state::{Compartment, StateTensor};
use super::testing::Testing;
use super::transition::TransitionTensor;
use super::transmission::Transmission;
use super::travel::TravelImportation;
use crate::error::{SimError, SimResult};

/// Builds the full transition tensor for a given instant and population.
///
/// Builders whose rates depend on neither time nor state (progression,
/// admission, discharge) are combined once at construction; everything else
/// is recomputed on every call. `assemble` never mutates `self`.
#[derive(Debug, Clone)]
pub struct TransitionAssembler {
    n_age: usize,
    profile: AgeProfile,
    population: Vec<f64>,
    staff_ratio: Vec<f64>,
    schedule: PolicySchedule,
    transmission: Transmission,
    travel: TravelImportation,
    testing: Testing,
    case_isolation: CaseIsolation,
    fixed: TransitionTensor,
}

impl TransitionAssembler {
    pub fn new(inputs: &ScenarioInputs, config: &ModelConfig) -> anyhow::Result<Self> {
        inputs.check().context("invalid scenario inputs")?;
        let n_age = inputs.n_age();
        config.check(n_age).context("invalid model configuration")?;

        let profile = AgeProfile::derive(inputs);
        let max_rate = config.age_adjustment.max_rate;

        let progression = DiseaseProgression::build(&config.progression, &profile, max_rate);
        let admission = HospitalAdmission::build(&config.admission, inputs, &profile, max_rate);
        let discharge = HospitalDischarge::build(&config.discharge, &profile);
        let mut fixed = TransitionTensor::zeros(n_age);
        progression.apply(&mut fixed);
        admission.apply(&mut fixed);
        discharge.apply(&mut fixed);

        Ok(Self {
            n_age,
            transmission: Transmission::build(&config.transmission, inputs, &profile),
            travel: TravelImportation::build(&config.travel, &profile.weights),
            testing: Testing::build(&config.testing, &inputs.historical_pcr_tests),
            case_isolation: CaseIsolation::build(&config.quarantine, &profile, max_rate),
            population: inputs.population.clone(),
            staff_ratio: inputs.ages.clinical_staff_ratio.clone(),
            schedule: config.policies.clone(),
            profile,
            fixed,
        })
    }

    pub fn n_age(&self) -> usize {
        self.n_age
    }

    pub fn profile(&self) -> &AgeProfile {
        &self.profile
    }

    pub fn schedule(&self) -> &PolicySchedule {
        &self.schedule
    }

    /// Everyone susceptible and untested, staff in the staff pool and the
    /// baseline share of everyone else in hospital.
    pub fn initial_state(&self) -> StateTensor {
        StateTensor::initial(&self.population, &self.staff_ratio, &self.profile.occupancy_ratio)
    }

    pub fn flags_at(&self, t: f64) -> PolicyFlags {
        self.schedule.flags_at(t)
    }

    /// Transition tensor at time `t` (days since the reference start) for
    /// `state`. Every row sums to zero.
    pub fn assemble(&self, t: f64, state: &StateTensor) -> SimResult<TransitionTensor> {
        let expected = self.n_age * Compartment::COUNT;
        if state.n_age() != self.n_age || state.len() != expected {
            return Err(SimError::ShapeMismatch {
                context: "state tensor",
                expected,
                actual: state.len(),
            });
        }

        let flags = self.schedule.flags_at(t);
        let mut tensor = self.fixed.clone();
        self.transmission.apply(&mut tensor, state, flags);
        self.travel.apply(&mut tensor, t);

        let tests = self.testing.transitions(state, self.schedule.date_at(t));
        if tests.n_age() != self.n_age {
            return Err(SimError::ShapeMismatch {
                context: "test transitions",
                expected: self.n_age,
                actual: tests.n_age(),
            });
        }
        tests.apply(&mut tensor);

        if flags.case_isolation {
            tensor = self.case_isolation.reallocate(&tensor, &tests);
        }

        tensor.enforce_conservation();
        Ok(tensor)
    }
}
