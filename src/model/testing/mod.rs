//! Diagnostic testing: daily capacity, who gets tested, and what the results do
//! to test state.

pub mod allocation;
pub mod capacity;
pub mod outcome;
pub mod specification;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub use allocation::{AntibodyPolicy, RetestingPolicy, SymptomParams, SymptomaticPolicy, TestAllocation, TestingPolicy};
pub use capacity::{CapacityCounter, CapacityParams, LogisticRamp};
pub use outcome::TestTransitions;
pub use specification::{TestSpecParams, TestSpecification};

use super::state::{StateTensor, TestState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    /// Virus detection by PCR.
    Pcr,
    /// Rapid virus antigen test.
    Antigen,
    Antibody,
}

impl TestKind {
    pub const COUNT: usize = 3;
    pub const ALL: [TestKind; 3] = [TestKind::Pcr, TestKind::Antigen, TestKind::Antibody];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// The test-state bit a positive result sets.
    pub fn positive_state(self) -> TestState {
        match self {
            TestKind::Pcr | TestKind::Antigen => TestState::VirusPositive,
            TestKind::Antibody => TestState::AntibodyPositive,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TestingParams {
    pub capacity: CapacityParams,
    pub specifications: TestSpecParams,
    pub policy: TestingPolicy,
    pub symptoms: SymptomParams,
}

impl TestingParams {
    pub fn check(&self) -> anyhow::Result<()> {
        self.capacity.check()?;
        self.specifications.check()?;
        self.policy.check()?;
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.symptoms.general) && (0.0..=1.0).contains(&self.symptoms.hospital),
            "testing.symptoms ratios must be in [0, 1]"
        );
        Ok(())
    }
}

/// Per-run testing model; `transitions` is called once per derivative evaluation.
#[derive(Debug, Clone)]
pub struct Testing {
    capacity: CapacityParams,
    spec: TestSpecification,
    policy: TestingPolicy,
    symptoms: SymptomParams,
    historical_pcr: BTreeMap<NaiveDate, Vec<f64>>,
}

impl Testing {
    pub fn build(params: &TestingParams, historical_pcr: &BTreeMap<NaiveDate, Vec<f64>>) -> Self {
        Self {
            capacity: params.capacity.clone(),
            spec: TestSpecification::from_params(&params.specifications),
            policy: params.policy.clone(),
            symptoms: params.symptoms,
            historical_pcr: historical_pcr.clone(),
        }
    }

    pub fn specification(&self) -> &TestSpecification {
        &self.spec
    }

    /// Tests administered on `date`: recorded counts when there are any,
    /// otherwise the policy applied to that day's capacity.
    pub fn allocate(&self, state: &StateTensor, date: NaiveDate) -> TestAllocation {
        if let Some(counts) = self.historical_pcr.get(&date) {
            log::trace!("{}: using recorded PCR counts", date);
            return allocation::allocate_historical_pcr(state, counts, self.symptoms.hospital);
        }
        let mut counter = self.capacity.available(date);
        log::trace!("{}: capacity {:?}", date, counter);
        self.policy.allocate(state, self.symptoms, &mut counter)
    }

    pub fn transitions(&self, state: &StateTensor, date: NaiveDate) -> TestTransitions {
        TestTransitions::from_allocation(&self.allocate(state, date), &self.spec)
    }
}
