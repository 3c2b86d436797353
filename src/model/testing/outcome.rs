use super::allocation::TestAllocation;
use super::specification::TestSpecification;
use super::TestKind;
use crate::model::state::{Compartment, TestState};
use crate::model::transition::TransitionTensor;

/// Test-state flow rates, `[age][compartment][destination test state]`.
///
/// Entries whose destination equals the source test state (a positive
/// confirmed again, a negative staying negative) are kept: case isolation
/// acts on re-confirmed positives too.
#[derive(Debug, Clone, PartialEq)]
pub struct TestTransitions {
    n_age: usize,
    rates: Vec<f64>,
}

impl TestTransitions {
    pub fn zeros(n_age: usize) -> Self {
        Self {
            n_age,
            rates: vec![0.0; n_age * Compartment::COUNT * TestState::COUNT],
        }
    }

    pub fn n_age(&self) -> usize {
        self.n_age
    }

    fn offset(age: usize, from: Compartment, to: TestState) -> usize {
        (age * Compartment::COUNT + from.index()) * TestState::COUNT + to.index()
    }

    pub fn get(&self, age: usize, from: Compartment, to: TestState) -> f64 {
        self.rates[Self::offset(age, from, to)]
    }

    pub fn add(&mut self, age: usize, from: Compartment, to: TestState, rate: f64) {
        self.rates[Self::offset(age, from, to)] += rate;
    }

    /// Convert administered-test rates into result flows.
    pub fn from_allocation(alloc: &TestAllocation, spec: &TestSpecification) -> Self {
        let mut out = Self::zeros(alloc.n_age());
        for age in 0..alloc.n_age() {
            for c in Compartment::all() {
                for kind in TestKind::ALL {
                    let rate = alloc.get(age, c, kind);
                    if rate == 0.0 {
                        continue;
                    }
                    let axis = kind.positive_state();
                    let (pos, neg) = spec.outcome_split(kind, c.health);
                    out.add(age, c, c.test.after_positive(axis), rate * pos);
                    out.add(age, c, c.test.after_negative(axis), rate * neg);
                }
            }
        }
        out
    }

    /// Age, health and isolation are unchanged by testing.
    pub fn apply(&self, tensor: &mut TransitionTensor) {
        for age in 0..self.n_age {
            for from in Compartment::all() {
                for to in TestState::ALL {
                    let rate = self.get(age, from, to);
                    if rate != 0.0 && to != from.test {
                        tensor.add(age, from, from.with_test(to), rate);
                    }
                }
            }
        }
    }
}
