use super::state::{Compartment, StateTensor};

const BLOCK: usize = Compartment::COUNT * Compartment::COUNT;

/// Instantaneous flow rates between cells, per capita of the source cell.
///
/// Stored as one dense `Compartment × Compartment` block per age group: every
/// entry is addressed by `(age, from, to)`, so a transition can never change a
/// person's age. Diagonal entries hold the self-rate once
/// [`TransitionTensor::enforce_conservation`] has run.
#[derive(Debug, Clone)]
pub struct TransitionTensor {
    n_age: usize,
    rates: Vec<f64>,
}

impl TransitionTensor {
    pub fn zeros(n_age: usize) -> Self {
        Self {
            n_age,
            rates: vec![0.0; n_age * BLOCK],
        }
    }

    pub fn n_age(&self) -> usize {
        self.n_age
    }

    #[inline]
    fn offset(age: usize, from: Compartment, to: Compartment) -> usize {
        age * BLOCK + from.index() * Compartment::COUNT + to.index()
    }

    pub fn get(&self, age: usize, from: Compartment, to: Compartment) -> f64 {
        self.rates[Self::offset(age, from, to)]
    }

    pub fn add(&mut self, age: usize, from: Compartment, to: Compartment, rate: f64) {
        self.rates[Self::offset(age, from, to)] += rate;
    }

    pub fn set(&mut self, age: usize, from: Compartment, to: Compartment, rate: f64) {
        self.rates[Self::offset(age, from, to)] = rate;
    }

    fn row(&self, age: usize, from: Compartment) -> &[f64] {
        let start = age * BLOCK + from.index() * Compartment::COUNT;
        &self.rates[start..start + Compartment::COUNT]
    }

    /// Sum of all rates leaving `from` towards other cells.
    pub fn outflow(&self, age: usize, from: Compartment) -> f64 {
        let diag = from.index();
        self.row(age, from)
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != diag)
            .map(|(_, r)| r)
            .sum()
    }

    /// Sum of a full row including the diagonal; zero after conservation.
    pub fn row_sum(&self, age: usize, from: Compartment) -> f64 {
        self.row(age, from).iter().sum()
    }

    /// Set every self-rate to minus the row's outflow, so rows sum to zero
    /// and no cell creates or destroys people.
    pub fn enforce_conservation(&mut self) {
        for age in 0..self.n_age {
            for from in Compartment::all() {
                let out = self.outflow(age, from);
                self.set(age, from, from, -out);
            }
        }
    }

    /// Nonzero off-diagonal entries `(age, from, to, rate)`.
    pub fn edges(&self) -> impl Iterator<Item = (usize, Compartment, Compartment, f64)> + '_ {
        self.rates.iter().enumerate().filter_map(|(i, r)| {
            let age = i / BLOCK;
            let within = i % BLOCK;
            let from = within / Compartment::COUNT;
            let to = within % Compartment::COUNT;
            (*r != 0.0 && from != to).then(|| {
                (
                    age,
                    Compartment::from_index(from),
                    Compartment::from_index(to),
                    *r,
                )
            })
        })
    }

    /// Contract `state` against the tensor into `out` (net change per cell).
    ///
    /// With `include_self_loss == false` the diagonal is skipped and `out`
    /// receives gross inflow only.
    pub fn contract_into(&self, state: &[f64], include_self_loss: bool, out: &mut [f64]) {
        out.fill(0.0);
        let n = Compartment::COUNT;
        for age in 0..self.n_age {
            let base = age * n;
            let block = &self.rates[age * BLOCK..(age + 1) * BLOCK];
            let dst = &mut out[base..base + n];
            for from in 0..n {
                let people = state[base + from];
                if people == 0.0 {
                    continue;
                }
                let row = &block[from * n..(from + 1) * n];
                for (to, rate) in row.iter().enumerate() {
                    if *rate == 0.0 || (!include_self_loss && to == from) {
                        continue;
                    }
                    dst[to] += people * rate;
                }
            }
        }
    }

    pub fn contract(&self, state: &StateTensor, include_self_loss: bool) -> StateTensor {
        let mut out = StateTensor::zeros(state.n_age());
        self.contract_into(state.as_slice(), include_self_loss, out.as_mut_slice());
        out
    }
}
