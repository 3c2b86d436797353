use log::{debug, info};

use super::assembler::TransitionAssembler;
use super::config::{ModelConfig, SolverConfig, SolverMethod};
use super::scenario::ScenarioInputs;
use super::state::{Compartment, StateTensor};
use crate::error::{SimError, SimResult};
use crate::math::ode::{euler_step, rk23_step_ws, Rk23Workspace, Tolerance};

/// First adaptive step size, days.
const INITIAL_STEP: f64 = 0.05;

/// Population on one whole simulated day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayRecord {
    pub day: usize,
    pub current: StateTensor,
    /// Gross inflow into each cell accumulated since day 0.
    pub new_cumulative: StateTensor,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    pub records: Vec<DayRecord>,
}

impl Trajectory {
    pub fn last(&self) -> Option<&DayRecord> {
        self.records.last()
    }
}

/// Drives the state forward in time.
///
/// The integrated vector is stacked: the first half is the population, the
/// second half the cumulative gross inflow per cell ("new" arrivals).
pub struct Simulation {
    assembler: TransitionAssembler,
    solver: SolverConfig,
}

impl Simulation {
    pub fn new(assembler: TransitionAssembler, solver: SolverConfig) -> Self {
        Self { assembler, solver }
    }

    pub fn from_inputs(inputs: &ScenarioInputs, config: &ModelConfig) -> anyhow::Result<Self> {
        let assembler = TransitionAssembler::new(inputs, config)?;
        Ok(Self::new(assembler, config.solver.clone()))
    }

    pub fn assembler(&self) -> &TransitionAssembler {
        &self.assembler
    }

    pub fn initial_state(&self) -> StateTensor {
        self.assembler.initial_state()
    }

    fn cells(&self) -> usize {
        self.assembler.n_age() * Compartment::COUNT
    }

    /// Stacked right-hand side: `dy = [net change, gross inflow]`.
    pub fn derivative(&self, t: f64, y: &[f64], dy: &mut [f64]) -> SimResult<()> {
        let n = self.cells();
        if y.len() != 2 * n || dy.len() != 2 * n {
            return Err(SimError::ShapeMismatch {
                context: "stacked state",
                expected: 2 * n,
                actual: y.len(),
            });
        }
        let current = &y[..n];
        let state = StateTensor::from_flat(self.assembler.n_age(), current.to_vec()).ok_or(
            SimError::ShapeMismatch {
                context: "state tensor",
                expected: n,
                actual: current.len(),
            },
        )?;
        let tensor = self.assembler.assemble(t, &state)?;
        let (net, inflow) = dy.split_at_mut(n);
        tensor.contract_into(current, true, net);
        tensor.contract_into(current, false, inflow);
        Ok(())
    }

    /// Integrate `days` whole days from `init`, recording days `0..=days`.
    pub fn run(&self, init: &StateTensor, days: usize) -> SimResult<Trajectory> {
        let n = self.cells();
        if init.len() != n {
            return Err(SimError::ShapeMismatch {
                context: "initial state",
                expected: n,
                actual: init.len(),
            });
        }
        let mut y = vec![0.0; 2 * n];
        y[..n].copy_from_slice(init.as_slice());

        info!(
            "simulating {} days over {} age groups ({:?})",
            days,
            self.assembler.n_age(),
            self.solver.method
        );
        let mut trajectory = Trajectory::default();
        trajectory.records.push(self.record(0, &y)?);

        match self.solver.method {
            SolverMethod::Euler { steps_per_day } => self.run_euler(&mut y, days, steps_per_day, &mut trajectory)?,
            SolverMethod::Adaptive { rtol, atol } => {
                self.run_adaptive(&mut y, days, Tolerance { rtol, atol }, &mut trajectory)?
            }
        }
        info!("simulation finished after {} days", days);
        Ok(trajectory)
    }

    fn run_euler(&self, y: &mut [f64], days: usize, steps_per_day: usize, out: &mut Trajectory) -> SimResult<()> {
        let dt = 1.0 / steps_per_day as f64;
        let mut dy = vec![0.0; y.len()];
        for day in 1..=days {
            for step in 0..steps_per_day {
                let t = (day - 1) as f64 + step as f64 * dt;
                euler_step(y, t, dt, &mut dy, |tt, yy, dd| self.derivative(tt, yy, dd))?;
            }
            out.records.push(self.record(day, y)?);
            debug!("day {} done", day);
        }
        Ok(())
    }

    fn run_adaptive(&self, y: &mut [f64], days: usize, tol: Tolerance, out: &mut Trajectory) -> SimResult<()> {
        let mut ws = Rk23Workspace::new(y.len());
        let mut t = 0.0;
        let mut dt = INITIAL_STEP;
        for day in 1..=days {
            let t_end = day as f64;
            let mut attempts = 0;
            let mut rejected = 0;
            while t < t_end {
                attempts += 1;
                if attempts > self.solver.max_steps_per_day {
                    return Err(SimError::integration(day, "step budget exhausted"));
                }
                let h = dt.min(t_end - t);
                let report = rk23_step_ws(y, t, h, tol, &mut ws, |tt, yy, dd| self.derivative(tt, yy, dd))?;
                if report.accepted {
                    t = if h == t_end - t { t_end } else { t + h };
                } else {
                    rejected += 1;
                }
                dt = report.next_dt;
                if !(dt >= self.solver.min_step) {
                    return Err(SimError::integration(
                        day,
                        format!("step size fell to {:e} (error norm {:e})", dt, report.error_norm),
                    ));
                }
            }
            out.records.push(self.record(day, y)?);
            debug!("day {} done: {} steps, {} rejected, next dt {:.4}", day, attempts, rejected, dt);
        }
        Ok(())
    }

    /// Validate the stacked vector and split it into a record.
    fn record(&self, day: usize, y: &[f64]) -> SimResult<DayRecord> {
        let n = self.cells();
        if let Some(i) = y.iter().position(|v| !v.is_finite()) {
            return Err(SimError::integration(day, format!("non-finite value in cell {}", i % n)));
        }
        let n_age = self.assembler.n_age();
        let floors: Vec<f64> = y[..n]
            .chunks(Compartment::COUNT)
            .map(|block| -self.solver.negative_tolerance * block.iter().sum::<f64>().abs())
            .collect();
        if let Some((i, v)) = y[..n]
            .iter()
            .enumerate()
            .find(|(i, v)| **v < floors[i / Compartment::COUNT])
        {
            let c = Compartment::from_index(i % Compartment::COUNT);
            return Err(SimError::integration(
                day,
                format!(
                    "population of age {} {} / {} / {} fell to {}",
                    i / Compartment::COUNT,
                    c.health.label(),
                    c.iso.label(),
                    c.test.label(),
                    v
                ),
            ));
        }
        let split = |slice: &[f64]| {
            StateTensor::from_flat(n_age, slice.to_vec()).ok_or(SimError::ShapeMismatch {
                context: "recorded state",
                expected: n,
                actual: slice.len(),
            })
        };
        Ok(DayRecord {
            day,
            current: split(&y[..n])?,
            new_cumulative: split(&y[n..])?,
        })
    }
}
