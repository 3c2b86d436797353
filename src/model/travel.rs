use serde::{Deserialize, Serialize};

use super::state::{Compartment, HealthStage, IsolationState, TestState};
use super::transition::TransitionTensor;
use crate::math::curves::{expit, gamma_kernel};

/// Imported infections from returning travellers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TravelParams {
    /// Days after which no more travel infections arrive.
    pub horizon_days: usize,
    /// Share of the population returning from abroad per day before restrictions.
    pub base_rate: f64,
    /// Day and steepness of the logistic decline in travel volume.
    pub decline_mean: f64,
    pub decline_slope: f64,
    /// Highest share of travellers that are infected.
    pub infection_peak: f64,
    /// Day at which that share peaks.
    pub infection_peak_day: f64,
    /// Gamma shape of the prevalence curve, must exceed 1.
    pub infection_shape: f64,
}

impl Default for TravelParams {
    fn default() -> Self {
        Self {
            horizon_days: 200,
            base_rate: 5e-4,
            decline_mean: 15.0,
            decline_slope: 1.0,
            infection_peak: 0.1,
            infection_peak_day: 10.0,
            infection_shape: 2.0,
        }
    }
}

impl TravelParams {
    pub fn check(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.infection_shape > 1.0, "travel.infection_shape must be > 1");
        anyhow::ensure!(self.infection_peak_day > 0.0, "travel.infection_peak_day must be > 0");
        anyhow::ensure!(self.decline_slope > 0.0, "travel.decline_slope must be > 0");
        anyhow::ensure!(
            self.base_rate >= 0.0 && self.infection_peak >= 0.0,
            "travel.base_rate and travel.infection_peak must be >= 0"
        );
        Ok(())
    }
}

/// Exposure rate of unrestricted, untested susceptibles from travel, tabulated
/// per whole day up to the horizon.
#[derive(Debug, Clone)]
pub struct TravelImportation {
    weights: Vec<f64>,
    /// `volume[d] * prevalence[d]` for each day before the horizon.
    daily: Vec<f64>,
}

impl TravelImportation {
    pub fn build(params: &TravelParams, weights: &[f64]) -> Self {
        let days = 0..params.horizon_days;
        let volume: Vec<f64> = days
            .clone()
            .map(|d| {
                params.base_rate * (1.0 - expit((d as f64 - params.decline_mean) / params.decline_slope))
            })
            .collect();

        let scale = params.infection_peak_day / (params.infection_shape - 1.0);
        let prevalence: Vec<f64> = days
            .map(|d| gamma_kernel(d as f64, params.infection_shape, scale))
            .collect();
        let peak = prevalence.iter().cloned().fold(0.0, f64::max);

        let daily = volume
            .iter()
            .zip(&prevalence)
            .map(|(v, p)| if peak > 0.0 { v * params.infection_peak * p / peak } else { 0.0 })
            .collect();

        Self {
            weights: weights.to_vec(),
            daily,
        }
    }

    /// Per-age rate on the simulated day containing `t`.
    pub fn rates_at(&self, t: f64) -> Vec<f64> {
        let day = t.max(0.0).floor() as usize;
        match self.daily.get(day) {
            Some(r) => self.weights.iter().map(|w| w * r).collect(),
            None => vec![0.0; self.weights.len()],
        }
    }

    /// Tested or isolated people do not travel.
    pub fn apply(&self, tensor: &mut TransitionTensor, t: f64) {
        let from = Compartment::new(HealthStage::Susceptible, IsolationState::Unrestricted, TestState::Untested);
        let to = from.with_health(HealthStage::Exposed);
        for (age, rate) in self.rates_at(t).into_iter().enumerate() {
            if rate != 0.0 {
                tensor.add(age, from, to, rate);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_peaks_before_decline_and_stops_at_horizon() {
        let params = TravelParams::default();
        let travel = TravelImportation::build(&params, &[1.0]);
        assert_eq!(travel.rates_at(0.0), vec![0.0]);
        let day5 = travel.rates_at(5.3)[0];
        assert!(day5 > 0.0);
        assert_eq!(day5, travel.rates_at(5.9)[0]);
        assert_eq!(travel.rates_at(200.0), vec![0.0]);
        assert!(travel.rates_at(60.0)[0] < day5 * 1e-6);
    }

    #[test]
    fn rate_is_weighted_by_age_share() {
        let params = TravelParams::default();
        let travel = TravelImportation::build(&params, &[0.25, 0.75]);
        let r = travel.rates_at(8.0);
        assert!((r[1] - 3.0 * r[0]).abs() < 1e-18);
    }

    #[test]
    fn only_unrestricted_untested_susceptibles_are_exposed() {
        let travel = TravelImportation::build(&TravelParams::default(), &[1.0]);
        let mut t = TransitionTensor::zeros(1);
        travel.apply(&mut t, 7.0);
        let edges: Vec<_> = t.edges().collect();
        assert_eq!(edges.len(), 1);
        let (age, from, to, _) = edges[0];
        assert_eq!(age, 0);
        assert_eq!(from.iso, IsolationState::Unrestricted);
        assert_eq!(from.test, TestState::Untested);
        assert_eq!(to.health, HealthStage::Exposed);
    }
}
