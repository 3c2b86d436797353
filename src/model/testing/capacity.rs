use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::TestKind;
use crate::math::curves::expit;
use crate::model::policy::ymd;

/// Logistic rollout: `total * expit((date - inflexion) / slope)` in whole days.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticRamp {
    pub total: f64,
    pub inflexion: NaiveDate,
    pub slope: f64,
}

impl LogisticRamp {
    pub fn at(&self, date: NaiveDate) -> f64 {
        let days = (date - self.inflexion).num_days() as f64;
        self.total * expit(days / self.slope)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityParams {
    /// First PCR rollout phase (central labs).
    pub pcr_initial: LogisticRamp,
    /// Second PCR phase (country-wide labs).
    pub pcr_expanded: LogisticRamp,
    /// No antigen or antibody tests exist before this date.
    pub rapid_first_day: NaiveDate,
    /// Combined antigen and antibody production.
    pub rapid: LogisticRamp,
    /// Share of `rapid` that is antigen; the rest is antibody.
    pub antigen_share: f64,
}

impl Default for CapacityParams {
    fn default() -> Self {
        Self {
            pcr_initial: LogisticRamp {
                total: 1e4,
                inflexion: ymd(2020, 3, 25),
                slope: 5.0,
            },
            pcr_expanded: LogisticRamp {
                total: 1e5,
                inflexion: ymd(2020, 4, 25),
                slope: 10.0,
            },
            rapid_first_day: ymd(2020, 4, 25),
            rapid: LogisticRamp {
                total: 5e6,
                inflexion: ymd(2020, 5, 20),
                slope: 20.0,
            },
            antigen_share: 0.7,
        }
    }
}

impl CapacityParams {
    pub fn check(&self) -> anyhow::Result<()> {
        for (name, ramp) in [
            ("pcr_initial", &self.pcr_initial),
            ("pcr_expanded", &self.pcr_expanded),
            ("rapid", &self.rapid),
        ] {
            anyhow::ensure!(ramp.total >= 0.0, "testing.capacity.{}.total must be >= 0", name);
            anyhow::ensure!(ramp.slope > 0.0, "testing.capacity.{}.slope must be > 0", name);
        }
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.antigen_share),
            "testing.capacity.antigen_share must be in [0, 1]"
        );
        Ok(())
    }

    /// Tests available per day on `date`.
    pub fn available(&self, date: NaiveDate) -> CapacityCounter {
        let pcr = self.pcr_initial.at(date) + self.pcr_expanded.at(date);
        let rapid = if date < self.rapid_first_day {
            0.0
        } else {
            self.rapid.at(date)
        };
        CapacityCounter::new([pcr, rapid * self.antigen_share, rapid * (1.0 - self.antigen_share)])
    }
}

/// Tests still unallocated within one evaluation, indexed by [`TestKind`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapacityCounter {
    remaining: [f64; TestKind::COUNT],
}

impl CapacityCounter {
    pub fn new(available: [f64; TestKind::COUNT]) -> Self {
        Self {
            remaining: available.map(|v| v.max(0.0)),
        }
    }

    pub fn remaining(&self, kind: TestKind) -> f64 {
        self.remaining[kind.index()]
    }

    /// Never goes below zero.
    pub fn consume(&mut self, kind: TestKind, used: f64) {
        let r = &mut self.remaining[kind.index()];
        *r = (*r - used).max(0.0);
    }
}
