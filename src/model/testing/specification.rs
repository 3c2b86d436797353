use serde::{Deserialize, Serialize};

use super::TestKind;
use crate::model::state::HealthStage;

/// Practical error rates of each test. Per-stage arrays run from `Exposed`
/// to `RecoveredIgG`; antibody false positives run from `Susceptible` to
/// `SymptomaticLate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TestSpecParams {
    pub pcr_false_negative: [f64; 6],
    pub pcr_false_positive: f64,
    pub antigen_false_negative: [f64; 6],
    pub antigen_false_positive: f64,
    pub antibody_false_negative: [f64; 6],
    pub antibody_false_positive: [f64; 5],
}

impl Default for TestSpecParams {
    fn default() -> Self {
        Self {
            pcr_false_negative: [0.9, 0.4, 0.15, 0.35, 0.5, 0.8],
            pcr_false_positive: 0.01,
            antigen_false_negative: [0.95, 0.6, 0.35, 0.45, 0.6, 0.9],
            antigen_false_positive: 0.1,
            antibody_false_negative: [0.99, 0.85, 0.8, 0.65, 0.3, 0.05],
            antibody_false_positive: [0.05, 0.04, 0.03, 0.02, 0.01],
        }
    }
}

impl TestSpecParams {
    pub fn check(&self) -> anyhow::Result<()> {
        let all = self
            .pcr_false_negative
            .iter()
            .chain(&self.antigen_false_negative)
            .chain(&self.antibody_false_negative)
            .chain(&self.antibody_false_positive)
            .chain([&self.pcr_false_positive, &self.antigen_false_positive]);
        for v in all {
            anyhow::ensure!(
                (0.0..=1.0).contains(v),
                "testing.specifications rates must be in [0, 1], got {}",
                v
            );
        }
        Ok(())
    }
}

/// One row of the specification table.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TestSpecRow {
    /// Whether people in this stage truly carry what the test detects.
    pub detects: bool,
    pub false_negative_rate: f64,
    pub false_positive_rate: f64,
}

/// Static `(kind × stage)` table.
#[derive(Debug, Clone, PartialEq)]
pub struct TestSpecification {
    rows: [[TestSpecRow; HealthStage::COUNT]; TestKind::COUNT],
}

impl TestSpecification {
    pub fn from_params(p: &TestSpecParams) -> Self {
        use HealthStage::*;
        let mut rows = [[TestSpecRow::default(); HealthStage::COUNT]; TestKind::COUNT];
        let from_exposed = [Exposed, Asymptomatic, SymptomaticEarly, SymptomaticLate, RecoveredIgM, RecoveredIgG];

        for (kind, fnr, fpr) in [
            (TestKind::Pcr, &p.pcr_false_negative, p.pcr_false_positive),
            (TestKind::Antigen, &p.antigen_false_negative, p.antigen_false_positive),
        ] {
            let table = &mut rows[kind.index()];
            for (stage, rate) in from_exposed.iter().zip(fnr) {
                table[stage.index()].false_negative_rate = *rate;
            }
            for stage in HealthStage::INFECTIOUS {
                table[stage.index()].detects = true;
            }
            for stage in [Susceptible, RecoveredIgM, RecoveredIgG] {
                table[stage.index()].false_positive_rate = fpr;
            }
        }

        let table = &mut rows[TestKind::Antibody.index()];
        for (stage, rate) in from_exposed.iter().zip(&p.antibody_false_negative) {
            table[stage.index()].false_negative_rate = *rate;
        }
        for stage in [RecoveredIgM, RecoveredIgG] {
            table[stage.index()].detects = true;
        }
        for (stage, rate) in [Susceptible, Exposed, Asymptomatic, SymptomaticEarly, SymptomaticLate]
            .iter()
            .zip(&p.antibody_false_positive)
        {
            table[stage.index()].false_positive_rate = *rate;
        }

        Self { rows }
    }

    pub fn row(&self, kind: TestKind, stage: HealthStage) -> &TestSpecRow {
        &self.rows[kind.index()][stage.index()]
    }

    /// Share of administered tests reading positive and negative.
    pub fn outcome_split(&self, kind: TestKind, stage: HealthStage) -> (f64, f64) {
        let row = self.row(kind, stage);
        if row.detects {
            (1.0 - row.false_negative_rate, row.false_negative_rate)
        } else {
            (row.false_positive_rate, 1.0 - row.false_positive_rate)
        }
    }
}

impl Default for TestSpecification {
    fn default() -> Self {
        Self::from_params(&TestSpecParams::default())
    }
}
