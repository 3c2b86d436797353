use serde::{Deserialize, Serialize};

/// Labels for the standard nine ten-year age bands.
pub const AGE_GROUP_LABELS: [&str; 9] = [
    "0-9", "10-19", "20-29", "30-39", "40-49", "50-59", "60-69", "70-79", "80+",
];

pub fn age_label(age: usize, n_age: usize) -> String {
    if n_age == AGE_GROUP_LABELS.len() {
        AGE_GROUP_LABELS[age].to_string()
    } else {
        format!("age{}", age)
    }
}

/// Disease progression stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStage {
    Susceptible,
    Exposed,
    Asymptomatic,
    SymptomaticEarly,
    SymptomaticLate,
    /// Recovered, IgM antibodies forming.
    RecoveredIgM,
    /// Recovered, IgG antibodies present.
    RecoveredIgG,
    Deceased,
}

impl HealthStage {
    pub const COUNT: usize = 8;

    pub const ALL: [HealthStage; 8] = [
        HealthStage::Susceptible,
        HealthStage::Exposed,
        HealthStage::Asymptomatic,
        HealthStage::SymptomaticEarly,
        HealthStage::SymptomaticLate,
        HealthStage::RecoveredIgM,
        HealthStage::RecoveredIgG,
        HealthStage::Deceased,
    ];

    /// Stages that shed virus, in the order of the per-stage infectiousness weights.
    pub const INFECTIOUS: [HealthStage; 4] = [
        HealthStage::Exposed,
        HealthStage::Asymptomatic,
        HealthStage::SymptomaticEarly,
        HealthStage::SymptomaticLate,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn is_infectious(self) -> bool {
        matches!(
            self,
            HealthStage::Exposed
                | HealthStage::Asymptomatic
                | HealthStage::SymptomaticEarly
                | HealthStage::SymptomaticLate
        )
    }

    /// Position within [`HealthStage::INFECTIOUS`].
    pub fn infectious_index(self) -> Option<usize> {
        HealthStage::INFECTIOUS.iter().position(|s| *s == self)
    }

    pub fn is_symptomatic(self) -> bool {
        matches!(self, HealthStage::SymptomaticEarly | HealthStage::SymptomaticLate)
    }

    pub fn is_recovered(self) -> bool {
        matches!(self, HealthStage::RecoveredIgM | HealthStage::RecoveredIgG)
    }

    pub fn is_alive(self) -> bool {
        self != HealthStage::Deceased
    }

    pub fn living() -> impl Iterator<Item = HealthStage> {
        HealthStage::ALL.into_iter().filter(|s| s.is_alive())
    }

    pub fn label(self) -> &'static str {
        match self {
            HealthStage::Susceptible => "susceptible",
            HealthStage::Exposed => "exposed",
            HealthStage::Asymptomatic => "asymptomatic",
            HealthStage::SymptomaticEarly => "infected1",
            HealthStage::SymptomaticLate => "infected2",
            HealthStage::RecoveredIgM => "recovered1",
            HealthStage::RecoveredIgG => "recovered2",
            HealthStage::Deceased => "deceased",
        }
    }
}

/// Where a person is, for contact-mixing purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationState {
    /// Unrestricted, or distancing when that policy is on.
    Unrestricted,
    HomeIsolated,
    Hospitalized,
    /// Mixes like a hospitalised patient, but never admitted or discharged.
    HospitalStaff,
}

impl IsolationState {
    pub const COUNT: usize = 4;

    pub const ALL: [IsolationState; 4] = [
        IsolationState::Unrestricted,
        IsolationState::HomeIsolated,
        IsolationState::Hospitalized,
        IsolationState::HospitalStaff,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn in_hospital(self) -> bool {
        matches!(self, IsolationState::Hospitalized | IsolationState::HospitalStaff)
    }

    pub fn label(self) -> &'static str {
        match self {
            IsolationState::Unrestricted => "distancing",
            IsolationState::HomeIsolated => "quarantined",
            IsolationState::Hospitalized => "hospitalized",
            IsolationState::HospitalStaff => "hospStaff",
        }
    }
}

/// Accumulated diagnostic result, a lattice over two bits (virus, antibody).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestState {
    Untested = 0b00,
    VirusPositive = 0b01,
    AntibodyPositive = 0b10,
    BothPositive = 0b11,
}

impl TestState {
    pub const COUNT: usize = 4;

    pub const ALL: [TestState; 4] = [
        TestState::Untested,
        TestState::VirusPositive,
        TestState::AntibodyPositive,
        TestState::BothPositive,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    fn from_bits(bits: u8) -> TestState {
        match bits & 0b11 {
            0b00 => TestState::Untested,
            0b01 => TestState::VirusPositive,
            0b10 => TestState::AntibodyPositive,
            _ => TestState::BothPositive,
        }
    }

    /// Destination after a positive result for the axis `positive` marks.
    pub fn after_positive(self, positive: TestState) -> TestState {
        TestState::from_bits(self as u8 | positive as u8)
    }

    /// Destination after a negative result for the axis `positive` marks.
    pub fn after_negative(self, positive: TestState) -> TestState {
        TestState::from_bits(self as u8 & !(positive as u8))
    }

    pub fn has_antibody(self) -> bool {
        self as u8 & TestState::AntibodyPositive as u8 != 0
    }

    pub fn label(self) -> &'static str {
        match self {
            TestState::Untested => "neg_noTest",
            TestState::VirusPositive => "pos_test",
            TestState::AntibodyPositive => "pos_antibody",
            TestState::BothPositive => "pos_both",
        }
    }
}

/// Everything about a cell except its age group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Compartment {
    pub health: HealthStage,
    pub iso: IsolationState,
    pub test: TestState,
}

impl Compartment {
    pub const COUNT: usize = HealthStage::COUNT * IsolationState::COUNT * TestState::COUNT;

    pub const fn new(health: HealthStage, iso: IsolationState, test: TestState) -> Self {
        Self { health, iso, test }
    }

    pub const fn index(self) -> usize {
        (self.health.index() * IsolationState::COUNT + self.iso.index()) * TestState::COUNT
            + self.test.index()
    }

    pub fn from_index(idx: usize) -> Self {
        let test = TestState::ALL[idx % TestState::COUNT];
        let iso = IsolationState::ALL[(idx / TestState::COUNT) % IsolationState::COUNT];
        let health = HealthStage::ALL[idx / (TestState::COUNT * IsolationState::COUNT)];
        Self { health, iso, test }
    }

    /// All compartments in storage order.
    pub fn all() -> impl Iterator<Item = Compartment> {
        (0..Compartment::COUNT).map(Compartment::from_index)
    }

    pub fn with_health(self, health: HealthStage) -> Self {
        Self { health, ..self }
    }

    pub fn with_iso(self, iso: IsolationState) -> Self {
        Self { iso, ..self }
    }

    pub fn with_test(self, test: TestState) -> Self {
        Self { test, ..self }
    }
}

/// Dense population over (age × health × isolation × test).
#[derive(Debug, Clone, PartialEq)]
pub struct StateTensor {
    n_age: usize,
    values: Vec<f64>,
}

impl StateTensor {
    pub fn zeros(n_age: usize) -> Self {
        Self {
            n_age,
            values: vec![0.0; n_age * Compartment::COUNT],
        }
    }

    /// Wrap a flat vector laid out age-major, then [`Compartment::index`].
    pub fn from_flat(n_age: usize, values: Vec<f64>) -> Option<Self> {
        (values.len() == n_age * Compartment::COUNT).then_some(Self { n_age, values })
    }

    /// Initial population: everyone susceptible and untested, hospital staff
    /// moved to the staff pool, and the general pool split between home and
    /// hospital at the baseline occupancy equilibrium.
    pub fn initial(population: &[f64], staff_ratio: &[f64], occupancy_ratio: &[f64]) -> Self {
        let n_age = population.len();
        let mut s = Self::zeros(n_age);
        let unrestricted = Compartment::new(
            HealthStage::Susceptible,
            IsolationState::Unrestricted,
            TestState::Untested,
        );
        for a in 0..n_age {
            let staff = staff_ratio[a] * population[a];
            let general = population[a] - staff;
            let in_hospital = occupancy_ratio[a] * general;
            s[(a, unrestricted)] = general - in_hospital;
            s[(a, unrestricted.with_iso(IsolationState::Hospitalized))] = in_hospital;
            s[(a, unrestricted.with_iso(IsolationState::HospitalStaff))] = staff;
        }
        s
    }

    pub fn n_age(&self) -> usize {
        self.n_age
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.values
    }

    pub fn get(&self, age: usize, c: Compartment) -> f64 {
        self.values[age * Compartment::COUNT + c.index()]
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn living_total(&self) -> f64 {
        self.iter()
            .filter(|(_, c, _)| c.health.is_alive())
            .map(|(_, _, v)| v)
            .sum()
    }

    /// Sum over all cells matching `pred`.
    pub fn sum_where(&self, mut pred: impl FnMut(usize, Compartment) -> bool) -> f64 {
        self.iter()
            .filter(|(a, c, _)| pred(*a, *c))
            .map(|(_, _, v)| v)
            .sum()
    }

    pub fn health_total(&self, health: HealthStage) -> f64 {
        self.sum_where(|_, c| c.health == health)
    }

    pub fn iso_total(&self, iso: IsolationState) -> f64 {
        self.sum_where(|_, c| c.iso == iso)
    }

    /// `(age, compartment, value)` in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Compartment, f64)> + '_ {
        self.values.iter().enumerate().map(|(i, v)| {
            (
                i / Compartment::COUNT,
                Compartment::from_index(i % Compartment::COUNT),
                *v,
            )
        })
    }
}

impl std::ops::Index<(usize, Compartment)> for StateTensor {
    type Output = f64;

    fn index(&self, (age, c): (usize, Compartment)) -> &f64 {
        &self.values[age * Compartment::COUNT + c.index()]
    }
}

impl std::ops::IndexMut<(usize, Compartment)> for StateTensor {
    fn index_mut(&mut self, (age, c): (usize, Compartment)) -> &mut f64 {
        &mut self.values[age * Compartment::COUNT + c.index()]
    }
}
