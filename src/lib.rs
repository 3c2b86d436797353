pub mod error;
pub mod io;
pub mod math;
pub mod model;

pub use error::{SimError, SimResult};
pub use model::assembler::TransitionAssembler;
pub use model::config::{ModelConfig, SolverConfig, SolverMethod};
pub use model::integrator::{DayRecord, Simulation, Trajectory};
pub use model::scenario::{AgeParameters, ScenarioInputs};
pub use model::state::{Compartment, HealthStage, IsolationState, StateTensor, TestState};
pub use model::transition::TransitionTensor;
