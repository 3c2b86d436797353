pub mod age_adjust;
pub mod assembler;
pub mod config;
pub mod hospital;
pub mod integrator;
pub mod policy;
pub mod progression;
pub mod quarantine;
pub mod scenario;
pub mod state;
pub mod testing;
pub mod transition;
pub mod transmission;
pub mod travel;
