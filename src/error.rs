use thiserror::Error;

/// Failures raised by the simulation core.
///
/// Configuration and file problems are reported through `anyhow` by the
/// loaders; this type covers what can go wrong once a run is underway.
#[derive(Debug, Error)]
pub enum SimError {
    /// A builder or the integrator was handed data of the wrong shape.
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The integration could not continue past `day`.
    #[error("integration failed on day {day}: {reason}")]
    Integration { day: usize, reason: String },
}

impl SimError {
    pub fn integration(day: usize, reason: impl Into<String>) -> Self {
        SimError::Integration {
            day,
            reason: reason.into(),
        }
    }
}

pub type SimResult<T> = Result<T, SimError>;
