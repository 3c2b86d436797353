pub mod curves;
pub mod linalg;
pub mod ode;
