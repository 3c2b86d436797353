pub mod contact;
pub mod inputs;
pub mod population;
pub mod report;
pub mod run_log;
