//! Pipeline entry points.
//!
//! - `run_monitor`: one full pass over the notice board

pub mod monitor;

pub use monitor::{RunReport, run_monitor, run_monitor_on};
