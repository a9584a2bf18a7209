pub mod periodic;

pub use periodic::{JobError, PeriodicJob, PeriodicWorker};
