//! The check pipeline.
//!
//! A sweep lists every check, validates each record, probes it, and hands
//! the outcome to the processor, which logs it, stores the new state and
//! alerts on transitions. Rotation periodically archives the per-check logs.

pub mod alert;
pub mod checker;
pub mod processor;
pub mod rotation;
pub mod scheduler;
pub mod types;
pub mod validation;
pub mod worker;


pub use checker::{Checker, HttpChecker};
pub use scheduler::Scheduler;
pub use worker::{SweepSummary, Worker};
