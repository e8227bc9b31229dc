//! Weekly trigger scheduling for capture jobs.

mod service;
mod trigger;

pub use service::{CaptureRunner, SchedulerConfig, ShutdownReport, TriggerScheduler};
pub use trigger::{WeeklyTrigger, next_occurrence};
