//! # Forecast Pipeline
//!
//! The daily forecast cycle: fetch the trailing analytics window, derive a
//! one-day-ahead forecast, persist it as a snapshot and prune the store back
//! to its cap. `ForecastScheduler` drives the cycle from a `TriggerSource` and
//! guarantees that at most one cycle runs at a time.

pub mod clock;
pub mod derive;
pub mod error;
pub mod pipeline;
pub mod scheduler;
pub mod trigger;

pub use clock::{Clock, SystemClock};
pub use derive::derive_forecast;
pub use error::{CycleError, DeriveError};
pub use pipeline::{CycleSuccess, ForecastPipeline, PipelineSettings};
pub use scheduler::{ForecastScheduler, SchedulerStatus, TriggerOutcome};
pub use trigger::{DailyTrigger, ManualTrigger, ScheduledJob, TriggerSource, next_run_after};
