//! `smelt_core`: accelerated, rate-limited conversion at smelting stations.
//!
//! No IO and no timers. Stations and actors are reached through the traits in
//! [`host`]; a driver calls [`Scheduler::run_quantum`] on its own clock.

pub mod autopull;
pub mod autotune;
mod config;
pub mod conversion;
pub mod host;
mod ledger;
mod profile;
pub mod scheduler;
pub mod splitter;
pub mod tracking;
mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;

pub use autotune::{EffectiveSchedulingParams, TuningMode};
pub use config::*;
pub use conversion::{CycleOutcome, SkipReason};
pub use host::{Actor, HostError, SlotStorage, Station, StationHost, Storage};
pub use ledger::{ByproductRule, FuelLedger, Settlement};
pub use profile::{tuning_for, PresetTuning, TuningProfileResolver};
pub use scheduler::{QuantumReport, Scheduler, SchedulerState, StatusReport};
pub use splitter::SplitOutcome;
pub use types::*;
