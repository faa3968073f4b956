//! A daily-tick, agent-based epidemic simulator exposed as a stepped decision process.
//!
//! Persons belong to overlapping contact pools: a household, a school, a workplace, a primary
//! and a secondary community and a household cluster. Each simulated day the [`calendar`]
//! publishes that day's measures (distancing factors, school closures, contact tracing,
//! household clustering, imported cases), the [`contact`] infector runs every pool that meets,
//! and the disease course of every infected person moves one day on.
//!
//! The [`mdp`] façade turns the simulation into an environment an external controller can
//! step: vaccinate an age group, simulate a day, read the counters, repeat.
//!
//! Like any module of this crate, a simulation relies on a [`Context`] for its services:
//! * named random number generators and reproducible per-pool streams ([`random`])
//! * CSV event logs under the run's output location ([`report`])
//! * typed lifecycle events delivered to subscribed viewers
//!
//! The domain state itself (population, calendar, profiles) lives in the
//! [`sim::Simulator`], outside the context.
pub mod calendar;
pub mod cli;
pub mod config;
pub mod contact;
pub mod context;
pub mod disease;
pub mod error;
pub mod hashing;
pub mod log;
pub mod mdp;
pub mod population;
pub mod random;
pub mod report;
pub mod sim;

pub use context::Context;
pub use error::StrideError;
pub use hashing::{HashMap, HashSet};
pub use mdp::{AgeGroup, ChildlessAgeGroup, CreateOptions, Mdp};
pub use population::VaccineType;

// Re-exported for the macros of this crate.
pub use csv;
pub use paste;
pub use rand;
