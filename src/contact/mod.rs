//! Contact rates and the per-pool transmission step.
pub mod age_contact_profile;
pub mod infector;

pub use age_contact_profile::{AgeContactProfile, AgeContactProfiles};
pub use infector::{infect_pool, infect_pools, InfectorInputs, Transmission};
