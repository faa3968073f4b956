//! Independent random number streams derived from the base seed.
//!
//! Named generators (see [`crate::define_rng`]) are stateful and live in the `Context`, so
//! the order in which a module draws from them matters. Work that may run on several threads
//! instead derives a fresh generator per unit of work, keyed by a stream name and a tuple of
//! integers such as `(day, contact type, pool id)`. Two runs with the same base seed produce
//! the same stream for the same key no matter which thread handles it.
use std::fmt::{self, Display};
use std::str::FromStr;

use crate::hashing::{hash_keys, hash_str};
use crate::rand::rngs::SmallRng;
use crate::rand::SeedableRng;
use crate::StrideError;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RngStreams {
    base_seed: u64,
}

impl RngStreams {
    #[must_use]
    pub fn new(base_seed: u64) -> Self {
        RngStreams { base_seed }
    }

    #[must_use]
    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    /// Creates the generator for `stream` at the given key.
    #[must_use]
    pub fn rng(&self, stream: &str, keys: &[u64]) -> SmallRng {
        let seed = self
            .base_seed
            .wrapping_add(hash_str(stream))
            .wrapping_add(hash_keys(keys));
        SmallRng::seed_from_u64(seed)
    }
}

/// The seed list of a run, written in configuration as comma-separated integers
/// (`"1,2,3,4"`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RngSeed(Vec<u64>);

impl RngSeed {
    #[must_use]
    pub fn from_value(seed: u64) -> Self {
        RngSeed(vec![seed])
    }

    #[must_use]
    pub fn values(&self) -> &[u64] {
        &self.0
    }

    /// Folds the seed list into a single base seed. A single value is used as is.
    #[must_use]
    pub fn base_seed(&self) -> u64 {
        match self.0.as_slice() {
            [single] => *single,
            values => hash_keys(values),
        }
    }
}

impl Default for RngSeed {
    fn default() -> Self {
        RngSeed(vec![1, 2, 3, 4])
    }
}

impl FromStr for RngSeed {
    type Err = StrideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| {
                value.parse::<u64>().map_err(|_| {
                    StrideError::ConfigInvalid(format!("rng seed entry `{value}` is not an integer"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if values.is_empty() {
            return Err(StrideError::ConfigInvalid("rng seed is empty".to_string()));
        }
        Ok(RngSeed(values))
    }
}

impl Display for RngSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u64::to_string).collect();
        write!(f, "{}", parts.join(","))
    }
}
