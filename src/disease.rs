//! Disease parameters consulted by the simulator: the per-contact transmission probability,
//! per-age stage durations and the hospitalisation curves.
use log::debug;
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;

use crate::config::{
    AgeBandConfig, DiseaseConfig, DurationConfig, HospitalisationConfig, TransmissionConfig,
};
use crate::population::{StageDurations, MAX_AGE};
use crate::StrideError;

/// Base per-contact transmission probability, optionally scaled by the susceptible's age.
#[derive(Clone, Debug, PartialEq)]
pub struct TransmissionProfile {
    probability: f64,
    age_factors: Vec<f64>,
}

impl TransmissionProfile {
    #[must_use]
    pub fn new(probability: f64) -> Self {
        TransmissionProfile {
            probability: probability.clamp(0.0, 1.0),
            age_factors: Vec::new(),
        }
    }

    /// Transmission probability `b0 + b1 * r0 + b2 * r0^2` for a target reproduction number.
    #[must_use]
    pub fn from_r0(r0: f64, b0: f64, b1: f64, b2: f64) -> Self {
        TransmissionProfile::new(b0 + b1 * r0 + b2 * r0 * r0)
    }

    #[must_use]
    pub fn with_age_factors(mut self, age_factors: Vec<f64>) -> Self {
        self.age_factors = age_factors;
        self
    }

    pub fn from_config(config: &TransmissionConfig) -> Result<Self, StrideError> {
        let (profile, age_factors) = match config {
            TransmissionConfig::Probability {
                probability,
                age_factors,
            } => (TransmissionProfile::new(*probability), age_factors),
            TransmissionConfig::FromR0 {
                r0,
                b0,
                b1,
                b2,
                age_factors,
            } => (TransmissionProfile::from_r0(*r0, *b0, *b1, *b2), age_factors),
        };
        if age_factors.iter().any(|factor| *factor < 0.0) {
            return Err(StrideError::ConfigInvalid(
                "transmission age factors must not be negative".to_string(),
            ));
        }
        debug!("transmission probability {}", profile.probability);
        Ok(profile.with_age_factors(age_factors.clone()))
    }

    #[must_use]
    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// The probability for a susceptible of `age`. Ages without a factor use `1.0`.
    #[must_use]
    pub fn probability_for_age(&self, age: u32) -> f64 {
        let factor = self.age_factors.get(age as usize).copied().unwrap_or(1.0);
        (self.probability * factor).clamp(0.0, 1.0)
    }
}

/// Distribution of the number of days spent in one stage.
#[derive(Clone, Debug)]
pub enum DurationDistribution {
    Fixed(u16),
    /// Entry `k` is the weight of `k + 1` days.
    Weighted(WeightedIndex<f64>),
}

impl DurationDistribution {
    fn from_config(config: &DurationConfig) -> Result<Self, StrideError> {
        match config {
            DurationConfig::Fixed(days) => Ok(DurationDistribution::Fixed((*days).max(1))),
            DurationConfig::Weights(weights) => WeightedIndex::new(weights)
                .map(DurationDistribution::Weighted)
                .map_err(|e| {
                    StrideError::ConfigInvalid(format!("invalid duration weights {weights:?}: {e}"))
                }),
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u16 {
        match self {
            DurationDistribution::Fixed(days) => *days,
            DurationDistribution::Weighted(index) => {
                u16::try_from(index.sample(rng) + 1).unwrap_or(u16::MAX)
            }
        }
    }
}

#[derive(Clone, Debug)]
struct AgeBand {
    min_age: u32,
    max_age: u32,
    latent: DurationDistribution,
    pre_symptomatic: DurationDistribution,
    symptomatic: DurationDistribution,
}

impl AgeBand {
    fn from_config(config: &AgeBandConfig) -> Result<Self, StrideError> {
        if config.min_age > config.max_age {
            return Err(StrideError::ConfigInvalid(format!(
                "age band {}..={} is empty",
                config.min_age, config.max_age
            )));
        }
        Ok(AgeBand {
            min_age: config.min_age,
            max_age: config.max_age,
            latent: DurationDistribution::from_config(&config.latent)?,
            pre_symptomatic: DurationDistribution::from_config(&config.pre_symptomatic)?,
            symptomatic: DurationDistribution::from_config(&config.symptomatic)?,
        })
    }
}

/// Per-age stage durations of an infection.
#[derive(Clone, Debug)]
pub struct DiseaseProfile {
    bands: Vec<AgeBand>,
}

impl DiseaseProfile {
    pub fn from_config(config: &DiseaseConfig) -> Result<Self, StrideError> {
        if config.age_bands.is_empty() {
            return Err(StrideError::ConfigInvalid(
                "disease.age_bands must not be empty".to_string(),
            ));
        }
        let mut bands = config
            .age_bands
            .iter()
            .map(AgeBand::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        bands.sort_by_key(|band| band.min_age);
        Ok(DiseaseProfile { bands })
    }

    /// A profile where every stage takes the given fixed number of days at every age.
    #[must_use]
    pub fn fixed(latent: u16, pre_symptomatic: u16, symptomatic: u16) -> Self {
        DiseaseProfile {
            bands: vec![AgeBand {
                min_age: 0,
                max_age: MAX_AGE,
                latent: DurationDistribution::Fixed(latent.max(1)),
                pre_symptomatic: DurationDistribution::Fixed(pre_symptomatic.max(1)),
                symptomatic: DurationDistribution::Fixed(symptomatic.max(1)),
            }],
        }
    }

    /// The band containing `age`; ages between or beyond the bands use the closest band below,
    /// or the first band.
    fn band(&self, age: u32) -> &AgeBand {
        self.bands
            .iter()
            .find(|band| (band.min_age..=band.max_age).contains(&age))
            .or_else(|| self.bands.iter().rev().find(|band| band.max_age < age))
            .unwrap_or(&self.bands[0])
    }

    pub fn sample_durations<R: Rng + ?Sized>(&self, age: u32, rng: &mut R) -> StageDurations {
        let band = self.band(age);
        StageDurations::new(
            band.latent.sample(rng),
            band.pre_symptomatic.sample(rng),
            band.symptomatic.sample(rng),
        )
    }
}

/// Per-age probability of hospitalisation at symptom onset and the delay until admission.
#[derive(Clone, Debug, PartialEq)]
pub struct HospitalisationProfile {
    probabilities: Vec<f64>,
    delays: Vec<u16>,
}

impl Default for HospitalisationProfile {
    /// Nobody is ever hospitalised.
    fn default() -> Self {
        HospitalisationProfile {
            probabilities: vec![0.0; MAX_AGE as usize + 1],
            delays: vec![0; MAX_AGE as usize + 1],
        }
    }
}

impl HospitalisationProfile {
    /// Expands age categories into per-age curves for ages `0..=MAX_AGE`. Category `i` covers
    /// ages from `age_categories[i]` up to the next category's lower bound.
    pub fn from_config(config: &HospitalisationConfig) -> Result<Self, StrideError> {
        let categories = config.age_categories.len();
        if categories == 0
            || config.probabilities.len() != categories
            || config.delays.len() != categories
        {
            return Err(StrideError::ConfigInvalid(
                "hospitalisation needs one probability and one delay per age category".to_string(),
            ));
        }
        if config.age_categories.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(StrideError::ConfigInvalid(
                "hospitalisation age categories must be ascending".to_string(),
            ));
        }
        if config
            .probabilities
            .iter()
            .chain(std::iter::once(&config.probability_factor))
            .any(|value| *value < 0.0)
        {
            return Err(StrideError::ConfigInvalid(
                "hospitalisation probabilities must not be negative".to_string(),
            ));
        }

        let mut profile = HospitalisationProfile::default();
        for age in 0..=MAX_AGE {
            let Some(category) = config
                .age_categories
                .iter()
                .rposition(|lower| *lower <= age)
            else {
                continue;
            };
            profile.probabilities[age as usize] =
                (config.probabilities[category] * config.probability_factor).min(1.0);
            profile.delays[age as usize] = config.delays[category];
        }
        Ok(profile)
    }

    #[must_use]
    pub fn probability(&self, age: u32) -> f64 {
        self.probabilities[age.min(MAX_AGE) as usize]
    }

    #[must_use]
    pub fn delay(&self, age: u32) -> u16 {
        self.delays[age.min(MAX_AGE) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn band(min_age: u32, max_age: u32, latent: DurationConfig) -> AgeBandConfig {
        AgeBandConfig {
            min_age,
            max_age,
            latent,
            pre_symptomatic: DurationConfig::Fixed(1),
            symptomatic: DurationConfig::Fixed(4),
        }
    }

    fn disease(bands: Vec<AgeBandConfig>) -> DiseaseConfig {
        DiseaseConfig {
            transmission: TransmissionConfig::Probability {
                probability: 0.1,
                age_factors: vec![],
            },
            age_bands: bands,
            hospitalisation: None,
        }
    }

    #[test]
    fn transmission_from_r0() {
        let profile = TransmissionProfile::from_r0(2.0, 0.01, 0.02, 0.005);
        assert_approx_eq!(profile.probability(), 0.01 + 0.04 + 0.02);
    }

    #[test]
    fn transmission_age_factors() {
        let profile = TransmissionProfile::from_config(&TransmissionConfig::Probability {
            probability: 0.4,
            age_factors: vec![0.5, 3.0],
        })
        .unwrap();
        assert_approx_eq!(profile.probability_for_age(0), 0.2);
        assert_approx_eq!(profile.probability_for_age(1), 1.0);
        assert_approx_eq!(profile.probability_for_age(50), 0.4);
    }

    #[test]
    fn durations_follow_age_bands() {
        let profile = DiseaseProfile::from_config(&disease(vec![
            band(20, 110, DurationConfig::Fixed(5)),
            band(0, 9, DurationConfig::Fixed(2)),
        ]))
        .unwrap();
        let mut rng = SmallRng::seed_from_u64(8);
        assert_eq!(profile.sample_durations(4, &mut rng).latent, 2);
        assert_eq!(profile.sample_durations(30, &mut rng).latent, 5);
        // Between bands: the closest band below.
        assert_eq!(profile.sample_durations(15, &mut rng).latent, 2);
        assert_eq!(profile.sample_durations(30, &mut rng).symptomatic, 4);
    }

    #[test]
    fn weighted_durations_stay_in_range() {
        let profile = DiseaseProfile::from_config(&disease(vec![band(
            0,
            110,
            DurationConfig::Weights(vec![0.0, 1.0, 1.0]),
        )]))
        .unwrap();
        let mut rng = SmallRng::seed_from_u64(8);
        for _ in 0..100 {
            let latent = profile.sample_durations(40, &mut rng).latent;
            assert!((2..=3).contains(&latent));
        }
    }

    #[test]
    fn rejects_bad_bands() {
        assert!(DiseaseProfile::from_config(&disease(vec![])).is_err());
        assert!(DiseaseProfile::from_config(&disease(vec![band(
            10,
            5,
            DurationConfig::Fixed(1)
        )]))
        .is_err());
        assert!(DiseaseProfile::from_config(&disease(vec![band(
            0,
            5,
            DurationConfig::Weights(vec![0.0, 0.0])
        )]))
        .is_err());
    }

    #[test]
    fn hospitalisation_curves_expand_categories() {
        let profile = HospitalisationProfile::from_config(&HospitalisationConfig {
            age_categories: vec![0, 20, 60],
            probabilities: vec![0.01, 0.1, 0.6],
            delays: vec![5, 4, 2],
            probability_factor: 2.0,
        })
        .unwrap();
        assert_approx_eq!(profile.probability(10), 0.02);
        assert_approx_eq!(profile.probability(20), 0.2);
        assert_approx_eq!(profile.probability(80), 1.0);
        assert_approx_eq!(profile.probability(500), 1.0);
        assert_eq!(profile.delay(19), 5);
        assert_eq!(profile.delay(60), 2);
    }

    #[test]
    fn hospitalisation_rejects_ragged_input() {
        let config = HospitalisationConfig {
            age_categories: vec![0, 20],
            probabilities: vec![0.1],
            delays: vec![1, 1],
            probability_factor: 1.0,
        };
        assert!(HospitalisationProfile::from_config(&config).is_err());
        assert_eq!(HospitalisationProfile::default().probability(70), 0.0);
    }
}
