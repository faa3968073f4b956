//! Expected daily contact rates between ages, one profile per contact type.
use crate::config::{ContactProfileConfig, ContactsConfig};
use crate::population::{ContactType, NUM_CONTACT_TYPES};
use crate::StrideError;

#[derive(Clone, Debug, PartialEq)]
enum Rates {
    Uniform(f64),
    /// `[infector age][contact age]`, square.
    Matrix(Vec<Vec<f64>>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct AgeContactProfile {
    rates: Rates,
    per_capita: bool,
}

impl AgeContactProfile {
    /// No contacts at all.
    #[must_use]
    pub fn none() -> Self {
        AgeContactProfile::uniform(0.0)
    }

    #[must_use]
    pub fn uniform(rate: f64) -> Self {
        AgeContactProfile {
            rates: Rates::Uniform(rate.max(0.0)),
            per_capita: false,
        }
    }

    pub fn from_matrix(matrix: Vec<Vec<f64>>) -> Result<Self, StrideError> {
        let size = matrix.len();
        if size == 0 || matrix.iter().any(|row| row.len() != size) {
            return Err(StrideError::ConfigInvalid(
                "contact matrices must be square and non-empty".to_string(),
            ));
        }
        if matrix.iter().flatten().any(|rate| *rate < 0.0 || !rate.is_finite()) {
            return Err(StrideError::ConfigInvalid(
                "contact rates must be finite and not negative".to_string(),
            ));
        }
        Ok(AgeContactProfile {
            rates: Rates::Matrix(matrix),
            per_capita: false,
        })
    }

    /// Divide rates by the number of other members of the pool.
    #[must_use]
    pub fn per_capita(mut self, per_capita: bool) -> Self {
        self.per_capita = per_capita;
        self
    }

    pub fn from_config(config: &ContactProfileConfig) -> Result<Self, StrideError> {
        let profile = match (&config.rate, &config.matrix) {
            (Some(rate), None) => AgeContactProfile::uniform(*rate),
            (None, Some(matrix)) => AgeContactProfile::from_matrix(matrix.clone())?,
            _ => {
                return Err(StrideError::ConfigInvalid(
                    "a contact profile needs exactly one of `rate` and `matrix`".to_string(),
                ))
            }
        };
        Ok(profile.per_capita(config.per_capita))
    }

    /// Contact rate between an infector of `infector_age` and a contact of `contact_age` in a
    /// pool of `pool_size` members. Ages beyond the matrix use its last row or column.
    #[must_use]
    pub fn rate(&self, infector_age: u32, contact_age: u32, pool_size: usize) -> f64 {
        let rate = match &self.rates {
            Rates::Uniform(rate) => *rate,
            Rates::Matrix(matrix) => {
                let last = matrix.len() - 1;
                let row = &matrix[(infector_age as usize).min(last)];
                row[(contact_age as usize).min(last)]
            }
        };
        if self.per_capita && pool_size > 1 {
            rate / (pool_size - 1) as f64
        } else {
            rate
        }
    }
}

/// The profile of every contact type.
#[derive(Clone, Debug, PartialEq)]
pub struct AgeContactProfiles {
    profiles: [AgeContactProfile; NUM_CONTACT_TYPES],
}

impl Default for AgeContactProfiles {
    fn default() -> Self {
        AgeContactProfiles {
            profiles: ContactType::ALL.map(|_| AgeContactProfile::none()),
        }
    }
}

impl AgeContactProfiles {
    pub fn from_config(config: &ContactsConfig) -> Result<Self, StrideError> {
        let mut profiles = AgeContactProfiles::default();
        for (contact_type, profile) in [
            (ContactType::Household, &config.household),
            (ContactType::School, &config.school),
            (ContactType::Workplace, &config.workplace),
            (ContactType::PrimaryCommunity, &config.primary_community),
            (ContactType::SecondaryCommunity, &config.secondary_community),
            (ContactType::HouseholdCluster, &config.household_cluster),
        ] {
            if let Some(profile) = profile {
                profiles.set(contact_type, AgeContactProfile::from_config(profile)?);
            }
        }
        Ok(profiles)
    }

    pub fn set(&mut self, contact_type: ContactType, profile: AgeContactProfile) {
        self.profiles[contact_type.index()] = profile;
    }

    #[must_use]
    pub fn get(&self, contact_type: ContactType) -> &AgeContactProfile {
        &self.profiles[contact_type.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_lookups_clamp_to_the_last_age() {
        let profile =
            AgeContactProfile::from_matrix(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(profile.rate(0, 1, 5), 2.0);
        assert_eq!(profile.rate(1, 0, 5), 3.0);
        assert_eq!(profile.rate(90, 90, 5), 4.0);
    }

    #[test]
    fn per_capita_divides_by_other_members() {
        let profile = AgeContactProfile::uniform(6.0).per_capita(true);
        assert_eq!(profile.rate(10, 10, 4), 2.0);
        assert_eq!(profile.rate(10, 10, 1), 6.0);
    }

    #[test]
    fn rejects_ragged_matrices() {
        assert!(AgeContactProfile::from_matrix(vec![vec![1.0], vec![1.0, 2.0]]).is_err());
        assert!(AgeContactProfile::from_matrix(vec![]).is_err());
        assert!(AgeContactProfile::from_matrix(vec![vec![-1.0]]).is_err());
    }

    #[test]
    fn missing_profiles_mean_no_contacts() {
        let config = ContactsConfig {
            school: Some(ContactProfileConfig {
                rate: Some(4.0),
                matrix: None,
                per_capita: false,
            }),
            ..ContactsConfig::default()
        };
        let profiles = AgeContactProfiles::from_config(&config).unwrap();
        assert_eq!(profiles.get(ContactType::School).rate(7, 8, 20), 4.0);
        assert_eq!(profiles.get(ContactType::Household).rate(7, 8, 3), 0.0);
    }

    #[test]
    fn profile_needs_one_kind_of_rate() {
        let config = ContactProfileConfig {
            rate: Some(1.0),
            matrix: Some(vec![vec![1.0]]),
            per_capita: false,
        };
        assert!(AgeContactProfile::from_config(&config).is_err());
        assert!(AgeContactProfile::from_config(&ContactProfileConfig::default()).is_err());
    }
}
