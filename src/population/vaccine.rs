//! Vaccine types, their effectiveness records and the per-person vaccine record.
//!
//! A person only stores which vaccine they received and for how many days. The effectiveness
//! values live in a [`VaccineTable`] shared by the whole population and are looked up at read
//! time, so a ramping vaccine costs nothing per person beyond the day counter.
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::StrideError;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum VaccineType {
    #[serde(rename = "noVaccine")]
    #[strum(serialize = "noVaccine")]
    NoVaccine,
    #[serde(rename = "mRNA")]
    #[strum(serialize = "mRNA")]
    MRna,
    #[serde(rename = "adeno")]
    #[strum(serialize = "adeno")]
    Adeno,
}

/// Calibrated effectiveness of one vaccine product.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VaccineProperties {
    /// Full effectiveness from the day of vaccination.
    Constant {
        id: String,
        ve_susceptible: f64,
        ve_infectiousness: f64,
        ve_severe: f64,
    },
    /// Effectiveness grows linearly from zero to the nominal values over `max_effect_day` days.
    Linear {
        id: String,
        ve_susceptible: f64,
        ve_infectiousness: f64,
        ve_severe: f64,
        max_effect_day: u32,
    },
}

impl VaccineProperties {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            VaccineProperties::Constant { id, .. } | VaccineProperties::Linear { id, .. } => id,
        }
    }

    fn scale(&self, nominal: f64, days_since: u32) -> f64 {
        match self {
            VaccineProperties::Constant { .. } => nominal,
            VaccineProperties::Linear { max_effect_day, .. } => {
                if days_since < *max_effect_day {
                    f64::from(days_since) * nominal / f64::from(*max_effect_day)
                } else {
                    nominal
                }
            }
        }
    }

    fn nominal(&self) -> (f64, f64, f64) {
        match self {
            VaccineProperties::Constant {
                ve_susceptible,
                ve_infectiousness,
                ve_severe,
                ..
            }
            | VaccineProperties::Linear {
                ve_susceptible,
                ve_infectiousness,
                ve_severe,
                ..
            } => (*ve_susceptible, *ve_infectiousness, *ve_severe),
        }
    }

    #[must_use]
    pub fn ve_susceptible(&self, days_since: u32) -> f64 {
        self.scale(self.nominal().0, days_since)
    }

    #[must_use]
    pub fn ve_infectiousness(&self, days_since: u32) -> f64 {
        self.scale(self.nominal().1, days_since)
    }

    #[must_use]
    pub fn ve_severe(&self, days_since: u32) -> f64 {
        self.scale(self.nominal().2, days_since)
    }

    pub fn validate(&self) -> Result<(), StrideError> {
        let (susceptible, infectiousness, severe) = self.nominal();
        for (name, value) in [
            ("ve_susceptible", susceptible),
            ("ve_infectiousness", infectiousness),
            ("ve_severe", severe),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(StrideError::ConfigInvalid(format!(
                    "vaccine {}: {name} = {value} is outside [0, 1]",
                    self.id()
                )));
            }
        }
        Ok(())
    }
}

/// The effectiveness records bound to each vaccine type for one simulation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VaccineTable {
    #[serde(rename = "mRNA", default)]
    pub mrna: Option<VaccineProperties>,
    #[serde(default)]
    pub adeno: Option<VaccineProperties>,
}

impl VaccineTable {
    /// `None` for `NoVaccine` and for types without a record.
    #[must_use]
    pub fn get(&self, vaccine_type: VaccineType) -> Option<&VaccineProperties> {
        match vaccine_type {
            VaccineType::NoVaccine => None,
            VaccineType::MRna => self.mrna.as_ref(),
            VaccineType::Adeno => self.adeno.as_ref(),
        }
    }

    pub fn validate(&self) -> Result<(), StrideError> {
        self.mrna.iter().chain(self.adeno.iter()).try_for_each(VaccineProperties::validate)
    }
}

/// What a vaccinated person carries: the product and the days since it was given.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VaccineRecord {
    pub vaccine_type: VaccineType,
    pub days_since: u32,
}

impl VaccineRecord {
    #[must_use]
    pub fn new(vaccine_type: VaccineType) -> Self {
        VaccineRecord {
            vaccine_type,
            days_since: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn linear() -> VaccineProperties {
        VaccineProperties::Linear {
            id: "adeno-ramp".to_string(),
            ve_susceptible: 0.6,
            ve_infectiousness: 0.4,
            ve_severe: 0.8,
            max_effect_day: 10,
        }
    }

    #[test]
    fn vaccine_type_names() {
        assert_eq!(VaccineType::MRna.to_string(), "mRNA");
        assert_eq!("adeno".parse::<VaccineType>().unwrap(), VaccineType::Adeno);
        assert_eq!(
            "noVaccine".parse::<VaccineType>().unwrap(),
            VaccineType::NoVaccine
        );
        assert!("pfizer".parse::<VaccineType>().is_err());
    }

    #[test]
    fn constant_is_flat() {
        let vaccine = VaccineProperties::Constant {
            id: "mRNA".to_string(),
            ve_susceptible: 0.9,
            ve_infectiousness: 0.5,
            ve_severe: 0.95,
        };
        assert_approx_eq!(vaccine.ve_susceptible(0), 0.9);
        assert_approx_eq!(vaccine.ve_susceptible(100), 0.9);
        assert_approx_eq!(vaccine.ve_severe(3), 0.95);
    }

    #[test]
    fn linear_ramps_then_plateaus() {
        let vaccine = linear();
        assert_approx_eq!(vaccine.ve_susceptible(0), 0.0);
        assert_approx_eq!(vaccine.ve_susceptible(5), 0.3);
        assert_approx_eq!(vaccine.ve_infectiousness(5), 0.2);
        assert_approx_eq!(vaccine.ve_susceptible(10), 0.6);
        assert_approx_eq!(vaccine.ve_susceptible(50), 0.6);
    }

    #[test]
    fn table_binds_types() {
        let table = VaccineTable {
            mrna: None,
            adeno: Some(linear()),
        };
        assert!(table.get(VaccineType::NoVaccine).is_none());
        assert!(table.get(VaccineType::MRna).is_none());
        assert_eq!(table.get(VaccineType::Adeno).unwrap().id(), "adeno-ramp");
    }

    #[test]
    fn parses_tagged_records() {
        let table: VaccineTable = serde_json::from_str(
            r#"{
                "mRNA": {"kind": "constant", "id": "m", "ve_susceptible": 1.0,
                         "ve_infectiousness": 0.0, "ve_severe": 1.0},
                "adeno": {"kind": "linear", "id": "a", "ve_susceptible": 0.67,
                          "ve_infectiousness": 0.0, "ve_severe": 0.9, "max_effect_day": 14}
            }"#,
        )
        .unwrap();
        assert!(matches!(
            table.get(VaccineType::MRna),
            Some(VaccineProperties::Constant { .. })
        ));
        assert!(table.validate().is_ok());
    }

    #[test]
    fn rejects_effectiveness_outside_unit_interval() {
        let vaccine = VaccineProperties::Constant {
            id: "bad".to_string(),
            ve_susceptible: 1.2,
            ve_infectiousness: 0.0,
            ve_severe: 0.0,
        };
        assert!(matches!(
            vaccine.validate(),
            Err(StrideError::ConfigInvalid(_))
        ));
    }
}
