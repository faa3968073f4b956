//! Persons, their contact pools, and the aggregate counters read by the decision process.
//!
//! The population is built once per simulation (see [`builder`]) and is frozen in structure:
//! pool memberships never change. Only the health and vaccine fields of a person are mutated
//! while the simulation runs.
pub mod builder;
pub mod contact_pool;
pub mod health;
pub mod person;
pub mod vaccine;

use serde::Serialize;

pub use contact_pool::{ContactPool, ContactPoolSys, ContactType, NUM_CONTACT_TYPES};
pub use health::{Health, HealthStatus, StageDurations};
pub use person::{Person, MAX_AGE};
pub use vaccine::{VaccineProperties, VaccineRecord, VaccineTable, VaccineType};

use crate::StrideError;

/// Counts of persons per health state plus the hospital and at-risk counters, taken in a
/// single scan.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HealthCounts {
    pub susceptible: usize,
    pub exposed: usize,
    pub infectious: usize,
    pub symptomatic: usize,
    pub recovered: usize,
    pub immune: usize,
    pub hospitalised: usize,
    pub total_hospitalised: usize,
    pub at_risk: usize,
}

impl HealthCounts {
    /// Everyone who has been infected so far, recovered included.
    #[must_use]
    pub fn total_infected(&self) -> usize {
        self.exposed + self.infectious + self.symptomatic + self.recovered
    }

    /// Everyone currently carrying the infection.
    #[must_use]
    pub fn infected(&self) -> usize {
        self.exposed + self.infectious + self.symptomatic
    }

    /// Sum over the six health states. Equals the population size.
    #[must_use]
    pub fn total(&self) -> usize {
        self.susceptible + self.immune + self.total_infected()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Population {
    persons: Vec<Person>,
    pools: ContactPoolSys,
    vaccines: VaccineTable,
}

impl Population {
    /// Builds the pool registry from the pool ids the persons carry. Person ids must equal
    /// their position.
    pub fn from_persons(persons: Vec<Person>) -> Result<Self, StrideError> {
        let mut pools = ContactPoolSys::new();
        for (position, person) in persons.iter().enumerate() {
            if person.id() as usize != position {
                return Err(StrideError::ConfigInvalid(format!(
                    "person at position {position} has id {}",
                    person.id()
                )));
            }
            for contact_type in ContactType::ALL {
                let pool_id = person.pool_id(contact_type);
                if pool_id as usize > persons.len() {
                    return Err(StrideError::ConfigInvalid(format!(
                        "person {} has {contact_type} id {pool_id}, more than the {} persons",
                        person.id(),
                        persons.len()
                    )));
                }
                pools.add_member(contact_type, pool_id, person.id());
            }
        }
        Ok(Population {
            persons,
            pools,
            vaccines: VaccineTable::default(),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.persons.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: u32) -> Option<&Person> {
        self.persons.get(id as usize)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Person> {
        self.persons.get_mut(id as usize)
    }

    /// Persons in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Person> {
        self.persons.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Person> {
        self.persons.iter_mut()
    }

    #[must_use]
    pub fn pools(&self) -> &ContactPoolSys {
        &self.pools
    }

    #[must_use]
    pub fn vaccines(&self) -> &VaccineTable {
        &self.vaccines
    }

    pub fn set_vaccines(&mut self, vaccines: VaccineTable) {
        self.vaccines = vaccines;
    }

    fn vaccine_of(&self, person: &Person) -> Option<(&VaccineProperties, u32)> {
        let record = person.vaccine?;
        let properties = self.vaccines.get(record.vaccine_type)?;
        Some((properties, record.days_since))
    }

    #[must_use]
    pub fn ve_susceptible(&self, person: &Person) -> f64 {
        self.vaccine_of(person)
            .map_or(0.0, |(vaccine, days)| vaccine.ve_susceptible(days))
    }

    #[must_use]
    pub fn ve_infectiousness(&self, person: &Person) -> f64 {
        self.vaccine_of(person)
            .map_or(0.0, |(vaccine, days)| vaccine.ve_infectiousness(days))
    }

    #[must_use]
    pub fn ve_severe(&self, person: &Person) -> f64 {
        self.vaccine_of(person)
            .map_or(0.0, |(vaccine, days)| vaccine.ve_severe(days))
    }

    /// Attaches a vaccine record to a person. Returns false if the person does not exist or
    /// the type has no effectiveness record.
    pub fn vaccinate(&mut self, id: u32, vaccine_type: VaccineType) -> bool {
        if self.vaccines.get(vaccine_type).is_none() {
            return false;
        }
        match self.persons.get_mut(id as usize) {
            Some(person) => {
                person.vaccine = Some(VaccineRecord::new(vaccine_type));
                true
            }
            None => false,
        }
    }

    /// Susceptible and not fully protected by a vaccine.
    #[must_use]
    pub fn is_at_risk(&self, person: &Person) -> bool {
        person.health.is_susceptible() && self.ve_susceptible(person) < 1.0
    }

    /// Ids of susceptible persons, in id order.
    pub fn susceptible_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.persons
            .iter()
            .filter(|person| person.health.is_susceptible())
            .map(Person::id)
    }

    #[must_use]
    pub fn health_counts(&self) -> HealthCounts {
        let mut counts = HealthCounts::default();
        for person in &self.persons {
            match person.health.status() {
                HealthStatus::Susceptible => counts.susceptible += 1,
                HealthStatus::Exposed => counts.exposed += 1,
                HealthStatus::Infectious => counts.infectious += 1,
                HealthStatus::Symptomatic => counts.symptomatic += 1,
                HealthStatus::Recovered => counts.recovered += 1,
                HealthStatus::Immune => counts.immune += 1,
            }
            counts.hospitalised += usize::from(person.health.is_hospitalised());
            counts.total_hospitalised += usize::from(person.health.was_hospitalised());
            counts.at_risk += usize::from(self.is_at_risk(person));
        }
        counts
    }

    fn count(&self, predicate: impl Fn(&Person) -> bool) -> usize {
        self.persons.iter().filter(|person| predicate(person)).count()
    }

    #[must_use]
    pub fn count_by_status(&self, status: HealthStatus) -> usize {
        self.count(|person| person.health.status() == status)
    }

    #[must_use]
    pub fn total_infected(&self) -> usize {
        self.count(|person| person.health.has_been_infected())
    }

    #[must_use]
    pub fn count_infected_cases(&self) -> usize {
        self.count(|person| person.health.is_infected())
    }

    #[must_use]
    pub fn count_exposed_cases(&self) -> usize {
        self.count_by_status(HealthStatus::Exposed)
    }

    #[must_use]
    pub fn count_infectious_cases(&self) -> usize {
        self.count(|person| person.health.is_infectious())
    }

    #[must_use]
    pub fn count_symptomatic_cases(&self) -> usize {
        self.count_by_status(HealthStatus::Symptomatic)
    }

    #[must_use]
    pub fn count_hospitalised_cases(&self) -> usize {
        self.count(|person| person.health.is_hospitalised())
    }

    #[must_use]
    pub fn total_hospitalised(&self) -> usize {
        self.count(|person| person.health.was_hospitalised())
    }

    #[must_use]
    pub fn at_risk(&self) -> usize {
        self.count(|person| self.is_at_risk(person))
    }

    /// Drops the pool registry. Persons keep their pool ids.
    pub fn clear_contact_pools(&mut self) {
        self.pools.clear();
    }

    /// Drops every person, pool and vaccine record.
    pub fn clear(&mut self) {
        self.persons.clear();
        self.pools.clear();
        self.vaccines = VaccineTable::default();
    }
}
