//! Within-pool transmission.
//!
//! The infector is split in two phases. [`infect_pool`] only reads the population and returns
//! the transmissions that happen in one pool; the simulator applies them afterwards in pool
//! order. Pools of one contact type are disjoint in membership, so the read phase can run on
//! several threads ([`infect_pools`]) as long as every pool draws from its own random stream.
use log::trace;
use rand::Rng;
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::calendar::DayPolicy;
use crate::contact::age_contact_profile::AgeContactProfile;
use crate::disease::TransmissionProfile;
use crate::population::{ContactPool, ContactType, Population};
use crate::random::RngStreams;

const INFECTOR_STREAM: &str = "infector";

/// A successful contact between an infectious and a susceptible person.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Transmission {
    pub infector: u32,
    pub infected: u32,
    pub pool_id: u32,
}

/// Everything the infector reads besides the pool itself.
#[derive(Copy, Clone)]
pub struct InfectorInputs<'a> {
    pub population: &'a Population,
    pub profile: &'a AgeContactProfile,
    pub transmission: &'a TransmissionProfile,
    /// Multiplier on the contact rate, above 1 for household clusters.
    pub intensity: f64,
    /// Distancing factor of the pool's contact type for today.
    pub distancing: f64,
    /// Set for school pools: per-age factors replace `distancing`, and a pair uses the larger
    /// factor of its two members.
    pub school: Option<&'a DayPolicy>,
}

impl InfectorInputs<'_> {
    fn pair_distancing(&self, infector_age: u32, contact_age: u32) -> Option<f64> {
        match self.school {
            None => Some(self.distancing),
            Some(policy) => {
                let infector = policy.school_distancing_factor(infector_age);
                let contact = policy.school_distancing_factor(contact_age);
                (infector < 1.0 && contact < 1.0).then_some(infector.max(contact))
            }
        }
    }
}

/// Runs one pool for one day. Members are visited in pool order: for every infectious member,
/// every other member still susceptible gets one Bernoulli draw on
/// `contact rate * intensity * (1 - distancing) * p(age) * (1 - ve_inf) * (1 - ve_sus)`, with
/// the contact rate clamped to `[0, 1]`.
pub fn infect_pool<R: Rng>(
    pool: &ContactPool,
    inputs: &InfectorInputs<'_>,
    rng: &mut R,
) -> Vec<Transmission> {
    let population = inputs.population;
    let members = pool.members();
    let is_infectious = |id: &u32| {
        population
            .get(*id)
            .is_some_and(|person| person.health.is_infectious())
    };
    if !members.iter().any(is_infectious) {
        return Vec::new();
    }

    let size = members.len();
    let mut infected_now = vec![false; size];
    let mut transmissions = Vec::new();

    for (infector_pos, infector) in members.iter().enumerate() {
        let Some(infector) = population.get(*infector) else {
            continue;
        };
        if !infector.health.is_infectious() {
            continue;
        }
        let ve_infectiousness = population.ve_infectiousness(infector);

        for (contact_pos, contact) in members.iter().enumerate() {
            if contact_pos == infector_pos || infected_now[contact_pos] {
                continue;
            }
            let Some(contact) = population.get(*contact) else {
                continue;
            };
            if !contact.health.is_susceptible() {
                continue;
            }
            let Some(distancing) = inputs.pair_distancing(infector.age(), contact.age()) else {
                continue;
            };

            let contact_rate = (inputs.profile.rate(infector.age(), contact.age(), size)
                * inputs.intensity
                * (1.0 - distancing))
                .clamp(0.0, 1.0);
            let probability = contact_rate
                * inputs.transmission.probability_for_age(contact.age())
                * (1.0 - ve_infectiousness)
                * (1.0 - population.ve_susceptible(contact));
            if probability.is_nan() || probability <= 0.0 {
                continue;
            }
            if rng.random_bool(probability.min(1.0)) {
                trace!(
                    "{} pool {}: {} infects {}",
                    pool.contact_type(),
                    pool.id(),
                    infector.id(),
                    contact.id()
                );
                infected_now[contact_pos] = true;
                transmissions.push(Transmission {
                    infector: infector.id(),
                    infected: contact.id(),
                    pool_id: pool.id(),
                });
            }
        }
    }
    transmissions
}

/// Runs every pool of one contact type for one day and returns the transmissions in pool
/// order. Pool `p` draws from the stream keyed by `(day, contact type, p)`, so the result does
/// not depend on `thread_pool`.
pub fn infect_pools(
    pools: &[ContactPool],
    inputs: &InfectorInputs<'_>,
    streams: RngStreams,
    day: usize,
    contact_type: ContactType,
    thread_pool: Option<&ThreadPool>,
) -> Vec<Transmission> {
    let run = |pool: &ContactPool| {
        let mut rng = streams.rng(
            INFECTOR_STREAM,
            &[day as u64, contact_type.index() as u64, u64::from(pool.id())],
        );
        infect_pool(pool, inputs, &mut rng)
    };

    match thread_pool {
        Some(thread_pool) => thread_pool.install(|| {
            pools
                .par_iter()
                .map(run)
                .collect::<Vec<_>>()
                .into_iter()
                .flatten()
                .collect::<Vec<Transmission>>()
        }),
        None => pools.iter().flat_map(run).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::population::{Person, StageDurations, VaccineProperties, VaccineTable, VaccineType};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn population(ages: &[u32], infectious: &[u32]) -> Population {
        let persons = ages
            .iter()
            .enumerate()
            .map(|(id, age)| Person::new(id as u32, *age, [1, 1, 0, 0, 0, 0]))
            .collect();
        let mut population = Population::from_persons(persons).unwrap();
        for id in infectious {
            let health = &mut population.get_mut(*id).unwrap().health;
            health.start_infection(0, StageDurations::new(1, 5, 5));
            health.update();
        }
        population
    }

    fn inputs<'a>(
        population: &'a Population,
        profile: &'a AgeContactProfile,
        transmission: &'a TransmissionProfile,
    ) -> InfectorInputs<'a> {
        InfectorInputs {
            population,
            profile,
            transmission,
            intensity: 1.0,
            distancing: 0.0,
            school: None,
        }
    }

    fn household(population: &Population) -> &ContactPool {
        &population.pools().member_pools(ContactType::Household)[0]
    }

    #[test]
    fn pool_without_infectious_members_is_a_no_op() {
        let population = population(&[30, 30, 30], &[]);
        let profile = AgeContactProfile::uniform(1.0);
        let transmission = TransmissionProfile::new(1.0);
        let mut rng = SmallRng::seed_from_u64(1);
        let result = infect_pool(
            household(&population),
            &inputs(&population, &profile, &transmission),
            &mut rng,
        );
        assert!(result.is_empty());
    }

    #[test]
    fn certain_transmission_reaches_every_susceptible_once() {
        let population = population(&[30, 30, 30, 30], &[0, 2]);
        let profile = AgeContactProfile::uniform(1.0);
        let transmission = TransmissionProfile::new(1.0);
        let mut rng = SmallRng::seed_from_u64(1);
        let result = infect_pool(
            household(&population),
            &inputs(&population, &profile, &transmission),
            &mut rng,
        );
        assert_eq!(
            result,
            vec![
                Transmission {
                    infector: 0,
                    infected: 1,
                    pool_id: 1
                },
                Transmission {
                    infector: 0,
                    infected: 3,
                    pool_id: 1
                },
            ]
        );
    }

    #[test]
    fn full_distancing_blocks_transmission() {
        let population = population(&[30, 30, 30], &[0]);
        let profile = AgeContactProfile::uniform(1.0);
        let transmission = TransmissionProfile::new(1.0);
        let mut inputs = inputs(&population, &profile, &transmission);
        inputs.distancing = 1.0;
        let mut rng = SmallRng::seed_from_u64(1);
        assert!(infect_pool(household(&population), &inputs, &mut rng).is_empty());
    }

    #[test]
    fn undefined_distancing_blocks_transmission() {
        let population = population(&[30, 30, 30], &[0]);
        let profile = AgeContactProfile::uniform(1.0);
        let transmission = TransmissionProfile::new(1.0);
        let mut inputs = inputs(&population, &profile, &transmission);
        inputs.distancing = f64::NAN;
        let mut rng = SmallRng::seed_from_u64(1);
        assert!(infect_pool(household(&population), &inputs, &mut rng).is_empty());
    }

    #[test]
    fn sterilising_vaccine_protects() {
        let mut population = population(&[30, 30, 30], &[0]);
        population.set_vaccines(VaccineTable {
            mrna: Some(VaccineProperties::Constant {
                id: "m".to_string(),
                ve_susceptible: 1.0,
                ve_infectiousness: 0.0,
                ve_severe: 0.0,
            }),
            adeno: None,
        });
        population.vaccinate(1, VaccineType::MRna);
        let profile = AgeContactProfile::uniform(1.0);
        let transmission = TransmissionProfile::new(1.0);
        let mut rng = SmallRng::seed_from_u64(1);
        let result = infect_pool(
            household(&population),
            &inputs(&population, &profile, &transmission),
            &mut rng,
        );
        let infected: Vec<u32> = result.iter().map(|t| t.infected).collect();
        assert_eq!(infected, vec![2]);
    }

    #[test]
    fn school_pairs_use_the_larger_factor_and_skip_closed_ages() {
        let population = population(&[8, 8, 9, 40], &[0]);
        let profile = AgeContactProfile::uniform(1.0);
        let transmission = TransmissionProfile::new(1.0);
        let mut school = vec![0.0; 26];
        school[9] = 1.0;
        let policy = DayPolicy {
            day: 0,
            is_regular_weekday: true,
            workplace_distancing: 0.0,
            community_distancing: 0.0,
            collectivity_distancing: 0.0,
            contact_tracing: false,
            universal_testing: false,
            household_clustering_allowed: false,
            imported_cases: 0,
            school_distancing: school,
        };
        let mut inputs = inputs(&population, &profile, &transmission);
        inputs.school = Some(&policy);
        let pool = &population.pools().member_pools(ContactType::School)[0];
        let mut rng = SmallRng::seed_from_u64(1);
        let infected: Vec<u32> = infect_pool(pool, &inputs, &mut rng)
            .iter()
            .map(|t| t.infected)
            .collect();
        // Age 9 is closed and age 40 is outside the school matrix.
        assert_eq!(infected, vec![1]);
    }

    #[test]
    fn results_do_not_depend_on_threads() {
        let ages: Vec<u32> = (0..200).map(|i| 20 + i % 50).collect();
        let persons: Vec<Person> = ages
            .iter()
            .enumerate()
            .map(|(id, age)| Person::new(id as u32, *age, [id as u32 / 4 + 1, 0, 0, 0, 0, 0]))
            .collect();
        let mut population = Population::from_persons(persons).unwrap();
        for id in (0..200).step_by(4) {
            let health = &mut population.get_mut(id).unwrap().health;
            health.start_infection(0, StageDurations::new(1, 5, 5));
            health.update();
        }
        let profile = AgeContactProfile::uniform(1.0);
        let transmission = TransmissionProfile::new(0.3);
        let inputs = inputs(&population, &profile, &transmission);
        let pools = population.pools().member_pools(ContactType::Household);
        let streams = RngStreams::new(99);
        let thread_pool = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();

        let serial = infect_pools(pools, &inputs, streams, 3, ContactType::Household, None);
        let parallel = infect_pools(
            pools,
            &inputs,
            streams,
            3,
            ContactType::Household,
            Some(&thread_pool),
        );
        assert_eq!(serial, parallel);
        assert!(!serial.is_empty());
        assert!(serial.windows(2).all(|pair| pair[0].pool_id <= pair[1].pool_id));
    }
}
