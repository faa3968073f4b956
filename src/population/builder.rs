//! Population construction: from a CSV file with one row per person, or from the built-in
//! synthetic generator. Either way, initial immunity is applied afterwards and the vaccine
//! records of the configuration are bound to the result.
use std::path::PathBuf;

use log::{debug, info};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;

use crate::config::{PopulationSource, SimulationConfig, SyntheticPopulationConfig};
use crate::context::Context;
use crate::define_rng;
use crate::population::{ContactType, Person, Population, NUM_CONTACT_TYPES};
use crate::random::ContextRandomExt;
use crate::StrideError;

define_rng!(PopulationRng);
define_rng!(ImmunityRng);

/// Builds the persons and pools of a simulation.
pub trait PopulationBuilder {
    fn build(&self, context: &Context) -> Result<Population, StrideError>;
}

#[derive(Deserialize, Debug)]
struct PersonRecord {
    age: u32,
    #[serde(default)]
    household_id: u32,
    #[serde(default)]
    school_id: u32,
    #[serde(default)]
    work_id: u32,
    #[serde(default)]
    primary_community_id: u32,
    #[serde(default)]
    secondary_community_id: u32,
    #[serde(default)]
    household_cluster_id: u32,
}

impl PersonRecord {
    fn pool_ids(&self) -> [u32; NUM_CONTACT_TYPES] {
        [
            self.household_id,
            self.school_id,
            self.work_id,
            self.primary_community_id,
            self.secondary_community_id,
            self.household_cluster_id,
        ]
    }
}

/// Reads persons from a CSV file with the columns `age`, `household_id`, `school_id`,
/// `work_id`, `primary_community_id`, `secondary_community_id` and `household_cluster_id`.
/// Missing pool columns and pool id `0` mean "not a member". Rows are numbered in file order.
pub struct FilePopulationBuilder {
    path: PathBuf,
}

impl FilePopulationBuilder {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        FilePopulationBuilder { path }
    }
}

impl PopulationBuilder for FilePopulationBuilder {
    fn build(&self, _context: &Context) -> Result<Population, StrideError> {
        let unreadable = |e: csv::Error| {
            StrideError::ConfigInvalid(format!(
                "cannot read population {}: {e}",
                self.path.display()
            ))
        };
        let mut reader = csv::Reader::from_path(&self.path).map_err(unreadable)?;
        let mut persons = Vec::new();
        for (id, record) in reader.deserialize::<PersonRecord>().enumerate() {
            let record = record.map_err(unreadable)?;
            let id = u32::try_from(id).map_err(|_| {
                StrideError::ConfigInvalid("population has too many persons".to_string())
            })?;
            persons.push(Person::new(id, record.age, record.pool_ids()));
        }
        debug!("read {} persons from {}", persons.len(), self.path.display());
        Population::from_persons(persons)
    }
}

/// Generates households of random size and groups their members into schools, workplaces,
/// communities and household clusters.
pub struct SyntheticPopulationBuilder {
    config: SyntheticPopulationConfig,
}

const SCHOOL_AGES: std::ops::RangeInclusive<u32> = 3..=18;
const WORKING_AGES: std::ops::RangeInclusive<u32> = 19..=64;

impl SyntheticPopulationBuilder {
    #[must_use]
    pub fn new(config: SyntheticPopulationConfig) -> Self {
        SyntheticPopulationBuilder { config }
    }

    fn validate(&self) -> Result<WeightedIndex<f64>, StrideError> {
        let config = &self.config;
        if config.size == 0 {
            return Err(StrideError::ConfigInvalid(
                "synthetic population size must be positive".to_string(),
            ));
        }
        if [
            config.school_size,
            config.workplace_size,
            config.community_size,
            config.households_per_cluster,
        ]
        .contains(&0)
        {
            return Err(StrideError::ConfigInvalid(
                "synthetic pool sizes must be positive".to_string(),
            ));
        }
        for (name, value) in [
            ("child_fraction", config.child_fraction),
            ("elderly_fraction", config.elderly_fraction),
            ("employment_rate", config.employment_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(StrideError::ConfigInvalid(format!(
                    "synthetic {name} = {value} is outside [0, 1]"
                )));
            }
        }
        WeightedIndex::new(&config.household_size_weights).map_err(|e| {
            StrideError::ConfigInvalid(format!("invalid household size weights: {e}"))
        })
    }

    fn adult_age<R: Rng>(&self, rng: &mut R) -> u32 {
        if rng.random_bool(self.config.elderly_fraction) {
            rng.random_range(65..=95)
        } else {
            rng.random_range(WORKING_AGES)
        }
    }

    /// Ages grouped by household, in household order.
    fn households<R: Rng>(&self, household_sizes: &WeightedIndex<f64>, rng: &mut R) -> Vec<Vec<u32>> {
        let mut households = Vec::new();
        let mut remaining = self.config.size;
        while remaining > 0 {
            let size = (household_sizes.sample(rng) + 1).min(remaining);
            let ages = (0..size)
                .map(|member| {
                    if member > 0 && rng.random_bool(self.config.child_fraction) {
                        rng.random_range(0..=18)
                    } else {
                        self.adult_age(rng)
                    }
                })
                .collect();
            households.push(ages);
            remaining -= size;
        }
        households
    }
}

/// Puts `ids` into consecutive pools of `pool_size`, numbered from 1.
fn assign_in_chunks(
    pool_ids: &mut [[u32; NUM_CONTACT_TYPES]],
    contact_type: ContactType,
    ids: &[usize],
    pool_size: usize,
) {
    for (chunk, members) in ids.chunks(pool_size).enumerate() {
        for &id in members {
            pool_ids[id][contact_type.index()] = chunk as u32 + 1;
        }
    }
}

/// Puts whole households into communities of at least `community_size` persons.
fn assign_communities(
    pool_ids: &mut [[u32; NUM_CONTACT_TYPES]],
    contact_type: ContactType,
    households: &[std::ops::Range<usize>],
    community_size: usize,
) {
    let mut community = 1;
    let mut filled = 0;
    for members in households {
        if filled >= community_size {
            community += 1;
            filled = 0;
        }
        for id in members.clone() {
            pool_ids[id][contact_type.index()] = community;
        }
        filled += members.len();
    }
}

impl PopulationBuilder for SyntheticPopulationBuilder {
    fn build(&self, context: &Context) -> Result<Population, StrideError> {
        let household_sizes = self.validate()?;
        let households = context.sample(PopulationRng, |rng| self.households(&household_sizes, rng));

        let mut ages = Vec::with_capacity(self.config.size);
        let mut household_ranges = Vec::with_capacity(households.len());
        for members in &households {
            let start = ages.len();
            ages.extend_from_slice(members);
            household_ranges.push(start..ages.len());
        }
        let mut pool_ids = vec![[0u32; NUM_CONTACT_TYPES]; ages.len()];

        for (household, members) in household_ranges.iter().enumerate() {
            let cluster = household / self.config.households_per_cluster + 1;
            for id in members.clone() {
                pool_ids[id][ContactType::Household.index()] = household as u32 + 1;
                pool_ids[id][ContactType::HouseholdCluster.index()] = cluster as u32;
            }
        }

        // Schools group pupils of similar age.
        let mut pupils: Vec<usize> = (0..ages.len())
            .filter(|id| SCHOOL_AGES.contains(&ages[*id]))
            .collect();
        pupils.sort_by_key(|id| ages[*id]);
        assign_in_chunks(&mut pool_ids, ContactType::School, &pupils, self.config.school_size);

        let mut workers: Vec<usize> = (0..ages.len())
            .filter(|id| WORKING_AGES.contains(&ages[*id]))
            .filter(|_| context.sample_bool(PopulationRng, self.config.employment_rate))
            .collect();
        context.sample(PopulationRng, |rng| workers.shuffle(rng));
        assign_in_chunks(
            &mut pool_ids,
            ContactType::Workplace,
            &workers,
            self.config.workplace_size,
        );

        assign_communities(
            &mut pool_ids,
            ContactType::PrimaryCommunity,
            &household_ranges,
            self.config.community_size,
        );
        let mut shuffled = household_ranges.clone();
        context.sample(PopulationRng, |rng| shuffled.shuffle(rng));
        assign_communities(
            &mut pool_ids,
            ContactType::SecondaryCommunity,
            &shuffled,
            self.config.community_size,
        );

        let persons = ages
            .iter()
            .zip(pool_ids)
            .enumerate()
            .map(|(id, (age, pools))| Person::new(id as u32, *age, pools))
            .collect();
        debug!(
            "generated {} persons in {} households",
            ages.len(),
            households.len()
        );
        Population::from_persons(persons)
    }
}

/// Makes each susceptible person immune with probability `rate`. Returns how many became
/// immune.
pub fn apply_immunity(population: &mut Population, rate: f64, context: &Context) -> usize {
    if rate <= 0.0 {
        return 0;
    }
    let mut immune = 0;
    for person in population.iter_mut() {
        if context.sample_bool(ImmunityRng, rate) && person.health.set_immune() {
            immune += 1;
        }
    }
    immune
}

/// Builds the population described by the configuration, applies initial immunity and binds
/// the configured vaccine records.
pub fn build_population(
    config: &SimulationConfig,
    context: &Context,
) -> Result<Population, StrideError> {
    let mut population = match &config.population.source {
        PopulationSource::File(path) => {
            FilePopulationBuilder::new(config.resolve_path(path)).build(context)?
        }
        PopulationSource::Synthetic(synthetic) => {
            SyntheticPopulationBuilder::new(synthetic.clone()).build(context)?
        }
    };
    let immune = apply_immunity(&mut population, config.population.immunity_rate, context);
    population.set_vaccines(config.vaccines.clone());
    info!(
        "built population of {} persons ({} immune)",
        population.len(),
        immune
    );
    Ok(population)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::population::HealthStatus;
    use std::fs;

    fn synthetic(size: usize) -> SyntheticPopulationConfig {
        serde_json::from_str(&format!(r#"{{ "size": {size} }}"#)).unwrap()
    }

    fn context() -> Context {
        let mut context = Context::new();
        context.init_random(42);
        context
    }

    #[test]
    fn reads_persons_from_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pop.csv");
        fs::write(
            &path,
            "age,household_id,school_id,work_id,primary_community_id,secondary_community_id,household_cluster_id\n\
             40,1,0,1,1,1,1\n\
             8,1,1,0,1,1,1\n\
             70,2,0,0,1,2,1\n",
        )
        .unwrap();
        let population = FilePopulationBuilder::new(path).build(&context()).unwrap();
        assert_eq!(population.len(), 3);
        assert_eq!(population.get(1).unwrap().age(), 8);
        assert_eq!(population.pools().num_pools(ContactType::Household), 2);
        assert_eq!(
            population.pools().get(ContactType::Household, 1).unwrap().members(),
            &[0, 1]
        );
        assert_eq!(
            population.pools().get(ContactType::School, 1).unwrap().members(),
            &[1]
        );
    }

    #[test]
    fn pool_ids_beyond_the_population_are_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pop.csv");
        fs::write(
            &path,
            "age,household_id,school_id,work_id,primary_community_id,secondary_community_id,household_cluster_id\n\
             40,1,0,1,1,1,1\n\
             8,4000000000,0,0,1,1,1\n",
        )
        .unwrap();
        let result = FilePopulationBuilder::new(path).build(&context());
        assert!(matches!(result, Err(StrideError::ConfigInvalid(_))));
    }

    #[test]
    fn missing_file_is_invalid_config() {
        let result = FilePopulationBuilder::new(PathBuf::from("/no/such/pop.csv")).build(&context());
        assert!(matches!(result, Err(StrideError::ConfigInvalid(_))));
    }

    #[test]
    fn synthetic_population_has_the_requested_size() {
        let population = SyntheticPopulationBuilder::new(synthetic(1000))
            .build(&context())
            .unwrap();
        assert_eq!(population.len(), 1000);
        let pools = population.pools();
        for person in population.iter() {
            assert_ne!(person.pool_id(ContactType::Household), 0);
            assert_ne!(person.pool_id(ContactType::PrimaryCommunity), 0);
            assert_ne!(person.pool_id(ContactType::HouseholdCluster), 0);
        }
        let largest = pools
            .member_pools(ContactType::Household)
            .iter()
            .map(|pool| pool.len())
            .max()
            .unwrap();
        assert!(largest <= 6);
        assert!(pools.num_pools(ContactType::School) > 0);
        assert!(pools.num_pools(ContactType::Workplace) > 0);
        assert!(population.iter().any(|person| person.age() < 5));
        assert!(population.iter().any(|person| person.age() >= 65));
    }

    #[test]
    fn synthetic_population_is_reproducible() {
        let a = SyntheticPopulationBuilder::new(synthetic(300))
            .build(&context())
            .unwrap();
        let b = SyntheticPopulationBuilder::new(synthetic(300))
            .build(&context())
            .unwrap();
        let ages = |population: &Population| -> Vec<u32> { population.iter().map(Person::age).collect() };
        assert_eq!(ages(&a), ages(&b));
    }

    #[test]
    fn immunity_rate_extremes() {
        let context = context();
        let mut population = SyntheticPopulationBuilder::new(synthetic(50))
            .build(&context)
            .unwrap();
        assert_eq!(apply_immunity(&mut population, 0.0, &context), 0);
        assert_eq!(apply_immunity(&mut population, 1.0, &context), 50);
        assert_eq!(population.count_by_status(HealthStatus::Immune), 50);
    }

    #[test]
    fn rejects_zero_sizes() {
        let mut config = synthetic(10);
        config.school_size = 0;
        assert!(SyntheticPopulationBuilder::new(config).build(&context()).is_err());
        assert!(SyntheticPopulationBuilder::new(synthetic(0))
            .build(&context())
            .is_err());
    }
}
