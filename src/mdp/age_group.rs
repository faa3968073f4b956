//! Age-stratified draw-without-replacement queues of person ids, the pool vaccinations are
//! drawn from.
use std::fmt;

use log::debug;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::context::Context;
use crate::define_rng;
use crate::population::{ContactType, Person, Population};
use crate::random::ContextRandomExt;
use crate::{HashSet, StrideError};

define_rng!(AgeGroupRng);
define_rng!(HouseholdUptakeRng);

/// A partition of persons by age.
pub trait AgeBucket: Copy + Eq + fmt::Debug + fmt::Display + 'static {
    /// Every bucket, in the order they are built and shuffled.
    const ALL: &'static [Self];

    /// The bucket a person of `age` falls in, `None` if the partition leaves the age out.
    fn of_age(age: u32) -> Option<Self>;

    fn position(self) -> usize {
        Self::ALL
            .iter()
            .position(|bucket| *bucket == self)
            .unwrap_or_default()
    }
}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AgeGroup {
    /// 0 to 4
    Children,
    /// 5 to 18
    Youngsters,
    /// 19 to 25
    YoungAdults,
    /// 26 to 64
    Adults,
    /// 65 and older
    Elderly,
}

impl AgeBucket for AgeGroup {
    const ALL: &'static [Self] = &[
        AgeGroup::Children,
        AgeGroup::Youngsters,
        AgeGroup::YoungAdults,
        AgeGroup::Adults,
        AgeGroup::Elderly,
    ];

    fn of_age(age: u32) -> Option<Self> {
        Some(match age {
            0..=4 => AgeGroup::Children,
            5..=18 => AgeGroup::Youngsters,
            19..=25 => AgeGroup::YoungAdults,
            26..=64 => AgeGroup::Adults,
            _ => AgeGroup::Elderly,
        })
    }
}

/// The partition used when children are not eligible. Persons under 18 are in no bucket, so
/// `ChildrenC` is always empty.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[repr(i8)]
pub enum ChildlessAgeGroup {
    ChildrenC = -1,
    /// 18 to 25
    YoungAdultsC,
    /// 26 to 64
    AdultsC,
    /// 65 and older
    ElderlyC,
}

impl AgeBucket for ChildlessAgeGroup {
    const ALL: &'static [Self] = &[
        ChildlessAgeGroup::ChildrenC,
        ChildlessAgeGroup::YoungAdultsC,
        ChildlessAgeGroup::AdultsC,
        ChildlessAgeGroup::ElderlyC,
    ];

    fn of_age(age: u32) -> Option<Self> {
        match age {
            0..=17 => None,
            18..=25 => Some(ChildlessAgeGroup::YoungAdultsC),
            26..=64 => Some(ChildlessAgeGroup::AdultsC),
            _ => Some(ChildlessAgeGroup::ElderlyC),
        }
    }
}

/// One shuffled stack of person ids per bucket. Sampling pops from the tail, so an id is handed
/// out at most once.
#[derive(Clone, Debug)]
pub struct AgeGroupIndex<G: AgeBucket> {
    buckets: Vec<Vec<u32>>,
    initial_sizes: Vec<usize>,
    _partition: std::marker::PhantomData<G>,
}

impl<G: AgeBucket> AgeGroupIndex<G> {
    /// Buckets `persons` by age and shuffles every bucket with the age-group generator.
    pub fn build<'a>(persons: impl IntoIterator<Item = &'a Person>, context: &Context) -> Self {
        let mut buckets = vec![Vec::new(); G::ALL.len()];
        for person in persons {
            if let Some(bucket) = G::of_age(person.age()) {
                buckets[bucket.position()].push(person.id());
            }
        }
        for bucket in &mut buckets {
            context.sample(AgeGroupRng, |rng| bucket.shuffle(rng));
        }
        let initial_sizes = buckets.iter().map(Vec::len).collect();
        AgeGroupIndex {
            buckets,
            initial_sizes,
            _partition: std::marker::PhantomData,
        }
    }

    /// Every person of the population.
    pub fn from_population(population: &Population, context: &Context) -> Self {
        Self::build(population.iter(), context)
    }

    /// Only members of the given household pools.
    pub fn from_households(population: &Population, households: &[u32], context: &Context) -> Self {
        let selected: HashSet<u32> = households.iter().copied().collect();
        Self::build(
            population
                .iter()
                .filter(|person| selected.contains(&person.pool_id(ContactType::Household))),
            context,
        )
    }

    /// Pops up to `n` ids from the bucket. Returns fewer once the bucket runs out.
    pub fn sample(&mut self, group: G, n: usize) -> Vec<u32> {
        let bucket = &mut self.buckets[group.position()];
        let keep = bucket.len().saturating_sub(n);
        let mut drawn = bucket.split_off(keep);
        drawn.reverse();
        drawn
    }

    #[must_use]
    pub fn remaining(&self, group: G) -> usize {
        self.buckets[group.position()].len()
    }

    #[must_use]
    pub fn initial_size(&self, group: G) -> usize {
        self.initial_sizes[group.position()]
    }

    /// Ids handed out by [`AgeGroupIndex::sample`] so far.
    #[must_use]
    pub fn sampled(&self, group: G) -> usize {
        self.initial_size(group) - self.remaining(group)
    }

    #[must_use]
    pub fn total_remaining(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }
}

/// Picks whole households until their members best approximate `uptake` of the population.
///
/// Households are visited in random order and added while they fit under the target. The
/// smallest household that would have overshot is remembered and added at the end if that
/// lands closer to the target. Returns household pool ids.
///
/// # Errors
///
/// `ConfigInvalid` if `uptake` is outside `[0, 1]`.
pub fn select_households(
    population: &Population,
    uptake: f64,
    context: &Context,
) -> Result<Vec<u32>, StrideError> {
    if !(0.0..=1.0).contains(&uptake) {
        return Err(StrideError::ConfigInvalid(format!(
            "uptake {uptake} is outside [0, 1]"
        )));
    }
    let target = (uptake * population.len() as f64).round() as usize;
    let mut households: Vec<(u32, usize)> = population
        .pools()
        .member_pools(ContactType::Household)
        .iter()
        .filter(|pool| !pool.is_empty())
        .map(|pool| (pool.id(), pool.len()))
        .collect();
    context.sample(HouseholdUptakeRng, |rng| households.shuffle(rng));

    let mut selected = Vec::new();
    let mut total = 0;
    let mut overshoot: Option<(u32, usize)> = None;
    for (id, size) in households {
        if total == target {
            break;
        }
        if total + size <= target {
            selected.push(id);
            total += size;
        } else if overshoot.is_none_or(|(_, smallest)| size < smallest) {
            overshoot = Some((id, size));
        }
    }
    if let Some((id, size)) = overshoot {
        if total + size - target < target - total {
            selected.push(id);
            total += size;
        }
    }
    debug!(
        "selected {} households with {total} members for a target of {target}",
        selected.len()
    );
    Ok(selected)
}
