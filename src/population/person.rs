use crate::population::contact_pool::{ContactType, NUM_CONTACT_TYPES};
use crate::population::health::Health;
use crate::population::vaccine::VaccineRecord;

/// Oldest age the age-indexed profiles cover. Older persons use the last row.
pub const MAX_AGE: u32 = 110;

#[derive(Clone, Debug, PartialEq)]
pub struct Person {
    id: u32,
    age: u32,
    pub health: Health,
    pub vaccine: Option<VaccineRecord>,
    pool_ids: [u32; NUM_CONTACT_TYPES],
}

impl Person {
    #[must_use]
    pub fn new(id: u32, age: u32, pool_ids: [u32; NUM_CONTACT_TYPES]) -> Self {
        Person {
            id,
            age,
            health: Health::new(),
            vaccine: None,
            pool_ids,
        }
    }

    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[must_use]
    pub fn age(&self) -> u32 {
        self.age
    }

    /// The pool of `contact_type` this person belongs to, `0` if none.
    #[must_use]
    pub fn pool_id(&self, contact_type: ContactType) -> u32 {
        self.pool_ids[contact_type.index()]
    }

    #[must_use]
    pub fn is_vaccinated(&self) -> bool {
        self.vaccine.is_some()
    }
}
