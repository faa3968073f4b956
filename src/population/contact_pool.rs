//! Contact pools and the registry that groups them by contact type.
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub const NUM_CONTACT_TYPES: usize = 6;

/// The kinds of contact pool. Declaration order is the order pools are processed in each day.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContactType {
    Household,
    School,
    Workplace,
    PrimaryCommunity,
    SecondaryCommunity,
    HouseholdCluster,
}

impl ContactType {
    pub const ALL: [ContactType; NUM_CONTACT_TYPES] = [
        ContactType::Household,
        ContactType::School,
        ContactType::Workplace,
        ContactType::PrimaryCommunity,
        ContactType::SecondaryCommunity,
        ContactType::HouseholdCluster,
    ];

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// A set of persons who meet in one context. Members are kept in insertion order, which is the
/// order the infector walks them in.
#[derive(Clone, Debug)]
pub struct ContactPool {
    id: u32,
    contact_type: ContactType,
    members: Vec<u32>,
}

impl ContactPool {
    #[must_use]
    pub fn new(id: u32, contact_type: ContactType) -> Self {
        ContactPool {
            id,
            contact_type,
            members: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[must_use]
    pub fn contact_type(&self) -> ContactType {
        self.contact_type
    }

    #[must_use]
    pub fn members(&self) -> &[u32] {
        &self.members
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// One ordered container of pools per contact type. Pool `0` of every type is the sentinel
/// "no pool" and never has members; a pool's id is its position in its container.
#[derive(Clone, Debug)]
pub struct ContactPoolSys {
    pools: [Vec<ContactPool>; NUM_CONTACT_TYPES],
}

impl Default for ContactPoolSys {
    fn default() -> Self {
        ContactPoolSys::new()
    }
}

impl ContactPoolSys {
    #[must_use]
    pub fn new() -> Self {
        ContactPoolSys {
            pools: ContactType::ALL.map(|contact_type| vec![ContactPool::new(0, contact_type)]),
        }
    }

    /// Adds `person` to pool `pool_id` of `contact_type`, creating pools up to that id as
    /// needed. Pool id `0` means "not a member" and is ignored.
    pub fn add_member(&mut self, contact_type: ContactType, pool_id: u32, person: u32) {
        if pool_id == 0 {
            return;
        }
        let pools = &mut self.pools[contact_type.index()];
        while pools.len() <= pool_id as usize {
            let next_id = u32::try_from(pools.len()).unwrap_or(u32::MAX);
            pools.push(ContactPool::new(next_id, contact_type));
        }
        pools[pool_id as usize].members.push(person);
    }

    /// All pools of a type, sentinel included.
    #[must_use]
    pub fn pools(&self, contact_type: ContactType) -> &[ContactPool] {
        &self.pools[contact_type.index()]
    }

    /// The pools of a type that persons can belong to, i.e. without the sentinel.
    #[must_use]
    pub fn member_pools(&self, contact_type: ContactType) -> &[ContactPool] {
        let pools = self.pools(contact_type);
        pools.get(1..).unwrap_or(&[])
    }

    #[must_use]
    pub fn get(&self, contact_type: ContactType, pool_id: u32) -> Option<&ContactPool> {
        self.pools(contact_type).get(pool_id as usize)
    }

    #[must_use]
    pub fn num_pools(&self, contact_type: ContactType) -> usize {
        self.pools(contact_type).len() - 1
    }

    /// Drops every pool and restores the sentinels.
    pub fn clear(&mut self) {
        *self = ContactPoolSys::new();
    }
}
