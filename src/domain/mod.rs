pub mod validation;

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use validation::{build_camp, validate_rows, ValidationError, ValidationErrors};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Block {
    #[serde(rename = "1")]
    First,
    #[serde(rename = "2")]
    Second,
}

impl Block {
    pub const ALL: [Block; 2] = [Block::First, Block::Second];

    pub fn number(self) -> u8 {
        match self {
            Self::First => 1,
            Self::Second => 2,
        }
    }

    pub fn fleets(self) -> [Fleet; 2] {
        match self {
            Self::First => [Fleet::OneA, Fleet::OneB],
            Self::Second => [Fleet::TwoA, Fleet::TwoB],
        }
    }
}

impl Display for Block {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Fleet {
    #[serde(rename = "1a")]
    OneA,
    #[serde(rename = "1b")]
    OneB,
    #[serde(rename = "2a")]
    TwoA,
    #[serde(rename = "2b")]
    TwoB,
}

impl Fleet {
    pub const ALL: [Fleet; 4] = [Fleet::OneA, Fleet::OneB, Fleet::TwoA, Fleet::TwoB];

    pub fn block(self) -> Block {
        match self {
            Self::OneA | Self::OneB => Block::First,
            Self::TwoA | Self::TwoB => Block::Second,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::OneA => 0,
            Self::OneB => 1,
            Self::TwoA => 2,
            Self::TwoB => 3,
        }
    }

    pub fn as_label(self) -> &'static str {
        match self {
            Self::OneA => "1a",
            Self::OneB => "1b",
            Self::TwoA => "2a",
            Self::TwoB => "2b",
        }
    }
}

impl Display for Fleet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_label())
    }
}

#[derive(Debug, Error)]
#[error("unknown fleet: {0}")]
pub struct FleetParseError(pub String);

impl FromStr for Fleet {
    type Err = FleetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1a" => Ok(Self::OneA),
            "1b" => Ok(Self::OneB),
            "2a" => Ok(Self::TwoA),
            "2b" => Ok(Self::TwoB),
            _ => Err(FleetParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Seatrade {
    pub id: String,
    pub min_capacity: u32,
    pub max_capacity: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Cabin {
    pub id: String,
    pub gender: String,
    pub campers: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Camper {
    pub id: String,
    pub cabin: usize,
    pub preferences: RankedPreferences,
}

/// Ordered seatrade preferences with a dense rank lookup table.
///
/// `order[rank]` is a seatrade index; `rank_of` answers the reverse question in
/// constant time.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RankedPreferences {
    order: Vec<usize>,
    rank_by_seatrade: Vec<Option<usize>>,
}

impl RankedPreferences {
    pub(crate) fn new(order: Vec<usize>, seatrade_count: usize) -> Self {
        let mut rank_by_seatrade = vec![None; seatrade_count];
        for (rank, seatrade) in order.iter().enumerate() {
            rank_by_seatrade[*seatrade] = Some(rank);
        }
        Self {
            order,
            rank_by_seatrade,
        }
    }

    /// 0-based rank index, `None` when the seatrade was not requested.
    pub fn rank_of(&self, seatrade: usize) -> Option<usize> {
        self.rank_by_seatrade.get(seatrade).copied().flatten()
    }

    pub fn contains(&self, seatrade: usize) -> bool {
        self.rank_of(seatrade).is_some()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.order.iter().copied()
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
pub struct SeatradeInstance {
    pub fleet: Fleet,
    pub seatrade: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Camp {
    seatrades: Vec<Seatrade>,
    cabins: Vec<Cabin>,
    campers: Vec<Camper>,
    instances: Vec<SeatradeInstance>,
    preference_len: usize,
}

impl Camp {
    pub(crate) fn from_parts(
        seatrades: Vec<Seatrade>,
        cabins: Vec<Cabin>,
        campers: Vec<Camper>,
        preference_len: usize,
    ) -> Self {
        let instances = Fleet::ALL
            .iter()
            .flat_map(|fleet| {
                (0..seatrades.len()).map(move |seatrade| SeatradeInstance {
                    fleet: *fleet,
                    seatrade,
                })
            })
            .collect();
        Self {
            seatrades,
            cabins,
            campers,
            instances,
            preference_len,
        }
    }

    pub fn seatrades(&self) -> &[Seatrade] {
        &self.seatrades
    }

    pub fn cabins(&self) -> &[Cabin] {
        &self.cabins
    }

    pub fn campers(&self) -> &[Camper] {
        &self.campers
    }

    /// Instances are laid out fleet-major: every seatrade of 1a, then 1b, 2a, 2b.
    pub fn instances(&self) -> &[SeatradeInstance] {
        &self.instances
    }

    pub fn preference_len(&self) -> usize {
        self.preference_len
    }

    pub fn instance_index(&self, fleet: Fleet, seatrade: usize) -> usize {
        fleet.index() * self.seatrades.len() + seatrade
    }

    pub fn instances_in_fleet(&self, fleet: Fleet) -> std::ops::Range<usize> {
        let start = fleet.index() * self.seatrades.len();
        start..start + self.seatrades.len()
    }

    pub fn instances_in_block(&self, block: Block) -> impl Iterator<Item = usize> + '_ {
        block
            .fleets()
            .into_iter()
            .flat_map(move |fleet| self.instances_in_fleet(fleet))
    }

    pub fn instance_label(&self, instance: usize) -> String {
        let inst = self.instances[instance];
        format!("{}_{}", inst.fleet, self.seatrades[inst.seatrade].id)
    }

    pub fn cabin_of(&self, camper: usize) -> &Cabin {
        &self.cabins[self.campers[camper].cabin]
    }

    pub fn genders(&self) -> Vec<&str> {
        self.cabins
            .iter()
            .map(|c| c.gender.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn cabins_with_gender<'a>(&'a self, gender: &'a str) -> impl Iterator<Item = usize> + 'a {
        self.cabins
            .iter()
            .enumerate()
            .filter(move |(_, cabin)| cabin.gender == gender)
            .map(|(idx, _)| idx)
    }

    pub fn seatrade_index(&self, id: &str) -> Option<usize> {
        self.seatrades.iter().position(|s| s.id == id)
    }
}
