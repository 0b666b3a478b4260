use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};

use thiserror::Error;

use crate::domain::{Cabin, Camp, Camper, RankedPreferences, Seatrade};
use crate::input::{CabinRow, CamperRow, SeatradeRow};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no seatrades supplied")]
    NoSeatrades,
    #[error("no campers supplied")]
    NoCampers,
    #[error("blank {0} identifier")]
    BlankIdentifier(&'static str),
    #[error("duplicate seatrade id: {0}")]
    DuplicateSeatrade(String),
    #[error("duplicate camper id: {0}")]
    DuplicateCamper(String),
    #[error("duplicate cabin id: {0}")]
    DuplicateCabin(String),
    #[error("seatrade {seatrade} has a negative capacity bound")]
    NegativeCapacity { seatrade: String },
    #[error("seatrade {seatrade} has capacity bound {value} beyond {max}", max = u32::MAX)]
    CapacityTooLarge { seatrade: String, value: i64 },
    #[error("seatrade {seatrade} has min_capacity {min} > max_capacity {max}")]
    CapacityInverted {
        seatrade: String,
        min: i64,
        max: i64,
    },
    #[error("camper {camper} has no seatrade preferences")]
    EmptyPreferences { camper: String },
    #[error("camper {camper} prefers unknown seatrade {seatrade}")]
    UnknownSeatrade { camper: String, seatrade: String },
    #[error("camper {camper} lists seatrade {seatrade} more than once")]
    DuplicatePreference { camper: String, seatrade: String },
    #[error("camper {camper} has {found} preferences, expected {expected}")]
    PreferenceLengthMismatch {
        camper: String,
        expected: usize,
        found: usize,
    },
    #[error("camper {camper} references undeclared cabin {cabin}")]
    UnknownCabin { camper: String, cabin: String },
    #[error("cabin {0} has no campers")]
    EmptyCabin(String),
    #[error("cabin {cabin} mixes genders {first} and {second}")]
    InconsistentCabinGender {
        cabin: String,
        first: String,
        second: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let messages = self
            .0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "invalid input ({} problems): {messages}", self.0.len())
    }
}

impl std::error::Error for ValidationErrors {}

impl ValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    pub fn contains(&self, error: &ValidationError) -> bool {
        self.0.contains(error)
    }
}

/// Checks the raw tables and returns every problem found.
///
/// `cabins` is an optional roster; when empty, cabins are derived from the
/// camper rows and take their gender from their first camper.
pub fn validate_rows(
    seatrades: &[SeatradeRow],
    campers: &[CamperRow],
    cabins: &[CabinRow],
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if seatrades.is_empty() {
        errors.push(ValidationError::NoSeatrades);
    }
    if campers.is_empty() {
        errors.push(ValidationError::NoCampers);
    }

    let mut seatrade_ids = HashSet::new();
    for row in seatrades {
        if row.seatrade_id.trim().is_empty() {
            errors.push(ValidationError::BlankIdentifier("seatrade"));
            continue;
        }
        if !seatrade_ids.insert(row.seatrade_id.as_str()) {
            errors.push(ValidationError::DuplicateSeatrade(row.seatrade_id.clone()));
        }
        if row.min_capacity < 0 || row.max_capacity < 0 {
            errors.push(ValidationError::NegativeCapacity {
                seatrade: row.seatrade_id.clone(),
            });
        } else if let Some(value) = [row.min_capacity, row.max_capacity]
            .into_iter()
            .find(|v| u32::try_from(*v).is_err())
        {
            errors.push(ValidationError::CapacityTooLarge {
                seatrade: row.seatrade_id.clone(),
                value,
            });
        } else if row.min_capacity > row.max_capacity {
            errors.push(ValidationError::CapacityInverted {
                seatrade: row.seatrade_id.clone(),
                min: row.min_capacity,
                max: row.max_capacity,
            });
        }
    }

    let mut roster = HashSet::new();
    for row in cabins {
        if row.cabin_id.trim().is_empty() {
            errors.push(ValidationError::BlankIdentifier("cabin"));
        } else if !roster.insert(row.cabin_id.as_str()) {
            errors.push(ValidationError::DuplicateCabin(row.cabin_id.clone()));
        }
    }

    let expected_len = campers.first().map(|c| c.preferences.len());
    let mut camper_ids = HashSet::new();
    let mut cabin_gender: HashMap<&str, &str> = cabins
        .iter()
        .map(|c| (c.cabin_id.as_str(), c.gender.as_str()))
        .collect();
    let mut occupied = HashSet::new();

    for row in campers {
        if row.camper_id.trim().is_empty() {
            errors.push(ValidationError::BlankIdentifier("camper"));
            continue;
        }
        if row.cabin_id.trim().is_empty() {
            errors.push(ValidationError::BlankIdentifier("cabin"));
            continue;
        }
        if !camper_ids.insert(row.camper_id.as_str()) {
            errors.push(ValidationError::DuplicateCamper(row.camper_id.clone()));
        }

        if !cabins.is_empty() && !roster.contains(row.cabin_id.as_str()) {
            errors.push(ValidationError::UnknownCabin {
                camper: row.camper_id.clone(),
                cabin: row.cabin_id.clone(),
            });
        }
        occupied.insert(row.cabin_id.as_str());
        match cabin_gender.get(row.cabin_id.as_str()) {
            Some(gender) if *gender != row.gender.as_str() => {
                errors.push(ValidationError::InconsistentCabinGender {
                    cabin: row.cabin_id.clone(),
                    first: gender.to_string(),
                    second: row.gender.clone(),
                });
            }
            Some(_) => {}
            None => {
                cabin_gender.insert(row.cabin_id.as_str(), row.gender.as_str());
            }
        }

        if row.preferences.is_empty() {
            errors.push(ValidationError::EmptyPreferences {
                camper: row.camper_id.clone(),
            });
            continue;
        }
        if let Some(expected) = expected_len {
            if row.preferences.len() != expected {
                errors.push(ValidationError::PreferenceLengthMismatch {
                    camper: row.camper_id.clone(),
                    expected,
                    found: row.preferences.len(),
                });
            }
        }
        let mut seen = HashSet::new();
        for pref in &row.preferences {
            if !seatrade_ids.contains(pref.as_str()) {
                errors.push(ValidationError::UnknownSeatrade {
                    camper: row.camper_id.clone(),
                    seatrade: pref.clone(),
                });
            }
            if !seen.insert(pref.as_str()) {
                errors.push(ValidationError::DuplicatePreference {
                    camper: row.camper_id.clone(),
                    seatrade: pref.clone(),
                });
            }
        }
    }

    for row in cabins {
        if !row.cabin_id.trim().is_empty() && !occupied.contains(row.cabin_id.as_str()) {
            errors.push(ValidationError::EmptyCabin(row.cabin_id.clone()));
        }
    }

    errors
}

pub fn build_camp(
    seatrades: &[SeatradeRow],
    campers: &[CamperRow],
    cabins: &[CabinRow],
) -> Result<Camp, ValidationErrors> {
    let errors = validate_rows(seatrades, campers, cabins);
    if !errors.is_empty() {
        return Err(ValidationErrors(errors));
    }

    let seatrade_list = seatrades
        .iter()
        .map(|row| Seatrade {
            id: row.seatrade_id.clone(),
            // range checked in validate_rows
            min_capacity: u32::try_from(row.min_capacity).unwrap_or(u32::MAX),
            max_capacity: u32::try_from(row.max_capacity).unwrap_or(u32::MAX),
        })
        .collect::<Vec<_>>();
    let seatrade_lookup: HashMap<&str, usize> = seatrade_list
        .iter()
        .enumerate()
        .map(|(idx, s)| (s.id.as_str(), idx))
        .collect();

    let mut cabin_list: Vec<Cabin> = cabins
        .iter()
        .map(|row| Cabin {
            id: row.cabin_id.clone(),
            gender: row.gender.clone(),
            campers: Vec::new(),
        })
        .collect();
    let mut cabin_lookup: HashMap<String, usize> = cabin_list
        .iter()
        .enumerate()
        .map(|(idx, c)| (c.id.clone(), idx))
        .collect();

    let mut camper_list = Vec::with_capacity(campers.len());
    for (camper_idx, row) in campers.iter().enumerate() {
        let cabin_idx = match cabin_lookup.get(&row.cabin_id) {
            Some(idx) => *idx,
            None => {
                let idx = cabin_list.len();
                cabin_list.push(Cabin {
                    id: row.cabin_id.clone(),
                    gender: row.gender.clone(),
                    campers: Vec::new(),
                });
                cabin_lookup.insert(row.cabin_id.clone(), idx);
                idx
            }
        };
        cabin_list[cabin_idx].campers.push(camper_idx);

        let order = row
            .preferences
            .iter()
            .filter_map(|pref| seatrade_lookup.get(pref.as_str()).copied())
            .collect::<Vec<_>>();
        camper_list.push(Camper {
            id: row.camper_id.clone(),
            cabin: cabin_idx,
            preferences: RankedPreferences::new(order, seatrade_list.len()),
        });
    }

    let preference_len = campers.first().map(|c| c.preferences.len()).unwrap_or(0);
    Ok(Camp::from_parts(
        seatrade_list,
        cabin_list,
        camper_list,
        preference_len,
    ))
}
