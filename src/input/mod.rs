use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::{build_camp, Camp};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeatradeRow {
    #[serde(alias = "seatrade", alias = "Seatrade")]
    pub seatrade_id: String,
    #[serde(alias = "campers_min", alias = "Campers/Seatrade Min")]
    pub min_capacity: i64,
    #[serde(alias = "campers_max", alias = "Campers/Seatrade Max")]
    pub max_capacity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CamperRow {
    #[serde(alias = "camper", alias = "Camper")]
    pub camper_id: String,
    #[serde(alias = "cabin", alias = "Cabin")]
    pub cabin_id: String,
    #[serde(default)]
    pub gender: String,
    pub preferences: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CabinRow {
    #[serde(alias = "cabin", alias = "Cabin")]
    pub cabin_id: String,
    #[serde(default)]
    pub gender: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampTables {
    pub seatrades: Vec<SeatradeRow>,
    pub campers: Vec<CamperRow>,
    #[serde(default)]
    pub cabins: Vec<CabinRow>,
}

impl CampTables {
    pub fn load(seatrades: &Path, campers: &Path, cabins: Option<&Path>) -> Result<Self> {
        let seatrades = read_seatrades(open(seatrades)?)
            .with_context(|| format!("failed parsing seatrade table: {}", seatrades.display()))?;
        let campers = read_campers(open(campers)?)
            .with_context(|| format!("failed parsing camper table: {}", campers.display()))?;
        let cabins = match cabins {
            Some(path) => read_cabins(open(path)?)
                .with_context(|| format!("failed parsing cabin table: {}", path.display()))?,
            None => Vec::new(),
        };
        Ok(Self {
            seatrades,
            campers,
            cabins,
        })
    }

    pub fn build(&self) -> Result<Camp> {
        Ok(build_camp(&self.seatrades, &self.campers, &self.cabins)?)
    }
}

fn open(path: &Path) -> Result<fs::File> {
    fs::File::open(path).with_context(|| format!("failed opening {}", path.display()))
}

pub fn read_seatrades<R: Read>(reader: R) -> Result<Vec<SeatradeRow>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut rows = Vec::new();
    for record in rdr.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}

pub fn read_cabins<R: Read>(reader: R) -> Result<Vec<CabinRow>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut rows = Vec::new();
    for record in rdr.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}

/// Reads `camper,cabin,gender,seatrade_1..seatrade_N`.
///
/// Preference columns are any header starting with `seatrade_` or
/// `preference_` followed by a number; they are ordered by that number, not by
/// column position. Blank trailing cells are dropped so a short list surfaces
/// as a length mismatch during validation.
pub fn read_campers<R: Read>(reader: R) -> Result<Vec<CamperRow>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();

    let column = |names: &[&str]| {
        headers
            .iter()
            .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
    };
    let camper_col = column(&["camper", "camper_id"])
        .ok_or_else(|| anyhow!("camper table is missing a `camper` column"))?;
    let cabin_col = column(&["cabin", "cabin_id"])
        .ok_or_else(|| anyhow!("camper table is missing a `cabin` column"))?;
    let gender_col = column(&["gender"]);

    let mut pref_cols = headers
        .iter()
        .enumerate()
        .filter_map(|(idx, h)| preference_ordinal(h).map(|ord| (ord, idx)))
        .collect::<Vec<_>>();
    pref_cols.sort();
    if pref_cols.is_empty() {
        return Err(anyhow!(
            "camper table has no `seatrade_<n>` preference columns"
        ));
    }

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let field = |idx: usize| record.get(idx).unwrap_or_default().to_string();
        let preferences = pref_cols
            .iter()
            .map(|(_, idx)| field(*idx))
            .filter(|p| !p.is_empty())
            .collect();
        rows.push(CamperRow {
            camper_id: field(camper_col),
            cabin_id: field(cabin_col),
            gender: gender_col.map(field).unwrap_or_default(),
            preferences,
        });
    }
    Ok(rows)
}

fn preference_ordinal(header: &str) -> Option<u32> {
    let lower = header.to_ascii_lowercase();
    let suffix = lower
        .strip_prefix("seatrade_")
        .or_else(|| lower.strip_prefix("preference_"))
        .or_else(|| lower.strip_prefix("seatrade #"))?;
    suffix.trim().parse().ok()
}
