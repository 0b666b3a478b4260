use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::domain::{Block, Camp, Fleet};
use crate::model::VariableLayout;

/// Rank reported for an assignment to a seatrade the camper never listed.
pub const UNRANKED_SENTINEL: u32 = 999;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AssignmentRecord {
    pub camper: String,
    pub cabin: String,
    pub block: Block,
    pub fleet: Fleet,
    pub seatrade: String,
    pub assigned: bool,
    /// 1-based rank when assigned, `0` otherwise.
    pub preference_rank: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Placement {
    pub block: Block,
    pub fleet: Fleet,
    pub seatrade: String,
    pub preference_rank: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InstanceFill {
    pub label: String,
    pub fleet: Fleet,
    pub seatrade: String,
    pub assigned: usize,
    pub min_capacity: u32,
    pub max_capacity: u32,
}

impl InstanceFill {
    pub fn within_capacity(&self) -> bool {
        (self.min_capacity as usize..=self.max_capacity as usize).contains(&self.assigned)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AssignmentSummary {
    pub campers: usize,
    pub assignments: usize,
    pub instances: Vec<InstanceFill>,
    pub rank_histogram: BTreeMap<u32, usize>,
    pub cabin_activations: usize,
    pub unranked: usize,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AssignmentTable {
    records: Vec<AssignmentRecord>,
}

pub fn interpret(camp: &Camp, layout: &VariableLayout, values: &[f64]) -> AssignmentTable {
    let mut records = Vec::with_capacity(camp.campers().len() * camp.instances().len());
    for (c, camper) in camp.campers().iter().enumerate() {
        let cabin = &camp.cabin_of(c).id;
        for (i, inst) in camp.instances().iter().enumerate() {
            let value = values
                .get(layout.assign.var(c, i).0)
                .copied()
                .unwrap_or(0.0);
            let assigned = value >= 0.5;
            let preference_rank = if assigned {
                camper
                    .preferences
                    .rank_of(inst.seatrade)
                    .map(|r| r as u32 + 1)
                    .unwrap_or(UNRANKED_SENTINEL)
            } else {
                0
            };
            records.push(AssignmentRecord {
                camper: camper.id.clone(),
                cabin: cabin.clone(),
                block: inst.fleet.block(),
                fleet: inst.fleet,
                seatrade: camp.seatrades()[inst.seatrade].id.clone(),
                assigned,
                preference_rank,
            });
        }
    }
    AssignmentTable { records }
}

impl AssignmentTable {
    pub fn records(&self) -> &[AssignmentRecord] {
        &self.records
    }

    /// One record per (camper, block) in a feasible plan.
    pub fn assigned(&self) -> impl Iterator<Item = &AssignmentRecord> {
        self.records.iter().filter(|r| r.assigned)
    }

    pub fn by_cabin(&self) -> BTreeMap<String, BTreeMap<String, Vec<Placement>>> {
        let mut out: BTreeMap<String, BTreeMap<String, Vec<Placement>>> = BTreeMap::new();
        for r in self.assigned() {
            out.entry(r.cabin.clone())
                .or_default()
                .entry(r.camper.clone())
                .or_default()
                .push(Placement {
                    block: r.block,
                    fleet: r.fleet,
                    seatrade: r.seatrade.clone(),
                    preference_rank: r.preference_rank,
                });
        }
        out
    }

    pub fn by_seatrade(&self) -> BTreeMap<String, BTreeMap<String, Vec<String>>> {
        let mut out: BTreeMap<String, BTreeMap<String, Vec<String>>> = BTreeMap::new();
        for r in self.assigned() {
            out.entry(format!("{}_{}", r.fleet, r.seatrade))
                .or_default()
                .entry(r.cabin.clone())
                .or_default()
                .push(r.camper.clone());
        }
        out
    }

    pub fn summary(&self, camp: &Camp) -> AssignmentSummary {
        let mut load: HashMap<(Fleet, &str), usize> = HashMap::new();
        let mut activations = HashSet::new();
        let mut rank_histogram = BTreeMap::new();
        let mut assignments = 0;
        for r in self.assigned() {
            assignments += 1;
            *load.entry((r.fleet, r.seatrade.as_str())).or_default() += 1;
            activations.insert((r.cabin.as_str(), r.fleet, r.seatrade.as_str()));
            *rank_histogram.entry(r.preference_rank).or_default() += 1;
        }

        let instances = camp
            .instances()
            .iter()
            .enumerate()
            .map(|(i, inst)| {
                let seatrade = &camp.seatrades()[inst.seatrade];
                InstanceFill {
                    label: camp.instance_label(i),
                    fleet: inst.fleet,
                    seatrade: seatrade.id.clone(),
                    assigned: load
                        .get(&(inst.fleet, seatrade.id.as_str()))
                        .copied()
                        .unwrap_or(0),
                    min_capacity: seatrade.min_capacity,
                    max_capacity: seatrade.max_capacity,
                }
            })
            .collect();

        AssignmentSummary {
            campers: camp.campers().len(),
            assignments,
            instances,
            unranked: rank_histogram
                .get(&UNRANKED_SENTINEL)
                .copied()
                .unwrap_or(0),
            rank_histogram,
            cabin_activations: activations.len(),
        }
    }
}
