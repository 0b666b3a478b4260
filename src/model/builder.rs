use std::ops::Range;

use serde::Serialize;
use tracing::debug;

use crate::config::OptimizationConfig;
use crate::domain::{Block, Camp, Fleet};
use crate::model::{LinearExpr, LinearModel, ModelStats, Sense, VarId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Grid {
    pub base: usize,
    pub rows: usize,
    pub cols: usize,
}

impl Grid {
    pub fn var(&self, row: usize, col: usize) -> VarId {
        debug_assert!(row < self.rows && col < self.cols);
        VarId(self.base + row * self.cols + col)
    }

    pub fn range(&self) -> Range<usize> {
        self.base..self.base + self.rows * self.cols
    }

    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableLayout {
    pub assign: Grid,
    pub cabin_active: Option<Grid>,
    pub fleet_active: Grid,
    pub seatrade_active: Option<Grid>,
}

#[derive(Debug, Clone)]
pub struct AssignmentModel {
    pub model: LinearModel,
    pub layout: VariableLayout,
}

impl AssignmentModel {
    pub fn stats(&self) -> ModelStats {
        self.model.stats()
    }
}

pub fn build_model(camp: &Camp, config: &OptimizationConfig) -> AssignmentModel {
    let mut builder = Builder::new(camp, config);
    builder.add_variables();
    builder.add_block_rows();
    builder.add_repeat_rows();
    builder.add_capacity_rows();
    builder.add_listed_only_rows();
    builder.add_top_choice_rows();
    builder.add_cabin_rows();
    builder.add_fleet_rows();
    builder.add_seatrade_rows();
    builder.set_objective();

    let built = AssignmentModel {
        layout: builder.layout(),
        model: builder.model,
    };
    let stats = built.stats();
    debug!(
        variables = stats.variables,
        rows = stats.rows,
        objective_terms = stats.objective_terms,
        "assignment model built"
    );
    built
}

struct Builder<'a> {
    camp: &'a Camp,
    config: &'a OptimizationConfig,
    model: LinearModel,
    assign: Grid,
    cabin_active: Option<Grid>,
    fleet_active: Grid,
    seatrade_active: Option<Grid>,
}

impl<'a> Builder<'a> {
    fn new(camp: &'a Camp, config: &'a OptimizationConfig) -> Self {
        let empty = Grid {
            base: 0,
            rows: 0,
            cols: 0,
        };
        Self {
            camp,
            config,
            model: LinearModel::default(),
            assign: empty,
            cabin_active: None,
            fleet_active: empty,
            seatrade_active: None,
        }
    }

    fn layout(&self) -> VariableLayout {
        VariableLayout {
            assign: self.assign,
            cabin_active: self.cabin_active,
            fleet_active: self.fleet_active,
            seatrade_active: self.seatrade_active,
        }
    }

    fn grid(&mut self, prefix: &str, rows: usize, cols: usize) -> Grid {
        let base = self.model.var_count();
        for r in 0..rows {
            for c in 0..cols {
                self.model.add_binary(format!("{prefix}_{r}_{c}"));
            }
        }
        Grid { base, rows, cols }
    }

    fn add_variables(&mut self) {
        let campers = self.camp.campers().len();
        let cabins = self.camp.cabins().len();
        let instances = self.camp.instances().len();
        let seatrades = self.camp.seatrades().len();

        self.assign = self.grid("assign", campers, instances);
        if self.config.cohesion_enabled() {
            self.cabin_active = Some(self.grid("cabin", cabins, instances));
        }
        self.fleet_active = self.grid("fleet", cabins, Fleet::ALL.len());
        if self.config.sparsity_enabled() || self.config.max_seatrades_per_fleet.is_some() {
            self.seatrade_active = Some(self.grid("offered", Fleet::ALL.len(), seatrades));
        }
    }

    fn add_block_rows(&mut self) {
        for c in 0..self.camp.campers().len() {
            for block in Block::ALL {
                let expr = LinearExpr::sum(
                    self.camp
                        .instances_in_block(block)
                        .map(|i| self.assign.var(c, i)),
                );
                self.model
                    .add_row(format!("block_{c}_{block}"), expr, Sense::Eq, 1.0);
            }
        }
    }

    fn add_repeat_rows(&mut self) {
        for c in 0..self.camp.campers().len() {
            for s in 0..self.camp.seatrades().len() {
                let expr = LinearExpr::sum(
                    Fleet::ALL
                        .iter()
                        .map(|f| self.assign.var(c, self.camp.instance_index(*f, s))),
                );
                self.model
                    .add_row(format!("no_repeat_{c}_{s}"), expr, Sense::Le, 1.0);
            }
        }
    }

    fn add_capacity_rows(&mut self) {
        let campers = self.camp.campers().len();
        for (i, instance) in self.camp.instances().iter().enumerate() {
            let seatrade = &self.camp.seatrades()[instance.seatrade];
            let load = LinearExpr::sum((0..campers).map(|c| self.assign.var(c, i)));
            if seatrade.min_capacity > 0 {
                self.model.add_row(
                    format!("cap_min_{i}"),
                    load.clone(),
                    Sense::Ge,
                    f64::from(seatrade.min_capacity),
                );
            }
            self.model.add_row(
                format!("cap_max_{i}"),
                load,
                Sense::Le,
                f64::from(seatrade.max_capacity),
            );
        }
    }

    fn add_listed_only_rows(&mut self) {
        for (c, camper) in self.camp.campers().iter().enumerate() {
            let expr = LinearExpr::sum(
                self.camp
                    .instances()
                    .iter()
                    .enumerate()
                    .filter(|(_, inst)| !camper.preferences.contains(inst.seatrade))
                    .map(|(i, _)| self.assign.var(c, i)),
            );
            if !expr.is_empty() {
                self.model
                    .add_row(format!("listed_only_{c}"), expr, Sense::Eq, 0.0);
            }
        }
    }

    /// At most one of the two picks may come from outside the top choices.
    fn add_top_choice_rows(&mut self) {
        let guarantee = self.config.top_choice_guarantee;
        if self.camp.preference_len() < guarantee + 2 {
            return;
        }
        for (c, camper) in self.camp.campers().iter().enumerate() {
            let expr = LinearExpr::sum(
                self.camp
                    .instances()
                    .iter()
                    .enumerate()
                    .filter(|(_, inst)| {
                        camper
                            .preferences
                            .rank_of(inst.seatrade)
                            .is_some_and(|rank| rank >= guarantee)
                    })
                    .map(|(i, _)| self.assign.var(c, i)),
            );
            if !expr.is_empty() {
                self.model
                    .add_row(format!("top_choice_{c}"), expr, Sense::Le, 1.0);
            }
        }
    }

    fn add_cabin_rows(&mut self) {
        let cap = self.config.max_campers_per_cabin_instance as usize;
        let instances = self.camp.instances().len();
        for (k, cabin) in self.camp.cabins().iter().enumerate() {
            if cabin.campers.len() > cap {
                for i in 0..instances {
                    let expr =
                        LinearExpr::sum(cabin.campers.iter().map(|c| self.assign.var(*c, i)));
                    self.model
                        .add_row(format!("cabin_cap_{k}_{i}"), expr, Sense::Le, cap as f64);
                }
            }
            let Some(active) = self.cabin_active else {
                continue;
            };
            for c in &cabin.campers {
                for i in 0..instances {
                    let mut expr = LinearExpr::with_capacity(2);
                    expr.add_term(self.assign.var(*c, i), 1.0);
                    expr.add_term(active.var(k, i), -1.0);
                    self.model
                        .add_row(format!("cabin_link_{c}_{i}"), expr, Sense::Le, 0.0);
                }
            }
        }
    }

    fn add_fleet_rows(&mut self) {
        let cabins = self.camp.cabins();
        for (k, cabin) in cabins.iter().enumerate() {
            for c in &cabin.campers {
                for fleet in Fleet::ALL {
                    let mut expr = LinearExpr::sum(
                        self.camp
                            .instances_in_fleet(fleet)
                            .map(|i| self.assign.var(*c, i)),
                    );
                    expr.add_term(self.fleet_active.var(k, fleet.index()), -1.0);
                    self.model
                        .add_row(format!("fleet_link_{c}_{fleet}"), expr, Sense::Le, 0.0);
                }
            }
            for block in Block::ALL {
                let expr = LinearExpr::sum(
                    block
                        .fleets()
                        .iter()
                        .map(|f| self.fleet_active.var(k, f.index())),
                );
                self.model
                    .add_row(format!("one_fleet_{k}_{block}"), expr, Sense::Eq, 1.0);
            }
        }

        let balance = (cabins.len() / 2) as f64;
        for fleet in Fleet::ALL {
            let expr =
                LinearExpr::sum((0..cabins.len()).map(|k| self.fleet_active.var(k, fleet.index())));
            self.model
                .add_row(format!("fleet_balance_{fleet}"), expr, Sense::Ge, balance);
        }

        for (g, gender) in self.camp.genders().into_iter().enumerate() {
            let members = self.camp.cabins_with_gender(gender).collect::<Vec<_>>();
            let floor = members.len() / 2;
            if floor == 0 {
                continue;
            }
            for fleet in Fleet::ALL {
                let expr = LinearExpr::sum(
                    members
                        .iter()
                        .map(|k| self.fleet_active.var(*k, fleet.index())),
                );
                self.model.add_row(
                    format!("gender_balance_{g}_{fleet}"),
                    expr,
                    Sense::Ge,
                    floor as f64,
                );
            }
        }
    }

    fn add_seatrade_rows(&mut self) {
        let Some(offered) = self.seatrade_active else {
            return;
        };
        let campers = self.camp.campers().len();
        for fleet in Fleet::ALL {
            for s in 0..self.camp.seatrades().len() {
                let i = self.camp.instance_index(fleet, s);
                for c in 0..campers {
                    let mut expr = LinearExpr::with_capacity(2);
                    expr.add_term(self.assign.var(c, i), 1.0);
                    expr.add_term(offered.var(fleet.index(), s), -1.0);
                    self.model
                        .add_row(format!("offered_link_{c}_{i}"), expr, Sense::Le, 0.0);
                }
            }
            if let Some(cap) = self.config.max_seatrades_per_fleet {
                let expr = LinearExpr::sum(
                    (0..self.camp.seatrades().len()).map(|s| offered.var(fleet.index(), s)),
                );
                self.model.add_row(
                    format!("fleet_offer_cap_{fleet}"),
                    expr,
                    Sense::Le,
                    f64::from(cap),
                );
            }
        }
    }

    fn set_objective(&mut self) {
        let mut objective = LinearExpr::with_capacity(self.assign.len());
        let weight = self.config.preference_weight;
        if weight > 0.0 {
            for (c, camper) in self.camp.campers().iter().enumerate() {
                for (i, inst) in self.camp.instances().iter().enumerate() {
                    if let Some(rank) = camper.preferences.rank_of(inst.seatrade) {
                        objective.add_term(self.assign.var(c, i), weight * rank as f64);
                    }
                }
            }
        }
        if let (Some(grid), Some(weight)) = (self.cabin_active, self.config.cabins_weight) {
            for v in grid.range() {
                objective.add_term(VarId(v), weight);
            }
        }
        if let (Some(grid), Some(weight)) = (self.seatrade_active, self.config.sparsity_weight) {
            for v in grid.range() {
                objective.add_term(VarId(v), weight);
            }
        }
        self.model.set_objective(objective);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::build_camp;
    use crate::input::{CamperRow, SeatradeRow};

    pub(crate) fn small_camp() -> Camp {
        let seatrades = ["S1", "S2"]
            .iter()
            .map(|id| SeatradeRow {
                seatrade_id: id.to_string(),
                min_capacity: 1,
                max_capacity: 2,
            })
            .collect::<Vec<_>>();
        let campers = [
            ("c1", "A", "f", ["S1", "S2"]),
            ("c2", "A", "f", ["S2", "S1"]),
            ("c3", "B", "m", ["S1", "S2"]),
            ("c4", "B", "m", ["S2", "S1"]),
        ]
        .iter()
        .map(|(id, cabin, gender, prefs)| CamperRow {
            camper_id: id.to_string(),
            cabin_id: cabin.to_string(),
            gender: gender.to_string(),
            preferences: prefs.iter().map(|p| p.to_string()).collect(),
        })
        .collect::<Vec<_>>();
        build_camp(&seatrades, &campers, &[]).expect("valid camp")
    }

    /// `cabins` cabins of `per_cabin` campers, alternating gender, each camper
    /// listing every seatrade in an order rotated by its index.
    pub(crate) fn rotating_camp(cabins: usize, per_cabin: usize, seatrades: usize) -> Camp {
        let ids = (1..=seatrades).map(|s| format!("S{s}")).collect::<Vec<_>>();
        let seatrade_rows = ids
            .iter()
            .map(|id| SeatradeRow {
                seatrade_id: id.clone(),
                min_capacity: 0,
                max_capacity: (cabins * per_cabin) as i64,
            })
            .collect::<Vec<_>>();
        let campers = (0..cabins * per_cabin)
            .map(|c| {
                let k = c / per_cabin;
                CamperRow {
                    camper_id: format!("c{c}"),
                    cabin_id: format!("K{k}"),
                    gender: if k % 2 == 0 { "f" } else { "m" }.to_string(),
                    preferences: (0..seatrades)
                        .map(|r| ids[(c + r) % seatrades].clone())
                        .collect(),
                }
            })
            .collect::<Vec<_>>();
        build_camp(&seatrade_rows, &campers, &[]).expect("valid camp")
    }

    fn uniform_seatrades(ids: &[&str], max: i64) -> Vec<SeatradeRow> {
        ids.iter()
            .map(|id| SeatradeRow {
                seatrade_id: id.to_string(),
                min_capacity: 0,
                max_capacity: max,
            })
            .collect()
    }

    fn camper_row(id: &str, cabin: &str, gender: &str, prefs: &[&str]) -> CamperRow {
        CamperRow {
            camper_id: id.to_string(),
            cabin_id: cabin.to_string(),
            gender: gender.to_string(),
            preferences: prefs.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub(crate) fn values_for(camp: &Camp, built: &AssignmentModel, picks: &[(usize, usize)]) -> Vec<f64> {
        let layout = &built.layout;
        let mut values = vec![0.0; built.model.var_count()];
        for (c, i) in picks {
            values[layout.assign.var(*c, *i).0] = 1.0;
            let k = camp.campers()[*c].cabin;
            let inst = camp.instances()[*i];
            values[layout.fleet_active.var(k, inst.fleet.index()).0] = 1.0;
            if let Some(grid) = layout.cabin_active {
                values[grid.var(k, *i).0] = 1.0;
            }
            if let Some(grid) = layout.seatrade_active {
                values[grid.var(inst.fleet.index(), inst.seatrade).0] = 1.0;
            }
        }
        values
    }

    // 1a_S1=0 1a_S2=1 1b_S1=2 1b_S2=3 2a_S1=4 2a_S2=5 2b_S1=6 2b_S2=7
    pub(crate) const BALANCED_PICKS: [(usize, usize); 8] =
        [(0, 0), (0, 5), (1, 1), (1, 4), (2, 2), (2, 7), (3, 3), (3, 6)];

    #[test]
    fn feasible_plan_satisfies_every_row() {
        let camp = small_camp();
        let built = build_model(&camp, &OptimizationConfig::default());
        let values = values_for(&camp, &built, &BALANCED_PICKS);
        assert!(built.model.violated_rows(&values).is_empty());
        // everyone got their first choice once and their second choice once
        assert!((built.model.objective().evaluate(&values) - (4.0 * 3.0 + 8.0 * 2.0 + 8.0 * 1.0)).abs() < 1e-9);
    }

    #[test]
    fn split_cabin_violates_fleet_rows() {
        let camp = small_camp();
        let built = build_model(&camp, &OptimizationConfig::default());
        let mut picks = BALANCED_PICKS;
        // c2 moves to 1b while c1 stays in 1a
        picks[2] = (1, 3);
        picks[6] = (3, 1);
        let values = values_for(&camp, &built, &picks);
        let violated = built.model.violated_rows(&values);
        assert!(violated.iter().any(|r| r.starts_with("one_fleet_")));
    }

    #[test]
    fn unused_terms_add_no_variables() {
        let camp = small_camp();
        let config = OptimizationConfig {
            cabins_weight: None,
            sparsity_weight: Some(0.0),
            ..OptimizationConfig::default()
        };
        let built = build_model(&camp, &config);
        assert!(built.layout.cabin_active.is_none());
        assert!(built.layout.seatrade_active.is_none());
        // assign (4 campers × 8 instances) + fleet (2 cabins × 4 fleets)
        assert_eq!(built.model.var_count(), 32 + 8);

        let capped = OptimizationConfig {
            max_seatrades_per_fleet: Some(1),
            ..config
        };
        let built = build_model(&camp, &capped);
        assert!(built.layout.seatrade_active.is_some());
        assert!(built
            .model
            .rows()
            .iter()
            .any(|r| r.name == "fleet_offer_cap_1a"));
    }

    #[test]
    fn two_low_ranked_picks_are_rejected() {
        let seatrades = ["S1", "S2", "S3", "S4"]
            .iter()
            .map(|id| SeatradeRow {
                seatrade_id: id.to_string(),
                min_capacity: 0,
                max_capacity: 4,
            })
            .collect::<Vec<_>>();
        let campers = vec![CamperRow {
            camper_id: "c1".into(),
            cabin_id: "A".into(),
            gender: "f".into(),
            preferences: vec!["S1".into(), "S2".into(), "S3".into(), "S4".into()],
        }];
        let camp = build_camp(&seatrades, &campers, &[]).expect("valid camp");
        let built = build_model(&camp, &OptimizationConfig::default());

        let third = camp.instance_index(Fleet::OneA, 2);
        let fourth = camp.instance_index(Fleet::TwoA, 3);
        let values = values_for(&camp, &built, &[(0, third), (0, fourth)]);
        assert_eq!(built.model.violated_rows(&values), vec!["top_choice_0"]);

        let first = camp.instance_index(Fleet::TwoA, 0);
        let values = values_for(&camp, &built, &[(0, third), (0, first)]);
        assert!(built.model.violated_rows(&values).is_empty());
    }

    #[test]
    fn unlisted_seatrade_is_fixed_to_zero() {
        let seatrades = ["S1", "S2", "S3"]
            .iter()
            .map(|id| SeatradeRow {
                seatrade_id: id.to_string(),
                min_capacity: 0,
                max_capacity: 4,
            })
            .collect::<Vec<_>>();
        let campers = vec![CamperRow {
            camper_id: "c1".into(),
            cabin_id: "A".into(),
            gender: "f".into(),
            preferences: vec!["S1".into(), "S2".into()],
        }];
        let camp = build_camp(&seatrades, &campers, &[]).expect("valid camp");
        let built = build_model(&camp, &OptimizationConfig::default());
        let s3 = camp.instance_index(Fleet::OneA, 2);
        let s1 = camp.instance_index(Fleet::TwoA, 0);
        let values = values_for(&camp, &built, &[(0, s3), (0, s1)]);
        assert_eq!(built.model.violated_rows(&values), vec!["listed_only_0"]);
    }

    #[test]
    fn oversized_cabin_is_capped_per_instance() {
        let seatrades = uniform_seatrades(&["S1", "S2", "S3"], 10);
        let campers = (1..=5)
            .map(|n| camper_row(&format!("c{n}"), "A", "f", &["S1", "S2", "S3"]))
            .collect::<Vec<_>>();
        let camp = build_camp(&seatrades, &campers, &[]).expect("valid camp");
        let built = build_model(&camp, &OptimizationConfig::default());
        assert!(built.model.rows().iter().any(|r| r.name.starts_with("cabin_cap_")));

        let one_s1 = camp.instance_index(Fleet::OneA, 0);
        let one_s2 = camp.instance_index(Fleet::OneA, 1);
        let two_s1 = camp.instance_index(Fleet::TwoA, 0);
        let two_s2 = camp.instance_index(Fleet::TwoA, 1);

        // four together is the most one cabin may put in an instance
        let mut picks = (0..4).flat_map(|c| [(c, one_s1), (c, two_s2)]).collect::<Vec<_>>();
        picks.extend([(4, one_s2), (4, two_s1)]);
        assert!(built.model.violated_rows(&values_for(&camp, &built, &picks)).is_empty());

        let crowded = (0..5).flat_map(|c| [(c, one_s1), (c, two_s2)]).collect::<Vec<_>>();
        let values = values_for(&camp, &built, &crowded);
        assert_eq!(
            built.model.violated_rows(&values),
            vec![format!("cabin_cap_0_{one_s1}"), format!("cabin_cap_0_{two_s2}")]
        );

        let small = small_camp();
        let built = build_model(&small, &OptimizationConfig::default());
        assert!(!built.model.rows().iter().any(|r| r.name.starts_with("cabin_cap_")));
    }

    #[test]
    fn one_sided_fleet_violates_balance() {
        let camp = small_camp();
        let built = build_model(&camp, &OptimizationConfig::default());
        let mut picks = BALANCED_PICKS;
        // cabin B joins cabin A in 1a
        picks[4] = (2, 0);
        picks[6] = (3, 1);
        let values = values_for(&camp, &built, &picks);
        let violated = built.model.violated_rows(&values);
        assert!(violated.contains(&"fleet_balance_1b"), "{violated:?}");
        assert!(!violated.iter().any(|r| r.starts_with("one_fleet_")));
    }

    #[test]
    fn same_gender_cabins_are_split_across_fleets() {
        let seatrades = uniform_seatrades(&["S1", "S2"], 4);
        let campers = vec![
            camper_row("c1", "A", "f", &["S1", "S2"]),
            camper_row("c2", "B", "f", &["S1", "S2"]),
            camper_row("c3", "C", "m", &["S1", "S2"]),
            camper_row("c4", "D", "m", &["S1", "S2"]),
        ];
        let camp = build_camp(&seatrades, &campers, &[]).expect("valid camp");
        let built = build_model(&camp, &OptimizationConfig::default());

        let s1 = |fleet| camp.instance_index(fleet, 0);
        let s2 = |fleet| camp.instance_index(fleet, 1);
        // two cabins per fleet in both blocks; block one groups by gender
        let picks = [
            (0, s1(Fleet::OneA)),
            (1, s1(Fleet::OneA)),
            (2, s1(Fleet::OneB)),
            (3, s1(Fleet::OneB)),
            (0, s2(Fleet::TwoA)),
            (2, s2(Fleet::TwoA)),
            (1, s2(Fleet::TwoB)),
            (3, s2(Fleet::TwoB)),
        ];
        let values = values_for(&camp, &built, &picks);
        assert_eq!(
            built.model.violated_rows(&values),
            vec!["gender_balance_0_1b", "gender_balance_1_1a"]
        );

        let mixed = [
            (0, s1(Fleet::OneA)),
            (2, s1(Fleet::OneA)),
            (1, s1(Fleet::OneB)),
            (3, s1(Fleet::OneB)),
            (0, s2(Fleet::TwoA)),
            (2, s2(Fleet::TwoA)),
            (1, s2(Fleet::TwoB)),
            (3, s2(Fleet::TwoB)),
        ];
        assert!(built
            .model
            .violated_rows(&values_for(&camp, &built, &mixed))
            .is_empty());
    }

    #[test]
    fn fleet_offer_cap_binds() {
        let camp = small_camp();
        let capped = OptimizationConfig {
            max_seatrades_per_fleet: Some(1),
            ..OptimizationConfig::default()
        };
        let built = build_model(&camp, &capped);
        // the balanced plan runs both seatrades in every fleet
        let values = values_for(&camp, &built, &BALANCED_PICKS);
        assert_eq!(
            built.model.violated_rows(&values),
            vec![
                "fleet_offer_cap_1a",
                "fleet_offer_cap_1b",
                "fleet_offer_cap_2a",
                "fleet_offer_cap_2b"
            ]
        );

        let roomy = OptimizationConfig {
            max_seatrades_per_fleet: Some(2),
            ..capped
        };
        let built = build_model(&camp, &roomy);
        let values = values_for(&camp, &built, &BALANCED_PICKS);
        assert!(built.model.violated_rows(&values).is_empty());
    }

    #[test]
    fn gender_rows_are_named_by_index() {
        let seatrades = uniform_seatrades(&["S1", "S2"], 4);
        let campers = vec![
            camper_row("c1", "A", "non binary", &["S1", "S2"]),
            camper_row("c2", "B", "non binary", &["S2", "S1"]),
        ];
        let camp = build_camp(&seatrades, &campers, &[]).expect("valid camp");
        let built = build_model(&camp, &OptimizationConfig::default());
        let names = built
            .model
            .rows()
            .iter()
            .filter(|r| r.name.starts_with("gender_balance_"))
            .map(|r| r.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "gender_balance_0_1a",
                "gender_balance_0_1b",
                "gender_balance_0_2a",
                "gender_balance_0_2b"
            ]
        );
    }
}
