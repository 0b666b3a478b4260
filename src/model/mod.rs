pub mod builder;
pub mod lp;

use serde::Serialize;

pub use builder::{build_model, AssignmentModel, Grid, VariableLayout};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VarId(pub usize);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    pub terms: Vec<(VarId, f64)>,
    pub constant: f64,
}

impl LinearExpr {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            terms: Vec::with_capacity(capacity),
            constant: 0.0,
        }
    }

    pub fn add_term(&mut self, var: VarId, coefficient: f64) {
        if coefficient != 0.0 {
            self.terms.push((var, coefficient));
        }
    }

    pub fn sum<I: IntoIterator<Item = VarId>>(vars: I) -> Self {
        let mut expr = Self::default();
        for var in vars {
            expr.add_term(var, 1.0);
        }
        expr
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(var, c)| c * values.get(var.0).copied().unwrap_or(0.0))
            .sum::<f64>()
            + self.constant
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sense {
    Le,
    Ge,
    Eq,
}

impl Sense {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::Eq => "=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub name: String,
    pub expr: LinearExpr,
    pub sense: Sense,
    pub rhs: f64,
}

impl Row {
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs = self.expr.evaluate(values);
        match self.sense {
            Sense::Le => lhs <= self.rhs + tolerance,
            Sense::Ge => lhs >= self.rhs - tolerance,
            Sense::Eq => (lhs - self.rhs).abs() <= tolerance,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LinearModel {
    names: Vec<String>,
    rows: Vec<Row>,
    objective: LinearExpr,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModelStats {
    pub variables: usize,
    pub rows: usize,
    pub objective_terms: usize,
}

impl LinearModel {
    pub fn add_binary(&mut self, name: impl Into<String>) -> VarId {
        self.names.push(name.into());
        VarId(self.names.len() - 1)
    }

    pub fn add_row(&mut self, name: impl Into<String>, expr: LinearExpr, sense: Sense, rhs: f64) {
        self.rows.push(Row {
            name: name.into(),
            expr,
            sense,
            rhs,
        });
    }

    pub fn set_objective(&mut self, objective: LinearExpr) {
        self.objective = objective;
    }

    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn var_count(&self) -> usize {
        self.names.len()
    }

    pub fn var_name(&self, var: VarId) -> &str {
        &self.names[var.0]
    }

    pub fn var_names(&self) -> &[String] {
        &self.names
    }

    pub fn stats(&self) -> ModelStats {
        ModelStats {
            variables: self.names.len(),
            rows: self.rows.len(),
            objective_terms: self.objective.terms.len(),
        }
    }

    pub fn violated_rows(&self, values: &[f64]) -> Vec<&str> {
        self.rows
            .iter()
            .filter(|row| !row.is_satisfied(values, 1e-6))
            .map(|row| row.name.as_str())
            .collect()
    }
}
