use std::fmt::Write;

use crate::model::{LinearExpr, LinearModel};

/// Renders the model in CPLEX LP format.
pub fn write_lp(model: &LinearModel) -> String {
    let mut out = String::new();
    out.push_str("Minimize\n obj: ");
    out.push_str(&fmt_expr(model, model.objective()));
    out.push('\n');
    out.push_str("Subject To\n");
    for row in model.rows() {
        let _ = writeln!(
            out,
            " {}: {} {} {}",
            row.name,
            fmt_expr(model, &row.expr),
            row.sense.symbol(),
            fmt_num(row.rhs - row.expr.constant)
        );
    }
    out.push_str("Binary\n");
    for name in model.var_names() {
        let _ = writeln!(out, " {name}");
    }
    out.push_str("End\n");
    out
}

fn fmt_num(v: f64) -> String {
    if (v - v.round()).abs() < 1e-9 {
        format!("{}", v.round() as i64)
    } else {
        format!("{v:.6}")
    }
}

fn fmt_expr(model: &LinearModel, expr: &LinearExpr) -> String {
    let mut parts = Vec::with_capacity(expr.terms.len());
    for (var, c) in &expr.terms {
        let name = model.var_name(*var);
        if (c - 1.0).abs() < 1e-12 {
            parts.push(format!("+ {name}"));
        } else if (c + 1.0).abs() < 1e-12 {
            parts.push(format!("- {name}"));
        } else if *c < 0.0 {
            parts.push(format!("- {} {name}", fmt_num(-c)));
        } else {
            parts.push(format!("+ {} {name}", fmt_num(*c)));
        }
    }
    if parts.is_empty() {
        return "0".to_string();
    }
    parts.join(" ")
}
