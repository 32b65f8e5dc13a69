//! Predicate rewriting
//!
//! Splits one read predicate into the three conditions the read path can
//! answer at different stages:
//!
//! ```text
//!   full            _name = 'cpu' AND _field = 'usage' AND _value > 10
//!     │
//!     ├─ tag+field-key   _name = 'cpu' AND _field = 'usage'   (per row)
//!     │
//!     └─ tag-only        _name = 'cpu'                        (series index)
//! ```
//!
//! Whatever still references `_value` after a row is known is handed to the
//! data reader as the row's residual value condition.

use super::expr::{reduce, BinaryOp, Expr, Literal, FIELD_REF, MEASUREMENT_REF, NAME_REF, VALUE_REF};

/// A read predicate: an optional expression tree
///
/// `None` matches every series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    root: Option<Expr>,
}

impl Predicate {
    /// Predicate matching everything
    pub fn all() -> Self {
        Self { root: None }
    }

    /// Predicate with the given root expression
    pub fn new(root: Expr) -> Self {
        Self { root: Some(root) }
    }

    /// The root expression, if any
    pub fn root(&self) -> Option<&Expr> {
        self.root.as_ref()
    }

    /// Root expression with `_measurement` remapped to the canonical `_name`
    pub fn normalized(&self) -> Option<Expr> {
        self.root.as_ref().map(remap_measurement)
    }
}

impl From<Expr> for Predicate {
    fn from(expr: Expr) -> Self {
        Self::new(expr)
    }
}

/// Rename `_measurement` references to `_name`
pub fn remap_measurement(expr: &Expr) -> Expr {
    expr.rewrite(&mut |node| match node {
        Expr::VarRef(ref name) if name == MEASUREMENT_REF => Expr::VarRef(NAME_REF.to_string()),
        other => other,
    })
}

/// Report whether `expr` references the field key and/or the field value
pub fn has_field_key_or_value(expr: &Expr) -> (bool, bool) {
    let mut has_field = false;
    let mut has_value = false;
    expr.walk(&mut |node| {
        if let Expr::VarRef(name) = node {
            match name.as_str() {
                FIELD_REF => has_field = true,
                VALUE_REF => has_value = true,
                _ => {}
            }
        }
    });
    (has_field, has_value)
}

/// Replace every comparison on the field value with `true`
pub fn rewrite_remove_field_value(expr: &Expr) -> Expr {
    replace_comparisons(expr, &[VALUE_REF])
}

/// Replace every comparison on the field key or field value with `true`
pub fn rewrite_remove_field_key_and_value(expr: &Expr) -> Expr {
    replace_comparisons(expr, &[FIELD_REF, VALUE_REF])
}

fn replace_comparisons(expr: &Expr, names: &[&str]) -> Expr {
    expr.rewrite(&mut |node| match node {
        Expr::Binary { op, ref lhs, ref rhs }
            if !op.is_logical() && (refers_to(lhs, names) || refers_to(rhs, names)) =>
        {
            Expr::boolean(true)
        }
        other => other,
    })
}

fn refers_to(expr: &Expr, names: &[&str]) -> bool {
    matches!(expr, Expr::VarRef(name) if names.contains(&name.as_str()))
}

/// Return the measurement name if `expr` restricts to exactly one
/// measurement by equality and contains no OR anywhere
///
/// Any other comparison on the measurement (`!=`, regex, ordering) or a
/// second measurement equality disqualifies the expression.
pub fn single_measurement_no_or(expr: &Expr) -> Option<String> {
    let mut measurement: Option<&str> = None;
    let mut found_once = true;
    let mut invalid = false;

    expr.walk(&mut |node| {
        if invalid || !found_once {
            return;
        }
        if let Expr::Binary { op, lhs, rhs } = node {
            if *op == BinaryOp::Or {
                invalid = true;
                return;
            }
            if matches!(lhs.as_ref(), Expr::VarRef(name) if name == NAME_REF) {
                if *op != BinaryOp::Eq {
                    invalid = true;
                    return;
                }
                if measurement.is_some() {
                    found_once = false;
                }
                if let Expr::Literal(Literal::String(s)) = rhs.as_ref() {
                    measurement = Some(s.as_str());
                }
            }
        }
    });

    match measurement {
        Some(name) if !name.is_empty() && found_once && !invalid => Some(name.to_string()),
        _ => None,
    }
}

/// The three tiers of a read predicate, computed once per cursor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredicatePlan {
    /// The normalized predicate
    pub full: Option<Expr>,
    /// Condition over tags, measurement and field key (evaluated per row)
    pub measurement_cond: Option<Expr>,
    /// Condition over tags and measurement only (pushed to the series index)
    pub tag_cond: Option<Expr>,
    /// Whether `full` references the field key
    pub has_field_key: bool,
    /// Whether `full` references the field value
    pub has_field_value: bool,
}

impl PredicatePlan {
    /// Split `predicate` into its tiers
    pub fn new(predicate: &Predicate) -> Self {
        let full = match predicate.normalized() {
            Some(expr) => expr,
            None => return Self::default(),
        };

        let (has_field_key, has_field_value) = has_field_key_or_value(&full);
        if !(has_field_key || has_field_value) {
            return Self {
                measurement_cond: Some(full.clone()),
                tag_cond: Some(full.clone()),
                full: Some(full),
                has_field_key,
                has_field_value,
            };
        }

        let measurement_cond = non_trivial(reduce(&rewrite_remove_field_value(&full), None));
        let tag_cond = non_trivial(reduce(&rewrite_remove_field_key_and_value(&full), None));

        Self {
            full: Some(full),
            measurement_cond,
            tag_cond,
            has_field_key,
            has_field_value,
        }
    }

    /// Measurement to restrict the series scan to, when the tag-only
    /// condition allows the metadata fast path
    pub fn single_measurement(&self) -> Option<String> {
        self.tag_cond.as_ref().and_then(single_measurement_no_or)
    }
}

fn non_trivial(expr: Expr) -> Option<Expr> {
    if expr.is_true_literal() {
        None
    } else {
        Some(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu() -> Expr {
        Expr::measurement().equal(Expr::string("cpu"))
    }

    #[test]
    fn test_remap_measurement() {
        let expr = remap_measurement(&cpu());
        assert_eq!(expr.to_string(), "_name = 'cpu'");
    }

    #[test]
    fn test_detects_field_key_and_value() {
        assert_eq!(has_field_key_or_value(&cpu()), (false, false));
        assert_eq!(
            has_field_key_or_value(&Expr::field_key().equal(Expr::string("x"))),
            (true, false)
        );
        let both = Expr::field_key()
            .equal(Expr::string("x"))
            .and(Expr::field_value().greater_than(Expr::integer(1)));
        assert_eq!(has_field_key_or_value(&both), (true, true));
    }

    #[test]
    fn test_plan_without_field_refs_keeps_full() {
        let plan = PredicatePlan::new(&Predicate::new(cpu()));
        let full = plan.full.clone().unwrap();
        assert_eq!(plan.tag_cond.as_ref(), Some(&full));
        assert_eq!(plan.measurement_cond.as_ref(), Some(&full));
        assert!(!plan.has_field_key);
        assert!(!plan.has_field_value);
    }

    #[test]
    fn test_plan_splits_tiers() {
        let expr = cpu()
            .and(Expr::field_key().equal(Expr::string("usage_idle")))
            .and(Expr::field_value().greater_than(Expr::integer(10)));
        let plan = PredicatePlan::new(&Predicate::new(expr));

        assert_eq!(plan.tag_cond.unwrap().to_string(), "_name = 'cpu'");
        assert_eq!(
            plan.measurement_cond.unwrap().to_string(),
            "_name = 'cpu' AND _field = 'usage_idle'"
        );
        assert!(plan.has_field_key);
        assert!(plan.has_field_value);
    }

    #[test]
    fn test_plan_field_key_only_has_no_tag_cond() {
        let plan = PredicatePlan::new(&Predicate::new(
            Expr::field_key().equal(Expr::string("usage_idle")),
        ));
        assert!(plan.tag_cond.is_none());
        assert!(plan.measurement_cond.is_some());
        assert!(plan.single_measurement().is_none());
    }

    #[test]
    fn test_empty_predicate() {
        let plan = PredicatePlan::new(&Predicate::all());
        assert_eq!(plan, PredicatePlan::default());
    }

    #[test]
    fn test_single_measurement() {
        let expr = remap_measurement(&cpu().and(Expr::tag("host").equal(Expr::string("a"))));
        assert_eq!(single_measurement_no_or(&expr), Some("cpu".to_string()));
    }

    #[test]
    fn test_single_measurement_rejects_or() {
        let expr = remap_measurement(
            &cpu().and(
                Expr::tag("host")
                    .equal(Expr::string("a"))
                    .or(Expr::tag("host").equal(Expr::string("b")))
                    .paren(),
            ),
        );
        assert_eq!(single_measurement_no_or(&expr), None);
    }

    #[test]
    fn test_single_measurement_rejects_not_equal() {
        let expr = remap_measurement(&Expr::measurement().not_equal(Expr::string("cpu")));
        assert_eq!(single_measurement_no_or(&expr), None);
    }

    #[test]
    fn test_single_measurement_rejects_two_measurements() {
        let expr = remap_measurement(&cpu().and(Expr::measurement().equal(Expr::string("mem"))));
        assert_eq!(single_measurement_no_or(&expr), None);
    }

    #[test]
    fn test_value_under_or_widens_to_true() {
        let expr = cpu().and(
            Expr::field_value()
                .greater_than(Expr::integer(10))
                .or(Expr::tag("host").equal(Expr::string("a")))
                .paren(),
        );
        let plan = PredicatePlan::new(&Predicate::new(expr));
        assert_eq!(plan.tag_cond.unwrap().to_string(), "_name = 'cpu'");
    }
}
