//! Predicate expression tree
//!
//! Boolean conditions over tag keys and the reserved pseudo-columns:
//!
//! - `_measurement` / `_name`: the measurement name (`_name` is canonical)
//! - `_field`: the field key
//! - `_value`: the field value, only known once data points are read
//!
//! Trees are immutable. [`reduce`] and the rewrite functions always build
//! structural copies; [`eval_bool`] evaluates a tree against a [`Valuer`].
//!
//! # Example
//!
//! ```rust
//! use kuba_storage_read::query::expr::{eval_bool, Expr, MapValuer};
//!
//! let cond = Expr::measurement().equal(Expr::string("cpu"))
//!     .and(Expr::tag("host").equal(Expr::string("a")));
//!
//! let row = MapValuer::new().with("_measurement", "cpu").with("host", "a");
//! assert!(eval_bool(&cond, &row));
//! assert_eq!(cond.to_string(), "_measurement = 'cpu' AND host = 'a'");
//! ```

use regex::Regex;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// Name the caller may use for the measurement pseudo-column
pub const MEASUREMENT_REF: &str = "_measurement";

/// Canonical name of the measurement pseudo-column after remapping
pub const NAME_REF: &str = "_name";

/// Field key pseudo-column
pub const FIELD_REF: &str = "_field";

/// Field value pseudo-column
pub const VALUE_REF: &str = "_value";

// ============================================================================
// Expression Tree
// ============================================================================

/// Predicate expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Binary operation (logical or comparison)
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: Box<Expr>,
        /// Right operand
        rhs: Box<Expr>,
    },
    /// Parenthesized sub-expression
    Paren(Box<Expr>),
    /// Reference to a tag key or pseudo-column
    VarRef(String),
    /// Constant value
    Literal(Literal),
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Logical AND
    And,
    /// Logical OR
    Or,
    /// Equal
    Eq,
    /// Not equal
    Neq,
    /// Less than
    Lt,
    /// Less than or equal
    Lte,
    /// Greater than
    Gt,
    /// Greater than or equal
    Gte,
    /// Regex match (`=~`)
    EqRegex,
    /// Regex non-match (`!~`)
    NeqRegex,
}

impl BinaryOp {
    /// Whether this is AND/OR
    #[inline]
    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Eq => "=",
            BinaryOp::Neq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::EqRegex => "=~",
            BinaryOp::NeqRegex => "!~",
        }
    }
}

/// Literal values
#[derive(Debug, Clone)]
pub enum Literal {
    /// Boolean
    Boolean(bool),
    /// String
    String(String),
    /// Signed integer
    Integer(i64),
    /// Floating point number
    Number(f64),
    /// Compiled regular expression
    Regex(Regex),
    /// Absent value
    Nil,
}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Literal::Boolean(a), Literal::Boolean(b)) => a == b,
            (Literal::String(a), Literal::String(b)) => a == b,
            (Literal::Integer(a), Literal::Integer(b)) => a == b,
            (Literal::Number(a), Literal::Number(b)) => a == b,
            (Literal::Regex(a), Literal::Regex(b)) => a.as_str() == b.as_str(),
            (Literal::Nil, Literal::Nil) => true,
            _ => false,
        }
    }
}

impl Expr {
    /// Reference to a tag key
    pub fn tag(key: impl Into<String>) -> Self {
        Expr::VarRef(key.into())
    }

    /// Reference to the measurement pseudo-column
    pub fn measurement() -> Self {
        Expr::VarRef(MEASUREMENT_REF.to_string())
    }

    /// Reference to the field key pseudo-column
    pub fn field_key() -> Self {
        Expr::VarRef(FIELD_REF.to_string())
    }

    /// Reference to the field value pseudo-column
    pub fn field_value() -> Self {
        Expr::VarRef(VALUE_REF.to_string())
    }

    /// String literal
    pub fn string(s: impl Into<String>) -> Self {
        Expr::Literal(Literal::String(s.into()))
    }

    /// Integer literal
    pub fn integer(v: i64) -> Self {
        Expr::Literal(Literal::Integer(v))
    }

    /// Float literal
    pub fn number(v: f64) -> Self {
        Expr::Literal(Literal::Number(v))
    }

    /// Boolean literal
    pub fn boolean(v: bool) -> Self {
        Expr::Literal(Literal::Boolean(v))
    }

    /// Regex literal; fails on an invalid pattern
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Expr::Literal(Literal::Regex(Regex::new(pattern)?)))
    }

    /// Build `self <op> rhs`
    pub fn binary(self, op: BinaryOp, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(self),
            rhs: Box::new(rhs),
        }
    }

    /// `self AND rhs`
    pub fn and(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::And, rhs)
    }

    /// `self OR rhs`
    pub fn or(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::Or, rhs)
    }

    /// `self = rhs`
    pub fn equal(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::Eq, rhs)
    }

    /// `self != rhs`
    pub fn not_equal(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::Neq, rhs)
    }

    /// `self < rhs`
    pub fn less_than(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::Lt, rhs)
    }

    /// `self > rhs`
    pub fn greater_than(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::Gt, rhs)
    }

    /// `self =~ rhs`
    pub fn matches(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::EqRegex, rhs)
    }

    /// Wrap in parentheses
    pub fn paren(self) -> Self {
        Expr::Paren(Box::new(self))
    }

    /// Whether this node is the literal `true`
    pub fn is_true_literal(&self) -> bool {
        matches!(self, Expr::Literal(Literal::Boolean(true)))
    }

    /// Visit every node depth-first, parents before children
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        f(self);
        match self {
            Expr::Binary { lhs, rhs, .. } => {
                lhs.walk(f);
                rhs.walk(f);
            }
            Expr::Paren(inner) => inner.walk(f),
            Expr::VarRef(_) | Expr::Literal(_) => {}
        }
    }

    /// Rebuild the tree bottom-up, applying `f` to every rebuilt node
    pub fn rewrite(&self, f: &mut impl FnMut(Expr) -> Expr) -> Expr {
        let node = match self {
            Expr::Binary { op, lhs, rhs } => Expr::Binary {
                op: *op,
                lhs: Box::new(lhs.rewrite(f)),
                rhs: Box::new(rhs.rewrite(f)),
            },
            Expr::Paren(inner) => Expr::Paren(Box::new(inner.rewrite(f))),
            other => other.clone(),
        };
        f(node)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Binary { op, lhs, rhs } => {
                fmt_operand(f, *op, lhs)?;
                write!(f, " {} ", op.symbol())?;
                fmt_operand(f, *op, rhs)
            }
            Expr::Paren(inner) => write!(f, "({})", inner),
            Expr::VarRef(name) => write!(f, "{}", name),
            Expr::Literal(lit) => write!(f, "{}", lit),
        }
    }
}

/// Write an operand, parenthesizing an OR nested directly under an AND
fn fmt_operand(f: &mut fmt::Formatter<'_>, parent: BinaryOp, operand: &Expr) -> fmt::Result {
    match operand {
        Expr::Binary {
            op: BinaryOp::Or, ..
        } if parent == BinaryOp::And => write!(f, "({})", operand),
        _ => write!(f, "{}", operand),
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Number(n) => write!(f, "{}", n),
            Literal::Regex(re) => write!(f, "/{}/", re.as_str()),
            Literal::Nil => write!(f, "nil"),
        }
    }
}

// ============================================================================
// Name Resolution
// ============================================================================

/// Value resolved for a name, borrowed from the valuer where possible
#[derive(Debug, Clone)]
pub enum Value<'a> {
    /// String value, typically a tag value or measurement name
    Str(Cow<'a, str>),
    /// Any other literal
    Literal(Cow<'a, Literal>),
}

impl Value<'_> {
    /// Owned literal form, as substituted by [`reduce`]
    pub fn into_literal(self) -> Literal {
        match self {
            Value::Str(s) => Literal::String(s.into_owned()),
            Value::Literal(lit) => lit.into_owned(),
        }
    }

    /// String view; absent values read as the empty string
    fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(&**s),
            Value::Literal(lit) => match &**lit {
                Literal::String(s) => Some(s),
                Literal::Nil => Some(""),
                _ => None,
            },
        }
    }

    fn as_literal(&self) -> Option<&Literal> {
        match self {
            Value::Literal(lit) => Some(&**lit),
            Value::Str(_) => None,
        }
    }

    fn as_regex(&self) -> Option<&Regex> {
        match self.as_literal() {
            Some(Literal::Regex(re)) => Some(re),
            _ => None,
        }
    }
}

impl<'a> From<&'a Literal> for Value<'a> {
    fn from(lit: &'a Literal) -> Self {
        Value::Literal(Cow::Borrowed(lit))
    }
}

/// Resolves names referenced by an expression to values
///
/// Returning `None` leaves the name unresolved: [`reduce`] keeps the
/// reference in its output, [`eval_bool`] treats it as an absent value.
pub trait Valuer {
    /// Resolve `name` to a value, or `None` if it is not known here
    fn value(&self, name: &str) -> Option<Value<'_>>;
}

/// Valuer backed by a map, used where a full row is known up front
#[derive(Debug, Clone, Default)]
pub struct MapValuer(HashMap<String, Literal>);

impl MapValuer {
    /// Create an empty valuer
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a string value
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), Literal::String(value.into()));
        self
    }

    /// Add an arbitrary literal
    pub fn with_literal(mut self, name: impl Into<String>, value: Literal) -> Self {
        self.0.insert(name.into(), value);
        self
    }
}

impl Valuer for MapValuer {
    fn value(&self, name: &str) -> Option<Value<'_>> {
        self.0.get(name).map(Value::from)
    }
}

// ============================================================================
// Reduction
// ============================================================================

/// Partially evaluate `expr`, substituting every name `valuer` resolves and
/// folding constants
///
/// The input is not modified. Names the valuer does not resolve (or all
/// names when `valuer` is `None`) stay as references, so the result is the
/// residual condition still to be checked.
pub fn reduce(expr: &Expr, valuer: Option<&dyn Valuer>) -> Expr {
    match expr {
        Expr::Binary { op, lhs, rhs } => {
            reduce_binary(*op, reduce(lhs, valuer), reduce(rhs, valuer))
        }
        Expr::Paren(inner) => match reduce(inner, valuer) {
            lit @ Expr::Literal(_) => lit,
            // Parens only matter around binary expressions
            var @ Expr::VarRef(_) => var,
            other => Expr::Paren(Box::new(other)),
        },
        Expr::VarRef(name) => match valuer.and_then(|v| v.value(name)) {
            Some(value) => Expr::Literal(value.into_literal()),
            None => expr.clone(),
        },
        Expr::Literal(_) => expr.clone(),
    }
}

fn reduce_binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    match op {
        BinaryOp::And => match (as_bool(&lhs), as_bool(&rhs)) {
            (Some(false), _) | (_, Some(false)) => Expr::boolean(false),
            (Some(true), _) => rhs,
            (_, Some(true)) => lhs,
            _ => lhs.and(rhs),
        },
        BinaryOp::Or => match (as_bool(&lhs), as_bool(&rhs)) {
            (Some(true), _) | (_, Some(true)) => Expr::boolean(true),
            (Some(false), _) => rhs,
            (_, Some(false)) => lhs,
            _ => lhs.or(rhs),
        },
        _ => match (&lhs, &rhs) {
            (Expr::Literal(l), Expr::Literal(r)) => match compare(op, &l.into(), &r.into()) {
                Some(b) => Expr::boolean(b),
                None => lhs.binary(op, rhs),
            },
            _ => lhs.binary(op, rhs),
        },
    }
}

fn as_bool(expr: &Expr) -> Option<bool> {
    match expr {
        Expr::Literal(Literal::Boolean(b)) => Some(*b),
        _ => None,
    }
}

// ============================================================================
// Evaluation
// ============================================================================

/// Evaluate `expr` to a boolean against `valuer`
///
/// Unresolved names are treated as absent values. Absent values compare
/// like the empty string, matching how the series index treats a missing
/// tag. Comparisons between incompatible types are false.
pub fn eval_bool(expr: &Expr, valuer: &dyn Valuer) -> bool {
    matches!(eval(expr, valuer).as_literal(), Some(Literal::Boolean(true)))
}

/// Borrows literals and resolved values; regex literals match in place.
fn eval<'a>(expr: &'a Expr, valuer: &'a dyn Valuer) -> Value<'a> {
    let result = match expr {
        Expr::Binary { op, lhs, rhs } => match op {
            BinaryOp::And => eval_bool(lhs, valuer) && eval_bool(rhs, valuer),
            BinaryOp::Or => eval_bool(lhs, valuer) || eval_bool(rhs, valuer),
            _ => {
                let l = eval(lhs, valuer);
                let r = eval(rhs, valuer);
                compare(*op, &l, &r).unwrap_or(false)
            }
        },
        Expr::Paren(inner) => return eval(inner, valuer),
        Expr::VarRef(name) => {
            return valuer
                .value(name)
                .unwrap_or(Value::Literal(Cow::Owned(Literal::Nil)))
        }
        Expr::Literal(lit) => return Value::from(lit),
    };
    Value::Literal(Cow::Owned(Literal::Boolean(result)))
}

/// Compare two values; `None` when the operator does not apply to them
fn compare(op: BinaryOp, lhs: &Value<'_>, rhs: &Value<'_>) -> Option<bool> {
    use Literal::*;

    if let Some(re) = rhs.as_regex() {
        let s = lhs.as_str()?;
        return match op {
            BinaryOp::EqRegex => Some(re.is_match(s)),
            BinaryOp::NeqRegex => Some(!re.is_match(s)),
            _ => None,
        };
    }
    if let (Some(l), Some(r)) = (lhs.as_str(), rhs.as_str()) {
        return ordering_matches(op, l.cmp(r));
    }

    match (lhs.as_literal()?, rhs.as_literal()?) {
        (Integer(a), Integer(b)) => ordering_matches(op, a.cmp(b)),
        (l @ (Integer(_) | Number(_)), r @ (Integer(_) | Number(_))) => {
            let ord = number_of(l).partial_cmp(&number_of(r))?;
            ordering_matches(op, ord)
        }
        (Boolean(a), Boolean(b)) => match op {
            BinaryOp::Eq => Some(a == b),
            BinaryOp::Neq => Some(a != b),
            _ => None,
        },
        _ => None,
    }
}

fn ordering_matches(op: BinaryOp, ord: Ordering) -> Option<bool> {
    Some(match op {
        BinaryOp::Eq => ord == Ordering::Equal,
        BinaryOp::Neq => ord != Ordering::Equal,
        BinaryOp::Lt => ord == Ordering::Less,
        BinaryOp::Lte => ord != Ordering::Greater,
        BinaryOp::Gt => ord == Ordering::Greater,
        BinaryOp::Gte => ord != Ordering::Less,
        _ => return None,
    })
}

fn number_of(lit: &Literal) -> f64 {
    match lit {
        Literal::Integer(i) => *i as f64,
        Literal::Number(n) => *n,
        _ => f64::NAN,
    }
}
