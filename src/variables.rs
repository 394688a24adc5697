//! Variable labels, vartypes, and the typed variable registry.

use crate::error::{ModelError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A variable (or constraint) label.
///
/// Labels are value-identified: there is no variable object, only the
/// label itself. Strings, integers, floats, and nested tuples of these
/// are all valid labels, and all of them round-trip through the archive
/// format with their structure preserved.
///
/// Floats compare and hash bit-exactly, so a label map never loses
/// entries to floating-point fuzziness.
#[derive(Debug, Clone)]
pub enum Variable {
    /// Integer label.
    Int(i64),
    /// Floating-point label.
    Float(f64),
    /// String label.
    Str(String),
    /// Tuple label (nested labels).
    Tuple(Vec<Variable>),
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Variable::Int(a), Variable::Int(b)) => a == b,
            (Variable::Float(a), Variable::Float(b)) => a.to_bits() == b.to_bits(),
            (Variable::Str(a), Variable::Str(b)) => a == b,
            (Variable::Tuple(a), Variable::Tuple(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Variable {}

impl Hash for Variable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Variable::Int(i) => {
                0u8.hash(state);
                i.hash(state);
            }
            Variable::Float(f) => {
                1u8.hash(state);
                f.to_bits().hash(state);
            }
            Variable::Str(s) => {
                2u8.hash(state);
                s.hash(state);
            }
            Variable::Tuple(items) => {
                3u8.hash(state);
                items.hash(state);
            }
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::Int(i) => write!(f, "{i}"),
            Variable::Float(x) => write!(f, "{x}"),
            Variable::Str(s) => write!(f, "{s}"),
            Variable::Tuple(items) => {
                write!(f, "(")?;
                for (k, item) in items.iter().enumerate() {
                    if k > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<&str> for Variable {
    fn from(s: &str) -> Self {
        Variable::Str(s.to_string())
    }
}

impl From<String> for Variable {
    fn from(s: String) -> Self {
        Variable::Str(s)
    }
}

impl From<i64> for Variable {
    fn from(i: i64) -> Self {
        Variable::Int(i)
    }
}

impl From<f64> for Variable {
    fn from(x: f64) -> Self {
        Variable::Float(x)
    }
}

impl From<Vec<Variable>> for Variable {
    fn from(items: Vec<Variable>) -> Self {
        Variable::Tuple(items)
    }
}

impl Variable {
    /// Whether this label has a JSON encoding.
    ///
    /// False exactly when the label is, or contains, a non-finite float.
    /// Every path that admits a label into a model rejects such labels
    /// with `UnserializableLabel`, so an encoded archive never holds one.
    pub fn is_serializable(&self) -> bool {
        match self {
            Variable::Float(x) => x.is_finite(),
            Variable::Tuple(items) => items.iter().all(Variable::is_serializable),
            _ => true,
        }
    }

    /// Converts this label to a JSON-safe value.
    ///
    /// Tuples become arrays. Non-finite floats have no JSON encoding and
    /// become `null`; see [`Self::is_serializable`].
    pub fn to_json(&self) -> Value {
        match self {
            Variable::Int(i) => Value::from(*i),
            Variable::Float(x) => serde_json::Number::from_f64(*x)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Variable::Str(s) => Value::from(s.clone()),
            Variable::Tuple(items) => Value::Array(items.iter().map(Variable::to_json).collect()),
        }
    }

    /// Recovers a label from its JSON-safe value, or `None` for a value
    /// that no label serializes to.
    ///
    /// Arrays come back as tuples; integral numbers come back as `Int`,
    /// other numbers as `Float`.
    pub fn from_json(value: &Value) -> Option<Variable> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Variable::Int(i))
                } else {
                    n.as_f64().map(Variable::Float)
                }
            }
            Value::String(s) => Some(Variable::Str(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(Variable::from_json)
                .collect::<Option<Vec<_>>>()
                .map(Variable::Tuple),
            _ => None,
        }
    }
}

/// The domain of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vartype {
    /// {-1, +1}.
    Spin,
    /// {0, 1}.
    Binary,
    /// Bounded integer.
    Integer,
    /// Bounded real.
    Real,
    /// Administrative tag for one-hot variable groups. Only the registry
    /// uses this; expressions never carry it.
    Discrete,
}

impl Vartype {
    /// Whether bounds are meaningful for this vartype.
    ///
    /// Bounds passed alongside `Spin`/`Binary` are silently dropped.
    pub fn accepts_bounds(&self) -> bool {
        !matches!(self, Vartype::Spin | Vartype::Binary)
    }
}

/// Insertion-ordered set of unique labels with a vartype and optional
/// bounds per label.
///
/// Insertion order is the canonical order for all iteration. A label's
/// vartype is immutable once added; a bound, once fixed, can only be
/// re-supplied with the same value.
///
/// # Examples
///
/// ```
/// use cqmodel::{VariableRegistry, Vartype};
///
/// let mut vars = VariableRegistry::new();
/// vars.register("i".into(), Vartype::Integer, Some(0.0), Some(10.0)).unwrap();
/// vars.register("i".into(), Vartype::Integer, Some(0.0), None).unwrap(); // same bound: no-op
/// assert!(vars.register("i".into(), Vartype::Binary, None, None).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct VariableRegistry {
    labels: Vec<Variable>,
    index: HashMap<Variable, usize>,
    vartypes: Vec<Vartype>,
    lower: HashMap<Variable, f64>,
    upper: HashMap<Variable, f64>,
}

impl VariableRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks whether `register` with the same arguments would succeed,
    /// without mutating anything.
    ///
    /// Callers registering a batch of variables run this over the whole
    /// batch first so that a conflict partway through leaves no partial
    /// state behind.
    pub fn validate(
        &self,
        label: &Variable,
        vartype: Vartype,
        lower: Option<f64>,
        upper: Option<f64>,
    ) -> Result<()> {
        if !label.is_serializable() {
            return Err(ModelError::UnserializableLabel(label.clone()));
        }
        let Some(&i) = self.index.get(label) else {
            return Ok(());
        };
        if self.vartypes[i] != vartype {
            return Err(ModelError::TypeConflict(label.clone()));
        }
        if vartype.accepts_bounds() {
            if let (Some(new), Some(&old)) = (lower, self.lower.get(label)) {
                if new != old {
                    return Err(ModelError::BoundConflict(label.clone()));
                }
            }
            if let (Some(new), Some(&old)) = (upper, self.upper.get(label)) {
                if new != old {
                    return Err(ModelError::BoundConflict(label.clone()));
                }
            }
        }
        Ok(())
    }

    /// Adds a label, or checks a re-add for consistency.
    ///
    /// A new label is appended at the next insertion index. An existing
    /// label must carry the same vartype; a bound may be supplied where
    /// none was fixed before, but a differing bound fails. Bounds are
    /// ignored entirely for `Spin`/`Binary`.
    pub fn register(
        &mut self,
        label: Variable,
        vartype: Vartype,
        lower: Option<f64>,
        upper: Option<f64>,
    ) -> Result<()> {
        self.validate(&label, vartype, lower, upper)?;

        if !self.index.contains_key(&label) {
            self.index.insert(label.clone(), self.labels.len());
            self.labels.push(label.clone());
            self.vartypes.push(vartype);
        }
        if vartype.accepts_bounds() {
            if let Some(lb) = lower {
                self.lower.entry(label.clone()).or_insert(lb);
            }
            if let Some(ub) = upper {
                self.upper.entry(label).or_insert(ub);
            }
        }
        Ok(())
    }

    /// The vartype of a label.
    pub fn vartype(&self, label: &Variable) -> Result<Vartype> {
        self.index
            .get(label)
            .map(|&i| self.vartypes[i])
            .ok_or_else(|| ModelError::UnknownVariable(label.clone()))
    }

    /// The (lower, upper) bounds of a label. Unset bounds are `None`.
    pub fn bounds(&self, label: &Variable) -> Result<(Option<f64>, Option<f64>)> {
        if !self.index.contains_key(label) {
            return Err(ModelError::UnknownVariable(label.clone()));
        }
        Ok((
            self.lower.get(label).copied(),
            self.upper.get(label).copied(),
        ))
    }

    /// Whether the label is registered.
    pub fn contains(&self, label: &Variable) -> bool {
        self.index.contains_key(label)
    }

    /// Number of registered labels.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// The insertion index of a label, if registered.
    pub fn index_of(&self, label: &Variable) -> Option<usize> {
        self.index.get(label).copied()
    }

    /// Iterates labels in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.labels.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_register_and_lookup() {
        let mut vars = VariableRegistry::new();
        vars.register("x".into(), Vartype::Binary, None, None).unwrap();
        vars.register(Variable::Int(7), Vartype::Integer, Some(0.0), Some(5.0))
            .unwrap();

        assert_eq!(vars.len(), 2);
        assert!(vars.contains(&"x".into()));
        assert_eq!(vars.vartype(&"x".into()).unwrap(), Vartype::Binary);
        assert_eq!(
            vars.bounds(&Variable::Int(7)).unwrap(),
            (Some(0.0), Some(5.0))
        );
    }

    #[test]
    fn test_reregister_same_is_noop() {
        let mut vars = VariableRegistry::new();
        vars.register("x".into(), Vartype::Binary, None, None).unwrap();
        vars.register("x".into(), Vartype::Binary, None, None).unwrap();
        assert_eq!(vars.len(), 1);
    }

    #[test]
    fn test_vartype_conflict_either_order() {
        for (first, second) in [
            (Vartype::Binary, Vartype::Spin),
            (Vartype::Spin, Vartype::Binary),
            (Vartype::Integer, Vartype::Real),
        ] {
            let mut vars = VariableRegistry::new();
            vars.register("x".into(), first, None, None).unwrap();
            let err = vars.register("x".into(), second, None, None).unwrap_err();
            assert!(matches!(err, ModelError::TypeConflict(_)));
            assert_eq!(vars.vartype(&"x".into()).unwrap(), first);
        }
    }

    #[test]
    fn test_bound_merge() {
        let mut vars = VariableRegistry::new();
        // No bound fixed yet: supplying one later is accepted.
        vars.register("i".into(), Vartype::Integer, None, None).unwrap();
        vars.register("i".into(), Vartype::Integer, Some(-2.0), None)
            .unwrap();
        assert_eq!(vars.bounds(&"i".into()).unwrap(), (Some(-2.0), None));

        // Same bound again: no-op.
        vars.register("i".into(), Vartype::Integer, Some(-2.0), Some(9.0))
            .unwrap();
        assert_eq!(vars.bounds(&"i".into()).unwrap(), (Some(-2.0), Some(9.0)));

        // Differing bound: rejected, stored bounds untouched.
        let err = vars
            .register("i".into(), Vartype::Integer, Some(0.0), None)
            .unwrap_err();
        assert!(matches!(err, ModelError::BoundConflict(_)));
        assert_eq!(vars.bounds(&"i".into()).unwrap(), (Some(-2.0), Some(9.0)));
    }

    #[test]
    fn test_bounds_ignored_for_binary_and_spin() {
        let mut vars = VariableRegistry::new();
        vars.register("b".into(), Vartype::Binary, Some(0.0), Some(1.0))
            .unwrap();
        vars.register("s".into(), Vartype::Spin, Some(-1.0), Some(1.0))
            .unwrap();
        assert_eq!(vars.bounds(&"b".into()).unwrap(), (None, None));
        assert_eq!(vars.bounds(&"s".into()).unwrap(), (None, None));
        // A differing "bound" on a binary variable is not a conflict.
        vars.register("b".into(), Vartype::Binary, Some(3.0), None)
            .unwrap();
    }

    #[test]
    fn test_unknown_lookups() {
        let vars = VariableRegistry::new();
        assert!(matches!(
            vars.vartype(&"x".into()),
            Err(ModelError::UnknownVariable(_))
        ));
        assert!(matches!(
            vars.bounds(&"x".into()),
            Err(ModelError::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_insertion_order() {
        let mut vars = VariableRegistry::new();
        for label in ["c", "a", "b"] {
            vars.register(label.into(), Vartype::Binary, None, None).unwrap();
        }
        let order: Vec<_> = vars.iter().cloned().collect();
        assert_eq!(order, vec!["c".into(), "a".into(), "b".into()]);
        assert_eq!(vars.index_of(&"a".into()), Some(1));
    }

    #[test]
    fn test_tuple_labels() {
        let mut vars = VariableRegistry::new();
        let label = Variable::Tuple(vec![Variable::Str("x".into()), Variable::Int(0)]);
        vars.register(label.clone(), Vartype::Real, None, None).unwrap();
        assert!(vars.contains(&label));
        assert_eq!(label.to_string(), "(x, 0)");
    }

    #[test]
    fn test_non_finite_float_labels_rejected() {
        assert!(Variable::Float(2.5).is_serializable());
        assert!(!Variable::Float(f64::NAN).is_serializable());
        assert!(!Variable::Tuple(vec!["x".into(), f64::INFINITY.into()]).is_serializable());

        let mut vars = VariableRegistry::new();
        let err = vars
            .register(f64::NAN.into(), Vartype::Real, None, None)
            .unwrap_err();
        assert!(matches!(err, ModelError::UnserializableLabel(_)));
        assert!(vars.is_empty());
    }

    #[test]
    fn test_json_number_forms() {
        // Integral numbers come back as Int, others as Float.
        let i = Variable::from_json(&serde_json::json!(3)).unwrap();
        assert_eq!(i, Variable::Int(3));
        let f = Variable::from_json(&serde_json::json!(1.5)).unwrap();
        assert_eq!(f, Variable::Float(1.5));
        assert!(Variable::from_json(&Value::Null).is_none());
    }

    fn label_strategy() -> impl Strategy<Value = Variable> {
        let leaf = prop_oneof![
            any::<i64>().prop_map(Variable::Int),
            "[a-z0-9_]{1,8}".prop_map(Variable::Str),
            (-1e9f64..1e9).prop_map(Variable::Float),
        ];
        leaf.prop_recursive(2, 8, 4, |inner| {
            prop::collection::vec(inner, 1..4).prop_map(Variable::Tuple)
        })
    }

    proptest! {
        #[test]
        fn test_label_json_round_trip(label in label_strategy()) {
            let json = label.to_json();
            let back = Variable::from_json(&json).unwrap();
            prop_assert_eq!(back, label);
        }
    }
}
