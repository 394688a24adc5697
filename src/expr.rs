//! Quadratic expression values.
//!
//! An expression is a constant offset plus linear terms (variable × bias)
//! plus quadratic terms (variable pair × bias). Two kinds exist:
//!
//! - [`ExpressionKind::BinaryQuadratic`]: every variable shares one
//!   vartype (`Spin` or `Binary`) and carries no bounds.
//! - [`ExpressionKind::Quadratic`]: each variable carries its own vartype
//!   and optional bounds.
//!
//! The kind is a closed tag rather than separate types; the constraint
//! store and the codec handle both through the same surface.

use crate::error::{ModelError, Result};
use crate::variables::{Variable, Vartype};
use std::collections::HashMap;

/// The kind of a [`QuadraticExpression`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionKind {
    /// Uniform vartype over all variables; no bounds.
    BinaryQuadratic(Vartype),
    /// Per-variable vartypes and bounds.
    Quadratic,
}

/// A quadratic expression over labeled variables.
///
/// Variables are kept in insertion order. Every variable holds a linear
/// bias (0.0 until one is added), so the linear term count equals the
/// variable count. Quadratic terms are keyed by unordered variable pair
/// and accumulate on repeated addition.
///
/// # Examples
///
/// ```
/// use cqmodel::QuadraticExpression;
///
/// let mut expr = QuadraticExpression::binary();
/// expr.add_variable("x".into(), None, None).unwrap();
/// expr.add_variable("y".into(), None, None).unwrap();
/// expr.add_linear(&"x".into(), 1.0).unwrap();
/// expr.add_quadratic(&"x".into(), &"y".into(), -2.0).unwrap();
/// assert_eq!(expr.num_variables(), 2);
/// assert_eq!(expr.degree(&"y".into()).unwrap(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct QuadraticExpression {
    kind: ExpressionKind,
    labels: Vec<Variable>,
    index: HashMap<Variable, usize>,
    vartypes: Vec<Vartype>,
    lower: Vec<Option<f64>>,
    upper: Vec<Option<f64>>,
    linear: Vec<f64>,
    quadratic: Vec<(usize, usize, f64)>,
    qindex: HashMap<(usize, usize), usize>,
    offset: f64,
}

impl QuadraticExpression {
    fn with_kind(kind: ExpressionKind) -> Self {
        Self {
            kind,
            labels: Vec::new(),
            index: HashMap::new(),
            vartypes: Vec::new(),
            lower: Vec::new(),
            upper: Vec::new(),
            linear: Vec::new(),
            quadratic: Vec::new(),
            qindex: HashMap::new(),
            offset: 0.0,
        }
    }

    /// An empty binary-quadratic expression over BINARY variables.
    pub fn binary() -> Self {
        Self::with_kind(ExpressionKind::BinaryQuadratic(Vartype::Binary))
    }

    /// An empty binary-quadratic expression over SPIN variables.
    pub fn spin() -> Self {
        Self::with_kind(ExpressionKind::BinaryQuadratic(Vartype::Spin))
    }

    /// An empty general quadratic expression (per-variable vartypes).
    pub fn general() -> Self {
        Self::with_kind(ExpressionKind::Quadratic)
    }

    /// The expression kind.
    pub fn kind(&self) -> ExpressionKind {
        self.kind
    }

    /// The vartype a variable of this expression would get when no
    /// per-variable vartype applies (binary-quadratic kind).
    fn uniform_vartype(&self) -> Option<Vartype> {
        match self.kind() {
            ExpressionKind::BinaryQuadratic(vartype) => Some(vartype),
            ExpressionKind::Quadratic => None,
        }
    }

    /// Adds a variable, or checks a re-add for consistency.
    ///
    /// For the binary-quadratic kind the vartype is fixed by the
    /// expression and bounds are dropped. For the quadratic kind the
    /// variable's vartype defaults to `Binary` when the label is plain
    /// (see [`Self::add_typed_variable`] to pick one).
    pub fn add_variable(
        &mut self,
        label: Variable,
        lower: Option<f64>,
        upper: Option<f64>,
    ) -> Result<usize> {
        let vartype = self.uniform_vartype().unwrap_or(Vartype::Binary);
        self.add_typed_variable(label, vartype, lower, upper)
    }

    /// Adds a variable with an explicit vartype.
    ///
    /// Re-adding an existing variable with a different vartype fails with
    /// `TypeConflict`; a differing already-fixed bound fails with
    /// `BoundConflict`. For the binary-quadratic kind the vartype must
    /// match the expression's uniform vartype. A label containing a
    /// non-finite float fails with `UnserializableLabel`.
    pub fn add_typed_variable(
        &mut self,
        label: Variable,
        vartype: Vartype,
        lower: Option<f64>,
        upper: Option<f64>,
    ) -> Result<usize> {
        if !label.is_serializable() {
            return Err(ModelError::UnserializableLabel(label));
        }
        let (vartype, lower, upper) = match self.uniform_vartype() {
            Some(uniform) => {
                if vartype != uniform {
                    return Err(ModelError::TypeConflict(label));
                }
                (uniform, None, None)
            }
            None => {
                if vartype.accepts_bounds() {
                    (vartype, lower, upper)
                } else {
                    (vartype, None, None)
                }
            }
        };

        if let Some(&i) = self.index.get(&label) {
            if self.vartypes[i] != vartype {
                return Err(ModelError::TypeConflict(label));
            }
            if let (Some(new), Some(old)) = (lower, self.lower[i]) {
                if new != old {
                    return Err(ModelError::BoundConflict(label));
                }
            }
            if let (Some(new), Some(old)) = (upper, self.upper[i]) {
                if new != old {
                    return Err(ModelError::BoundConflict(label));
                }
            }
            if self.lower[i].is_none() {
                self.lower[i] = lower;
            }
            if self.upper[i].is_none() {
                self.upper[i] = upper;
            }
            return Ok(i);
        }

        let i = self.labels.len();
        self.index.insert(label.clone(), i);
        self.labels.push(label);
        self.vartypes.push(vartype);
        self.lower.push(lower);
        self.upper.push(upper);
        self.linear.push(0.0);
        Ok(i)
    }

    /// Adds `bias` to the linear term of a variable already in the
    /// expression.
    pub fn add_linear(&mut self, label: &Variable, bias: f64) -> Result<()> {
        let i = self.index_of(label)?;
        self.linear[i] += bias;
        Ok(())
    }

    /// Adds `bias` to the quadratic term on the unordered pair `(u, v)`.
    ///
    /// Both variables must already be in the expression. Repeated
    /// addition on the same pair accumulates.
    pub fn add_quadratic(&mut self, u: &Variable, v: &Variable, bias: f64) -> Result<()> {
        let i = self.index_of(u)?;
        let j = self.index_of(v)?;
        let key = (i.min(j), i.max(j));
        match self.qindex.get(&key) {
            Some(&t) => self.quadratic[t].2 += bias,
            None => {
                self.qindex.insert(key, self.quadratic.len());
                self.quadratic.push((key.0, key.1, bias));
            }
        }
        Ok(())
    }

    /// Adds `value` to the constant offset.
    pub fn add_offset(&mut self, value: f64) {
        self.offset += value;
    }

    /// The constant offset.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Number of variables (and therefore of linear terms).
    pub fn num_variables(&self) -> usize {
        self.labels.len()
    }

    /// Number of quadratic terms.
    pub fn num_interactions(&self) -> usize {
        self.quadratic.len()
    }

    /// Whether the expression has no variables and a zero offset.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() && self.offset == 0.0
    }

    fn index_of(&self, label: &Variable) -> Result<usize> {
        self.index
            .get(label)
            .copied()
            .ok_or_else(|| ModelError::UnknownVariable(label.clone()))
    }

    /// The linear bias of a variable.
    pub fn linear(&self, label: &Variable) -> Result<f64> {
        Ok(self.linear[self.index_of(label)?])
    }

    /// The quadratic bias on `(u, v)`, 0.0 when no term exists.
    pub fn quadratic(&self, u: &Variable, v: &Variable) -> Result<f64> {
        let i = self.index_of(u)?;
        let j = self.index_of(v)?;
        let key = (i.min(j), i.max(j));
        Ok(self
            .qindex
            .get(&key)
            .map(|&t| self.quadratic[t].2)
            .unwrap_or(0.0))
    }

    /// Number of quadratic terms a variable participates in.
    pub fn degree(&self, label: &Variable) -> Result<usize> {
        let i = self.index_of(label)?;
        Ok(self
            .quadratic
            .iter()
            .filter(|&&(u, v, _)| u == i || v == i)
            .count())
    }

    /// The vartype of a variable.
    pub fn vartype(&self, label: &Variable) -> Result<Vartype> {
        Ok(self.vartypes[self.index_of(label)?])
    }

    /// The (lower, upper) bounds of a variable.
    pub fn bounds(&self, label: &Variable) -> Result<(Option<f64>, Option<f64>)> {
        let i = self.index_of(label)?;
        Ok((self.lower[i], self.upper[i]))
    }

    /// Iterates variables in insertion order.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.labels.iter()
    }

    /// Iterates `(variable, linear bias)` in insertion order.
    pub fn iter_linear(&self) -> impl Iterator<Item = (&Variable, f64)> {
        self.labels.iter().zip(self.linear.iter().copied())
    }

    /// Iterates `(u, v, bias)` quadratic terms in insertion order.
    pub fn iter_quadratic(&self) -> impl Iterator<Item = (&Variable, &Variable, f64)> {
        self.quadratic
            .iter()
            .map(move |&(i, j, bias)| (&self.labels[i], &self.labels[j], bias))
    }

    /// Codec plumbing: per-variable rows `(label, vartype, lower, upper,
    /// linear)` in insertion order.
    pub(crate) fn rows(&self) -> impl Iterator<Item = (&Variable, Vartype, Option<f64>, Option<f64>, f64)> {
        (0..self.labels.len()).map(move |i| {
            (
                &self.labels[i],
                self.vartypes[i],
                self.lower[i],
                self.upper[i],
                self.linear[i],
            )
        })
    }

    /// Codec plumbing: quadratic terms as index triples.
    pub(crate) fn raw_quadratic(&self) -> &[(usize, usize, f64)] {
        &self.quadratic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_kind_uniform_vartype() {
        let mut expr = QuadraticExpression::binary();
        expr.add_variable("x".into(), None, None).unwrap();
        assert_eq!(expr.vartype(&"x".into()).unwrap(), Vartype::Binary);

        // Bounds are dropped for the binary-quadratic kind.
        expr.add_variable("y".into(), Some(0.0), Some(1.0)).unwrap();
        assert_eq!(expr.bounds(&"y".into()).unwrap(), (None, None));

        // A conflicting vartype is rejected.
        let err = expr
            .add_typed_variable("x".into(), Vartype::Spin, None, None)
            .unwrap_err();
        assert!(matches!(err, ModelError::TypeConflict(_)));
    }

    #[test]
    fn test_quadratic_kind_per_variable() {
        let mut expr = QuadraticExpression::general();
        expr.add_typed_variable("i".into(), Vartype::Integer, Some(0.0), Some(10.0))
            .unwrap();
        expr.add_typed_variable("b".into(), Vartype::Binary, None, None)
            .unwrap();
        assert_eq!(expr.vartype(&"i".into()).unwrap(), Vartype::Integer);
        assert_eq!(expr.bounds(&"i".into()).unwrap(), (Some(0.0), Some(10.0)));
        assert_eq!(expr.vartype(&"b".into()).unwrap(), Vartype::Binary);

        let err = expr
            .add_typed_variable("i".into(), Vartype::Integer, Some(1.0), None)
            .unwrap_err();
        assert!(matches!(err, ModelError::BoundConflict(_)));
    }

    #[test]
    fn test_linear_accumulates() {
        let mut expr = QuadraticExpression::binary();
        expr.add_variable("x".into(), None, None).unwrap();
        expr.add_linear(&"x".into(), 1.5).unwrap();
        expr.add_linear(&"x".into(), 0.5).unwrap();
        assert_eq!(expr.linear(&"x".into()).unwrap(), 2.0);
        assert_eq!(expr.num_variables(), 1);
    }

    #[test]
    fn test_quadratic_unordered_pair() {
        let mut expr = QuadraticExpression::binary();
        expr.add_variable("x".into(), None, None).unwrap();
        expr.add_variable("y".into(), None, None).unwrap();
        expr.add_quadratic(&"x".into(), &"y".into(), 2.0).unwrap();
        expr.add_quadratic(&"y".into(), &"x".into(), 3.0).unwrap();
        assert_eq!(expr.quadratic(&"x".into(), &"y".into()).unwrap(), 5.0);
        assert_eq!(expr.num_interactions(), 1);
    }

    #[test]
    fn test_degree() {
        let mut expr = QuadraticExpression::binary();
        for label in ["x", "y", "z"] {
            expr.add_variable(label.into(), None, None).unwrap();
        }
        expr.add_quadratic(&"x".into(), &"y".into(), 1.0).unwrap();
        expr.add_quadratic(&"x".into(), &"z".into(), 1.0).unwrap();
        assert_eq!(expr.degree(&"x".into()).unwrap(), 2);
        assert_eq!(expr.degree(&"y".into()).unwrap(), 1);
        assert_eq!(expr.quadratic(&"y".into(), &"z".into()).unwrap(), 0.0);
    }

    #[test]
    fn test_non_finite_float_label_rejected() {
        let mut expr = QuadraticExpression::binary();
        let err = expr
            .add_variable(f64::NEG_INFINITY.into(), None, None)
            .unwrap_err();
        assert!(matches!(err, ModelError::UnserializableLabel(_)));
        assert!(expr.is_empty());
    }

    #[test]
    fn test_unknown_variable() {
        let mut expr = QuadraticExpression::binary();
        let err = expr.add_linear(&"x".into(), 1.0).unwrap_err();
        assert!(matches!(err, ModelError::UnknownVariable(_)));
    }

    #[test]
    fn test_offset_and_empty() {
        let mut expr = QuadraticExpression::general();
        assert!(expr.is_empty());
        expr.add_offset(4.5);
        expr.add_offset(-1.5);
        assert_eq!(expr.offset(), 3.0);
        assert!(!expr.is_empty());
    }
}
