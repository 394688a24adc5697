//! The constrained quadratic model.
//!
//! Holds one objective expression plus an insertion-ordered store of
//! labeled comparison constraints, a typed variable registry shared by
//! all of them, and the discrete (one-hot) group bookkeeping.

use crate::constraint::{Comparison, Sense};
use crate::error::{ModelError, Result};
use crate::expr::QuadraticExpression;
use crate::variables::{Variable, VariableRegistry, Vartype};
use std::collections::{HashMap, HashSet};

/// A constrained quadratic optimization model.
///
/// The model is the bookkeeping unit consumed by solvers: minimize the
/// objective subject to every stored constraint. Variables enter the
/// registry as a side effect of setting the objective or adding a
/// constraint, and every appearance of a variable must agree on its
/// vartype and bounds.
///
/// All ingestion methods take their expression by value: the model owns
/// stored expressions exclusively, and a caller that wants to keep one
/// clones it before handing it over.
///
/// # Examples
///
/// ```
/// use cqmodel::{ConstrainedModel, QuadraticExpression, Sense};
///
/// let mut model = ConstrainedModel::new();
///
/// let mut objective = QuadraticExpression::binary();
/// objective.add_variable("x0".into(), None, None).unwrap();
/// objective.add_linear(&"x0".into(), 1.0).unwrap();
/// model.set_objective(objective).unwrap();
///
/// let label = model
///     .add_discrete(["a".into(), "b".into(), "c".into()], None)
///     .unwrap();
/// assert!(model.is_discrete(&label));
/// assert_eq!(model.num_constraints(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConstrainedModel {
    objective: Option<QuadraticExpression>,
    order: Vec<Variable>,
    constraints: HashMap<Variable, Comparison>,
    variables: VariableRegistry,
    discrete: HashSet<Variable>,
    claimed: HashSet<Variable>,
}

impl ConstrainedModel {
    /// Creates an empty model: no objective, no constraints, empty
    /// registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The objective expression, if one was ever set.
    pub fn objective(&self) -> Option<&QuadraticExpression> {
        self.objective.as_ref()
    }

    /// The variable registry over the objective and all constraints.
    pub fn variables(&self) -> &VariableRegistry {
        &self.variables
    }

    /// The vartype of a variable.
    pub fn vartype(&self, label: &Variable) -> Result<Vartype> {
        self.variables.vartype(label)
    }

    /// The stored constraint under a label.
    pub fn constraint(&self, label: &Variable) -> Option<&Comparison> {
        self.constraints.get(label)
    }

    /// Iterates `(label, constraint)` in insertion order.
    pub fn constraints(&self) -> impl Iterator<Item = (&Variable, &Comparison)> {
        self.order
            .iter()
            .filter_map(|label| self.constraints.get(label).map(|c| (label, c)))
    }

    /// Number of constraints.
    pub fn num_constraints(&self) -> usize {
        self.order.len()
    }

    /// Whether a label names a discrete (one-hot) group constraint.
    pub fn is_discrete(&self, label: &Variable) -> bool {
        self.discrete.contains(label)
    }

    /// Iterates the labels of all discrete group constraints.
    pub fn discrete_labels(&self) -> impl Iterator<Item = &Variable> {
        self.discrete.iter()
    }

    /// Registers every variable of `expr` into the registry, with the
    /// vartype and bounds declared on the expression.
    ///
    /// Validates the whole batch before committing anything, so a
    /// conflict partway through leaves the registry untouched.
    fn register_expression(&mut self, expr: &QuadraticExpression) -> Result<()> {
        for v in expr.variables() {
            let vartype = expr.vartype(v)?;
            let (lower, upper) = expr.bounds(v)?;
            self.variables.validate(v, vartype, lower, upper)?;
        }
        for v in expr.variables() {
            let vartype = expr.vartype(v)?;
            let (lower, upper) = expr.bounds(v)?;
            self.variables.register(v.clone(), vartype, lower, upper)?;
        }
        Ok(())
    }

    /// Sets the objective, replacing any previous one.
    ///
    /// Registers the expression's variables first; on conflict the
    /// previous objective stays in place.
    pub fn set_objective(&mut self, expr: QuadraticExpression) -> Result<()> {
        self.register_expression(&expr)?;
        self.objective = Some(expr);
        Ok(())
    }

    /// Adds a variable directly. Re-adding with the same vartype is a
    /// no-op; a different vartype fails with `TypeConflict`.
    pub fn add_variable(&mut self, label: Variable, vartype: Vartype) -> Result<()> {
        self.variables.register(label, vartype, None, None)
    }

    /// Adds a constraint `expr <sense> rhs` and returns its label.
    ///
    /// Every variable of `expr` is registered. A supplied label that
    /// already exists fails with `DuplicateLabel`, and one containing a
    /// non-finite float with `UnserializableLabel`; with no label a short
    /// hex token is generated and collision-checked against the store.
    pub fn add_constraint_from_expression(
        &mut self,
        expr: QuadraticExpression,
        sense: Sense,
        rhs: f64,
        label: Option<Variable>,
    ) -> Result<Variable> {
        let label = match label {
            Some(label) => {
                if !label.is_serializable() {
                    return Err(ModelError::UnserializableLabel(label));
                }
                if self.constraints.contains_key(&label) {
                    return Err(ModelError::DuplicateLabel(label));
                }
                label
            }
            None => self.generate_label(),
        };

        self.register_expression(&expr)?;

        self.order.push(label.clone());
        self.constraints.insert(
            label.clone(),
            Comparison {
                lhs: expr,
                sense,
                rhs,
            },
        );
        Ok(label)
    }

    /// Adds a constraint from a comparison value.
    pub fn add_constraint_from_comparison(
        &mut self,
        comparison: Comparison,
        label: Option<Variable>,
    ) -> Result<Variable> {
        let Comparison { lhs, sense, rhs } = comparison;
        self.add_constraint_from_expression(lhs, sense, rhs, label)
    }

    /// Adds a constraint built from raw terms.
    ///
    /// Each term is `(variables, bias)`: zero variables add to the
    /// constant offset, one is a linear term, two is a quadratic term,
    /// and more fail with `UnsupportedTermArity`. Every referenced
    /// variable must already be registered; its vartype and bounds are
    /// looked up, not supplied.
    pub fn add_constraint_from_terms<I>(
        &mut self,
        terms: I,
        sense: Sense,
        rhs: f64,
        label: Option<Variable>,
    ) -> Result<Variable>
    where
        I: IntoIterator<Item = (Vec<Variable>, f64)>,
    {
        let mut expr = QuadraticExpression::general();
        for (vars, bias) in terms {
            match vars.len() {
                0 => expr.add_offset(bias),
                1 => {
                    let v = &vars[0];
                    self.declare_known(&mut expr, v)?;
                    expr.add_linear(v, bias)?;
                }
                2 => {
                    let (u, v) = (&vars[0], &vars[1]);
                    self.declare_known(&mut expr, u)?;
                    self.declare_known(&mut expr, v)?;
                    expr.add_quadratic(u, v, bias)?;
                }
                _ => return Err(ModelError::UnsupportedTermArity),
            }
        }
        self.add_constraint_from_expression(expr, sense, rhs, label)
    }

    /// Copies an already-registered variable's vartype and bounds into a
    /// term-built expression.
    fn declare_known(&self, expr: &mut QuadraticExpression, v: &Variable) -> Result<()> {
        let vartype = self.variables.vartype(v)?;
        let (lower, upper) = self.variables.bounds(v)?;
        expr.add_typed_variable(v.clone(), vartype, lower, upper)?;
        Ok(())
    }

    /// Adds a set of BINARY variables as a disjoint one-hot group:
    /// exactly one of them is 1.
    ///
    /// The group becomes an ordinary equality constraint (unit linear
    /// bias on each variable, `== 1`) whose label is additionally marked
    /// discrete, so a solver that does not understand discrete groups
    /// degrades to a plain equality constraint.
    ///
    /// Fails with `DiscreteConflict` if any variable already belongs to
    /// another group, and with `TypeConflict` if a pre-existing variable
    /// is not BINARY. The call is atomic: on failure nothing is recorded.
    /// Brand-new variables are registered as BINARY with no bounds.
    pub fn add_discrete<I>(&mut self, variables: I, label: Option<Variable>) -> Result<Variable>
    where
        I: IntoIterator<Item = Variable>,
    {
        let vars: Vec<Variable> = variables.into_iter().collect();

        if let Some(label) = &label {
            if self.constraints.contains_key(label) {
                return Err(ModelError::DuplicateLabel(label.clone()));
            }
        }
        for v in &vars {
            if self.claimed.contains(v) {
                return Err(ModelError::DiscreteConflict(v.clone()));
            }
            if self.variables.contains(v) && self.variables.vartype(v)? != Vartype::Binary {
                return Err(ModelError::TypeConflict(v.clone()));
            }
        }

        let mut expr = QuadraticExpression::binary();
        for v in &vars {
            expr.add_variable(v.clone(), None, None)?;
            expr.add_linear(v, 1.0)?;
        }

        let label = self.add_constraint_from_expression(expr, Sense::Eq, 1.0, label)?;
        self.discrete.insert(label.clone());
        self.claimed.extend(vars);
        Ok(label)
    }

    /// Marks an existing constraint as a discrete group without one-hot
    /// validation, claiming its variables.
    ///
    /// Used by the archive decoder: a decoded discrete constraint was
    /// validated when it was first added and written.
    pub(crate) fn mark_discrete(&mut self, label: &Variable) {
        if let Some(comparison) = self.constraints.get(label) {
            let vars: Vec<Variable> = comparison.lhs.variables().cloned().collect();
            self.claimed.extend(vars);
            self.discrete.insert(label.clone());
        }
    }

    /// Total linear plus quadratic term count over the objective and all
    /// constraint left-hand sides.
    pub fn num_biases(&self) -> usize {
        let expr_biases =
            |expr: &QuadraticExpression| expr.num_variables() + expr.num_interactions();
        let mut count = self.objective.as_ref().map(expr_biases).unwrap_or(0);
        count += self
            .constraints
            .values()
            .map(|c| expr_biases(&c.lhs))
            .sum::<usize>();
        count
    }

    /// Total count, over all constraints, of variables with at least one
    /// quadratic interaction in that constraint.
    ///
    /// A variable is counted once per constraint it appears quadratically
    /// in; there is no global deduplication.
    pub fn num_quadratic_variables(&self) -> usize {
        let mut count = 0;
        for comparison in self.constraints.values() {
            let mut seen: HashSet<&Variable> = HashSet::new();
            for (u, v, _) in comparison.lhs.iter_quadratic() {
                seen.insert(u);
                seen.insert(v);
            }
            count += seen.len();
        }
        count
    }

    /// Generates a constraint label not yet in the store.
    ///
    /// Short random hex tokens, widened after a collision streak; 6 hex
    /// chars give 16.7M possibilities per width, so widening is
    /// effectively unreachable.
    fn generate_label(&self) -> Variable {
        for width in (6..=14usize).step_by(2) {
            let mask = (1u64 << (4 * width)) - 1;
            for _ in 0..16 {
                let token = rand::random::<u64>() & mask;
                let label = Variable::Str(format!("{token:0width$x}"));
                if !self.constraints.contains_key(&label) {
                    return label;
                }
            }
        }
        let mut n = self.order.len();
        loop {
            let label = Variable::Str(format!("c{n}"));
            if !self.constraints.contains_key(&label) {
                return label;
            }
            n += 1;
        }
    }
}
