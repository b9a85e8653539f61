//! Discrete factors: the algebraic unit of variable elimination.
//!
//! A `Factor` maps every joint assignment of its scope to a non-negative value. Values are
//! kept in an `ndarray::ArrayD` with one axis per scope variable, in scope order. Every
//! operation returns a fresh `Factor`; nothing is mutated in place.

use log::trace;
use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};
use std::collections::HashMap;

use crate::common::errors::FactorError;
use crate::model::variable::Variable;

#[derive(Debug, Clone, PartialEq)]
pub struct Factor {
    scope: Vec<Variable>,
    values: ArrayD<f64>,
}

fn shape_of(scope: &[Variable]) -> Vec<usize> {
    scope.iter().map(Variable::cardinality).collect()
}

fn check_distinct(scope: &[Variable]) -> Result<(), FactorError> {
    for (i, var) in scope.iter().enumerate() {
        if scope[..i].iter().any(|v| v.name() == var.name()) {
            return Err(FactorError::DuplicateVariable {
                variable: var.name().to_string(),
            });
        }
    }
    Ok(())
}

/// Number of entries of the factor that the product of `factors` would produce.
pub fn joint_size<'a, I>(factors: I) -> usize
where
    I: IntoIterator<Item = &'a Factor>,
{
    let mut seen: Vec<&Variable> = Vec::new();
    for factor in factors {
        for var in &factor.scope {
            if !seen.iter().any(|v| v.name() == var.name()) {
                seen.push(var);
            }
        }
    }
    seen.iter()
        .fold(1usize, |acc, v| acc.saturating_mul(v.cardinality()))
}

impl Factor {
    /// Build a factor from values laid out row-major over `scope` (last variable fastest).
    pub fn new(scope: Vec<Variable>, values: Vec<f64>) -> Result<Self, FactorError> {
        check_distinct(&scope)?;
        let shape = shape_of(&scope);
        let expected = shape
            .iter()
            .try_fold(1usize, |acc, &n| acc.checked_mul(n))
            .ok_or(FactorError::ShapeMismatch {
                expected: usize::MAX,
                found: values.len(),
            })?;
        if values.len() != expected {
            return Err(FactorError::ShapeMismatch {
                expected,
                found: values.len(),
            });
        }
        if let Some(&value) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(FactorError::InvalidValue { value });
        }
        let values = ArrayD::from_shape_vec(IxDyn(&shape), values).map_err(|_| {
            FactorError::ShapeMismatch {
                expected,
                found: expected,
            }
        })?;
        Ok(Factor { scope, values })
    }

    /// A factor with empty scope.
    pub fn scalar(value: f64) -> Self {
        Factor {
            scope: Vec::new(),
            values: ArrayD::from_elem(IxDyn(&[]), value),
        }
    }

    pub fn scope(&self) -> &[Variable] {
        &self.scope
    }

    pub fn variable_names(&self) -> Vec<&str> {
        self.scope.iter().map(Variable::name).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.axis_of(name).is_some()
    }

    fn axis_of(&self, name: &str) -> Option<usize> {
        self.scope.iter().position(|v| v.name() == name)
    }

    /// Number of table entries.
    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn is_scalar(&self) -> bool {
        self.scope.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.values.sum()
    }

    /// Values in row-major order over the scope.
    pub fn to_vec(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }

    /// Value at an assignment given as one state index per scope variable, in scope order.
    pub fn value(&self, assignment: &[usize]) -> Option<f64> {
        if assignment.len() != self.scope.len() {
            return None;
        }
        self.values.get(assignment).copied()
    }

    /// Value at an assignment keyed by variable name. Extra entries are ignored.
    pub fn value_of(&self, assignment: &HashMap<String, usize>) -> Option<f64> {
        let index = self
            .scope
            .iter()
            .map(|v| assignment.get(v.name()).copied())
            .collect::<Option<Vec<usize>>>()?;
        self.value(&index)
    }

    /// The view of this factor's table laid out over `target`, which must contain every
    /// variable of this scope. Variables absent here become length-1 axes.
    fn aligned_to(&self, target: &[Variable]) -> ArrayViewD<'_, f64> {
        let position = |var: &Variable| {
            target
                .iter()
                .position(|t| t.name() == var.name())
                .unwrap_or(usize::MAX)
        };
        let mut order: Vec<usize> = (0..self.scope.len()).collect();
        order.sort_by_key(|&axis| position(&self.scope[axis]));

        let mut view = self.values.view().permuted_axes(IxDyn(&order));
        for (axis, var) in target.iter().enumerate() {
            if !self.contains(var.name()) {
                view = view.insert_axis(Axis(axis));
            }
        }
        view
    }

    /// Factor product. The result scope is this scope followed by the variables of `other`
    /// that are not already present.
    pub fn product(&self, other: &Factor) -> Result<Factor, FactorError> {
        let mut scope = self.scope.clone();
        for var in &other.scope {
            match scope.iter().find(|v| v.name() == var.name()) {
                Some(existing) if existing.states() != var.states() => {
                    return Err(FactorError::ScopeMismatch {
                        variable: var.name().to_string(),
                    });
                }
                Some(_) => {}
                None => scope.push(var.clone()),
            }
        }

        let dims = shape_of(&scope);
        let expected: usize = dims.iter().product();
        let shape = IxDyn(&dims);
        let lhs = self.aligned_to(&scope);
        let rhs = other.aligned_to(&scope);
        let (Some(lhs), Some(rhs)) = (lhs.broadcast(shape.clone()), rhs.broadcast(shape)) else {
            return Err(FactorError::ShapeMismatch {
                expected,
                found: self.size().max(other.size()),
            });
        };
        let values = &lhs * &rhs;
        trace!(
            "product {:?} x {:?} -> {} entries",
            self.variable_names(),
            other.variable_names(),
            values.len()
        );
        Ok(Factor { scope, values })
    }

    /// Sum out `names`. Every name must be in scope.
    pub fn marginalize(&self, names: &[&str]) -> Result<Factor, FactorError> {
        let mut axes = Vec::with_capacity(names.len());
        for name in names {
            let axis = self
                .axis_of(name)
                .ok_or_else(|| FactorError::InvalidElimination {
                    variable: name.to_string(),
                })?;
            if !axes.contains(&axis) {
                axes.push(axis);
            }
        }
        // Highest axis first so the remaining indices stay valid.
        axes.sort_unstable_by(|a, b| b.cmp(a));

        let mut values = self.values.clone();
        let mut scope = self.scope.clone();
        for axis in axes {
            values = values.sum_axis(Axis(axis));
            scope.remove(axis);
        }
        Ok(Factor { scope, values })
    }

    /// Fix `name` to the state at index `state`. A variable outside the scope leaves the
    /// factor unchanged.
    pub fn reduce(&self, name: &str, state: usize) -> Result<Factor, FactorError> {
        let Some(axis) = self.axis_of(name) else {
            return Ok(self.clone());
        };
        let cardinality = self.scope[axis].cardinality();
        if state >= cardinality {
            return Err(FactorError::InvalidState {
                variable: name.to_string(),
                state,
                cardinality,
            });
        }
        let mut scope = self.scope.clone();
        scope.remove(axis);
        let values = self.values.index_axis(Axis(axis), state).to_owned();
        Ok(Factor { scope, values })
    }

    /// Divide every value by the total. A total that is not strictly positive is degenerate.
    pub fn normalize(&self) -> Result<Factor, FactorError> {
        let sum = self.sum();
        if !(sum > 0.0 && sum.is_finite()) {
            return Err(FactorError::Degenerate { sum });
        }
        Ok(Factor {
            scope: self.scope.clone(),
            values: self.values.mapv(|v| v / sum),
        })
    }

    /// Reorder the scope. `order` must name every scope variable exactly once.
    pub fn permute(&self, order: &[&str]) -> Result<Factor, FactorError> {
        if order.len() != self.scope.len() {
            return Err(FactorError::ShapeMismatch {
                expected: self.scope.len(),
                found: order.len(),
            });
        }
        let mut axes = Vec::with_capacity(order.len());
        for name in order {
            let axis = self
                .axis_of(name)
                .filter(|axis| !axes.contains(axis))
                .ok_or_else(|| FactorError::ScopeMismatch {
                    variable: name.to_string(),
                })?;
            axes.push(axis);
        }
        let scope = axes.iter().map(|&a| self.scope[a].clone()).collect();
        let values = self
            .values
            .view()
            .permuted_axes(IxDyn(&axes))
            .as_standard_layout()
            .into_owned();
        Ok(Factor { scope, values })
    }

    /// The assignment with the largest value, ties going to the first in row-major order.
    pub fn argmax(&self) -> Option<(Vec<usize>, f64)> {
        let shape = shape_of(&self.scope);
        let mut best: Option<(usize, f64)> = None;
        for (flat, &value) in self.values.iter().enumerate() {
            if best.is_none_or(|(_, current)| value > current) {
                best = Some((flat, value));
            }
        }
        best.map(|(flat, value)| (unravel(flat, &shape), value))
    }
}

/// Row-major flat index to per-axis indices.
pub(crate) fn unravel(mut flat: usize, shape: &[usize]) -> Vec<usize> {
    let mut index = vec![0; shape.len()];
    for (axis, &dim) in shape.iter().enumerate().rev() {
        index[axis] = flat % dim;
        flat /= dim;
    }
    index
}
