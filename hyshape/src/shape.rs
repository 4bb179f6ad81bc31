//! Symbolic shape tuples.
//!
//! A [`ShapeTuple`] is the annotation of a tensor's shape: an ordered sequence of symbolic
//! expressions. It is never mutated; [`ShapeTuple::concat`] and the transform resolvers
//! produce new values.
//!
//! Comparison against a concrete shape goes through [`shapes_equal`] (or [`check_shape`] when
//! an error is wanted), which evaluates every axis.
use smallvec::SmallVec;

use crate::dim::DimVar;
use crate::error::{ShapeError, ShapeResult};
use crate::expr::SymExpr;

#[derive(Clone, Debug, PartialEq)]
pub struct ShapeTuple(SmallVec<SymExpr, 6>);

impl ShapeTuple {
    pub fn new() -> Self {
        Self(SmallVec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, axis: usize) -> Option<&SymExpr> {
        self.0.get(axis)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SymExpr> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[SymExpr] {
        &self.0
    }

    /// `self` followed by `other`.
    pub fn concat(&self, other: &ShapeTuple) -> ShapeTuple {
        self.iter().chain(other.iter()).cloned().collect()
    }

    /// Axis holding an expression structurally equal to `expr`.
    pub fn index_of(&self, expr: &SymExpr) -> Option<usize> {
        self.iter().position(|e| e.structurally_eq(expr))
    }

    /// Axis named by `dim`.
    pub fn axis_of(&self, dim: &DimVar) -> Option<usize> {
        self.iter()
            .position(|e| e.as_var().is_some_and(|var| var == dim))
    }

    /// Concrete sizes, using the declared default size of every variable.
    pub fn evaluate(&self) -> ShapeResult<Vec<i64>> {
        self.iter().map(SymExpr::evaluate).collect()
    }

    /// Total number of elements, `1` for a scalar shape.
    pub fn numel(&self) -> ShapeResult<i64> {
        self.evaluate().map(|sizes| sizes.iter().product())
    }
}

impl Default for ShapeTuple {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Index<usize> for ShapeTuple {
    type Output = SymExpr;

    fn index(&self, axis: usize) -> &SymExpr {
        &self.0[axis]
    }
}

impl FromIterator<SymExpr> for ShapeTuple {
    fn from_iter<T: IntoIterator<Item = SymExpr>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl FromIterator<DimVar> for ShapeTuple {
    fn from_iter<T: IntoIterator<Item = DimVar>>(iter: T) -> Self {
        iter.into_iter().map(SymExpr::Var).collect()
    }
}

impl<'a> IntoIterator for &'a ShapeTuple {
    type Item = &'a SymExpr;
    type IntoIter = std::slice::Iter<'a, SymExpr>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl std::fmt::Display for ShapeTuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, e) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{e}")?;
        }
        if self.len() == 1 {
            write!(f, ",")?;
        }
        write!(f, ")")
    }
}

/// Whether `symbolic` describes `concrete`: same rank and every axis evaluates to the
/// corresponding size.
pub fn shapes_equal(symbolic: &ShapeTuple, concrete: &[i64]) -> bool {
    symbolic.len() == concrete.len()
        && symbolic
            .iter()
            .zip(concrete)
            .all(|(e, size)| e.evaluate().is_ok_and(|v| v == *size))
}

/// [`shapes_equal`] reporting a `ShapeMismatch` (or the evaluation failure) on mismatch.
pub fn check_shape(symbolic: &ShapeTuple, concrete: &[i64]) -> ShapeResult<()> {
    let mismatch = || ShapeError::ShapeMismatch {
        spec: symbolic.to_string(),
        expected: symbolic.to_string(),
        found: format!("{concrete:?}"),
    };

    if symbolic.len() != concrete.len() {
        return Err(mismatch());
    }
    for (e, size) in symbolic.iter().zip(concrete) {
        if e.evaluate()? != *size {
            return Err(mismatch());
        }
    }
    Ok(())
}
