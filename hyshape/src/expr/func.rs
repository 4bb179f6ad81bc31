//! Free-function builders for [`SymExpr`].
//!
//! Every builder accepts anything convertible into an expression: dimension variables (owned
//! or borrowed), expressions and integer literals.
use crate::error::{ShapeError, ShapeResult};
use crate::expr::{BinOp, SymExpr};

/// `lhs + rhs`
pub fn add(lhs: impl Into<SymExpr>, rhs: impl Into<SymExpr>) -> SymExpr {
    SymExpr::binary(BinOp::Add, lhs.into(), rhs.into())
}

/// `lhs - rhs`
pub fn sub(lhs: impl Into<SymExpr>, rhs: impl Into<SymExpr>) -> SymExpr {
    SymExpr::binary(BinOp::Sub, lhs.into(), rhs.into())
}

/// `lhs * rhs`
pub fn mul(lhs: impl Into<SymExpr>, rhs: impl Into<SymExpr>) -> SymExpr {
    SymExpr::binary(BinOp::Mul, lhs.into(), rhs.into())
}

/// `lhs // rhs` (floor division).
///
/// Fails with `InvalidOperand` when the divisor is the literal zero. A symbolic divisor that
/// evaluates to zero is reported at evaluation time instead.
pub fn floor_div(lhs: impl Into<SymExpr>, rhs: impl Into<SymExpr>) -> ShapeResult<SymExpr> {
    let lhs = lhs.into();
    let rhs = rhs.into();
    if let SymExpr::Lit(0) = rhs {
        return Err(ShapeError::InvalidOperand {
            spec: format!("{} // 0", lhs.symbolic()),
            reason: "division by zero".to_string(),
        });
    }
    Ok(SymExpr::binary(BinOp::FloorDiv, lhs, rhs))
}

/// Product of all `factors`, `1` when empty.
pub fn product<I>(factors: I) -> SymExpr
where
    I: IntoIterator,
    I::Item: Into<SymExpr>,
{
    factors
        .into_iter()
        .map(Into::<SymExpr>::into)
        .reduce(|acc, factor| mul(acc, factor))
        .unwrap_or(SymExpr::Lit(1))
}
