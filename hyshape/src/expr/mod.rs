//! Symbolic dimension expressions.
//!
//! Role
//! - Wrap dimension variables and integer literals into an immutable expression tree.
//! - Evaluate an expression once every leaf carries a size, either its declared default or a
//!   binding supplied by the caller (e.g. the current size of an axis).
//! - Render expressions as `Batch(b):20` or `floor(EmbeddingDim(d)/4):25`.
//!
//! Builders live in [`func`]; `+`, `-` and `*` are also available as operators on
//! [`SymExpr`] and [`DimVar`]. Floor division is fallible and only exists as
//! [`func::floor_div`].
//!
//! Equality semantics
//! - [`SymExpr::structurally_eq`] compares the trees: same variables (by symbol), same
//!   literals, same operators.
//! - `==` additionally treats two expressions as equal when both evaluate to the same size.
//!
//! Example
//! ```
//! use hyshape::dim::{DimRegistry, Strictness};
//! use hyshape::expr::{SymExpr, func};
//!
//! let reg = DimRegistry::new(Strictness::Strict);
//! let d = reg.declare_one("EmbeddingDim(d):100").unwrap();
//! let quarter = func::floor_div(&d, 4).unwrap();
//! assert_eq!(quarter.evaluate().unwrap(), 25);
//! assert_eq!(quarter.to_string(), "floor(EmbeddingDim(d)/4):25");
//! assert_eq!((&d * 2).evaluate().unwrap(), 200);
//! ```
pub mod func;
pub mod pretty;

use std::{cmp::Ordering, sync::Arc};

use strum::{EnumIs, IntoStaticStr};

use crate::dim::DimVar;
use crate::error::{ShapeError, ShapeResult};

/// Binary operators of the algebra.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIs, IntoStaticStr)]
pub enum BinOp {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "//")]
    FloorDiv,
}

impl BinOp {
    /// Binding strength used when rendering; atoms and `floor(..)` bind tightest.
    pub(crate) fn precedence(self) -> u8 {
        match self {
            BinOp::Add | BinOp::Sub => 1,
            BinOp::Mul => 2,
            BinOp::FloorDiv => 3,
        }
    }

    pub fn symbol(self) -> &'static str {
        self.into()
    }
}

/// An immutable symbolic expression over dimension variables and integers.
#[derive(Debug, Clone, EnumIs)]
pub enum SymExpr {
    Var(DimVar),
    Lit(i64),
    Binary {
        op: BinOp,
        lhs: Arc<SymExpr>,
        rhs: Arc<SymExpr>,
    },
}

pub(crate) fn floor_div_i64(lhs: i64, rhs: i64) -> Option<i64> {
    let q = lhs.checked_div(rhs)?;
    if lhs % rhs != 0 && ((lhs < 0) != (rhs < 0)) {
        Some(q - 1)
    } else {
        Some(q)
    }
}

impl SymExpr {
    pub fn var(dim: &DimVar) -> Self {
        SymExpr::Var(dim.clone())
    }

    pub fn lit(value: i64) -> Self {
        SymExpr::Lit(value)
    }

    pub(crate) fn binary(op: BinOp, lhs: SymExpr, rhs: SymExpr) -> Self {
        SymExpr::Binary {
            op,
            lhs: Arc::new(lhs),
            rhs: Arc::new(rhs),
        }
    }

    /// The dimension variable if this expression is a bare variable.
    pub fn as_var(&self) -> Option<&DimVar> {
        match self {
            SymExpr::Var(dim) => Some(dim),
            _ => None,
        }
    }

    /// Evaluate using the declared default sizes.
    pub fn evaluate(&self) -> ShapeResult<i64> {
        self.evaluate_in(&|_: &DimVar| None)
    }

    /// Evaluate, asking `bindings` first for the size of every variable and falling back to
    /// the declared default size.
    pub fn evaluate_in<F>(&self, bindings: &F) -> ShapeResult<i64>
    where
        F: Fn(&DimVar) -> Option<i64>,
    {
        match self {
            SymExpr::Lit(value) => Ok(*value),
            SymExpr::Var(dim) => {
                bindings(dim)
                    .or(dim.size())
                    .ok_or_else(|| ShapeError::UnresolvedSize {
                        spec: self.symbolic().to_string(),
                        symbol: dim.symbol().to_string(),
                    })
            }
            SymExpr::Binary { op, lhs, rhs } => {
                let l = lhs.evaluate_in(bindings)?;
                let r = rhs.evaluate_in(bindings)?;
                let value = match op {
                    BinOp::Add => l.checked_add(r),
                    BinOp::Sub => l.checked_sub(r),
                    BinOp::Mul => l.checked_mul(r),
                    BinOp::FloorDiv => {
                        if r == 0 {
                            return Err(ShapeError::InvalidOperand {
                                spec: self.symbolic().to_string(),
                                reason: format!("divisor `{}` evaluates to zero", rhs.symbolic()),
                            });
                        }
                        floor_div_i64(l, r)
                    }
                };
                value.ok_or_else(|| ShapeError::InvalidOperand {
                    spec: self.symbolic().to_string(),
                    reason: format!("`{l} {} {r}` overflows", op.symbol()),
                })
            }
        }
    }

    /// Tree equality: same operators, same literals, same variable symbols.
    pub fn structurally_eq(&self, other: &SymExpr) -> bool {
        match (self, other) {
            (SymExpr::Var(a), SymExpr::Var(b)) => a == b,
            (SymExpr::Lit(a), SymExpr::Lit(b)) => a == b,
            (
                SymExpr::Binary { op, lhs, rhs },
                SymExpr::Binary {
                    op: op2,
                    lhs: lhs2,
                    rhs: rhs2,
                },
            ) => op == op2 && lhs.structurally_eq(lhs2) && rhs.structurally_eq(rhs2),
            _ => false,
        }
    }

    /// Distinct variables referenced by the expression, in first-occurrence order.
    pub fn free_vars(&self) -> Vec<DimVar> {
        fn collect(e: &SymExpr, out: &mut Vec<DimVar>) {
            match e {
                SymExpr::Var(dim) => {
                    if !out.contains(dim) {
                        out.push(dim.clone());
                    }
                }
                SymExpr::Lit(_) => {}
                SymExpr::Binary { lhs, rhs, .. } => {
                    collect(lhs, out);
                    collect(rhs, out);
                }
            }
        }
        let mut out = Vec::new();
        collect(self, &mut out);
        out
    }

    /// Rebuild the expression, replacing every variable for which `f` returns an expression.
    pub fn substitute<F>(&self, f: &F) -> SymExpr
    where
        F: Fn(&DimVar) -> Option<SymExpr>,
    {
        match self {
            SymExpr::Var(dim) => f(dim).unwrap_or_else(|| self.clone()),
            SymExpr::Lit(_) => self.clone(),
            SymExpr::Binary { op, lhs, rhs } => {
                SymExpr::binary(*op, lhs.substitute(f), rhs.substitute(f))
            }
        }
    }

    /// Formatter of the symbolic form alone, without the evaluated size suffix.
    pub fn symbolic(&self) -> impl std::fmt::Display + '_ {
        struct Symbolic<'a>(&'a SymExpr);

        impl std::fmt::Display for Symbolic<'_> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt_symbolic(f, 0)
            }
        }

        Symbolic(self)
    }

    fn fmt_symbolic(&self, f: &mut std::fmt::Formatter<'_>, parent: u8) -> std::fmt::Result {
        match self {
            SymExpr::Var(dim) => write!(f, "{}({})", dim.name(), dim.symbol()),
            SymExpr::Lit(value) if *value < 0 && parent > 0 => write!(f, "({value})"),
            SymExpr::Lit(value) => write!(f, "{value}"),
            SymExpr::Binary {
                op: BinOp::FloorDiv,
                lhs,
                rhs,
            } => {
                write!(f, "floor(")?;
                lhs.fmt_symbolic(f, BinOp::Mul.precedence())?;
                write!(f, "/")?;
                rhs.fmt_symbolic(f, BinOp::FloorDiv.precedence())?;
                write!(f, ")")
            }
            SymExpr::Binary { op, lhs, rhs } => {
                let prec = op.precedence();
                let parens = parent > prec;
                if parens {
                    write!(f, "(")?;
                }
                lhs.fmt_symbolic(f, prec)?;
                match op {
                    BinOp::Mul => write!(f, "*")?,
                    _ => write!(f, " {} ", op.symbol())?,
                }
                // The right operand of `-` and `*` needs parentheses at equal precedence.
                rhs.fmt_symbolic(f, prec + 1)?;
                if parens {
                    write!(f, ")")?;
                }
                Ok(())
            }
        }
    }
}

impl std::fmt::Display for SymExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SymExpr::Lit(value) => write!(f, "{value}"),
            _ => match self.evaluate() {
                Ok(size) => write!(f, "{}:{size}", self.symbolic()),
                Err(_) => write!(f, "{}", self.symbolic()),
            },
        }
    }
}

impl PartialEq for SymExpr {
    fn eq(&self, other: &Self) -> bool {
        if self.structurally_eq(other) {
            return true;
        }
        matches!((self.evaluate(), other.evaluate()), (Ok(a), Ok(b)) if a == b)
    }
}

impl PartialOrd for SymExpr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.evaluate(), other.evaluate()) {
            (Ok(a), Ok(b)) => Some(a.cmp(&b)),
            _ if self.structurally_eq(other) => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl From<DimVar> for SymExpr {
    fn from(dim: DimVar) -> Self {
        SymExpr::Var(dim)
    }
}

impl From<&DimVar> for SymExpr {
    fn from(dim: &DimVar) -> Self {
        SymExpr::Var(dim.clone())
    }
}

impl From<&SymExpr> for SymExpr {
    fn from(e: &SymExpr) -> Self {
        e.clone()
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for SymExpr {
                fn from(value: $t) -> Self {
                    SymExpr::Lit(value as i64)
                }
            }
        )*
    };
}

impl_from_int!(i32, i64, u32, usize);

macro_rules! impl_arith_ops {
    ($($name:ty),*) => {
        $(
            impl<R: Into<SymExpr>> std::ops::Add<R> for $name {
                type Output = SymExpr;

                fn add(self, rhs: R) -> SymExpr {
                    func::add(self, rhs)
                }
            }

            impl<R: Into<SymExpr>> std::ops::Sub<R> for $name {
                type Output = SymExpr;

                fn sub(self, rhs: R) -> SymExpr {
                    func::sub(self, rhs)
                }
            }

            impl<R: Into<SymExpr>> std::ops::Mul<R> for $name {
                type Output = SymExpr;

                fn mul(self, rhs: R) -> SymExpr {
                    func::mul(self, rhs)
                }
            }
        )*
    };
}

impl_arith_ops!(SymExpr, &SymExpr, DimVar, &DimVar);
