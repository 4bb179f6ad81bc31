//! Transform resolvers.
//!
//! Pure functions from parsed slot sequences (and the current concrete shape, where sizes
//! matter) to the plain tuples a host tensor library consumes:
//!
//! | resolver            | host operation | output                                   |
//! |---------------------|----------------|------------------------------------------|
//! | [`view`]            | reshape/view   | target sizes, `-1` for an inferred axis  |
//! | [`permute`]         | transpose      | source index of every target axis        |
//! | [`expand`]          | expand         | per-axis multiplier, `-1` when unchanged |
//! | [`expand_positional`] | expand       | same, pairing source/target by position  |
//! | [`reduced_axes`]    | sum/mean/...   | ascending indices of dropped axes        |
//! | [`align`]           | reshape/view   | target sizes with `1` for new axes       |
//!
//! Pairing rules shared by all resolvers: expression slots match by structural identity,
//! the i-th anonymous slot of the target matches the i-th anonymous slot of the source.
//!
//! Every function takes the full spec string only to report it in errors.
use std::collections::BTreeMap;

use log::trace;

use crate::dim::DimVar;
use crate::error::{ShapeError, ShapeResult};
use crate::expr::SymExpr;
use crate::shorthand::{Slot, SlotList};

/// Sizes of the variables standing alone on a source axis, read from the concrete shape.
struct Bindings(BTreeMap<String, i64>);

impl Bindings {
    fn from_source(source: &SlotList, in_shape: &[i64]) -> Self {
        let mut map = BTreeMap::new();
        for (slot, size) in source.iter().zip(in_shape) {
            if let Some(dim) = slot.as_expr().and_then(SymExpr::as_var) {
                map.entry(dim.symbol().to_string()).or_insert(*size);
            }
        }
        Bindings(map)
    }

    fn size_of(&self, dim: &DimVar) -> Option<i64> {
        self.0.get(dim.symbol()).copied()
    }

    /// Size of `expr` on the source: the axis value when `expr` is itself a source slot,
    /// otherwise an evaluation with bound variables and declared defaults.
    fn evaluate(
        &self,
        expr: &SymExpr,
        source: &SlotList,
        in_shape: &[i64],
        spec: &str,
    ) -> ShapeResult<i64> {
        if let Some(pos) = source.position_of(expr) {
            return Ok(in_shape[pos]);
        }
        expr.evaluate_in(&|dim: &DimVar| self.size_of(dim))
            .map_err(|e| e.in_spec(spec))
    }
}

fn check_rank(spec: &str, source: &SlotList, in_shape: &[i64]) -> ShapeResult<()> {
    if source.len() != in_shape.len() {
        return Err(ShapeError::DimensionCountMismatch {
            spec: spec.to_string(),
            expected: source.len(),
            found: in_shape.len(),
        });
    }
    if source.iter().any(Slot::is_inferred) {
        return Err(ShapeError::ParseError {
            spec: spec.to_string(),
            errors: vec!["`-1` is only allowed on the target side of a view".to_string()],
        });
    }
    Ok(())
}

fn placeholder_mismatch(spec: &str, source: &SlotList, target: &SlotList) -> ShapeError {
    ShapeError::AmbiguousPlaceholder {
        spec: spec.to_string(),
        source_count: source.anonymous_count(),
        target_count: target.anonymous_count(),
    }
}

/// Product of `sizes`, failing instead of wrapping on overflow.
fn element_count(spec: &str, sizes: impl IntoIterator<Item = i64>) -> ShapeResult<i64> {
    sizes
        .into_iter()
        .try_fold(1i64, |acc, size| acc.checked_mul(size))
        .ok_or_else(|| ShapeError::InvalidOperand {
            spec: spec.to_string(),
            reason: "element count overflows a 64-bit integer".to_string(),
        })
}

/// Resolve the target shape of a reshape.
///
/// Anonymous target slots copy the size of the matching anonymous source axis. Expressions
/// are evaluated with the variables of the source bound to their current sizes; variables
/// absent from the source use their declared size. Only a `-1` slot may stand for an inferred
/// axis and at most one is allowed; when present, the remaining sizes must divide the element
/// count of `in_shape`. An expression evaluating to a negative size is rejected.
pub fn view(
    spec: &str,
    source: &SlotList,
    target: &SlotList,
    in_shape: &[i64],
) -> ShapeResult<Vec<i64>> {
    check_rank(spec, source, in_shape)?;
    let bindings = Bindings::from_source(source, in_shape);

    let mut out = Vec::with_capacity(target.len());
    for slot in target.iter() {
        let size = match slot {
            Slot::Anonymous(ordinal) => {
                let pos = source
                    .anonymous_position(*ordinal)
                    .ok_or_else(|| placeholder_mismatch(spec, source, target))?;
                in_shape[pos]
            }
            Slot::Inferred => -1,
            Slot::Expr(e) => {
                let size = bindings.evaluate(e, source, in_shape, spec)?;
                if size < 0 {
                    return Err(ShapeError::InvalidOperand {
                        spec: spec.to_string(),
                        reason: format!("slot `{}` has the negative size {size}", e.symbolic()),
                    });
                }
                size
            }
        };
        out.push(size);
    }

    let inferred = target.iter().filter(|slot| slot.is_inferred()).count();
    if inferred > 1 {
        return Err(ShapeError::DimensionCountMismatch {
            spec: spec.to_string(),
            expected: 1,
            found: inferred,
        });
    }
    if inferred == 1 {
        let numel = element_count(spec, in_shape.iter().copied())?;
        let known = element_count(
            spec,
            target
                .iter()
                .zip(&out)
                .filter(|(slot, _)| !slot.is_inferred())
                .map(|(_, size)| *size),
        )?;
        if known == 0 || numel % known != 0 {
            return Err(ShapeError::ShapeMismatch {
                spec: spec.to_string(),
                expected: format!("a divisor of {numel} elements"),
                found: format!("{known} elements in the sized axes of {out:?}"),
            });
        }
    }

    trace!("view `{spec}`: {in_shape:?} -> {out:?}");
    Ok(out)
}

/// Resolve the permutation taking an ordering matching `source` to one matching `target`.
///
/// `target[i]` is found at `source[perm[i]]`.
pub fn permute(spec: &str, source: &SlotList, target: &SlotList) -> ShapeResult<Vec<usize>> {
    if source.anonymous_count() != target.anonymous_count() {
        return Err(placeholder_mismatch(spec, source, target));
    }
    if source.len() != target.len() {
        return Err(ShapeError::ShapeMismatch {
            spec: spec.to_string(),
            expected: format!("{} axes ({source})", source.len()),
            found: format!("{} axes ({target})", target.len()),
        });
    }

    let mut consumed = vec![false; source.len()];
    let mut perm = Vec::with_capacity(target.len());
    for slot in target.iter() {
        let pos = match slot {
            Slot::Anonymous(ordinal) => source.anonymous_position(*ordinal),
            other => source
                .iter()
                .enumerate()
                .position(|(i, s)| !consumed[i] && s.matches(other)),
        };
        let pos = pos.ok_or_else(|| ShapeError::UnmatchedDimension {
            spec: spec.to_string(),
            dim: slot.to_string(),
        })?;
        consumed[pos] = true;
        perm.push(pos);
    }

    trace!("permute `{spec}`: {perm:?}");
    Ok(perm)
}

fn expansion_factor(spec: &str, dim: String, from: i64, to: i64) -> ShapeResult<i64> {
    if from <= 0 || to % from != 0 {
        return Err(ShapeError::NonIntegerExpansion {
            spec: spec.to_string(),
            dim,
            from,
            to,
        });
    }
    Ok(to / from)
}

/// Resolve per-axis expansion multipliers for named expansions `(dimension, new size)`.
///
/// Axes without an expansion keep the factor `-1`. The new size is evaluated with the
/// source variables bound to their current sizes, so `k -> k*5` on an axis of size 1 yields 5.
pub fn expand(
    spec: &str,
    source: &SlotList,
    expansions: &[(SymExpr, SymExpr)],
    in_shape: &[i64],
) -> ShapeResult<Vec<i64>> {
    check_rank(spec, source, in_shape)?;
    let bindings = Bindings::from_source(source, in_shape);

    let mut factors = vec![-1; source.len()];
    for (dim, size) in expansions {
        let pos = source
            .position_of(dim)
            .ok_or_else(|| ShapeError::UnmatchedDimension {
                spec: spec.to_string(),
                dim: dim.symbolic().to_string(),
            })?;
        let to = size
            .evaluate_in(&|var: &DimVar| bindings.size_of(var))
            .map_err(|e| e.in_spec(spec))?;
        factors[pos] = expansion_factor(spec, dim.symbolic().to_string(), in_shape[pos], to)?;
    }

    trace!("expand `{spec}`: {in_shape:?} x {factors:?}");
    Ok(factors)
}

/// Resolve expansion multipliers by pairing source and target slots position by position.
///
/// Slots left unchanged (structurally, or anonymous) keep the factor `-1`.
pub fn expand_positional(
    spec: &str,
    source: &SlotList,
    target: &SlotList,
    in_shape: &[i64],
) -> ShapeResult<Vec<i64>> {
    check_rank(spec, source, in_shape)?;
    if source.len() != target.len() {
        return Err(ShapeError::DimensionCountMismatch {
            spec: spec.to_string(),
            expected: source.len(),
            found: target.len(),
        });
    }
    let bindings = Bindings::from_source(source, in_shape);

    let mut factors = Vec::with_capacity(source.len());
    for (i, (from, to)) in source.iter().zip(target.iter()).enumerate() {
        let factor = match (from, to) {
            (_, Slot::Anonymous(_)) => -1,
            (from, to) if from.matches(to) => -1,
            (_, Slot::Expr(e)) => {
                let size = e
                    .evaluate_in(&|var: &DimVar| bindings.size_of(var))
                    .map_err(|err| err.in_spec(spec))?;
                expansion_factor(spec, from.to_string(), in_shape[i], size)?
            }
            (_, Slot::Inferred) => -1,
        };
        factors.push(factor);
    }

    trace!("expand `{spec}`: {in_shape:?} x {factors:?}");
    Ok(factors)
}

/// Indices of the source axes absent from the target, in ascending order.
///
/// The target must keep source axes in their original order; a reordering target is an
/// `InvalidReduction` on the first slot found out of order.
pub fn reduced_axes(spec: &str, source: &SlotList, target: &SlotList) -> ShapeResult<Vec<usize>> {
    let mut kept = vec![false; source.len()];
    let mut next = 0;
    for slot in target.iter() {
        let pos = match slot {
            Slot::Anonymous(ordinal) => source
                .anonymous_position(*ordinal)
                .filter(|pos| *pos >= next),
            other => source
                .iter()
                .enumerate()
                .skip(next)
                .find(|(_, s)| s.matches(other))
                .map(|(i, _)| i),
        };
        match pos {
            Some(pos) => {
                kept[pos] = true;
                next = pos + 1;
            }
            None => {
                return Err(ShapeError::InvalidReduction {
                    spec: spec.to_string(),
                    slot: slot.to_string(),
                });
            }
        }
    }

    let axes: Vec<usize> = kept
        .iter()
        .enumerate()
        .filter(|(_, kept)| !**kept)
        .map(|(i, _)| i)
        .collect();
    trace!("reduce `{spec}`: axes {axes:?}");
    Ok(axes)
}

/// Resolve the reshape inserting unit axes so that `source` lines up with `target`.
///
/// `source` must appear in `target` in the same order; every other target axis gets size 1.
pub fn align(
    spec: &str,
    source: &SlotList,
    target: &SlotList,
    in_shape: &[i64],
) -> ShapeResult<Vec<i64>> {
    check_rank(spec, source, in_shape)?;

    let mut next = 0;
    let mut out = Vec::with_capacity(target.len());
    for slot in target.iter() {
        match source.get(next) {
            Some(candidate) if candidate.matches(slot) => {
                out.push(in_shape[next]);
                next += 1;
            }
            _ => out.push(1),
        }
    }
    if let Some(missing) = source.get(next) {
        return Err(ShapeError::UnmatchedDimension {
            spec: spec.to_string(),
            dim: missing.to_string(),
        });
    }

    trace!("align `{spec}`: {in_shape:?} -> {out:?}");
    Ok(out)
}
