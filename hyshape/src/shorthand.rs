//! Shorthand shape notation.
//!
//! Grammar
//! - Compact: `btd`, one dimension per character. `_` is an anonymous slot and a digit is an
//!   integer literal.
//! - Explicit: `b,t,d*2`, slots separated by top-level commas. A slot is an arithmetic
//!   expression over declared symbols and integers (`+ - * //`, parentheses), empty or `_`
//!   (anonymous), or `-1` (axis inferred by the host reshape).
//! - Arrow: `source -> target`, split once on the first `->`; both sides follow the rules
//!   above independently.
//!
//! A chain `s1 -> s2 -> ... -> sN` splits on every `->` after whitespace is removed, so no
//! stage may contain the two characters `->` itself. Slot arithmetic never produces them
//! (no slot ends in `-`), so `btd -> b,-1 -> -1` and `bt->-1` split where expected.
//!
//! A side containing no comma but an operator or parenthesis is a single explicit slot
//! (`d//4`). Whitespace is insignificant.
//!
//! The compiler only produces slot sequences. Pairing source and target slots is the job of
//! the resolvers in [`crate::transform`].
use smallvec::SmallVec;
use strum::EnumIs;

use crate::dim::{DimRegistry, DimVar};
use crate::error::{ShapeError, ShapeResult};
use crate::expr::{SymExpr, func};
use crate::parser::{AstOp, SlotAst, parse_slot};
use crate::shape::ShapeTuple;

/// One position of a shorthand shape.
#[derive(Debug, Clone, EnumIs)]
pub enum Slot {
    /// A symbol, literal or arithmetic expression.
    Expr(SymExpr),
    /// An unnamed axis; carries its ordinal among the anonymous slots of the same side.
    Anonymous(usize),
    /// `-1`: size left to the host reshape.
    Inferred,
}

impl Slot {
    pub fn as_expr(&self) -> Option<&SymExpr> {
        match self {
            Slot::Expr(e) => Some(e),
            _ => None,
        }
    }

    /// Same slot for positional matching: structural equality of expressions, equal
    /// ordinals of anonymous slots.
    pub fn matches(&self, other: &Slot) -> bool {
        match (self, other) {
            (Slot::Expr(a), Slot::Expr(b)) => a.structurally_eq(b),
            (Slot::Anonymous(a), Slot::Anonymous(b)) => a == b,
            (Slot::Inferred, Slot::Inferred) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::Expr(e) => write!(f, "{}", e.symbolic()),
            Slot::Anonymous(_) => write!(f, "_"),
            Slot::Inferred => write!(f, "-1"),
        }
    }
}

/// Ordered slots of one side of a shorthand spec.
#[derive(Debug, Clone, Default)]
pub struct SlotList(SmallVec<Slot, 6>);

impl SlotList {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.0.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Slot> {
        self.0.get(index)
    }

    pub fn anonymous_count(&self) -> usize {
        self.iter().filter(|s| s.is_anonymous()).count()
    }

    /// Position of the `ordinal`-th anonymous slot.
    pub fn anonymous_position(&self, ordinal: usize) -> Option<usize> {
        self.iter()
            .enumerate()
            .filter(|(_, s)| s.is_anonymous())
            .nth(ordinal)
            .map(|(i, _)| i)
    }

    /// Position of the first expression slot structurally equal to `expr`.
    pub fn position_of(&self, expr: &SymExpr) -> Option<usize> {
        self.iter()
            .position(|s| s.as_expr().is_some_and(|e| e.structurally_eq(expr)))
    }

    /// Convert into a shape annotation; every slot must be named.
    pub fn to_shape(&self, spec: &str) -> ShapeResult<ShapeTuple> {
        self.iter()
            .map(|slot| match slot {
                Slot::Expr(e) => Ok(e.clone()),
                other => Err(ShapeError::ParseError {
                    spec: spec.to_string(),
                    errors: vec![format!("slot `{other}` is not allowed in a shape annotation")],
                }),
            })
            .collect()
    }
}

impl FromIterator<Slot> for SlotList {
    fn from_iter<T: IntoIterator<Item = Slot>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl std::fmt::Display for SlotList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, slot) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{slot}")?;
        }
        Ok(())
    }
}

/// How integer literals of the compact and explicit forms are read.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, EnumIs)]
pub enum LiteralMode {
    /// `4` is the literal size four.
    #[default]
    Size,
    /// A bare number is an anonymous axis (reduction specs: `2bd->2d`).
    Anonymous,
}

/// A parsed shorthand spec.
#[derive(Debug, Clone, EnumIs)]
pub enum Shorthand {
    Compact(SlotList),
    Explicit(SlotList),
    Arrow { source: SlotList, target: SlotList },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Form {
    Compact,
    Explicit,
}

const OPERATOR_CHARS: &[char] = &['+', '-', '*', '/', '(', ')'];

fn strip_whitespace(spec: &str) -> String {
    spec.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Split a side into raw slot strings, deciding between compact and explicit form.
fn split_side(side: &str) -> (Form, Vec<&str>) {
    if side.is_empty() {
        return (Form::Compact, Vec::new());
    }

    if side.contains(',') {
        let mut slots = Vec::new();
        let mut depth = 0usize;
        let mut start = 0;
        for (i, c) in side.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    slots.push(&side[start..i]);
                    start = i + 1;
                }
                _ => {}
            }
        }
        slots.push(&side[start..]);
        return (Form::Explicit, slots);
    }

    if side.contains(OPERATOR_CHARS) {
        return (Form::Explicit, vec![side]);
    }

    let slots = side
        .char_indices()
        .map(|(i, c)| &side[i..i + c.len_utf8()])
        .collect();
    (Form::Compact, slots)
}

fn resolve_ast(ast: &SlotAst<'_>, registry: &DimRegistry, spec: &str) -> ShapeResult<SymExpr> {
    match ast {
        SlotAst::Ident(symbol) => registry
            .get(symbol)
            .map(SymExpr::Var)
            .ok_or_else(|| ShapeError::NotDeclared {
                spec: spec.to_string(),
                symbol: symbol.to_string(),
            }),
        SlotAst::Int(value) => Ok(SymExpr::Lit(*value)),
        SlotAst::Neg(inner) => match inner.as_ref() {
            SlotAst::Int(value) => Ok(SymExpr::Lit(-value)),
            other => Ok(func::mul(-1, resolve_ast(other, registry, spec)?)),
        },
        SlotAst::Binary { op, lhs, rhs } => {
            let l = resolve_ast(lhs, registry, spec)?;
            let r = resolve_ast(rhs, registry, spec)?;
            match op {
                AstOp::Add => Ok(func::add(l, r)),
                AstOp::Sub => Ok(func::sub(l, r)),
                AstOp::Mul => Ok(func::mul(l, r)),
                AstOp::FloorDiv => func::floor_div(l, r).map_err(|e| e.in_spec(spec)),
                AstOp::TrueDiv => Err(ShapeError::InvalidOperand {
                    spec: spec.to_string(),
                    reason: format!(
                        "`{}/{}` is a true division, shapes only support floor division `//`",
                        l.symbolic(),
                        r.symbolic()
                    ),
                }),
            }
        }
    }
}

/// Resolve one slot expression (e.g. `d//4`) against `registry`.
pub fn parse_expr(registry: &DimRegistry, src: &str) -> ShapeResult<SymExpr> {
    let text = strip_whitespace(src);
    let ast = parse_slot(&text).map_err(|e| e.in_spec(src))?;
    resolve_ast(&ast, registry, src)
}

fn resolve_slot(
    raw: &str,
    anonymous: &mut usize,
    registry: &DimRegistry,
    mode: LiteralMode,
    spec: &str,
) -> ShapeResult<Slot> {
    let is_number = !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit());
    if raw.is_empty() || raw == "_" || (is_number && mode.is_anonymous()) {
        let slot = Slot::Anonymous(*anonymous);
        *anonymous += 1;
        return Ok(slot);
    }
    if raw == "-1" {
        return Ok(Slot::Inferred);
    }

    let ast = parse_slot(raw).map_err(|e| e.in_spec(spec))?;
    resolve_ast(&ast, registry, spec).map(Slot::Expr)
}

fn parse_side(
    registry: &DimRegistry,
    side: &str,
    mode: LiteralMode,
    spec: &str,
) -> ShapeResult<(Form, SlotList)> {
    let (form, raws) = split_side(side);
    let mut anonymous = 0;
    let slots = raws
        .into_iter()
        .map(|raw| resolve_slot(raw, &mut anonymous, registry, mode, spec))
        .collect::<ShapeResult<SlotList>>()?;
    Ok((form, slots))
}

impl Shorthand {
    /// Tokenize and resolve `spec` against `registry`.
    ///
    /// ```
    /// use hyshape::dim::{DimRegistry, Strictness};
    /// use hyshape::shorthand::{LiteralMode, Shorthand};
    ///
    /// let reg = DimRegistry::new(Strictness::Strict);
    /// reg.declare("Batch(b):20 SeqLength(t):10 EmbeddingDim(d):100").unwrap();
    /// let sh = Shorthand::parse(&reg, "btd -> b,t,4,d//4", LiteralMode::Size).unwrap();
    /// let (source, target) = sh.into_arrow("btd -> b,t,4,d//4").unwrap();
    /// assert_eq!(source.len(), 3);
    /// assert_eq!(target.len(), 4);
    /// ```
    pub fn parse(registry: &DimRegistry, spec: &str, mode: LiteralMode) -> ShapeResult<Self> {
        let text = strip_whitespace(spec);
        match text.split_once("->") {
            Some((source, target)) => {
                let (_, source) = parse_side(registry, source, mode, spec)?;
                let (_, target) = parse_side(registry, target, mode, spec)?;
                Ok(Shorthand::Arrow { source, target })
            }
            None => {
                let (form, slots) = parse_side(registry, &text, mode, spec)?;
                Ok(match form {
                    Form::Compact => Shorthand::Compact(slots),
                    Form::Explicit => Shorthand::Explicit(slots),
                })
            }
        }
    }

    /// Slots of a single-sided spec, or the source of an arrow spec.
    pub fn source(&self) -> &SlotList {
        match self {
            Shorthand::Compact(slots) | Shorthand::Explicit(slots) => slots,
            Shorthand::Arrow { source, .. } => source,
        }
    }

    /// Split an arrow spec; single-sided specs fail with `ParseError`.
    pub fn into_arrow(self, spec: &str) -> ShapeResult<(SlotList, SlotList)> {
        match self {
            Shorthand::Arrow { source, target } => Ok((source, target)),
            _ => Err(ShapeError::ParseError {
                spec: spec.to_string(),
                errors: vec!["expected a `source -> target` transform".to_string()],
            }),
        }
    }

    /// Slots of a single-sided spec; arrow specs fail with `ParseError`.
    pub fn into_single(self, spec: &str) -> ShapeResult<SlotList> {
        match self {
            Shorthand::Compact(slots) | Shorthand::Explicit(slots) => Ok(slots),
            Shorthand::Arrow { .. } => Err(ShapeError::ParseError {
                spec: spec.to_string(),
                errors: vec!["expected a shape, found a `->` transform".to_string()],
            }),
        }
    }
}

/// Parse every stage of a chain `s1 -> s2 -> ... -> sN`.
pub fn parse_chain(registry: &DimRegistry, spec: &str) -> ShapeResult<Vec<SlotList>> {
    strip_whitespace(spec)
        .split("->")
        .map(|stage| parse_side(registry, stage, LiteralMode::Size, spec).map(|(_, s)| s))
        .collect()
}

/// Parse expansion pairs `k->k*5, t->t*2` into `(dimension, new size)` expressions.
pub fn parse_expansions(registry: &DimRegistry, spec: &str) -> ShapeResult<Vec<(SymExpr, SymExpr)>> {
    let text = strip_whitespace(spec);
    let (_, pairs) = split_side(&text);
    pairs
        .into_iter()
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (dim, size) = pair.split_once("->").ok_or_else(|| ShapeError::ParseError {
                spec: spec.to_string(),
                errors: vec![format!("expansion `{pair}` is not of the form `dim -> size`")],
            })?;
            let dim = parse_expr(registry, dim).map_err(|e| e.in_spec(spec))?;
            let size = parse_expr(registry, size).map_err(|e| e.in_spec(spec))?;
            Ok((dim, size))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_side_splits_per_character() {
        let (form, slots) = split_side("d_b_");
        assert_eq!(form, Form::Compact);
        assert_eq!(slots, vec!["d", "_", "b", "_"]);
    }

    #[test]
    fn explicit_side_keeps_empty_slots() {
        let (form, slots) = split_side(",c,,");
        assert_eq!(form, Form::Explicit);
        assert_eq!(slots, vec!["", "c", "", ""]);
    }

    #[test]
    fn commas_inside_parentheses_do_not_split() {
        let (_, slots) = split_side("b,(t+1),d");
        assert_eq!(slots, vec!["b", "(t+1)", "d"]);
    }

    #[test]
    fn operator_without_comma_is_one_slot() {
        let (form, slots) = split_side("d//4");
        assert_eq!(form, Form::Explicit);
        assert_eq!(slots, vec!["d//4"]);
    }
}
