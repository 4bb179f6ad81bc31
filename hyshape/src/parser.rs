//! chumsky grammars for dimension declarations and slot arithmetic.
//!
//! Role
//! - Turn declaration strings such as `Batch(b):20 SeqLength(t):10` into [`DimDecl`]s.
//! - Turn a single shorthand slot such as `d//4` or `(b+t)*2` into a [`SlotAst`], which the
//!   shorthand compiler later resolves against a registry.
//!
//! Both stages only check syntax. Symbol resolution is done by the caller so that an unknown
//! symbol is reported as `NotDeclared` rather than as a parse error.
//!
//! Precedence of slot arithmetic, loosest first: `+ -` < `* // /` < unary `-` < atoms
//! (integers, identifiers and parenthesised expressions). All binary operators are
//! left-associative.
use chumsky::prelude::*;

use crate::dim::DimDecl;
use crate::error::{ShapeError, ShapeResult};

/// Operators accepted in slot arithmetic.
///
/// `TrueDiv` is recognised only so that a single `/` can be rejected with a precise message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AstOp {
    Add,
    Sub,
    Mul,
    FloorDiv,
    TrueDiv,
}

/// Syntax tree of one shorthand slot, borrowing identifiers from the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotAst<'src> {
    Ident(&'src str),
    Int(i64),
    Neg(Box<SlotAst<'src>>),
    Binary {
        op: AstOp,
        lhs: Box<SlotAst<'src>>,
        rhs: Box<SlotAst<'src>>,
    },
}

fn ident<'src>() -> impl Parser<'src, &'src str, &'src str, extra::Err<Rich<'src, char>>> + Clone {
    any()
        .filter(|c: &char| c.is_ascii_alphabetic())
        .then(
            any()
                .filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_')
                .repeated(),
        )
        .to_slice()
        .labelled("identifier")
}

fn size_parser<'src>() -> impl Parser<'src, &'src str, i64, extra::Err<Rich<'src, char>>> + Clone {
    text::int(10)
        .try_map(|digits: &str, span| {
            let size: i64 = digits.parse().map_err(|_| {
                Rich::custom(span, format!("dimension size `{digits}` is out of range"))
            })?;
            if size <= 0 {
                return Err(Rich::custom(
                    span,
                    format!("dimension size must be positive, got {size}"),
                ));
            }
            Ok(size)
        })
        .labelled("dimension size")
}

/// Grammar of one declaration: `Name(symbol):size`, where `:size` is optional and either
/// `Name` or `(symbol)` may be left out.
///
/// A bare token is both name and symbol, and so is a lone `(symbol)`.
pub fn decl_parser<'src>()
-> impl Parser<'src, &'src str, DimDecl, extra::Err<Rich<'src, char>>> + Clone {
    let symbol = ident()
        .padded()
        .delimited_by(just('('), just(')'))
        .labelled("symbol");

    let named = ident()
        .then(symbol.clone().or_not())
        .map(|(name, symbol)| (name, symbol.unwrap_or(name)));
    let unnamed = symbol.map(|symbol| (symbol, symbol));

    choice((named, unnamed))
        .then(just(':').ignore_then(size_parser()).or_not())
        .map(|((name, symbol), size)| DimDecl {
            name: name.to_string(),
            symbol: symbol.to_string(),
            size,
        })
        .labelled("dimension declaration")
}

fn whitespace<'src>() -> impl Parser<'src, &'src str, (), extra::Err<Rich<'src, char>>> + Clone
{
    any()
        .filter(|c: &char| c.is_whitespace())
        .repeated()
        .at_least(1)
        .ignored()
        .labelled("whitespace")
}

fn decls_parser<'src>()
-> impl Parser<'src, &'src str, Vec<DimDecl>, extra::Err<Rich<'src, char>>> {
    decl_parser()
        .separated_by(whitespace())
        .at_least(1)
        .collect::<Vec<_>>()
        .padded()
        .then_ignore(end())
}

fn slot_parser<'src>()
-> impl Parser<'src, &'src str, SlotAst<'src>, extra::Err<Rich<'src, char>>> {
    recursive(|expr| {
        let int = text::int(10)
            .try_map(|digits: &str, span| {
                digits.parse::<i64>().map(SlotAst::Int).map_err(|_| {
                    Rich::custom(span, format!("integer literal `{digits}` is out of range"))
                })
            })
            .labelled("integer");

        let atom = choice((
            int,
            ident().map(SlotAst::Ident),
            expr.delimited_by(just('('), just(')'))
                .labelled("parentheses"),
        ))
        .padded()
        .labelled("atom");

        let unary = just('-')
            .padded()
            .repeated()
            .foldr(atom, |_, rhs| SlotAst::Neg(Box::new(rhs)));

        let product_op = choice((
            just("//").to(AstOp::FloorDiv),
            just("*").to(AstOp::Mul),
            just("/").to(AstOp::TrueDiv),
        ))
        .padded();
        let product = unary
            .clone()
            .foldl(product_op.then(unary).repeated(), |lhs, (op, rhs)| {
                SlotAst::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                }
            })
            .labelled("product");

        let sum_op = choice((just('+').to(AstOp::Add), just('-').to(AstOp::Sub))).padded();
        product
            .clone()
            .foldl(sum_op.then(product).repeated(), |lhs, (op, rhs)| {
                SlotAst::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                }
            })
            .labelled("sum")
    })
}

fn parse_error<'src>(spec: &str, errs: Vec<Rich<'src, char>>) -> ShapeError {
    ShapeError::ParseError {
        spec: spec.to_string(),
        errors: errs.into_iter().map(|e| e.to_string()).collect(),
    }
}

/// Parse a space separated list of declarations.
///
/// ```
/// use hyshape::parser::parse_decls;
/// let decls = parse_decls("Batch(b):20 t").unwrap();
/// assert_eq!(decls[0].symbol, "b");
/// assert_eq!(decls[0].size, Some(20));
/// assert_eq!(decls[1].name, "t");
/// assert_eq!(decls[1].size, None);
/// ```
pub fn parse_decls(src: &str) -> ShapeResult<Vec<DimDecl>> {
    decls_parser()
        .parse(src)
        .into_result()
        .map_err(|errs| parse_error(src, errs))
}

/// Parse the arithmetic of a single slot.
pub fn parse_slot(src: &str) -> ShapeResult<SlotAst<'_>> {
    slot_parser()
        .then_ignore(end())
        .parse(src)
        .into_result()
        .map_err(|errs| parse_error(src, errs))
}
