//! RcDoc-based pretty-printer with termcolor annotations for expressions and shapes.
//!
//! Builds annotated `RcDoc<Style>` trees and renders them to a `termcolor::WriteColor` sink
//! with width-aware layout. Long shapes break after their commas.

use std::io::{self, Write};

use pretty::{RcDoc, RenderAnnotated};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::expr::{BinOp, SymExpr};
use crate::shape::ShapeTuple;

/// Styles that we annotate parts of the document with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Punct, // commas, colons
    /// Parentheses are colored by nesting depth so matching pairs share a color.
    Paren(u8),
    Operator, // +, -, *, /
    Keyword,  // floor
    Ident,    // dimension names and symbols
    Size,     // evaluated sizes and literals
}

impl Style {
    fn to_color_spec(self) -> ColorSpec {
        let mut s = ColorSpec::new();
        match self {
            Style::Punct => {
                s.set_dimmed(true);
            }
            Style::Paren(depth) => {
                let fg = match depth % 4 {
                    0 => Color::Blue,
                    1 => Color::Green,
                    2 => Color::Yellow,
                    3 => Color::Magenta,
                    _ => unreachable!(),
                };
                s.set_fg(Some(fg)).set_dimmed(true);
            }
            Style::Operator => {
                s.set_fg(Some(Color::Yellow)).set_bold(true);
            }
            Style::Keyword => {
                s.set_fg(Some(Color::Cyan)).set_bold(true);
            }
            Style::Ident => {
                s.set_fg(Some(Color::Green)).set_bold(true);
            }
            Style::Size => {
                s.set_fg(Some(Color::Magenta));
            }
        }
        s
    }
}

fn styled(style: Style, s: impl Into<String>) -> RcDoc<'static, Style> {
    RcDoc::text(s.into()).annotate(style)
}

fn punct(s: &'static str) -> RcDoc<'static, Style> {
    styled(Style::Punct, s)
}

fn op(s: &'static str) -> RcDoc<'static, Style> {
    styled(Style::Operator, s)
}

#[inline]
fn lparen(depth: u8) -> RcDoc<'static, Style> {
    styled(Style::Paren(depth), "(")
}

#[inline]
fn rparen(depth: u8) -> RcDoc<'static, Style> {
    styled(Style::Paren(depth), ")")
}

fn symbolic_doc(e: &SymExpr, parent: u8, depth: u8) -> RcDoc<'static, Style> {
    match e {
        SymExpr::Var(dim) => styled(Style::Ident, dim.name())
            .append(lparen(depth))
            .append(styled(Style::Ident, dim.symbol()))
            .append(rparen(depth)),
        SymExpr::Lit(value) if *value < 0 && parent > 0 => lparen(depth)
            .append(styled(Style::Size, value.to_string()))
            .append(rparen(depth)),
        SymExpr::Lit(value) => styled(Style::Size, value.to_string()),
        SymExpr::Binary {
            op: BinOp::FloorDiv,
            lhs,
            rhs,
        } => styled(Style::Keyword, "floor")
            .append(lparen(depth))
            .append(symbolic_doc(lhs, BinOp::Mul.precedence(), depth + 1))
            .append(op("/"))
            .append(symbolic_doc(rhs, BinOp::FloorDiv.precedence(), depth + 1))
            .append(rparen(depth))
            .group(),
        SymExpr::Binary { op: bin, lhs, rhs } => {
            let prec = bin.precedence();
            let parens = parent > prec;
            let inner_depth = if parens { depth + 1 } else { depth };
            let sep = match bin {
                BinOp::Mul => op("*"),
                _ => RcDoc::space()
                    .append(op(bin.symbol()))
                    .append(RcDoc::space()),
            };
            let body = symbolic_doc(lhs, prec, inner_depth)
                .append(sep)
                .append(symbolic_doc(rhs, prec + 1, inner_depth));
            if parens {
                lparen(depth).append(body).append(rparen(depth)).group()
            } else {
                body.group()
            }
        }
    }
}

/// Document for an expression, suffixed with `:size` when it evaluates.
pub fn expr_doc(e: &SymExpr) -> RcDoc<'static, Style> {
    let doc = symbolic_doc(e, 0, 0);
    match (e, e.evaluate()) {
        (SymExpr::Lit(_), _) | (_, Err(_)) => doc,
        (_, Ok(size)) => doc
            .append(punct(":"))
            .append(styled(Style::Size, size.to_string())),
    }
}

/// Document for a shape tuple, breaking lines after commas when too wide.
pub fn shape_doc(shape: &ShapeTuple) -> RcDoc<'static, Style> {
    let items = shape.iter().map(expr_doc);
    lparen(0)
        .append(
            RcDoc::intersperse(items, punct(",").append(RcDoc::line()))
                .nest(1)
                .group(),
        )
        .append(if shape.len() == 1 {
            punct(",")
        } else {
            RcDoc::nil()
        })
        .append(rparen(0))
}

// A writer that maps Style annotations to termcolor ColorSpec on a WriteColor sink.
struct ColorWriter<'w, W: WriteColor + Write> {
    out: &'w mut W,
}

impl<'a, 'w, W: WriteColor + Write> RenderAnnotated<'a, Style> for ColorWriter<'w, W> {
    fn push_annotation(&mut self, ann: &'a Style) -> io::Result<()> {
        self.out.set_color(&ann.to_color_spec())
    }
    fn pop_annotation(&mut self) -> io::Result<()> {
        self.out.reset()
    }
}

impl<'w, W: WriteColor + Write> pretty::Render for ColorWriter<'w, W> {
    type Error = io::Error;
    fn write_str(&mut self, s: &str) -> io::Result<usize> {
        self.out.write_all(s.as_bytes())?;
        Ok(s.len())
    }
    fn write_str_all(&mut self, s: &str) -> io::Result<()> {
        self.out.write_all(s.as_bytes())
    }
    fn fail_doc(&self) -> Self::Error {
        io::Error::other("render failed")
    }
}

/// Render a document to a `termcolor::WriteColor` with width-aware layout.
pub fn render_to<W: WriteColor + Write>(
    doc: &RcDoc<'_, Style>,
    width: usize,
    out: &mut W,
) -> io::Result<()> {
    let mut cw = ColorWriter { out };
    doc.render_raw(width, &mut cw)
}

/// Convenience: print a shape to stdout with colors if supported.
pub fn print_shape_colored(shape: &ShapeTuple, width: usize) -> io::Result<()> {
    let stdout = StandardStream::stdout(ColorChoice::Auto);
    let mut stdout = stdout.lock();
    render_to(&shape_doc(shape), width, &mut stdout)
}

/// Convenience: format a document to a plain string without colors.
pub fn to_plain_string(doc: &RcDoc<'_, Style>, width: usize) -> String {
    let mut buf = String::new();
    // Writing into a `String` never fails.
    let _ = doc.render_fmt(width, &mut buf);
    buf
}

/// Convenience: retrieve the width of the terminal, or 80 if it cannot be determined.
pub fn terminal_width() -> usize {
    term_size::dimensions().map(|(w, _)| w).unwrap_or(80)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dim::{DimRegistry, Strictness};
    use crate::expr::func;

    #[test]
    fn plain_rendering_matches_display() {
        let reg = DimRegistry::new(Strictness::Strict);
        let d = reg.declare_one("EmbeddingDim(d):100").unwrap();
        let e = func::floor_div(&d, 4).unwrap();
        assert_eq!(to_plain_string(&expr_doc(&e), 80), e.to_string());
    }

    #[test]
    fn narrow_shapes_break_after_commas() {
        let reg = DimRegistry::new(Strictness::Strict);
        let dims = reg
            .declare("Batch(b):20 SeqLength(t):10 EmbeddingDim(d):100")
            .unwrap();
        let shape: ShapeTuple = dims.into_iter().collect();
        let wide = to_plain_string(&shape_doc(&shape), 200);
        assert_eq!(wide, shape.to_string());
        let narrow = to_plain_string(&shape_doc(&shape), 10);
        assert!(narrow.contains('\n'));
    }
}
