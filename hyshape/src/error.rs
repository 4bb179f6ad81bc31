use strum::EnumIs;
use thiserror::Error;

/// Failures raised while declaring dimensions, parsing shorthand or resolving transforms.
///
/// Every variant carries the spec string that triggered it so the authoring mistake can be
/// located without re-deriving internal state.
#[derive(Debug, EnumIs, Error)]
pub enum ShapeError {
    /// Strict declaration of a symbol that is already registered.
    #[error(
        "Dimension variable `{symbol}` is already declared (while declaring `{spec}`). Redeclare it in relaxed mode to overwrite."
    )]
    AlreadyDeclared { spec: String, symbol: String },

    /// A symbol was referenced before any declaration.
    #[error("Unknown dimension variable `{symbol}` in `{spec}`. Declare it before use.")]
    NotDeclared { spec: String, symbol: String },

    /// Malformed shorthand, declaration or arithmetic.
    #[error("Failed to parse `{spec}`: {}", errors.join("; "))]
    ParseError { spec: String, errors: Vec<String> },

    /// Two shapes (or shape specs) disagree on their axes.
    #[error("Shape mismatch in `{spec}`: expected {expected}, found {found}.")]
    ShapeMismatch {
        spec: String,
        expected: String,
        found: String,
    },

    /// The number of resolved axes conflicts with the shape it is resolved against.
    #[error("Dimension count mismatch in `{spec}`: expected {expected} axes, found {found}.")]
    DimensionCountMismatch {
        spec: String,
        expected: usize,
        found: usize,
    },

    /// A named target axis has no counterpart in the source.
    #[error("Dimension `{dim}` of `{spec}` has no counterpart in the source shape.")]
    UnmatchedDimension { spec: String, dim: String },

    /// Anonymous placeholder counts differ between source and target.
    #[error(
        "Anonymous placeholders of `{spec}` cannot be paired: source has {source_count}, target has {target_count}."
    )]
    AmbiguousPlaceholder {
        spec: String,
        source_count: usize,
        target_count: usize,
    },

    /// Expanding an axis by a non whole-number factor.
    #[error(
        "Expansion of `{dim}` in `{spec}` from {from} to {to} is not a whole-number multiple."
    )]
    NonIntegerExpansion {
        spec: String,
        dim: String,
        from: i64,
        to: i64,
    },

    /// Evaluation needs a size that some dimension variable does not carry.
    #[error("Cannot evaluate `{spec}`: dimension variable `{symbol}` has no size.")]
    UnresolvedSize { spec: String, symbol: String },

    /// Arithmetic with an operand that cannot be used (zero divisor, true division).
    #[error("Invalid operand in `{spec}`: {reason}.")]
    InvalidOperand { spec: String, reason: String },

    /// A warp chain whose stages and tags do not line up.
    #[error("Invalid transform chain `{spec}`: {reason}.")]
    ConfigurationError { spec: String, reason: String },

    /// A reduction target keeps an axis the source does not have, or reorders the kept axes.
    #[error("Invalid reduction `{spec}`: target slot `{slot}` has no source axis left in order.")]
    InvalidReduction { spec: String, slot: String },

    /// The host tensor operation failed during a warp step.
    #[error("Host operation `{step}` failed in `{spec}`: {source}")]
    Backend {
        spec: String,
        step: String,
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl ShapeError {
    /// Spec string the error refers to.
    pub fn spec(&self) -> &str {
        match self {
            ShapeError::AlreadyDeclared { spec, .. }
            | ShapeError::NotDeclared { spec, .. }
            | ShapeError::ParseError { spec, .. }
            | ShapeError::ShapeMismatch { spec, .. }
            | ShapeError::DimensionCountMismatch { spec, .. }
            | ShapeError::UnmatchedDimension { spec, .. }
            | ShapeError::AmbiguousPlaceholder { spec, .. }
            | ShapeError::NonIntegerExpansion { spec, .. }
            | ShapeError::UnresolvedSize { spec, .. }
            | ShapeError::InvalidOperand { spec, .. }
            | ShapeError::ConfigurationError { spec, .. }
            | ShapeError::InvalidReduction { spec, .. }
            | ShapeError::Backend { spec, .. } => spec,
        }
    }

    /// Replace the spec string, used when an inner resolution failed on a sub-expression
    /// and the caller knows the full spec.
    pub(crate) fn in_spec(mut self, full: &str) -> Self {
        match &mut self {
            ShapeError::AlreadyDeclared { spec, .. }
            | ShapeError::NotDeclared { spec, .. }
            | ShapeError::ParseError { spec, .. }
            | ShapeError::ShapeMismatch { spec, .. }
            | ShapeError::DimensionCountMismatch { spec, .. }
            | ShapeError::UnmatchedDimension { spec, .. }
            | ShapeError::AmbiguousPlaceholder { spec, .. }
            | ShapeError::NonIntegerExpansion { spec, .. }
            | ShapeError::UnresolvedSize { spec, .. }
            | ShapeError::InvalidOperand { spec, .. }
            | ShapeError::ConfigurationError { spec, .. }
            | ShapeError::InvalidReduction { spec, .. }
            | ShapeError::Backend { spec, .. } => *spec = full.to_string(),
        }
        self
    }
}

pub type ShapeResult<T> = Result<T, ShapeError>;
