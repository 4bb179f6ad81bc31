//! Hyshape: symbolic dimension algebra and shorthand shape transforms.
//!
//! Tensor axes are named once (`Batch(b):20`) and then referred to by their one-character
//! symbol in compact shorthand strings. The crate turns those strings into the plain integer
//! tuples a host tensor library expects for reshape, transpose, expand and reduce calls.
//!
//! Layers
//!  - [`dim`]: dimension variables and the registry that owns them.
//!  - [`expr`]: immutable symbolic expressions over variables and integers (`d//4`, `b*t`).
//!  - [`shape`]: ordered symbolic shape tuples and their comparison with concrete shapes.
//!  - [`shorthand`]: compact (`btd`), explicit (`b,t,d*2`) and arrow (`btd -> b,t,d`) forms.
//!  - [`transform`]: resolvers producing sizes, permutations, expansion factors and reduced axes.
//!  - [`warp`]: multi-step chains applied through a [`warp::TensorBackend`].
//!  - [`context`]: [`context::DimContext`], the session object gluing everything together.
//!
//! Example
//! ```
//! use hyshape::prelude::*;
//!
//! let ctx = DimContext::default();
//! ctx.declare("Batch(b):20 SeqLength(t):10 EmbeddingDim(d):100 Heads(h):4").unwrap();
//!
//! let out = ctx
//!     .warp_shape("btd -> b,t,h,d//h -> btd", "vv", &[20, 10, 100], WarpOptions::default())
//!     .unwrap();
//! assert_eq!(out, vec![20, 10, 100]);
//!
//! let d = ctx.lookup("d").unwrap().remove(0);
//! assert_eq!(floor_div(&d, 4).unwrap().to_string(), "floor(EmbeddingDim(d)/4):25");
//! ```

/// Session object owning a registry.
pub mod context;
/// Dimension variables and their registry.
pub mod dim;
/// Error taxonomy.
pub mod error;
/// Symbolic expressions, builders and pretty-printing.
pub mod expr;
/// Grammars for declarations and slot arithmetic.
pub mod parser;
/// Symbolic shape tuples.
pub mod shape;
/// Shorthand compiler.
pub mod shorthand;
/// Transform resolvers.
pub mod transform;
/// Chained transforms.
pub mod warp;

pub mod prelude {
    //! Convenient re-exports for end users.
    //!
    //! - Session and registry types
    //! - Expressions and free-function builders from `func::*`
    //! - Shapes and the concrete-shape predicates
    //! - Warp backends and options
    pub use crate::context::{DimContext, ExpansionSource, ShapeSource};
    pub use crate::dim::{DimDecl, DimRegistry, DimVar, Strictness};
    pub use crate::error::{ShapeError, ShapeResult};
    pub use crate::expr::{BinOp, SymExpr, func::*};
    pub use crate::shape::{ShapeTuple, check_shape, shapes_equal};
    pub use crate::shorthand::{LiteralMode, Shorthand, Slot, SlotList};
    pub use crate::warp::{ShapeBackend, StepKind, TensorBackend, WarpOptions, WarpPlan};
}
