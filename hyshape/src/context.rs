//! The session object tying a registry to the shorthand compiler and the resolvers.
//!
//! A [`DimContext`] owns one [`DimRegistry`]; every shorthand spec handed to it is resolved
//! against that registry. Transform results are plain integer tuples ready for a host tensor
//! library.
//!
//! ```
//! use hyshape::prelude::*;
//!
//! let ctx = DimContext::default();
//! ctx.declare("Batch(b):20 SeqLength(t):10 EmbeddingDim(d):100 K(k):1").unwrap();
//!
//! assert_eq!(ctx.view_transform("btd -> b,t,4,d//4", &[20, 10, 100]).unwrap(), vec![20, 10, 4, 25]);
//! assert_eq!(ctx.permute_transform("btdk -> dtbk").unwrap(), vec![2, 1, 0, 3]);
//! assert_eq!(ctx.expand_transform("bktd", "k->k*5", &[20, 1, 10, 100]).unwrap(), vec![-1, 5, -1, -1]);
//! assert_eq!(ctx.agg_dims("2bd->2d").unwrap(), vec![1]);
//! ```
use crate::dim::{DimRegistry, DimVar, Strictness};
use crate::error::{ShapeError, ShapeResult};
use crate::expr::SymExpr;
use crate::shape::ShapeTuple;
use crate::shorthand::{LiteralMode, Shorthand, Slot, SlotList, parse_expansions, parse_expr};
use crate::transform;
use crate::warp::{ShapeBackend, TensorBackend, WarpOptions, WarpPlan};

/// Anything that can stand for one side of a transform: a shorthand string or a symbolic
/// shape built in code.
pub trait ShapeSource {
    fn slots(&self, registry: &DimRegistry) -> ShapeResult<SlotList>;

    /// Text used to report errors.
    fn describe(&self) -> String;
}

impl ShapeSource for str {
    fn slots(&self, registry: &DimRegistry) -> ShapeResult<SlotList> {
        Shorthand::parse(registry, self, LiteralMode::Size)?.into_single(self)
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

impl ShapeSource for String {
    fn slots(&self, registry: &DimRegistry) -> ShapeResult<SlotList> {
        self.as_str().slots(registry)
    }

    fn describe(&self) -> String {
        self.clone()
    }
}

impl ShapeSource for ShapeTuple {
    fn slots(&self, _: &DimRegistry) -> ShapeResult<SlotList> {
        Ok(self.iter().cloned().map(Slot::Expr).collect())
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

impl ShapeSource for SlotList {
    fn slots(&self, _: &DimRegistry) -> ShapeResult<SlotList> {
        Ok(self.clone())
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

impl<T: Clone + Into<SymExpr>> ShapeSource for [T] {
    fn slots(&self, _: &DimRegistry) -> ShapeResult<SlotList> {
        Ok(self.iter().cloned().map(|e| Slot::Expr(e.into())).collect())
    }

    fn describe(&self) -> String {
        self.iter()
            .cloned()
            .map(Into::<SymExpr>::into)
            .collect::<ShapeTuple>()
            .to_string()
    }
}

impl<T: Clone + Into<SymExpr>, const N: usize> ShapeSource for [T; N] {
    fn slots(&self, registry: &DimRegistry) -> ShapeResult<SlotList> {
        self.as_slice().slots(registry)
    }

    fn describe(&self) -> String {
        self.as_slice().describe()
    }
}

impl<T: Clone + Into<SymExpr>> ShapeSource for Vec<T> {
    fn slots(&self, registry: &DimRegistry) -> ShapeResult<SlotList> {
        self.as_slice().slots(registry)
    }

    fn describe(&self) -> String {
        self.as_slice().describe()
    }
}

/// Expansions `(dimension, new size)`: either a shorthand `"k->k*5, t->t*2"` or pairs built in
/// code.
pub trait ExpansionSource {
    fn expansions(&self, registry: &DimRegistry) -> ShapeResult<Vec<(SymExpr, SymExpr)>>;

    fn describe(&self) -> String;
}

impl ExpansionSource for str {
    fn expansions(&self, registry: &DimRegistry) -> ShapeResult<Vec<(SymExpr, SymExpr)>> {
        parse_expansions(registry, self)
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

impl<A, B> ExpansionSource for [(A, B)]
where
    A: Clone + Into<SymExpr>,
    B: Clone + Into<SymExpr>,
{
    fn expansions(&self, _: &DimRegistry) -> ShapeResult<Vec<(SymExpr, SymExpr)>> {
        Ok(self
            .iter()
            .cloned()
            .map(|(dim, size)| (dim.into(), size.into()))
            .collect())
    }

    fn describe(&self) -> String {
        self.iter()
            .cloned()
            .map(|(dim, size)| {
                let (dim, size): (SymExpr, SymExpr) = (dim.into(), size.into());
                format!("{}->{}", dim.symbolic(), size.symbolic())
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl<A, B, const N: usize> ExpansionSource for [(A, B); N]
where
    A: Clone + Into<SymExpr>,
    B: Clone + Into<SymExpr>,
{
    fn expansions(&self, registry: &DimRegistry) -> ShapeResult<Vec<(SymExpr, SymExpr)>> {
        self.as_slice().expansions(registry)
    }

    fn describe(&self) -> String {
        self.as_slice().describe()
    }
}

/// One dimension-algebra session.
#[derive(Default)]
pub struct DimContext {
    registry: DimRegistry,
}

impl DimContext {
    pub fn new(strictness: Strictness) -> Self {
        Self {
            registry: DimRegistry::new(strictness),
        }
    }

    pub fn with_registry(registry: DimRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &DimRegistry {
        &self.registry
    }

    /// Declare `Name(symbol):size` entries under the registry's default policy.
    pub fn declare(&self, spec: &str) -> ShapeResult<Vec<DimVar>> {
        self.registry.declare(spec)
    }

    pub fn declare_with(&self, spec: &str, strictness: Strictness) -> ShapeResult<Vec<DimVar>> {
        self.registry.declare_with(spec, strictness)
    }

    /// Variables of the space separated `symbols` (`"b t d"`).
    pub fn lookup(&self, symbols: &str) -> ShapeResult<Vec<DimVar>> {
        self.registry.lookup(symbols)
    }

    pub fn update_sizes(&self, spec: &str) -> ShapeResult<Vec<DimVar>> {
        self.registry.update_sizes(spec)
    }

    pub fn parse(&self, spec: &str) -> ShapeResult<Shorthand> {
        Shorthand::parse(&self.registry, spec, LiteralMode::Size)
    }

    /// Resolve a single expression such as `d//4`.
    pub fn expr(&self, src: &str) -> ShapeResult<SymExpr> {
        parse_expr(&self.registry, src)
    }

    /// Shape annotation from a single-sided spec, e.g. `"b,t,d*2"`.
    pub fn shape(&self, spec: &str) -> ShapeResult<ShapeTuple> {
        self.parse(spec)?.into_single(spec)?.to_shape(spec)
    }

    fn arrow(&self, spec: &str, mode: LiteralMode) -> ShapeResult<(SlotList, SlotList)> {
        Shorthand::parse(&self.registry, spec, mode)?.into_arrow(spec)
    }

    /// Target sizes of the reshape `spec` applied to a tensor of shape `in_shape`.
    pub fn view_transform(&self, spec: &str, in_shape: &[i64]) -> ShapeResult<Vec<i64>> {
        let (source, target) = self.arrow(spec, LiteralMode::Size)?;
        transform::view(spec, &source, &target, in_shape)
    }

    /// Permutation of the shorthand `"btdk -> dtbk"`.
    pub fn permute_transform(&self, spec: &str) -> ShapeResult<Vec<usize>> {
        let (source, target) = self.arrow(spec, LiteralMode::Size)?;
        transform::permute(spec, &source, &target)
    }

    /// Permutation from an ordering matching `src` to one matching `to`.
    pub fn permute_between<S, T>(&self, src: &S, to: &T) -> ShapeResult<Vec<usize>>
    where
        S: ShapeSource + ?Sized,
        T: ShapeSource + ?Sized,
    {
        let spec = format!("{} -> {}", src.describe(), to.describe());
        let source = src.slots(&self.registry).map_err(|e| e.in_spec(&spec))?;
        let target = to.slots(&self.registry).map_err(|e| e.in_spec(&spec))?;
        transform::permute(&spec, &source, &target)
    }

    /// Per-axis multipliers of `src` once `expansions` are applied to `in_shape`.
    pub fn expand_transform<S, E>(
        &self,
        src: &S,
        expansions: &E,
        in_shape: &[i64],
    ) -> ShapeResult<Vec<i64>>
    where
        S: ShapeSource + ?Sized,
        E: ExpansionSource + ?Sized,
    {
        let spec = format!("{} : {}", src.describe(), expansions.describe());
        let source = src.slots(&self.registry).map_err(|e| e.in_spec(&spec))?;
        let pairs = expansions
            .expansions(&self.registry)
            .map_err(|e| e.in_spec(&spec))?;
        transform::expand(&spec, &source, &pairs, in_shape)
    }

    /// Axes of the source reduced away by `"2bd->2d"`; bare numbers are anonymous axes.
    pub fn agg_dims(&self, spec: &str) -> ShapeResult<Vec<usize>> {
        let (source, target) = self.arrow(spec, LiteralMode::Anonymous)?;
        transform::reduced_axes(spec, &source, &target)
    }

    /// Reshape of `in_shape` inserting the unit axes that line `"jk -> ijk"` up.
    pub fn align_transform(&self, spec: &str, in_shape: &[i64]) -> ShapeResult<Vec<i64>> {
        let (source, target) = self.arrow(spec, LiteralMode::Size)?;
        transform::align(spec, &source, &target, in_shape)
    }

    pub fn plan(&self, chain: &str, tags: &str) -> ShapeResult<WarpPlan> {
        WarpPlan::parse(&self.registry, chain, tags)
    }

    /// Apply the chain `"s1 -> s2 -> ... -> sN"` to `tensor`, one step kind per tag character.
    pub fn warp<B: TensorBackend>(
        &self,
        backend: &B,
        tensor: B::Tensor,
        chain: &str,
        tags: &str,
        opts: WarpOptions,
    ) -> ShapeResult<B::Tensor> {
        self.plan(chain, tags)?.run(backend, tensor, opts)
    }

    /// [`DimContext::warp`] on a concrete shape, without any tensor.
    pub fn warp_shape(
        &self,
        chain: &str,
        tags: &str,
        shape: &[i64],
        opts: WarpOptions,
    ) -> ShapeResult<Vec<i64>> {
        self.warp(&ShapeBackend, shape.to_vec(), chain, tags, opts)
    }

    /// Check `concrete` against the annotation `spec`.
    pub fn check(&self, spec: &str, concrete: &[i64]) -> ShapeResult<()> {
        crate::shape::check_shape(&self.shape(spec)?, concrete).map_err(|e| match e {
            ShapeError::ShapeMismatch {
                expected, found, ..
            } => ShapeError::ShapeMismatch {
                spec: spec.to_string(),
                expected,
                found,
            },
            other => other.in_spec(spec),
        })
    }
}
