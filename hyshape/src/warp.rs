//! Warp sequencer: a chain of shorthand stages applied to a tensor step by step.
//!
//! A chain `"btd -> b,t,h,d//h -> btd"` has one step per arrow, and a tag string gives the kind
//! of every step (`"vv"`). Each step is resolved against the *current* shape of the tensor,
//! handed to the host operation, and the shape reported by the host afterwards becomes the
//! current shape of the next step.
//!
//! Host libraries plug in through [`TensorBackend`]. [`ShapeBackend`] is a backend whose tensor
//! is its own concrete shape, useful to dry-run a chain.
use log::{info, trace};
use strum::{EnumIs, IntoStaticStr};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dim::DimRegistry;
use crate::error::{ShapeError, ShapeResult};
use crate::shorthand::{SlotList, parse_chain};
use crate::transform;

/// Host tensor operations driven by the sequencer.
///
/// Sizes and factors follow the broadcast conventions: `-1` in [`TensorBackend::view`] is an
/// axis to infer, `-1` in [`TensorBackend::expand`] keeps the axis unchanged and any other
/// value multiplies the axis size.
pub trait TensorBackend {
    type Tensor;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Current concrete shape of `tensor`.
    fn shape(&self, tensor: &Self::Tensor) -> Vec<i64>;

    fn view(&self, tensor: Self::Tensor, sizes: &[i64]) -> Result<Self::Tensor, Self::Error>;

    fn permute(&self, tensor: Self::Tensor, perm: &[usize]) -> Result<Self::Tensor, Self::Error>;

    fn expand(&self, tensor: Self::Tensor, factors: &[i64]) -> Result<Self::Tensor, Self::Error>;
}

/// Kind of one warp step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIs, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum StepKind {
    View,
    Permute,
    Expand,
    /// Reshape inserting unit axes, executed through [`TensorBackend::view`].
    Align,
}

impl StepKind {
    /// `v`/`r` view, `p`/`t` permute, `e` expand, `a` align.
    pub fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'v' | 'r' => Some(StepKind::View),
            'p' | 't' => Some(StepKind::Permute),
            'e' => Some(StepKind::Expand),
            'a' => Some(StepKind::Align),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// Knobs of a warp run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WarpOptions {
    /// Log `old -> new` for every step at `info` level instead of `trace`.
    pub verbose: bool,
}

impl WarpOptions {
    pub fn verbose() -> Self {
        Self { verbose: true }
    }
}

/// A validated chain: every stage parsed, one step kind per transition.
///
/// Building the plan performs all syntactic checks, so a malformed chain fails before any host
/// operation runs.
#[derive(Debug, Clone)]
pub struct WarpPlan {
    spec: String,
    stages: Vec<SlotList>,
    kinds: Vec<StepKind>,
}

impl WarpPlan {
    pub fn parse(registry: &DimRegistry, chain: &str, tags: &str) -> ShapeResult<Self> {
        let stages = parse_chain(registry, chain)?;
        let kinds = tags
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|tag| {
                StepKind::from_tag(tag).ok_or_else(|| ShapeError::ConfigurationError {
                    spec: chain.to_string(),
                    reason: format!("unknown step tag `{tag}` in `{tags}`"),
                })
            })
            .collect::<ShapeResult<Vec<_>>>()?;

        if stages.len() != kinds.len() + 1 {
            return Err(ShapeError::ConfigurationError {
                spec: chain.to_string(),
                reason: format!(
                    "{} stages need {} step tags, got {} (`{tags}`)",
                    stages.len(),
                    stages.len() - 1,
                    kinds.len()
                ),
            });
        }

        Ok(Self {
            spec: chain.to_string(),
            stages,
            kinds,
        })
    }

    pub fn spec(&self) -> &str {
        &self.spec
    }

    pub fn stages(&self) -> &[SlotList] {
        &self.stages
    }

    pub fn kinds(&self) -> &[StepKind] {
        &self.kinds
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Apply every step to `tensor` in order.
    pub fn run<B: TensorBackend>(
        &self,
        backend: &B,
        tensor: B::Tensor,
        opts: WarpOptions,
    ) -> ShapeResult<B::Tensor> {
        let mut tensor = tensor;
        for (i, kind) in self.kinds.iter().enumerate() {
            let (source, target) = (&self.stages[i], &self.stages[i + 1]);
            let step = format!("{source} -> {target}");
            let old = backend.shape(&tensor);

            let host = |result: Result<B::Tensor, B::Error>| {
                result.map_err(|err| ShapeError::Backend {
                    spec: step.clone(),
                    step: kind.name().to_string(),
                    source: Box::new(err),
                })
            };

            tensor = match kind {
                StepKind::View => {
                    let sizes = transform::view(&step, source, target, &old)?;
                    host(backend.view(tensor, &sizes))?
                }
                StepKind::Permute => {
                    if source.len() != old.len() {
                        return Err(ShapeError::DimensionCountMismatch {
                            spec: step.clone(),
                            expected: source.len(),
                            found: old.len(),
                        });
                    }
                    let perm = transform::permute(&step, source, target)?;
                    host(backend.permute(tensor, &perm))?
                }
                StepKind::Expand => {
                    let factors = transform::expand_positional(&step, source, target, &old)?;
                    host(backend.expand(tensor, &factors))?
                }
                StepKind::Align => {
                    let sizes = transform::align(&step, source, target, &old)?;
                    host(backend.view(tensor, &sizes))?
                }
            };

            let new = backend.shape(&tensor);
            if opts.verbose {
                info!("{} `{step}`: {old:?} -> {new:?}", kind.name());
            } else {
                trace!("{} `{step}`: {old:?} -> {new:?}", kind.name());
            }
        }
        Ok(tensor)
    }
}

/// Failures of the shape-only backend, mirroring what a host tensor library would reject.
#[derive(Debug, Error, EnumIs)]
pub enum ShapeBackendError {
    #[error("cannot view {from:?} as {to:?}: element counts differ")]
    ElementCount { from: Vec<i64>, to: Vec<i64> },

    #[error("only one axis can be inferred, got {sizes:?}")]
    MultipleInferred { sizes: Vec<i64> },

    #[error("{perm:?} is not a permutation of {rank} axes")]
    InvalidPermutation { perm: Vec<usize>, rank: usize },

    #[error("expected {expected} expansion factors, got {found}")]
    RankMismatch { expected: usize, found: usize },

    #[error("invalid expansion factor {factor}")]
    InvalidFactor { factor: i64 },

    #[error("element count of {sizes:?} overflows a 64-bit integer")]
    Overflow { sizes: Vec<i64> },
}

fn checked_numel(sizes: &[i64]) -> Result<i64, ShapeBackendError> {
    sizes
        .iter()
        .try_fold(1i64, |acc, size| acc.checked_mul(*size))
        .ok_or_else(|| ShapeBackendError::Overflow {
            sizes: sizes.to_vec(),
        })
}

/// Backend whose tensor is its own concrete shape.
///
/// ```
/// use hyshape::warp::{ShapeBackend, TensorBackend};
/// let out = ShapeBackend.view(vec![20, 10, 100], &[20, 10, 4, -1]).unwrap();
/// assert_eq!(out, vec![20, 10, 4, 25]);
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct ShapeBackend;

impl TensorBackend for ShapeBackend {
    type Tensor = Vec<i64>;
    type Error = ShapeBackendError;

    fn shape(&self, tensor: &Vec<i64>) -> Vec<i64> {
        tensor.clone()
    }

    fn view(&self, tensor: Vec<i64>, sizes: &[i64]) -> Result<Vec<i64>, ShapeBackendError> {
        let numel = checked_numel(&tensor)?;
        let mismatch = || ShapeBackendError::ElementCount {
            from: tensor.clone(),
            to: sizes.to_vec(),
        };

        let mut out = sizes.to_vec();
        let inferred: Vec<usize> = (0..out.len()).filter(|i| out[*i] == -1).collect();
        match inferred.as_slice() {
            [] => {}
            [axis] => {
                let sized: Vec<i64> = out.iter().copied().filter(|size| *size != -1).collect();
                let known = checked_numel(&sized)?;
                if known <= 0 || numel % known != 0 {
                    return Err(mismatch());
                }
                out[*axis] = numel / known;
            }
            _ => {
                return Err(ShapeBackendError::MultipleInferred {
                    sizes: sizes.to_vec(),
                });
            }
        }

        if out.iter().any(|size| *size < 0) || checked_numel(&out)? != numel {
            return Err(mismatch());
        }
        Ok(out)
    }

    fn permute(&self, tensor: Vec<i64>, perm: &[usize]) -> Result<Vec<i64>, ShapeBackendError> {
        let mut seen = vec![false; tensor.len()];
        let valid = perm.len() == tensor.len()
            && perm
                .iter()
                .all(|axis| *axis < seen.len() && !std::mem::replace(&mut seen[*axis], true));
        if !valid {
            return Err(ShapeBackendError::InvalidPermutation {
                perm: perm.to_vec(),
                rank: tensor.len(),
            });
        }
        Ok(perm.iter().map(|axis| tensor[*axis]).collect())
    }

    fn expand(&self, tensor: Vec<i64>, factors: &[i64]) -> Result<Vec<i64>, ShapeBackendError> {
        if factors.len() != tensor.len() {
            return Err(ShapeBackendError::RankMismatch {
                expected: tensor.len(),
                found: factors.len(),
            });
        }
        tensor
            .iter()
            .zip(factors)
            .map(|(size, factor)| match *factor {
                -1 => Ok(*size),
                f if f > 0 => size.checked_mul(f).ok_or_else(|| ShapeBackendError::Overflow {
                    sizes: tensor.clone(),
                }),
                f => Err(ShapeBackendError::InvalidFactor { factor: f }),
            })
            .collect()
    }
}
