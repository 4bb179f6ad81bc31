//! Dimension variables and their registry.
//!
//! A [`DimVar`] names one tensor axis (e.g. `Batch(b):20`). Its identity is its symbol: two
//! handles with the same symbol denote the same axis when matched inside shapes and
//! transforms. Handles are `Arc`-backed and therefore cheap to clone and share.
//!
//! The [`DimRegistry`] owns the symbol table of one session. Declarations are strict by
//! default: declaring an existing symbol fails with `AlreadyDeclared`. In relaxed mode the
//! symbol is overwritten; handles obtained before the overwrite keep their old size and can be
//! detected with [`DimRegistry::is_current`].
use std::{collections::BTreeMap, sync::Arc};

use log::{debug, info};
use parking_lot::RwLock;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::EnumIs;

use crate::error::{ShapeError, ShapeResult};
use crate::parser::parse_decls;

/// Plain description of a declaration: `Name(symbol):size`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DimDecl {
    pub name: String,
    pub symbol: String,
    pub size: Option<i64>,
}

impl std::fmt::Display for DimDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.symbol)?;
        if let Some(size) = self.size {
            write!(f, ":{size}")?;
        }
        Ok(())
    }
}

/// Policy applied when a declaration reuses an existing symbol.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, EnumIs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Strictness {
    /// Redeclaration fails with `AlreadyDeclared`.
    #[default]
    Strict,
    /// Redeclaration silently replaces the registered variable.
    Relaxed,
}

/// A declared dimension variable.
///
/// Equality, ordering and hashing only look at the symbol.
#[derive(Clone)]
pub struct DimVar(Arc<DimDecl>);

impl DimVar {
    pub fn new(decl: DimDecl) -> Self {
        Self(Arc::new(decl))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn symbol(&self) -> &str {
        &self.0.symbol
    }

    /// Default size carried by the declaration, if any.
    pub fn size(&self) -> Option<i64> {
        self.0.size
    }

    pub fn decl(&self) -> &DimDecl {
        &self.0
    }

    /// Whether both handles point to the very same declaration (not only the same symbol).
    pub fn same_instance(&self, other: &DimVar) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for DimVar {
    fn eq(&self, other: &Self) -> bool {
        self.symbol() == other.symbol()
    }
}

impl Eq for DimVar {}

impl PartialOrd for DimVar {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DimVar {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.symbol().cmp(other.symbol())
    }
}

impl std::hash::Hash for DimVar {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.symbol().hash(state)
    }
}

impl std::fmt::Debug for DimVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DimVar({})", self.0)
    }
}

impl std::fmt::Display for DimVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Symbol table of declared dimension variables.
///
/// # A note on concurrency
/// Declarations are stored behind a read-write lock, so every method takes `&self`. Lookups
/// may run concurrently; declarations are exclusive and atomic (a failing multi-declaration
/// registers nothing).
///
/// ```
/// use hyshape::dim::{DimRegistry, Strictness};
/// let reg = DimRegistry::new(Strictness::Strict);
/// let dims = reg.declare("Batch(b):20 SeqLength(t):10").unwrap();
/// assert_eq!(dims.len(), 2);
/// assert_eq!(reg.lookup("t").unwrap()[0].size(), Some(10));
/// assert!(reg.declare("Other(b):3").is_err());
/// ```
#[derive(Default)]
pub struct DimRegistry {
    decls: RwLock<BTreeMap<String, DimVar>>,
    strictness: Strictness,
}

impl DimRegistry {
    /// Create an empty registry applying `strictness` to [`Self::declare`].
    pub fn new(strictness: Strictness) -> Self {
        Self {
            decls: Default::default(),
            strictness,
        }
    }

    pub fn strictness(&self) -> Strictness {
        self.strictness
    }

    /// Declare the space separated variables of `spec` under the registry's policy.
    pub fn declare(&self, spec: &str) -> ShapeResult<Vec<DimVar>> {
        self.declare_with(spec, self.strictness)
    }

    /// Declare exactly one variable.
    pub fn declare_one(&self, spec: &str) -> ShapeResult<DimVar> {
        let mut dims = self.declare(spec)?;
        if dims.len() != 1 {
            return Err(ShapeError::ParseError {
                spec: spec.to_string(),
                errors: vec![format!("expected one declaration, found {}", dims.len())],
            });
        }
        Ok(dims.remove(0))
    }

    /// Declare the variables of `spec`, overriding the registry's policy.
    ///
    /// Declarations are processed left to right; a symbol repeated within `spec` is checked
    /// against the earlier occurrence exactly as against an older declaration.
    pub fn declare_with(&self, spec: &str, strictness: Strictness) -> ShapeResult<Vec<DimVar>> {
        let decls = parse_decls(spec)?;
        self.insert_all(spec, decls, strictness)
    }

    /// Register already parsed declarations.
    pub fn insert(&self, decl: DimDecl, strictness: Strictness) -> ShapeResult<DimVar> {
        let spec = decl.to_string();
        let mut dims = self.insert_all(&spec, vec![decl], strictness)?;
        Ok(dims.remove(0))
    }

    fn insert_all(
        &self,
        spec: &str,
        decls: Vec<DimDecl>,
        strictness: Strictness,
    ) -> ShapeResult<Vec<DimVar>> {
        let mut table = self.decls.write();

        if strictness.is_strict() {
            let mut seen: Vec<&str> = Vec::with_capacity(decls.len());
            for decl in &decls {
                if table.contains_key(&decl.symbol) || seen.contains(&decl.symbol.as_str()) {
                    return Err(ShapeError::AlreadyDeclared {
                        spec: spec.to_string(),
                        symbol: decl.symbol.clone(),
                    });
                }
                seen.push(&decl.symbol);
            }
        }

        let mut dims = Vec::with_capacity(decls.len());
        for decl in decls {
            let dim = DimVar::new(decl);
            match table.insert(dim.symbol().to_string(), dim.clone()) {
                Some(old) => info!("Dimension variable {old} overwritten by {dim}."),
                None => debug!("New dimension variable declared {dim}."),
            }
            dims.push(dim);
        }
        Ok(dims)
    }

    /// Retrieve the variables named by a space separated list of symbols.
    pub fn lookup(&self, symbols: &str) -> ShapeResult<Vec<DimVar>> {
        let table = self.decls.read();
        symbols
            .split_whitespace()
            .map(|symbol| {
                table
                    .get(symbol)
                    .cloned()
                    .ok_or_else(|| ShapeError::NotDeclared {
                        spec: symbols.to_string(),
                        symbol: symbol.to_string(),
                    })
            })
            .collect()
    }

    /// Retrieve a single variable, `None` if the symbol is unknown.
    pub fn get(&self, symbol: &str) -> Option<DimVar> {
        self.decls.read().get(symbol).cloned()
    }

    /// Replace the default sizes of declared variables, e.g. `"b:32 t:5"`.
    ///
    /// Names are kept. The previous handles become stale, as with a relaxed redeclaration.
    pub fn update_sizes(&self, spec: &str) -> ShapeResult<Vec<DimVar>> {
        let updates = parse_decls(spec)?;
        let mut table = self.decls.write();

        let mut dims = Vec::with_capacity(updates.len());
        for update in &updates {
            let current = table
                .get(&update.symbol)
                .ok_or_else(|| ShapeError::NotDeclared {
                    spec: spec.to_string(),
                    symbol: update.symbol.clone(),
                })?;
            dims.push(DimVar::new(DimDecl {
                name: current.name().to_string(),
                symbol: update.symbol.clone(),
                size: update.size,
            }));
        }

        for dim in &dims {
            debug!("Dimension variable {} resized.", dim);
            table.insert(dim.symbol().to_string(), dim.clone());
        }
        Ok(dims)
    }

    /// Whether `dim` is the instance currently registered under its symbol.
    pub fn is_current(&self, dim: &DimVar) -> bool {
        self.decls
            .read()
            .get(dim.symbol())
            .is_some_and(|registered| registered.same_instance(dim))
    }

    /// Registered symbols in lexicographic order.
    pub fn symbols(&self) -> Vec<String> {
        self.decls.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.decls.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.read().is_empty()
    }

    /// Copy of every registered declaration.
    pub fn snapshot(&self) -> Vec<DimDecl> {
        self.decls
            .read()
            .values()
            .map(|dim| dim.decl().clone())
            .collect()
    }
}
