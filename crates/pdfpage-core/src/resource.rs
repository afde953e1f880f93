//! Resource sub-dictionary catalogue and reference bookkeeping.
//!
//! A page's `/Resources` dictionary is split into sub-dictionaries by
//! resource kind. [`ResourceUsage`] records which names the content stream
//! actually uses, per kind, so unused entries can be pruned.

use std::collections::{BTreeMap, BTreeSet};

/// A `/Resources` sub-dictionary whose entries are referenced by name from
/// content stream operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResourceKind {
    /// `/ExtGState`, used by `gs`.
    ExtGState,
    /// `/ColorSpace`, used by `cs`, `CS`, and inline image `/CS`.
    ColorSpace,
    /// `/Pattern`, used by `scn` and `SCN`.
    Pattern,
    /// `/Shading`, used by `sh`.
    Shading,
    /// `/XObject`, used by `Do`.
    XObject,
    /// `/Font`, used by `Tf`.
    Font,
    /// `/Properties`, used by `BDC` and `DP`.
    Properties,
}

impl ResourceKind {
    /// Every kind, in the order sub-dictionaries are pruned.
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::ExtGState,
        ResourceKind::ColorSpace,
        ResourceKind::Pattern,
        ResourceKind::Shading,
        ResourceKind::XObject,
        ResourceKind::Font,
        ResourceKind::Properties,
    ];

    /// The sub-dictionary key under `/Resources`, without the leading `/`.
    pub fn key(self) -> &'static str {
        match self {
            ResourceKind::ExtGState => "ExtGState",
            ResourceKind::ColorSpace => "ColorSpace",
            ResourceKind::Pattern => "Pattern",
            ResourceKind::Shading => "Shading",
            ResourceKind::XObject => "XObject",
            ResourceKind::Font => "Font",
            ResourceKind::Properties => "Properties",
        }
    }

    /// Look up a kind by its sub-dictionary key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }
}

/// Names referenced by a content stream, grouped by resource kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceUsage {
    names: BTreeMap<ResourceKind, BTreeSet<String>>,
}

impl ResourceUsage {
    /// Create an empty usage record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `name` is used as a resource of `kind`.
    pub fn record(&mut self, kind: ResourceKind, name: impl Into<String>) {
        self.names.entry(kind).or_default().insert(name.into());
    }

    /// Returns true if `name` was recorded under `kind`.
    pub fn contains(&self, kind: ResourceKind, name: &str) -> bool {
        self.names.get(&kind).is_some_and(|set| set.contains(name))
    }

    /// Iterate the names recorded under `kind`, in sorted order.
    pub fn names(&self, kind: ResourceKind) -> impl Iterator<Item = &str> {
        self.names
            .get(&kind)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Total number of recorded (kind, name) pairs.
    pub fn len(&self) -> usize {
        self.names.values().map(BTreeSet::len).sum()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
