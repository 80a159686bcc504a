//! Freshness validation and reconciliation of fetched catalogs.
//!
//! Large upstream listings occasionally come back truncated or empty under
//! transient conditions while still returning a success status. A
//! [`FreshnessValidator`] flags such a fetch as suspicious; the orchestrator
//! then [`reconcile`]s it with the previous snapshot instead of overwriting
//! a good cache with it.

use std::collections::BTreeSet;

use crate::types::Catalog;

/// Which previous ids a suspicious fetch must not drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preserve {
    /// Keep every previously known id missing from the fresh fetch.
    All,
    /// Keep only these ids.
    Only(BTreeSet<String>),
}

impl Preserve {
    /// Combine two preserve sets; `All` dominates.
    pub fn union(self, other: Preserve) -> Preserve {
        match (self, other) {
            (Preserve::All, _) | (_, Preserve::All) => Preserve::All,
            (Preserve::Only(mut a), Preserve::Only(b)) => {
                a.extend(b);
                Preserve::Only(a)
            }
        }
    }

    fn as_set(&self) -> Option<&BTreeSet<String>> {
        match self {
            Preserve::All => None,
            Preserve::Only(ids) => Some(ids),
        }
    }
}

/// Verdict on a freshly fetched catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    /// Store as-is.
    Accept,
    /// Merge with the previous snapshot, keeping `preserve`.
    Suspicious { preserve: Preserve },
}

impl Freshness {
    pub fn is_suspicious(&self) -> bool {
        matches!(self, Freshness::Suspicious { .. })
    }

    /// Combine two verdicts: suspicious if either is, preserving the union.
    pub fn and(self, other: Freshness) -> Freshness {
        match (self, other) {
            (Freshness::Accept, other) | (other, Freshness::Accept) => other,
            (Freshness::Suspicious { preserve: a }, Freshness::Suspicious { preserve: b }) => {
                Freshness::Suspicious {
                    preserve: a.union(b),
                }
            }
        }
    }
}

/// Provider-specific plausibility check for a fresh fetch.
pub trait FreshnessValidator: Send + Sync {
    /// Judge `fresh` given the previous snapshot, if any.
    fn check(&self, fresh: &Catalog, previous: Option<&Catalog>) -> Freshness;
}

/// Default policy: every fetch is believed.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl FreshnessValidator for AcceptAll {
    fn check(&self, _fresh: &Catalog, _previous: Option<&Catalog>) -> Freshness {
        Freshness::Accept
    }
}

/// Suspicious when fewer than `min` entries came back.
///
/// For providers known to return a large, stable catalog.
#[derive(Debug, Clone, Copy)]
pub struct MinEntries {
    pub min: usize,
}

impl MinEntries {
    pub fn new(min: usize) -> Self {
        Self { min }
    }
}

impl FreshnessValidator for MinEntries {
    fn check(&self, fresh: &Catalog, _previous: Option<&Catalog>) -> Freshness {
        if fresh.len() < self.min {
            Freshness::Suspicious {
                preserve: Preserve::All,
            }
        } else {
            Freshness::Accept
        }
    }
}

/// Suspicious when any pinned id is missing; preserves exactly the missing
/// pinned ids.
#[derive(Debug, Clone, Default)]
pub struct RequirePinned {
    pub ids: BTreeSet<String>,
}

impl RequirePinned {
    pub fn new(ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }
}

impl FreshnessValidator for RequirePinned {
    fn check(&self, fresh: &Catalog, _previous: Option<&Catalog>) -> Freshness {
        let missing: BTreeSet<String> = self
            .ids
            .iter()
            .filter(|id| !fresh.contains(id))
            .cloned()
            .collect();
        if missing.is_empty() {
            Freshness::Accept
        } else {
            Freshness::Suspicious {
                preserve: Preserve::Only(missing),
            }
        }
    }
}

/// Merge a fresh catalog with the previous snapshot.
///
/// Starts from `fresh`; every id in `preserve` (every previous id when
/// `None`) that exists in `previous` but not in `fresh` is copied over.
/// Entries present in `fresh` always win.
pub fn reconcile(
    previous: &Catalog,
    fresh: &Catalog,
    preserve: Option<&BTreeSet<String>>,
) -> Catalog {
    let mut merged = fresh.clone();
    for (id, record) in previous {
        let keep = preserve.is_none_or(|ids| ids.contains(id));
        if keep && !fresh.contains(id) {
            merged.insert(id.clone(), record.clone());
        }
    }
    merged
}

/// [`reconcile`] driven by a [`Preserve`] verdict.
pub(crate) fn reconcile_with(previous: &Catalog, fresh: &Catalog, preserve: &Preserve) -> Catalog {
    reconcile(previous, fresh, preserve.as_set())
}
