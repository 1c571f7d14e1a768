use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock};

/// How a [`RouteClassifier`] decides membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Full operation match, falling back to the final path segment.
    Exact,
    /// Any registered entry that prefixes the operation.
    Prefix,
}

/// Set of operations exempt from one admission check. Reads are concurrent;
/// writes are administrative and rare.
#[derive(Debug)]
pub struct RouteClassifier {
    mode: MatchMode,
    items: RwLock<BTreeSet<String>>,
}

fn normalize(op: &str) -> &str {
    op.strip_prefix('/').unwrap_or(op)
}

fn collect<I, S>(ops: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    ops.into_iter()
        .filter_map(|op| {
            let op = normalize(op.as_ref());
            (!op.is_empty()).then(|| op.to_string())
        })
        .collect()
}

impl RouteClassifier {
    pub fn new<I, S>(mode: MatchMode, ops: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            mode,
            items: RwLock::new(collect(ops)),
        }
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn add<I, S>(&self, ops: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let additions = collect(ops);
        let mut guard = self.items.write().unwrap_or_else(PoisonError::into_inner);
        guard.extend(additions);
        self
    }

    pub fn replace_all<I, S>(&self, ops: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let replacement = collect(ops);
        let mut guard = self.items.write().unwrap_or_else(PoisonError::into_inner);
        *guard = replacement;
        self
    }

    pub fn clear(&self) -> &Self {
        let mut guard = self.items.write().unwrap_or_else(PoisonError::into_inner);
        guard.clear();
        self
    }

    /// Entries in sorted order, for diagnostics.
    pub fn snapshot(&self) -> Vec<String> {
        let guard = self.items.read().unwrap_or_else(PoisonError::into_inner);
        guard.iter().cloned().collect()
    }

    /// Union of both classifiers, keeping this classifier's mode.
    pub fn merge(&self, other: &RouteClassifier) -> RouteClassifier {
        let mut items = self.items.read().unwrap_or_else(PoisonError::into_inner).clone();
        items.extend(
            other
                .items
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .cloned(),
        );
        RouteClassifier {
            mode: self.mode,
            items: RwLock::new(items),
        }
    }

    pub fn is_whitelisted(&self, operation: &str) -> bool {
        let op = normalize(operation);
        if op.is_empty() {
            return false;
        }
        let guard = self.items.read().unwrap_or_else(PoisonError::into_inner);
        match self.mode {
            MatchMode::Exact => {
                if guard.contains(op) {
                    return true;
                }
                match op.rsplit_once('/') {
                    Some((_, method)) if !method.is_empty() => guard.contains(method),
                    Some(_) => false,
                    // A bare method name matches a registered `Service/Method`.
                    None => guard
                        .iter()
                        .any(|entry| entry.rsplit_once('/').is_some_and(|(_, m)| m == op)),
                }
            }
            MatchMode::Prefix => guard.iter().any(|entry| op.starts_with(entry.as_str())),
        }
    }
}
