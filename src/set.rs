//! Thread-safe set of proxy identifiers.

use parking_lot::RwLock;
use rand::Rng;
use std::collections::HashSet;

/// A set of proxy identifiers guarded by a reader/writer lock.
///
/// Mutations (`add`, `remove`, `pick`) take the write lock; queries take the
/// read lock and may run concurrently with each other.
#[derive(Debug, Default)]
pub struct ProxySet {
    proxies: RwLock<HashSet<String>>,
}

impl ProxySet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a proxy. Returns `false` if it was already present.
    pub fn add(&self, proxy: impl Into<String>) -> bool {
        self.proxies.write().insert(proxy.into())
    }

    /// Remove a proxy. Returns `false` if it was not present.
    pub fn remove(&self, proxy: &str) -> bool {
        self.proxies.write().remove(proxy)
    }

    /// Whether the proxy is a member.
    pub fn contains(&self, proxy: &str) -> bool {
        self.proxies.read().contains(proxy)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.proxies.read().len()
    }

    /// Whether the set has no members.
    pub fn is_empty(&self) -> bool {
        self.proxies.read().is_empty()
    }

    /// Remove and return an arbitrary member, or `None` if the set is empty.
    pub fn pick(&self) -> Option<String> {
        let mut proxies = self.proxies.write();
        if proxies.is_empty() {
            return None;
        }

        let idx = rand::rng().random_range(0..proxies.len());
        let proxy = proxies.iter().nth(idx)?.clone();
        proxies.take(&proxy)
    }

    /// Return an arbitrary member without removing it.
    pub fn peek(&self) -> Option<String> {
        self.proxies.read().iter().next().cloned()
    }

    /// Point-in-time copy of all members.
    pub fn snapshot(&self) -> HashSet<String> {
        self.proxies.read().clone()
    }
}

impl<S: Into<String>> FromIterator<S> for ProxySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            proxies: RwLock::new(iter.into_iter().map(Into::into).collect()),
        }
    }
}
