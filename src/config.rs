//! Configuration for the proxy pool.

use std::time::Duration;

/// Which lists are purged when the blacklist changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlacklistFilter {
    /// Only the fresh list is purged. Blacklisted proxies in the used list stay
    /// there and never come back through `return_proxy`.
    FreshOnly,
    /// Both the fresh and used lists are purged.
    FreshAndUsed,
}

/// Configuration for the proxy pool.
#[derive(Debug, Clone)]
pub struct ProxyPoolConfig {
    /// Source URLs or file paths to load proxy lists from.
    pub sources: Vec<String>,
    /// Period of the background recycle timer.
    pub recycle_interval: Duration,
    /// Usage count a used proxy may have and still be re-admitted on the first pass.
    pub initial_recycle_threshold: u64,
    /// A non-forced pass does nothing while the actual list holds more than this.
    pub actual_soft_limit: usize,
    /// A non-forced pass skips the used list while the actual list holds more than this.
    pub actual_hard_limit: usize,
    /// Lists purged on a blacklist change.
    pub blacklist_filter: BlacklistFilter,
}

impl ProxyPoolConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ProxyPoolConfigBuilder {
        ProxyPoolConfigBuilder::new()
    }
}

impl Default for ProxyPoolConfig {
    fn default() -> Self {
        ProxyPoolConfigBuilder::new().build()
    }
}

/// Builder for `ProxyPoolConfig`.
pub struct ProxyPoolConfigBuilder {
    sources: Vec<String>,
    recycle_interval: Option<Duration>,
    initial_recycle_threshold: Option<u64>,
    actual_soft_limit: Option<usize>,
    actual_hard_limit: Option<usize>,
    blacklist_filter: Option<BlacklistFilter>,
}

impl ProxyPoolConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            recycle_interval: None,
            initial_recycle_threshold: None,
            actual_soft_limit: None,
            actual_hard_limit: None,
            blacklist_filter: None,
        }
    }

    /// Set the source URLs or file paths to load proxy lists from.
    pub fn sources(mut self, sources: Vec<impl Into<String>>) -> Self {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }

    /// Set the period of the background recycle timer.
    pub fn recycle_interval(mut self, interval: Duration) -> Self {
        self.recycle_interval = Some(interval);
        self
    }

    /// Set the starting recycle threshold.
    pub fn initial_recycle_threshold(mut self, threshold: u64) -> Self {
        self.initial_recycle_threshold = Some(threshold);
        self
    }

    /// Set the actual list size above which non-forced passes do nothing.
    pub fn actual_soft_limit(mut self, limit: usize) -> Self {
        self.actual_soft_limit = Some(limit);
        self
    }

    /// Set the actual list size above which non-forced passes skip the used list.
    pub fn actual_hard_limit(mut self, limit: usize) -> Self {
        self.actual_hard_limit = Some(limit);
        self
    }

    /// Set which lists are purged on a blacklist change.
    pub fn blacklist_filter(mut self, filter: BlacklistFilter) -> Self {
        self.blacklist_filter = Some(filter);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ProxyPoolConfig {
        ProxyPoolConfig {
            sources: self.sources,
            recycle_interval: self.recycle_interval.unwrap_or(Duration::from_secs(15)),
            initial_recycle_threshold: self.initial_recycle_threshold.unwrap_or(3),
            actual_soft_limit: self.actual_soft_limit.unwrap_or(10),
            actual_hard_limit: self.actual_hard_limit.unwrap_or(20),
            blacklist_filter: self.blacklist_filter.unwrap_or(BlacklistFilter::FreshOnly),
        }
    }
}

impl Default for ProxyPoolConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
