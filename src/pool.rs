//! Core proxy pool implementation.

use crate::config::{BlacklistFilter, ProxyPoolConfig};
use crate::error::PoolError;
use crate::props::ProxyProps;
use crate::recycler::{Command, Recycler};
use crate::set::ProxySet;
use crate::utils;

use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Number of proxies held in each list of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolSummary {
    pub fresh: usize,
    pub actual: usize,
    pub used: usize,
    pub blacklisted: usize,
}

/// State shared between the pool handle and its recycle worker.
pub(crate) struct PoolState {
    fresh: ProxySet,
    actual: ProxySet,
    used: ProxySet,
    blacklist: ProxySet,
    /// Checkout count per proxy. Never reset.
    stats: RwLock<HashMap<String, u64>>,
    recycle_threshold: AtomicU64,
    /// Serializes recycle and filter passes.
    maintenance: Mutex<()>,
    config: ProxyPoolConfig,
}

impl PoolState {
    fn new(proxies: impl IntoIterator<Item = String>, config: ProxyPoolConfig) -> Self {
        Self {
            fresh: proxies.into_iter().collect(),
            actual: ProxySet::new(),
            used: ProxySet::new(),
            blacklist: ProxySet::new(),
            stats: RwLock::new(HashMap::new()),
            recycle_threshold: AtomicU64::new(config.initial_recycle_threshold),
            maintenance: Mutex::new(()),
            config,
        }
    }

    /// Move proxies into the actual list.
    ///
    /// Fresh proxies are always promoted; used proxies only while their usage
    /// count is at or below the recycle threshold, which rises by one after
    /// every pass that promotes a used proxy. Unless `force` is set, the pass
    /// stops early when the actual list is already well stocked.
    pub(crate) fn recycle(&self, force: bool) -> Result<(), PoolError> {
        let _guard = self.maintenance.lock();

        if !force && self.actual.len() > self.config.actual_soft_limit {
            return Ok(());
        }

        let mut promoted_fresh = 0;
        for proxy in self.fresh.snapshot() {
            // Skip proxies checked out since the snapshot.
            if self.fresh.remove(&proxy) {
                self.actual.add(proxy);
                promoted_fresh += 1;
            }
        }

        if !force && self.actual.len() > self.config.actual_hard_limit {
            debug!("Recycled {} fresh proxies", promoted_fresh);
            return Ok(());
        }

        if self.used.is_empty() {
            if self.actual.is_empty() {
                return Err(PoolError::EmptyUsedList);
            }
            debug!("Recycled {} fresh proxies, used list empty", promoted_fresh);
            return Ok(());
        }

        let threshold = self.recycle_threshold.load(Ordering::Acquire);
        let stats = self.stats.read().clone();

        let mut promoted_used = 0;
        for proxy in self.used.snapshot() {
            let eligible = stats.get(&proxy).map_or(true, |&count| count <= threshold);
            if eligible && self.used.remove(&proxy) {
                self.actual.add(proxy);
                promoted_used += 1;
            }
        }

        if promoted_used > 0 {
            self.recycle_threshold.fetch_add(1, Ordering::AcqRel);
        }

        debug!(
            "Recycled {} fresh and {} used proxies (threshold {}, {} still parked)",
            promoted_fresh,
            promoted_used,
            threshold,
            self.used.len()
        );

        Ok(())
    }

    /// Drop blacklisted proxies from the lists selected by the config.
    /// Returns how many were removed.
    pub(crate) fn filter_blacklisted(&self) -> usize {
        let _guard = self.maintenance.lock();

        let mut removed = purge(&self.fresh, &self.blacklist);
        if self.config.blacklist_filter == BlacklistFilter::FreshAndUsed {
            removed += purge(&self.used, &self.blacklist);
        }
        removed
    }
}

fn purge(list: &ProxySet, blacklist: &ProxySet) -> usize {
    list.snapshot()
        .into_iter()
        .filter(|proxy| blacklist.contains(proxy) && list.remove(proxy))
        .count()
}

/// A rotating pool of proxies.
///
/// Proxies start in the fresh list, are handed out by [`get_proxy`](Self::get_proxy),
/// come back through [`return_proxy`](Self::return_proxy) into the used list, and
/// are moved back into rotation by recycle passes.
pub struct ProxyPool {
    state: Arc<PoolState>,
    recycler: Mutex<Option<Recycler>>,
}

impl ProxyPool {
    /// Create a pool with the default configuration. All proxies start fresh.
    pub fn new<I, S>(proxies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_config(proxies, ProxyPoolConfig::default())
    }

    /// Create a pool with the given configuration. All proxies start fresh.
    pub fn with_config<I, S>(proxies: I, config: ProxyPoolConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let proxies = proxies.into_iter().map(Into::into).filter(|p: &String| !p.is_empty());

        Self {
            state: Arc::new(PoolState::new(proxies, config)),
            recycler: Mutex::new(None),
        }
    }

    /// Create a pool from the proxy lists named in `config.sources`.
    ///
    /// Sources that fail to load are skipped with a warning.
    pub async fn from_sources(config: ProxyPoolConfig) -> Self {
        info!("Initializing proxy pool from {} sources", config.sources.len());

        let mut all_proxies = HashSet::new();

        for source in &config.sources {
            match utils::load_proxies_from_source(source).await {
                Ok(source_proxies) => {
                    info!("Loaded {} proxies from {}", source_proxies.len(), source);
                    all_proxies.extend(source_proxies);
                }
                Err(e) => {
                    warn!("Failed to load proxies from {}: {}", source, e);
                }
            }
        }

        info!("Found {} unique proxies", all_proxies.len());

        Self::with_config(all_proxies, config)
    }

    /// Check out a proxy, preferring the actual list over the fresh one.
    ///
    /// When both are empty a recycle is requested from the running worker and
    /// `NoAvailableProxy` is returned straight away; call again later.
    pub fn get_proxy(&self) -> Result<String, PoolError> {
        let picked = self.state.actual.pick().or_else(|| self.state.fresh.pick());

        match picked {
            Some(proxy) => {
                *self.state.stats.write().entry(proxy.clone()).or_insert(0) += 1;
                Ok(proxy)
            }
            None => {
                self.notify(Command::ForceRecycle);
                Err(PoolError::NoAvailableProxy)
            }
        }
    }

    /// Give a checked-out proxy back. Blacklisted proxies are dropped.
    pub fn return_proxy(&self, proxy: impl Into<String>) {
        let proxy = proxy.into();
        if proxy.is_empty() || self.state.blacklist.contains(&proxy) {
            return;
        }
        self.state.used.add(proxy);
    }

    /// Add a proxy discovered after construction.
    ///
    /// Proxies that were never checked out go to the fresh list; known ones go
    /// straight back into rotation. Proxies already held by the pool are ignored.
    pub fn add_proxy(&self, proxy: impl Into<String>) {
        let proxy = proxy.into();
        if proxy.is_empty() {
            return;
        }

        let state = &self.state;
        if state.fresh.contains(&proxy)
            || state.actual.contains(&proxy)
            || state.used.contains(&proxy)
        {
            debug!("Proxy {} already in pool", proxy);
            return;
        }

        let known = state.stats.read().contains_key(&proxy);
        if known {
            state.actual.add(proxy);
        } else {
            state.fresh.add(proxy);
        }
    }

    /// Exclude a proxy from rotation and ask the worker to purge it.
    pub fn blacklist_proxy(&self, proxy: impl Into<String>) {
        let proxy = proxy.into();
        info!("Blacklisting proxy {}", proxy);
        self.state.blacklist.add(proxy);
        self.notify(Command::BlacklistChanged);
    }

    /// Snapshot of checkout counts per proxy.
    pub fn stats(&self) -> HashMap<String, u64> {
        self.state.stats.read().clone()
    }

    /// Run a recycle pass on the calling thread.
    pub fn recycle(&self, force: bool) -> Result<(), PoolError> {
        self.state.recycle(force)
    }

    /// Run a blacklist filter pass on the calling thread.
    pub fn filter_blacklisted(&self) -> usize {
        self.state.filter_blacklisted()
    }

    /// Start the background recycle worker on the current Tokio runtime.
    pub fn start_recycle(&self) -> Result<(), PoolError> {
        let mut recycler = self.recycler.lock();
        if recycler.is_some() {
            return Err(PoolError::AlreadyStarted);
        }

        *recycler = Some(Recycler::spawn(
            Arc::clone(&self.state),
            self.state.config.recycle_interval,
        )?);
        Ok(())
    }

    /// Stop the background recycle worker. Returns whether one was running.
    pub fn stop_recycle(&self) -> bool {
        match self.recycler.lock().take() {
            Some(recycler) => {
                recycler.shutdown();
                true
            }
            None => false,
        }
    }

    /// Whether the background recycle worker is running.
    pub fn is_recycling(&self) -> bool {
        self.recycler.lock().is_some()
    }

    /// Current usage ceiling for re-admitting used proxies.
    pub fn recycle_threshold(&self) -> u64 {
        self.state.recycle_threshold.load(Ordering::Acquire)
    }

    /// Get the size of each list in the pool.
    pub fn summary(&self) -> PoolSummary {
        PoolSummary {
            fresh: self.state.fresh.len(),
            actual: self.state.actual.len(),
            used: self.state.used.len(),
            blacklisted: self.state.blacklist.len(),
        }
    }

    /// Property flags the pool knows for a proxy.
    pub fn props(&self, proxy: &str) -> ProxyProps {
        let mut props = ProxyProps::empty();
        props.set(ProxyProps::BLACKLISTED, self.state.blacklist.contains(proxy));
        props
    }

    /// Configuration the pool was built with.
    pub fn config(&self) -> &ProxyPoolConfig {
        &self.state.config
    }

    fn notify(&self, command: Command) {
        match self.recycler.lock().as_ref() {
            Some(recycler) => {
                recycler.notify(command);
            }
            None => debug!("Recycler not running, dropping {:?}", command),
        }
    }
}

impl Drop for ProxyPool {
    fn drop(&mut self) {
        self.stop_recycle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> ProxyPool {
        ProxyPool::new(["p1:80", "p2:80", "p3:80"])
    }

    #[test]
    fn new_pool_starts_fresh() {
        let pool = pool();
        assert_eq!(
            pool.summary(),
            PoolSummary {
                fresh: 3,
                actual: 0,
                used: 0,
                blacklisted: 0
            }
        );
        assert_eq!(pool.recycle_threshold(), 3);
        assert!(pool.stats().is_empty());
    }

    #[test]
    fn forced_recycle_moves_fresh_to_actual() {
        let pool = pool();
        pool.recycle(true).unwrap();

        let summary = pool.summary();
        assert_eq!(summary.actual, 3);
        assert_eq!(summary.fresh, 0);
        // Nothing came out of the used list.
        assert_eq!(pool.recycle_threshold(), 3);
    }

    #[test]
    fn checkout_counts_usage() {
        let pool = pool();

        let first = pool.get_proxy().unwrap();
        assert_eq!(pool.stats().get(&first), Some(&1));

        pool.return_proxy(first.clone());
        pool.recycle(true).unwrap();
        while pool.get_proxy().ok().as_ref() != Some(&first) {}
        assert_eq!(pool.stats().get(&first), Some(&2));
    }

    #[test]
    fn checkout_prefers_actual() {
        let pool = ProxyPool::new(["p1:80"]);
        pool.recycle(true).unwrap();
        pool.add_proxy("p2:80");

        assert_eq!(pool.summary().fresh, 1);
        assert_eq!(pool.get_proxy().unwrap(), "p1:80");
        assert_eq!(pool.get_proxy().unwrap(), "p2:80");
    }

    #[test]
    fn exhausted_pool_reports_no_proxy() {
        let pool = ProxyPool::new(Vec::<String>::new());
        assert!(matches!(pool.get_proxy(), Err(PoolError::NoAvailableProxy)));
    }

    #[test]
    fn blacklisted_proxy_is_not_requeued() {
        let pool = pool();
        pool.blacklist_proxy("p1:80");
        pool.return_proxy("p1:80");

        assert_eq!(pool.summary().used, 0);
        assert_eq!(pool.summary().blacklisted, 1);
        assert!(pool.props("p1:80").contains(ProxyProps::BLACKLISTED));
        assert!(!pool.props("p2:80").contains(ProxyProps::BLACKLISTED));
    }

    #[test]
    fn empty_return_is_ignored() {
        let pool = pool();
        pool.return_proxy("");
        assert_eq!(pool.summary().used, 0);
    }

    #[test]
    fn add_routes_known_proxies_to_actual() {
        let pool = ProxyPool::new(["p1:80"]);
        let proxy = pool.get_proxy().unwrap();

        pool.add_proxy(proxy);
        pool.add_proxy("p9:80");

        let summary = pool.summary();
        assert_eq!(summary.actual, 1);
        assert_eq!(summary.fresh, 1);
    }

    #[test]
    fn add_ignores_proxies_already_held() {
        let pool = pool();
        pool.add_proxy("p1:80");
        pool.add_proxy("");
        assert_eq!(pool.summary().fresh, 3);
    }

    #[test]
    fn recycle_fails_when_everything_is_checked_out() {
        let pool = ProxyPool::new(["p1:80"]);
        pool.get_proxy().unwrap();

        assert!(matches!(pool.recycle(false), Err(PoolError::EmptyUsedList)));
        assert!(matches!(pool.recycle(true), Err(PoolError::EmptyUsedList)));
    }

    #[test]
    fn recycle_with_empty_used_but_stocked_actual_succeeds() {
        let pool = pool();
        pool.recycle(true).unwrap();
        assert!(pool.recycle(true).is_ok());
        assert_eq!(pool.recycle_threshold(), 3);
    }

    #[test]
    fn threshold_rises_after_each_promoting_pass() {
        let config = ProxyPoolConfig::builder().initial_recycle_threshold(1).build();
        let pool = ProxyPool::with_config(["hot:80", "cold:80"], config);

        // hot: two checkouts, cold: one.
        pool.recycle(true).unwrap();
        let a = pool.get_proxy().unwrap();
        let b = pool.get_proxy().unwrap();
        let (hot, cold) = if a == "hot:80" { (a, b) } else { (b, a) };
        pool.return_proxy(hot.clone());
        pool.recycle(true).unwrap();
        assert_eq!(pool.get_proxy().unwrap(), hot);
        pool.return_proxy(hot.clone());
        pool.return_proxy(cold.clone());
        assert_eq!(pool.stats()[&hot], 2);
        assert_eq!(pool.stats()[&cold], 1);

        assert_eq!(pool.recycle_threshold(), 2);

        pool.recycle(true).unwrap();
        assert_eq!(pool.summary().used, 0);
        assert_eq!(pool.recycle_threshold(), 3);
    }

    #[test]
    fn proxy_above_threshold_is_left_in_used() {
        let config = ProxyPoolConfig::builder().initial_recycle_threshold(1).build();
        let pool = ProxyPool::with_config(["hot:80"], config);

        for _ in 0..2 {
            let proxy = pool.get_proxy().unwrap();
            pool.add_proxy(proxy);
        }
        let proxy = pool.get_proxy().unwrap();
        pool.return_proxy(proxy);
        assert_eq!(pool.stats()["hot:80"], 3);

        // Count 3 > threshold 1: nothing promoted, threshold unchanged.
        pool.recycle(true).unwrap();
        assert_eq!(pool.summary().used, 1);
        assert_eq!(pool.summary().actual, 0);
        assert_eq!(pool.recycle_threshold(), 1);
    }

    #[test]
    fn parked_proxy_returns_once_threshold_reaches_its_count() {
        let config = ProxyPoolConfig::builder().initial_recycle_threshold(1).build();
        let pool = ProxyPool::with_config(["hot:80"], config);

        for _ in 0..2 {
            let proxy = pool.get_proxy().unwrap();
            pool.add_proxy(proxy);
        }
        pool.return_proxy(pool.get_proxy().unwrap());
        pool.recycle(true).unwrap();
        assert!(pool.state.used.contains("hot:80"));

        // Each pass re-admitting cold raises the threshold by one.
        pool.add_proxy("cold:80");
        for expected in 2..=3 {
            let cold = pool.get_proxy().unwrap();
            assert_eq!(cold, "cold:80");
            pool.return_proxy(cold);
            pool.recycle(true).unwrap();
            assert_eq!(pool.recycle_threshold(), expected);
            assert!(pool.state.used.contains("hot:80"));
        }

        // The pass at threshold 3 admits hot with its count of 3.
        pool.return_proxy(pool.get_proxy().unwrap());
        pool.recycle(true).unwrap();
        assert_eq!(pool.stats()["hot:80"], 3);
        assert!(pool.state.actual.contains("hot:80"));
        assert_eq!(pool.summary().used, 0);
        assert_eq!(pool.recycle_threshold(), 4);
    }

    #[test]
    fn unforced_recycle_skips_when_actual_is_stocked() {
        let proxies: Vec<String> = (0..11).map(|i| format!("10.0.0.{}:80", i)).collect();
        let pool = ProxyPool::new(proxies);
        pool.recycle(true).unwrap();
        pool.add_proxy("10.0.1.1:80");

        pool.recycle(false).unwrap();
        assert_eq!(pool.summary().fresh, 1);

        pool.recycle(true).unwrap();
        assert_eq!(pool.summary().fresh, 0);
    }

    #[test]
    fn unforced_recycle_stops_after_fresh_when_above_hard_limit() {
        let proxies: Vec<String> = (0..22).map(|i| format!("10.0.0.{}:80", i)).collect();
        let pool = ProxyPool::new(proxies);

        let proxy = pool.get_proxy().unwrap();
        pool.return_proxy(proxy);

        pool.recycle(false).unwrap();
        let summary = pool.summary();
        assert_eq!(summary.fresh, 0);
        assert_eq!(summary.actual, 21);
        assert_eq!(summary.used, 1);

        pool.recycle(false).unwrap();
        assert_eq!(pool.summary().used, 1);

        pool.recycle(true).unwrap();
        assert_eq!(pool.summary().actual, 22);
        assert_eq!(pool.recycle_threshold(), 4);
    }

    #[test]
    fn filter_removes_blacklisted_fresh_only_by_default() {
        let pool = pool();
        let proxy = pool.get_proxy().unwrap();
        pool.return_proxy(proxy.clone());

        let fresh_victim = pool.state.fresh.peek().unwrap();
        pool.blacklist_proxy(fresh_victim.clone());
        pool.blacklist_proxy(proxy.clone());

        assert_eq!(pool.filter_blacklisted(), 1);
        assert!(!pool.state.fresh.contains(&fresh_victim));
        assert!(pool.state.used.contains(&proxy));
    }

    #[test]
    fn filter_can_purge_used_too() {
        let config = ProxyPoolConfig::builder()
            .blacklist_filter(BlacklistFilter::FreshAndUsed)
            .build();
        let pool = ProxyPool::with_config(["p1:80", "p2:80"], config);
        let proxy = pool.get_proxy().unwrap();
        pool.return_proxy(proxy.clone());
        pool.blacklist_proxy(proxy.clone());

        assert_eq!(pool.filter_blacklisted(), 1);
        assert_eq!(pool.summary().used, 0);
        assert_eq!(pool.summary().fresh, 1);
    }

    #[test]
    fn signals_without_worker_do_not_block() {
        let pool = ProxyPool::new(Vec::<String>::new());
        assert!(pool.get_proxy().is_err());
        pool.blacklist_proxy("p1:80");
        assert!(!pool.stop_recycle());
        assert!(!pool.is_recycling());
    }

    #[test]
    fn start_outside_runtime_fails() {
        let pool = pool();
        assert!(matches!(pool.start_recycle(), Err(PoolError::NoRuntime(_))));
        assert!(!pool.is_recycling());
    }
}
