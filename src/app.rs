//! Process-wide dispatch state.
//!
//! # Responsibilities
//! - Own the default router and the per-domain routers
//! - Hold the three middleware phases
//! - Create the firewall on first use
//! - Pick a router for each inbound request by host
//!
//! # Design Decisions
//! - Explicitly constructed and passed around; several apps can coexist
//! - Each middleware phase has its own lock; readers take an `Arc` snapshot,
//!   writers copy on write, so a dispatch sees the old or new list in full
//! - Routers hold a `Weak<App>` back-reference

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::DispatchConfig;
use crate::context::{Context, ContextPool};
use crate::http::Exchange;
use crate::routing::Router;
use crate::security::{Firewall, FirewallSettings};

/// A request transform run around the handler.
pub type Middleware = Arc<dyn Fn(&mut Context) + Send + Sync>;

/// Middleware phases, in execution order around the firewall and handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Before the firewall.
    Pre,
    /// After the firewall, before the handler.
    Main,
    /// After the handler; always runs.
    AfterRequest,
}

type MiddlewareList = RwLock<Arc<Vec<Middleware>>>;

/// Container for routers, middlewares and the firewall.
pub struct App {
    me: Weak<App>,
    default_router: Arc<Router>,
    domains: RwLock<HashMap<String, Arc<Router>>>,
    pre_middlewares: MiddlewareList,
    middlewares: MiddlewareList,
    after_request: MiddlewareList,
    firewall: OnceLock<Firewall>,
    firewall_settings: Arc<FirewallSettings>,
    pool: ContextPool,
    seed: u64,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("default_router", &self.default_router)
            .field("firewall_settings", &self.firewall_settings)
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

impl App {
    /// Create an app with the firewall disabled.
    pub fn new() -> Arc<Self> {
        Self::with_parts(Arc::new(FirewallSettings::default()), ContextPool::default())
    }

    /// Create an app from a loaded configuration.
    pub fn from_config(config: &DispatchConfig) -> Arc<Self> {
        Self::with_parts(
            Arc::new(FirewallSettings::from_config(&config.firewall)),
            ContextPool::with_capacity(config.pool.capacity),
        )
    }

    /// Create an app sharing `settings` with the caller.
    pub fn with_firewall_settings(settings: Arc<FirewallSettings>) -> Arc<Self> {
        Self::with_parts(settings, ContextPool::default())
    }

    fn with_parts(firewall_settings: Arc<FirewallSettings>, pool: ContextPool) -> Arc<Self> {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::from(d.subsec_nanos()) ^ d.as_secs())
            .unwrap_or_default();

        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            default_router: Arc::new(Router::new(me.clone())),
            domains: RwLock::new(HashMap::new()),
            pre_middlewares: RwLock::default(),
            middlewares: RwLock::default(),
            after_request: RwLock::default(),
            firewall: OnceLock::new(),
            firewall_settings,
            pool,
            seed,
        })
    }

    // --- Routers ---

    /// The router used when no domain matches.
    pub fn router(&self) -> &Arc<Router> {
        &self.default_router
    }

    /// Router for `host`, created on first use.
    pub fn domain(&self, host: &str) -> Arc<Router> {
        let key = host.trim().to_ascii_lowercase();
        if let Some(router) = self.read_domains().get(&key) {
            return router.clone();
        }

        let mut domains = self.domains.write().unwrap_or_else(PoisonError::into_inner);
        domains
            .entry(key)
            .or_insert_with(|| Arc::new(Router::new(self.me.clone())))
            .clone()
    }

    /// Router serving requests addressed to `host`.
    ///
    /// Tries the exact host, then the host without its port, then falls back
    /// to the default router.
    pub fn router_for(&self, host: Option<&str>) -> Arc<Router> {
        let Some(host) = host.map(|h| h.trim().to_ascii_lowercase()) else {
            return self.default_router.clone();
        };

        let domains = self.read_domains();
        domains
            .get(&host)
            .or_else(|| strip_port(&host).and_then(|bare| domains.get(bare)))
            .cloned()
            .unwrap_or_else(|| self.default_router.clone())
    }

    fn read_domains(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<Router>>> {
        self.domains.read().unwrap_or_else(PoisonError::into_inner)
    }

    // --- Middlewares ---

    /// Append a middleware to `phase`.
    pub fn use_phase<F>(&self, phase: Phase, middleware: F)
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        let mut list = self
            .phase_list(phase)
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::make_mut(&mut list).push(Arc::new(middleware));
    }

    /// Run before the firewall check.
    pub fn use_pre<F>(&self, middleware: F)
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.use_phase(Phase::Pre, middleware);
    }

    /// Run after the firewall check, before the handler.
    pub fn use_middleware<F>(&self, middleware: F)
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.use_phase(Phase::Main, middleware);
    }

    /// Run after the handler.
    pub fn use_after_request<F>(&self, middleware: F)
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.use_phase(Phase::AfterRequest, middleware);
    }

    /// Snapshot of the middlewares registered for `phase`.
    pub fn middlewares(&self, phase: Phase) -> Arc<Vec<Middleware>> {
        self.phase_list(phase)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn phase_list(&self, phase: Phase) -> &MiddlewareList {
        match phase {
            Phase::Pre => &self.pre_middlewares,
            Phase::Main => &self.middlewares,
            Phase::AfterRequest => &self.after_request,
        }
    }

    // --- Firewall ---

    /// The firewall, created on first call.
    pub fn firewall(&self) -> &Firewall {
        self.firewall.get_or_init(|| {
            tracing::debug!(
                max_req_per_min = self.firewall_settings.max_req_per_min(),
                block_timeout_secs = self.firewall_settings.block_timeout_secs(),
                "Initializing firewall"
            );
            Firewall::new(self.firewall_settings.clone(), self.seed)
        })
    }

    /// Live thresholds; changes apply to the next request.
    pub fn firewall_settings(&self) -> &Arc<FirewallSettings> {
        &self.firewall_settings
    }

    pub fn max_hack_attempts(&self) -> i32 {
        self.firewall_settings.max_hack_attempts()
    }

    pub fn set_max_hack_attempts(&self, value: i32) {
        self.firewall_settings.set_max_hack_attempts(value);
    }

    // --- Dispatch ---

    /// Route one request to its domain router and run it.
    pub fn handle(&self, exchange: Exchange) -> Exchange {
        if exchange.has_malformed_host() {
            let client = exchange.client_id();
            tracing::warn!(client = %client, "Malformed Host header");
            self.firewall().record_hack_attempt(&client);
        }

        self.router_for(exchange.host()).dispatch(exchange)
    }

    pub fn pool(&self) -> &ContextPool {
        &self.pool
    }

    /// Non-cryptographic seed fixed at construction.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

fn strip_port(host: &str) -> Option<&str> {
    let (bare, port) = host.rsplit_once(':')?;
    let bracketed_or_plain = bare.ends_with(']') || !bare.contains(':');
    (bracketed_or_plain && !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit())).then_some(bare)
}
