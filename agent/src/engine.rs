//! Engine state shared by every handler
//!
//! One `Engine` holds the filter, the correlation store, the triggers and
//! the host facilities. Handlers receive it by shared reference; all mutable
//! state behind it is atomic.

use std::sync::Arc;

use hookwatch_shared::CategoryMask;
use tracing::info;

use crate::config::Config;
use crate::correlation::CorrelationStore;
use crate::filter::CategoryFilter;
use crate::host::caps::CapsFacility;
use crate::host::procfs::ProcfsSocketResolver;
use crate::host::sink::TracingSink;
use crate::host::spawn::CommandSpawner;
use crate::host::{CapabilityFacility, EventSink, ProcessSpawner, SocketResolver};
use crate::reporter::Reporter;
use crate::triggers::{AnalyzeFilter, ExecuteTrigger, RestartTrigger};

pub struct Engine {
    reporter: Reporter,
    bind_calls: CorrelationStore,
    execute: ExecuteTrigger,
    restart: RestartTrigger,
    analyze: AnalyzeFilter,
    max_arg_strings: usize,
    spawner: Arc<dyn ProcessSpawner>,
    capabilities: Arc<dyn CapabilityFacility>,
    sockets: Arc<dyn SocketResolver>,
}

impl Engine {
    /// Engine wired to the live process facilities
    pub fn new(config: &Config) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: &Config) -> EngineBuilder {
        EngineBuilder {
            config: config.clone(),
            sink: None,
            spawner: None,
            capabilities: None,
            sockets: None,
        }
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Pending `sys_bind` calls, keyed by caller
    pub fn bind_calls(&self) -> &CorrelationStore {
        &self.bind_calls
    }

    pub fn execute(&self) -> &ExecuteTrigger {
        &self.execute
    }

    pub fn restart(&self) -> &RestartTrigger {
        &self.restart
    }

    pub fn analyze(&self) -> &AnalyzeFilter {
        &self.analyze
    }

    pub fn max_arg_strings(&self) -> usize {
        self.max_arg_strings
    }

    pub fn spawner(&self) -> &dyn ProcessSpawner {
        self.spawner.as_ref()
    }

    pub fn capabilities(&self) -> &dyn CapabilityFacility {
        self.capabilities.as_ref()
    }

    pub fn sockets(&self) -> &dyn SocketResolver {
        self.sockets.as_ref()
    }

    /// Operator controls
    pub fn control(&self) -> Control<'_> {
        Control { engine: self }
    }
}

pub struct EngineBuilder {
    config: Config,
    sink: Option<Arc<dyn EventSink>>,
    spawner: Option<Arc<dyn ProcessSpawner>>,
    capabilities: Option<Arc<dyn CapabilityFacility>>,
    sockets: Option<Arc<dyn SocketResolver>>,
}

impl EngineBuilder {
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn spawner(mut self, spawner: Arc<dyn ProcessSpawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    pub fn capabilities(mut self, capabilities: Arc<dyn CapabilityFacility>) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    pub fn sockets(mut self, sockets: Arc<dyn SocketResolver>) -> Self {
        self.sockets = Some(sockets);
        self
    }

    pub fn build(self) -> Engine {
        let config = self.config;

        let execute = ExecuteTrigger::new(
            config.execute_threshold,
            config.recovery_path,
            config.spawn_env.clone(),
        );
        if config.execute_armed {
            execute.arm();
        }

        Engine {
            reporter: Reporter::new(
                CategoryFilter::new(config.mask),
                self.sink.unwrap_or_else(|| Arc::new(TracingSink)),
            ),
            bind_calls: CorrelationStore::with_capacity(config.correlation_capacity),
            execute,
            restart: RestartTrigger::new(config.restart_enabled, config.init_path, config.spawn_env),
            analyze: AnalyzeFilter::default(),
            max_arg_strings: config.max_arg_strings,
            spawner: self.spawner.unwrap_or_else(|| Arc::new(CommandSpawner)),
            capabilities: self.capabilities.unwrap_or_else(|| Arc::new(CapsFacility)),
            sockets: self
                .sockets
                .unwrap_or_else(|| Arc::new(ProcfsSocketResolver::default())),
        }
    }
}

/// Operator control surface
///
/// Every setter takes effect for the next handler invocation.
pub struct Control<'a> {
    engine: &'a Engine,
}

impl Control<'_> {
    pub fn mask(&self) -> CategoryMask {
        self.engine.reporter.filter().mask()
    }

    pub fn set_mask(&self, mask: CategoryMask) {
        self.engine.reporter.filter().set_mask(mask);
        info!("Category mask set to {}", mask);
    }

    pub fn restart_enabled(&self) -> bool {
        self.engine.restart.is_enabled()
    }

    pub fn set_restart_enabled(&self, enabled: bool) {
        self.engine.restart.set_enabled(enabled);
        info!("Privileged restart {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn arm_execute(&self) {
        self.engine.execute.arm();
        info!("Execute trigger armed");
    }

    pub fn disarm_execute(&self) {
        self.engine.execute.disarm();
        info!("Execute trigger disarmed");
    }

    pub fn reset_execute_counter(&self) {
        self.engine.execute.reset();
    }
}
