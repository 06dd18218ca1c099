//! System configuration with sensible defaults.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use crate::ask::AskOptions;
use crate::directory::DirectoryConfig;
use crate::mailbox::MailboxConfig;
use crate::util::{duration_serde, Address};

/// Default node name for single-process systems.
pub const DEFAULT_NODE_ADDRESS: &str = "local";

/// Default deadline when waiting for an actor or the system to stop.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// What a send to a stopped actor does.
///
/// The loud default surfaces wiring bugs; best-effort pipelines can opt
/// into silent drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StoppedSendPolicy {
    /// Fail the send with `SendError::ActorStopped`
    #[default]
    Fail,

    /// Drop the envelope silently
    DropSilently,
}

/// System-wide configuration.
///
/// # Examples
///
/// ```rust
/// use locus_rt::system::SystemConfig;
///
/// let config = SystemConfig::default();
/// assert_eq!(config.node_address, "local");
///
/// let config = SystemConfig::builder()
///     .with_node_address("node-a")
///     .with_max_actors(100)
///     .with_virtual_clock(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_actors, 100);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Node name used in every address this system mints
    pub node_address: String,

    /// Verbose diagnostics
    pub debug: bool,

    /// Maximum concurrent actors (0 = unlimited)
    pub max_actors: usize,

    /// Collect runtime metrics and register the metrics interceptor
    pub enable_metrics: bool,

    /// Default mailbox configuration for spawned actors
    pub mailbox: MailboxConfig,

    /// Default ask options
    pub ask: AskOptions,

    /// Directory cache configuration
    pub directory: DirectoryConfig,

    /// Behaviour of sends to stopped actors
    pub stopped_send: StoppedSendPolicy,

    /// Run the timer on a virtual clock (test mode)
    pub virtual_clock: bool,

    /// Deadline when waiting for actors to stop
    #[serde(with = "duration_serde")]
    pub stop_timeout: Duration,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            node_address: DEFAULT_NODE_ADDRESS.to_string(),
            debug: false,
            max_actors: 0,
            enable_metrics: false,
            mailbox: MailboxConfig::default(),
            ask: AskOptions::default(),
            directory: DirectoryConfig::default(),
            stopped_send: StoppedSendPolicy::default(),
            virtual_clock: false,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

impl SystemConfig {
    /// Create a configuration builder.
    pub fn builder() -> SystemConfigBuilder {
        SystemConfigBuilder::default()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        Address::new(&self.node_address, "system", "events")
            .map_err(|e| format!("node_address: {e}"))?;
        self.mailbox
            .validate()
            .map_err(|e| format!("mailbox: {e}"))?;
        if self.stop_timeout.is_zero() {
            return Err("stop_timeout must be > 0".to_string());
        }
        Ok(())
    }
}

/// Builder for [`SystemConfig`].
#[derive(Debug, Default)]
pub struct SystemConfigBuilder {
    config: SystemConfig,
}

impl SystemConfigBuilder {
    /// Set the node name.
    pub fn with_node_address(mut self, node_address: impl Into<String>) -> Self {
        self.config.node_address = node_address.into();
        self
    }

    /// Enable verbose diagnostics.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Set the maximum number of concurrent actors (0 = unlimited).
    pub fn with_max_actors(mut self, max_actors: usize) -> Self {
        self.config.max_actors = max_actors;
        self
    }

    /// Enable runtime metrics collection.
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.config.enable_metrics = enabled;
        self
    }

    /// Set the default mailbox configuration.
    pub fn with_mailbox(mut self, mailbox: MailboxConfig) -> Self {
        self.config.mailbox = mailbox;
        self
    }

    /// Set the default ask options.
    pub fn with_ask_defaults(mut self, ask: AskOptions) -> Self {
        self.config.ask = ask;
        self
    }

    /// Set the directory configuration.
    pub fn with_directory(mut self, directory: DirectoryConfig) -> Self {
        self.config.directory = directory;
        self
    }

    /// Set the stopped-send policy.
    pub fn with_stopped_send(mut self, policy: StoppedSendPolicy) -> Self {
        self.config.stopped_send = policy;
        self
    }

    /// Run the timer on a virtual clock (test mode).
    pub fn with_virtual_clock(mut self, virtual_clock: bool) -> Self {
        self.config.virtual_clock = virtual_clock;
        self
    }

    /// Set the stop deadline.
    pub fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.config.stop_timeout = stop_timeout;
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn build(self) -> Result<SystemConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}
