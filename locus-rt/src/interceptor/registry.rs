// Layer 1: Standard library imports
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use parking_lot::RwLock;
use tracing::warn;

// Layer 3: Internal module imports
use super::context::MessageContext;
use crate::actor::HandlerError;
use crate::message::Envelope;
use crate::util::Address;

/// Error returned by a failing interceptor hook.
///
/// Interceptor failures never abort delivery; the registry counts them,
/// logs them, and continues the chain with the envelope unchanged.
#[derive(Debug, Clone, thiserror::Error)]
#[error("interceptor failure: {message}")]
pub struct InterceptorError {
    message: String,
}

impl InterceptorError {
    /// Create an error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Outcome of a `before_send`/`before_receive` hook.
#[derive(Debug, Clone, PartialEq)]
pub enum Intercept {
    /// Pass the envelope through unchanged
    Continue,

    /// Replace the envelope for the rest of the chain
    Transform(Envelope),

    /// Drop the message silently (counted as filtered)
    Filter,
}

/// Where a registration applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterceptorScope {
    /// Runs for every actor
    Global,

    /// Runs only for exchanges involving the given actor
    Actor(Address),
}

impl InterceptorScope {
    fn matches(&self, actor: &Address) -> bool {
        match self {
            Self::Global => true,
            Self::Actor(scoped) => scoped == actor,
        }
    }

    fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }
}

/// Hook points around message delivery.
///
/// All hooks have pass-through defaults; implement only what you need.
pub trait Interceptor: Send + Sync + 'static {
    /// Runs before a send is routed to the target mailbox.
    fn before_send(
        &self,
        _envelope: &Envelope,
        _actor: &Address,
        _ctx: &mut MessageContext,
    ) -> Result<Intercept, InterceptorError> {
        Ok(Intercept::Continue)
    }

    /// Runs after dequeue, before the handler is invoked.
    fn before_receive(
        &self,
        _envelope: &Envelope,
        _actor: &Address,
        _ctx: &mut MessageContext,
    ) -> Result<Intercept, InterceptorError> {
        Ok(Intercept::Continue)
    }

    /// Runs after the handler completed successfully.
    fn after_process(
        &self,
        _envelope: &Envelope,
        _actor: &Address,
        _ctx: &mut MessageContext,
    ) -> Result<(), InterceptorError> {
        Ok(())
    }

    /// Runs when the handler failed.
    fn on_error(
        &self,
        _error: &HandlerError,
        _envelope: &Envelope,
        _actor: &Address,
        _ctx: &mut MessageContext,
    ) -> Result<(), InterceptorError> {
        Ok(())
    }
}

/// Envelope predicate limiting which messages a registration sees.
pub type InterceptorFilter = Arc<dyn Fn(&Envelope) -> bool + Send + Sync>;

/// Registration options: name, priority, scope, filter, initial state.
#[derive(Clone)]
pub struct InterceptorOptions {
    /// Human-readable name (for stats and logs)
    pub name: String,

    /// Higher priority runs earlier within its scope group
    pub priority: i32,

    /// Global or per-actor scope
    pub scope: InterceptorScope,

    /// Optional envelope predicate
    pub filter: Option<InterceptorFilter>,

    /// Whether the registration starts enabled
    pub enabled: bool,
}

impl Default for InterceptorOptions {
    fn default() -> Self {
        Self {
            name: String::from("interceptor"),
            priority: 0,
            scope: InterceptorScope::Global,
            filter: None,
            enabled: true,
        }
    }
}

impl InterceptorOptions {
    /// Create options with a name and defaults otherwise.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder method: set the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Builder method: set the scope.
    pub fn with_scope(mut self, scope: InterceptorScope) -> Self {
        self.scope = scope;
        self
    }

    /// Builder method: set the envelope filter.
    pub fn with_filter(
        mut self,
        filter: impl Fn(&Envelope) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }
}

/// Identifier of a registration, returned by `register`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterceptorId(u64);

/// Read-only counters for one registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptorStats {
    /// Registration name
    pub name: String,
    /// Hook invocations that ran
    pub invoked: u64,
    /// Envelopes dropped by this registration
    pub filtered: u64,
    /// Hook failures (isolated)
    pub errors: u64,
    /// Whether the registration is currently enabled
    pub enabled: bool,
}

struct Entry {
    id: InterceptorId,
    name: String,
    priority: i32,
    scope: InterceptorScope,
    filter: Option<InterceptorFilter>,
    enabled: AtomicBool,
    invoked: AtomicU64,
    filtered: AtomicU64,
    errors: AtomicU64,
    interceptor: Arc<dyn Interceptor>,
}

impl Entry {
    fn applies(&self, actor: &Address, envelope: &Envelope) -> bool {
        if !self.enabled.load(Ordering::Relaxed) {
            return false;
        }
        if !self.scope.matches(actor) {
            return false;
        }
        match &self.filter {
            Some(filter) => filter(envelope),
            None => true,
        }
    }

    fn record_failure(&self, hook: &str, error: &InterceptorError) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        warn!(
            interceptor = %self.name,
            hook,
            %error,
            "interceptor failed; continuing without it"
        );
    }
}

/// Registry of interceptors with pre-sorted dispatch order.
///
/// Ordering: global registrations by priority descending, then actor-scoped
/// registrations by priority descending. The sorted chain is rebuilt on
/// every registration change and shared as an immutable snapshot, so
/// dispatch never takes the write lock.
#[derive(Clone)]
pub struct InterceptorRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    entries: RwLock<Vec<Arc<Entry>>>,
    chain: RwLock<Arc<[Arc<Entry>]>>,
    next_id: AtomicU64,
}

impl InterceptorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                entries: RwLock::new(Vec::new()),
                chain: RwLock::new(Arc::from(Vec::new())),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register an interceptor; returns its id for later control.
    pub fn register(
        &self,
        interceptor: Arc<dyn Interceptor>,
        options: InterceptorOptions,
    ) -> InterceptorId {
        let id = InterceptorId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = Arc::new(Entry {
            id,
            name: options.name,
            priority: options.priority,
            scope: options.scope,
            filter: options.filter,
            enabled: AtomicBool::new(options.enabled),
            invoked: AtomicU64::new(0),
            filtered: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            interceptor,
        });

        let mut entries = self.inner.entries.write();
        entries.push(entry);
        self.rebuild_chain(&entries);
        id
    }

    /// Remove a registration. Returns whether it existed.
    pub fn unregister(&self, id: InterceptorId) -> bool {
        let mut entries = self.inner.entries.write();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        let removed = entries.len() != before;
        if removed {
            self.rebuild_chain(&entries);
        }
        removed
    }

    /// Enable or disable a registration in place.
    pub fn set_enabled(&self, id: InterceptorId, enabled: bool) -> bool {
        let entries = self.inner.entries.read();
        match entries.iter().find(|e| e.id == id) {
            Some(entry) => {
                entry.enabled.store(enabled, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Counters for one registration.
    pub fn stats(&self, id: InterceptorId) -> Option<InterceptorStats> {
        let entries = self.inner.entries.read();
        entries.iter().find(|e| e.id == id).map(|e| InterceptorStats {
            name: e.name.clone(),
            invoked: e.invoked.load(Ordering::Relaxed),
            filtered: e.filtered.load(Ordering::Relaxed),
            errors: e.errors.load(Ordering::Relaxed),
            enabled: e.enabled.load(Ordering::Relaxed),
        })
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn rebuild_chain(&self, entries: &[Arc<Entry>]) {
        let mut sorted: Vec<Arc<Entry>> = entries.to_vec();
        sorted.sort_by(|a, b| {
            b.scope
                .is_global()
                .cmp(&a.scope.is_global())
                .then(b.priority.cmp(&a.priority))
        });
        *self.inner.chain.write() = Arc::from(sorted);
    }

    fn chain(&self) -> Arc<[Arc<Entry>]> {
        Arc::clone(&self.inner.chain.read())
    }

    /// Run the `before_send` chain for an envelope targeting `actor`.
    ///
    /// Returns `None` if any registration filtered the envelope out. A
    /// failing hook is skipped and the envelope continues unchanged.
    pub fn before_send(
        &self,
        mut envelope: Envelope,
        actor: &Address,
        ctx: &mut MessageContext,
    ) -> Option<Envelope> {
        for entry in self.chain().iter() {
            if !entry.applies(actor, &envelope) {
                continue;
            }
            entry.invoked.fetch_add(1, Ordering::Relaxed);
            match entry.interceptor.before_send(&envelope, actor, ctx) {
                Ok(Intercept::Continue) => {}
                Ok(Intercept::Transform(transformed)) => envelope = transformed,
                Ok(Intercept::Filter) => {
                    entry.filtered.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
                Err(error) => entry.record_failure("before_send", &error),
            }
        }
        Some(envelope)
    }

    /// Run the `before_receive` chain for an envelope dequeued by `actor`.
    pub fn before_receive(
        &self,
        mut envelope: Envelope,
        actor: &Address,
        ctx: &mut MessageContext,
    ) -> Option<Envelope> {
        for entry in self.chain().iter() {
            if !entry.applies(actor, &envelope) {
                continue;
            }
            entry.invoked.fetch_add(1, Ordering::Relaxed);
            match entry.interceptor.before_receive(&envelope, actor, ctx) {
                Ok(Intercept::Continue) => {}
                Ok(Intercept::Transform(transformed)) => envelope = transformed,
                Ok(Intercept::Filter) => {
                    entry.filtered.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
                Err(error) => entry.record_failure("before_receive", &error),
            }
        }
        Some(envelope)
    }

    /// Run the `after_process` chain.
    pub fn after_process(&self, envelope: &Envelope, actor: &Address, ctx: &mut MessageContext) {
        for entry in self.chain().iter() {
            if !entry.applies(actor, envelope) {
                continue;
            }
            entry.invoked.fetch_add(1, Ordering::Relaxed);
            if let Err(error) = entry.interceptor.after_process(envelope, actor, ctx) {
                entry.record_failure("after_process", &error);
            }
        }
    }

    /// Run the `on_error` chain.
    pub fn on_error(
        &self,
        error: &HandlerError,
        envelope: &Envelope,
        actor: &Address,
        ctx: &mut MessageContext,
    ) {
        for entry in self.chain().iter() {
            if !entry.applies(actor, envelope) {
                continue;
            }
            entry.invoked.fetch_add(1, Ordering::Relaxed);
            if let Err(hook_error) = entry.interceptor.on_error(error, envelope, actor, ctx) {
                entry.record_failure("on_error", &hook_error);
            }
        }
    }
}

impl Default for InterceptorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn addr(id: &str) -> Address {
        Address::new("local", "worker", id).unwrap()
    }

    /// Records which interceptor names ran, in order.
    struct Recorder {
        name: &'static str,
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Interceptor for Recorder {
        fn before_send(
            &self,
            _envelope: &Envelope,
            _actor: &Address,
            _ctx: &mut MessageContext,
        ) -> Result<Intercept, InterceptorError> {
            self.seen.lock().unwrap().push(self.name);
            Ok(Intercept::Continue)
        }
    }

    struct Tagger;

    impl Interceptor for Tagger {
        fn before_send(
            &self,
            envelope: &Envelope,
            _actor: &Address,
            _ctx: &mut MessageContext,
        ) -> Result<Intercept, InterceptorError> {
            Ok(Intercept::Transform(
                envelope.clone().with_field("tagged", json!(true)),
            ))
        }
    }

    struct Dropper;

    impl Interceptor for Dropper {
        fn before_send(
            &self,
            _envelope: &Envelope,
            _actor: &Address,
            _ctx: &mut MessageContext,
        ) -> Result<Intercept, InterceptorError> {
            Ok(Intercept::Filter)
        }
    }

    struct FailingBefore;

    impl Interceptor for FailingBefore {
        fn before_send(
            &self,
            _envelope: &Envelope,
            _actor: &Address,
            _ctx: &mut MessageContext,
        ) -> Result<Intercept, InterceptorError> {
            Err(InterceptorError::new("boom"))
        }
    }

    struct FailingAfter;

    impl Interceptor for FailingAfter {
        fn after_process(
            &self,
            _envelope: &Envelope,
            _actor: &Address,
            _ctx: &mut MessageContext,
        ) -> Result<(), InterceptorError> {
            Err(InterceptorError::new("boom"))
        }
    }

    #[test]
    fn test_register_and_unregister() {
        let registry = InterceptorRegistry::new();
        let id = registry.register(Arc::new(Tagger), InterceptorOptions::named("tagger"));

        assert_eq!(registry.len(), 1);
        assert!(registry.unregister(id));
        assert!(registry.is_empty());
        assert!(!registry.unregister(id));
    }

    #[test]
    fn test_before_send_transforms_envelope() {
        let registry = InterceptorRegistry::new();
        registry.register(Arc::new(Tagger), InterceptorOptions::named("tagger"));

        let mut ctx = MessageContext::new();
        let out = registry
            .before_send(Envelope::new("PING"), &addr("a"), &mut ctx)
            .unwrap();

        assert_eq!(out.field("tagged"), Some(&json!(true)));
    }

    #[test]
    fn test_filtered_envelope_is_dropped_and_counted() {
        let registry = InterceptorRegistry::new();
        let id = registry.register(Arc::new(Dropper), InterceptorOptions::named("dropper"));

        let mut ctx = MessageContext::new();
        let out = registry.before_send(Envelope::new("PING"), &addr("a"), &mut ctx);

        assert!(out.is_none());
        assert_eq!(registry.stats(id).unwrap().filtered, 1);
    }

    #[test]
    fn test_global_before_actor_scope_and_priority_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registry = InterceptorRegistry::new();
        let target = addr("a");

        registry.register(
            Arc::new(Recorder {
                name: "actor-hi",
                seen: Arc::clone(&seen),
            }),
            InterceptorOptions::named("actor-hi")
                .with_priority(100)
                .with_scope(InterceptorScope::Actor(target.clone())),
        );
        registry.register(
            Arc::new(Recorder {
                name: "global-lo",
                seen: Arc::clone(&seen),
            }),
            InterceptorOptions::named("global-lo").with_priority(1),
        );
        registry.register(
            Arc::new(Recorder {
                name: "global-hi",
                seen: Arc::clone(&seen),
            }),
            InterceptorOptions::named("global-hi").with_priority(10),
        );

        let mut ctx = MessageContext::new();
        registry.before_send(Envelope::new("PING"), &target, &mut ctx);

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["global-hi", "global-lo", "actor-hi"]
        );
    }

    #[test]
    fn test_actor_scope_skipped_for_other_actor() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registry = InterceptorRegistry::new();

        registry.register(
            Arc::new(Recorder {
                name: "scoped",
                seen: Arc::clone(&seen),
            }),
            InterceptorOptions::named("scoped").with_scope(InterceptorScope::Actor(addr("a"))),
        );

        let mut ctx = MessageContext::new();
        registry.before_send(Envelope::new("PING"), &addr("b"), &mut ctx);

        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_filter_limits_matches() {
        let registry = InterceptorRegistry::new();
        let id = registry.register(
            Arc::new(Tagger),
            InterceptorOptions::named("only-ping").with_filter(|env| env.kind() == "PING"),
        );

        let mut ctx = MessageContext::new();
        let other = registry
            .before_send(Envelope::new("OTHER"), &addr("a"), &mut ctx)
            .unwrap();
        assert!(other.field("tagged").is_none());

        let ping = registry
            .before_send(Envelope::new("PING"), &addr("a"), &mut ctx)
            .unwrap();
        assert_eq!(ping.field("tagged"), Some(&json!(true)));
        assert_eq!(registry.stats(id).unwrap().invoked, 1);
    }

    #[test]
    fn test_disabled_interceptor_is_skipped() {
        let registry = InterceptorRegistry::new();
        let id = registry.register(Arc::new(Tagger), InterceptorOptions::named("tagger"));
        registry.set_enabled(id, false);

        let mut ctx = MessageContext::new();
        let out = registry
            .before_send(Envelope::new("PING"), &addr("a"), &mut ctx)
            .unwrap();

        assert!(out.field("tagged").is_none());
    }

    #[test]
    fn test_failing_before_hook_does_not_lose_the_message() {
        let registry = InterceptorRegistry::new();
        let failing =
            registry.register(Arc::new(FailingBefore), InterceptorOptions::named("failing"));
        registry.register(Arc::new(Tagger), InterceptorOptions::named("tagger"));

        let mut ctx = MessageContext::new();
        let out = registry
            .before_send(Envelope::new("PING"), &addr("a"), &mut ctx)
            .unwrap();

        // Delivery continues, later interceptors still run.
        assert_eq!(out.field("tagged"), Some(&json!(true)));
        assert_eq!(registry.stats(failing).unwrap().errors, 1);
    }

    #[test]
    fn test_failing_after_hook_is_isolated() {
        let registry = InterceptorRegistry::new();
        let failing =
            registry.register(Arc::new(FailingAfter), InterceptorOptions::named("failing"));
        let tagger = registry.register(Arc::new(Tagger), InterceptorOptions::named("tagger"));

        let mut ctx = MessageContext::new();
        let env = Envelope::new("PING");
        registry.after_process(&env, &addr("a"), &mut ctx);

        assert_eq!(registry.stats(failing).unwrap().errors, 1);
        assert_eq!(registry.stats(tagger).unwrap().errors, 0);
    }
}
