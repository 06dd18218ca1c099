//! Chained pre/post/error hooks around send and receive.
//!
//! Interceptors observe and transform envelopes at four points: before a
//! send is routed, before an actor's handler runs, after the handler
//! completes, and when the handler fails. Registrations carry a priority,
//! a scope (global or per-actor) and an optional envelope filter; dispatch
//! walks a pre-sorted snapshot so the per-message cost is one slice scan.
//!
//! A failing interceptor is isolated: its error counter increments, the
//! failure is logged, and delivery continues with the remaining chain.

pub mod context;
pub mod registry;

pub use context::MessageContext;
pub use registry::{
    Intercept, Interceptor, InterceptorError, InterceptorId, InterceptorOptions,
    InterceptorRegistry, InterceptorScope, InterceptorStats,
};
