//! State shared between the system facade, cells, and background tasks.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

// Layer 3: Internal module imports
use super::config::{StoppedSendPolicy, SystemConfig};
use super::errors::SendError;
use super::events::{SystemEvent, SystemEventKind};
use crate::actor::ActorStatus;
use crate::ask::CorrelationTable;
use crate::directory::Directory;
use crate::events::EventBus;
use crate::interceptor::{InterceptorRegistry, MessageContext};
use crate::mailbox::{MailboxError, MailboxSender, MailboxStats};
use crate::message::{validate_for_transport, Envelope};
use crate::telemetry::RuntimeMetrics;
use crate::timer::Scheduler;
use crate::util::Address;

/// System run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SystemState {
    /// Created, not yet started
    Created,
    /// Accepting spawns and sends
    Running,
    /// Shutdown in progress
    Stopping,
    /// Fully stopped
    Stopped,
}

/// Why a cell is being stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopReason {
    /// System shutdown cascade
    SystemShutdown,
    /// Explicit `stop_actor`
    External,
    /// Supervision `Stop` directive
    Supervision,
    /// Escalation reached the guardian
    Escalated,
}

impl StopReason {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::SystemShutdown => "system-shutdown",
            Self::External => "stop",
            Self::Supervision => "supervision-stop",
            Self::Escalated => "escalated",
        }
    }
}

/// Failure escalated to the guardian.
#[derive(Debug)]
pub(crate) struct GuardianReport {
    pub(crate) address: Address,
    pub(crate) error: String,
}

/// Registry entry for one live (or stopped) actor.
///
/// Stopped cells stay in the map so sends to them can distinguish
/// "stopped" from "never existed"; they are removed at system stop.
pub(crate) struct CellHandle {
    pub(crate) sender: MailboxSender,
    pub(crate) bus: EventBus,
    pub(crate) stop_tx: mpsc::UnboundedSender<StopReason>,
    pub(crate) status: Arc<RwLock<ActorStatus>>,
    pub(crate) stats: Arc<MailboxStats>,
    pub(crate) capacity: usize,
    pub(crate) task: Mutex<Option<JoinHandle<()>>>,
}

impl CellHandle {
    pub(crate) fn is_stopped(&self) -> bool {
        matches!(
            *self.status.read(),
            ActorStatus::Stopping | ActorStatus::Stopped | ActorStatus::Failed
        )
    }
}

/// Everything cells and background tasks need from the system.
pub(crate) struct SystemShared {
    pub(crate) config: SystemConfig,
    pub(crate) state: RwLock<SystemState>,
    pub(crate) cells: DashMap<Address, CellHandle>,
    pub(crate) directory: Directory,
    pub(crate) interceptors: InterceptorRegistry,
    pub(crate) correlations: CorrelationTable,
    pub(crate) scheduler: Scheduler,
    pub(crate) metrics: Option<Arc<RuntimeMetrics>>,
    pub(crate) guardian_tx: RwLock<Option<mpsc::UnboundedSender<GuardianReport>>>,
    pub(crate) system_events_addr: Address,
}

impl SystemShared {
    pub(crate) fn is_running(&self) -> bool {
        *self.state.read() == SystemState::Running
    }

    /// The system send path: validate, run the send pipeline, resolve
    /// pending asks, deliver to the target mailbox.
    pub(crate) async fn send_to(
        &self,
        target: &Address,
        envelope: Envelope,
    ) -> Result<(), SendError> {
        if !self.is_running() {
            return Err(SendError::SystemNotRunning);
        }

        let mut envelope = envelope;
        if envelope.timestamp().is_none() {
            envelope = envelope.stamped();
        }
        validate_for_transport(&envelope).map_err(SendError::InvalidEnvelope)?;

        let mut ctx = MessageContext::for_envelope(&envelope);
        let Some(envelope) = self.interceptors.before_send(envelope, target, &mut ctx) else {
            return Ok(()); // filtered by the pipeline
        };

        // A reply may resolve a pending system-level ask directly.
        if envelope.is_reply() {
            if let Some(correlation_id) = envelope.correlation_id() {
                if self.correlations.complete(correlation_id, envelope.clone()) {
                    return Ok(());
                }
            }
        }

        let Some(handle) = self.cells.get(target) else {
            if envelope.is_reply() {
                // Late reply to an already-resolved or expired ask.
                debug!(target = %target, "dropping unroutable reply");
                return Ok(());
            }
            return Err(SendError::NoSuchActor(target.clone()));
        };

        if handle.is_stopped() {
            return match self.config.stopped_send {
                StoppedSendPolicy::Fail => Err(SendError::ActorStopped(target.clone())),
                StoppedSendPolicy::DropSilently => Ok(()),
            };
        }

        let sender = handle.sender.clone();
        drop(handle);

        match sender.enqueue(envelope).await {
            Ok(()) => Ok(()),
            Err(MailboxError::Full { capacity }) => Err(SendError::MailboxFull {
                address: target.clone(),
                capacity,
            }),
            Err(MailboxError::Stopped) => match self.config.stopped_send {
                StoppedSendPolicy::Fail => Err(SendError::ActorStopped(target.clone())),
                StoppedSendPolicy::DropSilently => Ok(()),
            },
            Err(other) => {
                warn!(target = %target, error = %other, "unexpected mailbox error");
                Ok(())
            }
        }
    }

    /// Emit a lifecycle event towards the system-event actor.
    ///
    /// Never fails: a missing system-event actor or a full queue makes the
    /// emit a no-op.
    pub(crate) fn emit_system_event(&self, kind: SystemEventKind, data: Value) {
        let event = SystemEvent::new(kind, data);
        if let Some(handle) = self.cells.get(&self.system_events_addr) {
            if handle.is_stopped() {
                return;
            }
            if let Err(error) = handle.sender.try_enqueue(event.to_envelope()) {
                debug!(kind = %kind, %error, "system event dropped");
            }
        }
    }

    /// Forward an escalated failure to the guardian.
    pub(crate) fn report_failure(&self, report: GuardianReport) {
        if let Some(tx) = self.guardian_tx.read().as_ref() {
            let _ = tx.send(report);
        }
    }
}
