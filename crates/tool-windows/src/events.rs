use tokio::sync::mpsc::error::TryRecvError;

use crate::error::{HostFault, ToolWindowError};
use crate::host::{HostEventEnvelope, HostEventKind, HostEventReceiver, HostTransport};
use crate::record::ToolWindowRecord;

/// A host-originated state change, carrying the host's full view of the window.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolWindowEvent {
    Docked(ToolWindowRecord),
    Undocked(ToolWindowRecord),
    Closed(ToolWindowRecord),
}

impl ToolWindowEvent {
    pub fn decode(envelope: &HostEventEnvelope) -> Result<Self, ToolWindowError> {
        let Some(kind) = HostEventKind::from_event_name(&envelope.event) else {
            return Err(ToolWindowError::InvalidPayload(format!(
                "unknown host event {}",
                envelope.event
            )));
        };
        let record = serde_json::from_value::<ToolWindowRecord>(envelope.payload.clone())
            .map_err(|error| {
                ToolWindowError::InvalidPayload(format!("{} payload: {error}", envelope.event))
            })?;
        Ok(match kind {
            HostEventKind::Docked => Self::Docked(record),
            HostEventKind::Undocked => Self::Undocked(record),
            HostEventKind::Closed => Self::Closed(record),
        })
    }

    #[must_use]
    pub fn kind(&self) -> HostEventKind {
        match self {
            Self::Docked(_) => HostEventKind::Docked,
            Self::Undocked(_) => HostEventKind::Undocked,
            Self::Closed(_) => HostEventKind::Closed,
        }
    }

    #[must_use]
    pub fn record(&self) -> &ToolWindowRecord {
        match self {
            Self::Docked(record) | Self::Undocked(record) | Self::Closed(record) => record,
        }
    }
}

/// The one push-event listener a session installs.
pub struct EventSubscription {
    receiver: HostEventReceiver,
    closed: bool,
}

impl EventSubscription {
    pub async fn install<T: HostTransport + ?Sized>(transport: &T) -> Result<Self, HostFault> {
        let receiver = transport.subscribe().await?;
        Ok(Self::from_receiver(receiver))
    }

    #[must_use]
    pub fn from_receiver(receiver: HostEventReceiver) -> Self {
        Self {
            receiver,
            closed: false,
        }
    }

    /// Takes every event already queued without waiting.
    pub fn drain(&mut self) -> Vec<ToolWindowEvent> {
        let mut events = Vec::new();
        while !self.closed {
            match self.receiver.try_recv() {
                Ok(envelope) => events.extend(decode_or_log(&envelope)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.mark_closed(),
            }
        }
        events
    }

    /// Waits for the next decodable event; `None` once the host hangs up.
    pub async fn next(&mut self) -> Option<ToolWindowEvent> {
        while !self.closed {
            match self.receiver.recv().await {
                Some(envelope) => {
                    if let Some(event) = decode_or_log(&envelope) {
                        return Some(event);
                    }
                }
                None => self.mark_closed(),
            }
        }
        None
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn mark_closed(&mut self) {
        if !self.closed {
            tracing::warn!("host event channel closed; remote reconciliation stopped");
        }
        self.closed = true;
    }
}

fn decode_or_log(envelope: &HostEventEnvelope) -> Option<ToolWindowEvent> {
    match ToolWindowEvent::decode(envelope) {
        Ok(event) => Some(event),
        Err(error) => {
            tracing::warn!(event = %envelope.event, reason = %error, "dropping host event");
            None
        }
    }
}
