//! In-process window host.
//!
//! Honors the same command contract as the native host and lets callers act
//! as the user on the native window chrome, which is how remote events are
//! produced. Used for headless runs and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{Mutex, mpsc};

use crate::error::{HOST_CODE_UNKNOWN_WINDOW, HOST_CODE_WINDOW_CREATION_FAILED, HostFault};
use crate::host::{
    ContextArgs, HostCommand, HostEventEnvelope, HostEventKind, HostEventReceiver, HostTransport,
    OpenToolWindowArgs, RestoreToolWindowArgs, WindowHandleArgs,
};
use crate::identity::window_identity;
use crate::record::{ContextKey, ToolWindowRecord};

#[derive(Default)]
struct HostState {
    windows: HashMap<String, ToolWindowRecord>,
    subscribers: Vec<mpsc::UnboundedSender<HostEventEnvelope>>,
    unavailable: bool,
    fail_next_open: bool,
    failing_subscribes: u32,
    echo_command_events: bool,
    command_log: Vec<HostCommand>,
}

impl HostState {
    fn emit(&mut self, kind: HostEventKind, record: &ToolWindowRecord) {
        let payload = match serde_json::to_value(record) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::warn!(id = %record.id, reason = %error, "memory host failed to encode event");
                return;
            }
        };
        self.emit_envelope(HostEventEnvelope::new(kind, payload));
    }

    fn emit_envelope(&mut self, envelope: HostEventEnvelope) {
        self.subscribers
            .retain(|subscriber| subscriber.send(envelope.clone()).is_ok());
    }

    fn echo(&mut self, kind: HostEventKind, record: &ToolWindowRecord) {
        if self.echo_command_events {
            self.emit(kind, record);
        }
    }
}

#[derive(Default)]
pub struct MemoryHost {
    state: Mutex<HostState>,
}

impl MemoryHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_available(&self, available: bool) {
        self.state.lock().await.unavailable = !available;
    }

    pub async fn fail_next_open(&self) {
        self.state.lock().await.fail_next_open = true;
    }

    pub async fn fail_subscribe(&self, times: u32) {
        self.state.lock().await.failing_subscribes = times;
    }

    /// Also emit events for changes made by commands, as some hosts do.
    pub async fn set_echo_command_events(&self, echo: bool) {
        self.state.lock().await.echo_command_events = echo;
    }

    pub async fn window(&self, id: &str) -> Option<ToolWindowRecord> {
        self.state.lock().await.windows.get(id).cloned()
    }

    pub async fn windows_for(&self, context: &ContextKey) -> Vec<ToolWindowRecord> {
        let state = self.state.lock().await;
        let mut windows = state
            .windows
            .values()
            .filter(|record| context.matches(record))
            .cloned()
            .collect::<Vec<_>>();
        windows.sort_by(|left, right| left.id.cmp(&right.id));
        windows
    }

    pub async fn window_count(&self) -> usize {
        self.state.lock().await.windows.len()
    }

    pub async fn command_log(&self) -> Vec<HostCommand> {
        self.state.lock().await.command_log.clone()
    }

    /// The user dragged the window into the dock on the native chrome.
    pub async fn user_dock(&self, id: &str) -> bool {
        self.user_transition(id, HostEventKind::Docked).await
    }

    /// The user restored the window from the native chrome.
    pub async fn user_undock(&self, id: &str) -> bool {
        self.user_transition(id, HostEventKind::Undocked).await
    }

    /// The user closed the native window.
    pub async fn user_close(&self, id: &str) -> bool {
        self.user_transition(id, HostEventKind::Closed).await
    }

    /// Adds a window without telling anyone, as a session restore would.
    pub async fn restore_from_previous_session(&self, mut record: ToolWindowRecord) {
        if record.host_handle.is_empty() {
            record.host_handle = new_handle();
        }
        self.state
            .lock()
            .await
            .windows
            .insert(record.id.clone(), record);
    }

    /// Drops a window silently so the cache and host diverge.
    pub async fn forget_window(&self, id: &str) -> bool {
        self.state.lock().await.windows.remove(id).is_some()
    }

    /// Pushes an arbitrary envelope, for duplicate or malformed deliveries.
    pub async fn emit_raw(&self, envelope: HostEventEnvelope) {
        self.state.lock().await.emit_envelope(envelope);
    }

    pub async fn hang_up_subscribers(&self) {
        self.state.lock().await.subscribers.clear();
    }

    async fn user_transition(&self, id: &str, kind: HostEventKind) -> bool {
        let mut state = self.state.lock().await;
        let record = match kind {
            HostEventKind::Closed => state.windows.remove(id),
            HostEventKind::Docked | HostEventKind::Undocked => {
                let Some(record) = state.windows.get_mut(id) else {
                    return false;
                };
                if kind == HostEventKind::Docked {
                    record.mark_docked();
                } else {
                    record.mark_floating();
                }
                Some(record.clone())
            }
        };
        match record {
            Some(record) => {
                state.emit(kind, &record);
                true
            }
            None => false,
        }
    }

    fn handle_command(
        state: &mut HostState,
        command: HostCommand,
        args: Value,
    ) -> Result<Value, HostFault> {
        match command {
            HostCommand::OpenToolWindow => {
                let args: OpenToolWindowArgs = decode_args(command, args)?;
                if std::mem::take(&mut state.fail_next_open) {
                    return Err(rejected(
                        HOST_CODE_WINDOW_CREATION_FAILED,
                        "native window allocation failed",
                    ));
                }
                let id = window_identity(&args.book_id, &args.version_id, args.tool_kind);
                let record = state
                    .windows
                    .entry(id.clone())
                    .or_insert_with(|| ToolWindowRecord {
                        id,
                        tool_kind: args.tool_kind,
                        book_id: args.book_id,
                        version_id: args.version_id,
                        docked: false,
                        visible: true,
                        title: args.title,
                        icon_ref: args.icon_ref,
                        last_position: args.position,
                        last_size: args.size,
                        host_handle: new_handle(),
                    })
                    .clone();
                encode(&record)
            }
            HostCommand::MinimizeToolWindow => {
                let args: WindowHandleArgs = decode_args(command, args)?;
                let record = state
                    .windows
                    .get_mut(&args.id)
                    .ok_or_else(|| unknown_window(&args.id))?;
                record.mark_docked();
                let record = record.clone();
                state.echo(HostEventKind::Docked, &record);
                Ok(Value::Null)
            }
            HostCommand::RestoreToolWindow => {
                let args: RestoreToolWindowArgs = decode_args(command, args)?;
                let record = state
                    .windows
                    .get_mut(&args.id)
                    .ok_or_else(|| unknown_window(&args.id))?;
                record.mark_floating();
                record.last_position = args.position;
                record.last_size = args.size;
                let record = record.clone();
                state.echo(HostEventKind::Undocked, &record);
                Ok(Value::Null)
            }
            HostCommand::CloseToolWindow => {
                let args: WindowHandleArgs = decode_args(command, args)?;
                if let Some(record) = state.windows.remove(&args.id) {
                    state.echo(HostEventKind::Closed, &record);
                }
                Ok(Value::Null)
            }
            HostCommand::CloseAllTools => {
                let args: ContextArgs = decode_args(command, args)?;
                let context = ContextKey::new(args.book_id, args.version_id);
                let closing = state
                    .windows
                    .values()
                    .filter(|record| context.matches(record))
                    .map(|record| record.id.clone())
                    .collect::<Vec<_>>();
                for id in closing {
                    if let Some(record) = state.windows.remove(&id) {
                        state.echo(HostEventKind::Closed, &record);
                    }
                }
                Ok(Value::Null)
            }
            HostCommand::GetToolWindowsState => {
                let args: ContextArgs = decode_args(command, args)?;
                let context = ContextKey::new(args.book_id, args.version_id);
                let mut windows = state
                    .windows
                    .values()
                    .filter(|record| context.matches(record))
                    .cloned()
                    .collect::<Vec<_>>();
                windows.sort_by(|left, right| left.id.cmp(&right.id));
                encode(&windows)
            }
        }
    }
}

#[async_trait]
impl HostTransport for MemoryHost {
    async fn invoke(&self, command: HostCommand, args: Value) -> Result<Value, HostFault> {
        let mut state = self.state.lock().await;
        state.command_log.push(command);
        if state.unavailable {
            return Err(HostFault::Unavailable("memory host offline".to_string()));
        }
        Self::handle_command(&mut state, command, args)
    }

    async fn subscribe(&self) -> Result<HostEventReceiver, HostFault> {
        let mut state = self.state.lock().await;
        if state.failing_subscribes > 0 {
            state.failing_subscribes -= 1;
            return Err(HostFault::Unavailable("event bridge not ready".to_string()));
        }
        if state.unavailable {
            return Err(HostFault::Unavailable("memory host offline".to_string()));
        }
        let (sender, receiver) = mpsc::unbounded_channel();
        state.subscribers.push(sender);
        Ok(receiver)
    }
}

fn new_handle() -> String {
    format!("tool-window-{}", uuid::Uuid::new_v4())
}

fn decode_args<A: DeserializeOwned>(command: HostCommand, args: Value) -> Result<A, HostFault> {
    serde_json::from_value(args)
        .map_err(|error| rejected("invalid_arguments", &format!("{}: {error}", command.as_str())))
}

fn encode<V: serde::Serialize>(value: &V) -> Result<Value, HostFault> {
    serde_json::to_value(value).map_err(|error| rejected("internal", &error.to_string()))
}

fn unknown_window(id: &str) -> HostFault {
    rejected(HOST_CODE_UNKNOWN_WINDOW, &format!("no window {id}"))
}

fn rejected(code: &str, message: &str) -> HostFault {
    HostFault::Rejected {
        code: code.to_string(),
        message: message.to_string(),
    }
}
