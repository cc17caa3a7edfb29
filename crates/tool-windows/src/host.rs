//! Contract with the native window host.
//!
//! The host owns the real windows. This process talks to it through six
//! request/response commands and receives three kinds of push events; both
//! travel as JSON values so any IPC bridge can implement [`HostTransport`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::HostFault;
use crate::record::{WindowPosition, WindowSize};
use crate::tool_registry::ToolKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostCommand {
    OpenToolWindow,
    MinimizeToolWindow,
    RestoreToolWindow,
    CloseToolWindow,
    CloseAllTools,
    GetToolWindowsState,
}

impl HostCommand {
    pub const ALL: [HostCommand; 6] = [
        HostCommand::OpenToolWindow,
        HostCommand::MinimizeToolWindow,
        HostCommand::RestoreToolWindow,
        HostCommand::CloseToolWindow,
        HostCommand::CloseAllTools,
        HostCommand::GetToolWindowsState,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenToolWindow => "open_tool_window",
            Self::MinimizeToolWindow => "minimize_tool_window",
            Self::RestoreToolWindow => "restore_tool_window",
            Self::CloseToolWindow => "close_tool_window",
            Self::CloseAllTools => "close_all_tools",
            Self::GetToolWindowsState => "get_tool_windows_state",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostEventKind {
    Docked,
    Undocked,
    Closed,
}

impl HostEventKind {
    pub const ALL: [HostEventKind; 3] = [
        HostEventKind::Docked,
        HostEventKind::Undocked,
        HostEventKind::Closed,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Docked => "tool-window-docked",
            Self::Undocked => "tool-window-undocked",
            Self::Closed => "tool-window-closed",
        }
    }

    #[must_use]
    pub fn from_event_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

/// Raw push notification as delivered by the bridge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HostEventEnvelope {
    pub event: String,
    pub payload: Value,
}

impl HostEventEnvelope {
    #[must_use]
    pub fn new(kind: HostEventKind, payload: Value) -> Self {
        Self {
            event: kind.as_str().to_string(),
            payload,
        }
    }
}

pub type HostEventReceiver = mpsc::UnboundedReceiver<HostEventEnvelope>;

#[async_trait]
pub trait HostTransport: Send + Sync {
    async fn invoke(&self, command: HostCommand, args: Value) -> Result<Value, HostFault>;

    /// Registers a listener for push events. Called at most a bounded number of
    /// times per session.
    async fn subscribe(&self) -> Result<HostEventReceiver, HostFault>;
}

#[async_trait]
impl<T: HostTransport + ?Sized> HostTransport for std::sync::Arc<T> {
    async fn invoke(&self, command: HostCommand, args: Value) -> Result<Value, HostFault> {
        (**self).invoke(command, args).await
    }

    async fn subscribe(&self) -> Result<HostEventReceiver, HostFault> {
        (**self).subscribe().await
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenToolWindowArgs {
    pub tool_kind: ToolKind,
    pub book_id: String,
    pub version_id: String,
    pub title: String,
    pub icon_ref: Option<String>,
    pub position: WindowPosition,
    pub size: WindowSize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowHandleArgs {
    pub id: String,
    pub host_handle: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreToolWindowArgs {
    pub id: String,
    pub host_handle: Option<String>,
    pub position: WindowPosition,
    pub size: WindowSize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextArgs {
    pub book_id: String,
    pub version_id: String,
}
