//! Lifecycle and synchronization of detachable tool windows.
//!
//! Tool windows (name generator, character tracker, ...) are separate native
//! windows owned by a host process. This crate keeps the UI process's cached
//! view of them converged with the host: commands issued here, events pushed
//! by the host and per-context snapshots all settle into one table that the
//! dock sidebar and tool launcher project from.

#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod context_handoff;
pub mod error;
pub mod events;
pub mod gateway;
pub mod geometry_hints;
pub mod host;
pub mod identity;
pub mod memory_host;
pub mod record;
pub mod session;
pub mod table;
pub mod tool_registry;
pub mod views;

pub use config::{ConfigError, ToolWindowConfig};
pub use context_handoff::{ContextPublisher, ContextWaiter, context_handoff};
pub use error::{HostFault, ToolWindowError};
pub use events::{EventSubscription, ToolWindowEvent};
pub use gateway::CommandGateway;
pub use geometry_hints::GeometryHintStore;
pub use host::{HostCommand, HostEventEnvelope, HostEventKind, HostTransport};
pub use identity::window_identity;
pub use memory_host::MemoryHost;
pub use record::{ContextKey, ToolWindowRecord, WindowPosition, WindowSize, WindowState};
pub use session::{CommandOutcome, SessionContext, ToolWindowSession, create_session};
pub use table::{LocalWrite, ReconcileOutcome, ToolWindowTable};
pub use tool_registry::{ToolKind, ToolSpec, tool_spec, tool_specs};
pub use views::{DockEntry, DockSidebar, LauncherAffordance, LauncherSlot, ToolLauncher};
