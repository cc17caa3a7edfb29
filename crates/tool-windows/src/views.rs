//! Read-only projections of the session for the dock sidebar and the tool
//! launcher. A view is bound to the context it was rendered for and shows
//! nothing once that context stops being current.

use crate::error::ToolWindowError;
use crate::host::HostTransport;
use crate::record::{ContextKey, ToolWindowRecord, WindowState};
use crate::session::{CommandOutcome, ToolWindowSession};
use crate::tool_registry::{ToolKind, tool_specs};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DockEntry {
    pub id: String,
    pub tool_kind: ToolKind,
    pub title: String,
    pub icon_ref: Option<String>,
}

impl From<&ToolWindowRecord> for DockEntry {
    fn from(record: &ToolWindowRecord) -> Self {
        Self {
            id: record.id.clone(),
            tool_kind: record.tool_kind,
            title: record.title.clone(),
            icon_ref: record
                .icon_ref
                .clone()
                .or_else(|| Some(record.tool_kind.spec().icon.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LauncherAffordance {
    Open,
    Dock,
    Restore,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LauncherSlot {
    pub tool_kind: ToolKind,
    pub title: &'static str,
    pub icon: &'static str,
    pub window_id: String,
    pub state: Option<WindowState>,
}

impl LauncherSlot {
    #[must_use]
    pub fn affordance(&self) -> LauncherAffordance {
        match self.state {
            None => LauncherAffordance::Open,
            Some(WindowState::Floating) => LauncherAffordance::Dock,
            Some(WindowState::Docked) => LauncherAffordance::Restore,
        }
    }
}

fn ensure_current<T: HostTransport>(
    session: &ToolWindowSession<T>,
    context: &ContextKey,
) -> Result<(), ToolWindowError> {
    if session.context().is_current(context) {
        Ok(())
    } else {
        Err(ToolWindowError::context_mismatch(
            context,
            session.current_context(),
        ))
    }
}

fn ensure_owned<T: HostTransport>(
    session: &ToolWindowSession<T>,
    context: &ContextKey,
    id: &str,
) -> Result<(), ToolWindowError> {
    ensure_current(session, context)?;
    match session.table().get(id) {
        Some(record) if context.matches(record) => Ok(()),
        Some(record) => Err(ToolWindowError::context_mismatch(
            &record.context(),
            session.current_context(),
        )),
        None => Err(ToolWindowError::UnknownWindow(id.to_string())),
    }
}

/// Docked windows of one context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DockSidebar {
    context: ContextKey,
}

impl DockSidebar {
    #[must_use]
    pub fn new(context: ContextKey) -> Self {
        Self { context }
    }

    #[must_use]
    pub fn context(&self) -> &ContextKey {
        &self.context
    }

    /// `None` when this sidebar belongs to a context that is no longer current.
    pub fn entries<T: HostTransport>(&self, session: &ToolWindowSession<T>) -> Option<Vec<DockEntry>> {
        if !session.context().is_current(&self.context) {
            return None;
        }
        Some(
            session
                .table()
                .records_for(&self.context)
                .into_iter()
                .filter(|record| record.docked)
                .map(DockEntry::from)
                .collect(),
        )
    }

    /// Whether the panel should be drawn at all.
    pub fn is_shown<T: HostTransport>(&self, session: &ToolWindowSession<T>) -> bool {
        session.context().dock_panel_visible && session.context().is_current(&self.context)
    }

    pub async fn restore<T: HostTransport>(
        &self,
        session: &mut ToolWindowSession<T>,
        id: &str,
    ) -> Result<CommandOutcome, ToolWindowError> {
        ensure_owned(session, &self.context, id)?;
        session.undock_window(id).await
    }

    pub async fn dismiss<T: HostTransport>(
        &self,
        session: &mut ToolWindowSession<T>,
        id: &str,
    ) -> Result<CommandOutcome, ToolWindowError> {
        ensure_owned(session, &self.context, id)?;
        session.close_tool(id).await
    }
}

/// One slot per tool kind with the action its button should offer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolLauncher {
    context: ContextKey,
}

impl ToolLauncher {
    #[must_use]
    pub fn new(context: ContextKey) -> Self {
        Self { context }
    }

    #[must_use]
    pub fn context(&self) -> &ContextKey {
        &self.context
    }

    pub fn slots<T: HostTransport>(&self, session: &ToolWindowSession<T>) -> Option<Vec<LauncherSlot>> {
        if !session.context().is_current(&self.context) {
            return None;
        }
        let mut specs = tool_specs().to_vec();
        specs.sort_by_key(|spec| spec.launcher_order);
        Some(
            specs
                .into_iter()
                .map(|spec| {
                    let window_id = self.context.window_id(spec.kind);
                    let state = session.table().get(&window_id).map(ToolWindowRecord::state);
                    LauncherSlot {
                        tool_kind: spec.kind,
                        title: spec.title,
                        icon: spec.icon,
                        window_id,
                        state,
                    }
                })
                .collect(),
        )
    }

    /// Opens the tool, or restores it when it sits in the dock.
    pub async fn activate<T: HostTransport>(
        &self,
        session: &mut ToolWindowSession<T>,
        kind: ToolKind,
    ) -> Result<ToolWindowRecord, ToolWindowError> {
        ensure_current(session, &self.context)?;
        session
            .open_tool(kind, &self.context.book_id, &self.context.version_id)
            .await
    }

    pub async fn dock<T: HostTransport>(
        &self,
        session: &mut ToolWindowSession<T>,
        kind: ToolKind,
    ) -> Result<CommandOutcome, ToolWindowError> {
        let id = self.context.window_id(kind);
        ensure_owned(session, &self.context, &id)?;
        session.dock_window(&id).await
    }

    pub async fn close<T: HostTransport>(
        &self,
        session: &mut ToolWindowSession<T>,
        kind: ToolKind,
    ) -> Result<CommandOutcome, ToolWindowError> {
        let id = self.context.window_id(kind);
        ensure_owned(session, &self.context, &id)?;
        session.close_tool(&id).await
    }
}
