use crate::config::ToolWindowConfig;
use crate::error::ToolWindowError;
use crate::events::{EventSubscription, ToolWindowEvent};
use crate::gateway::CommandGateway;
use crate::geometry_hints::GeometryHintStore;
use crate::host::HostTransport;
use crate::record::{ContextKey, ToolWindowRecord, WindowPosition, WindowSize};
use crate::table::{LocalWrite, ReconcileOutcome, ToolWindowTable};
use crate::tool_registry::ToolKind;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub current: Option<ContextKey>,
    pub dock_panel_visible: bool,
    pub listener_installed: bool,
    listener_attempts: u8,
}

impl SessionContext {
    #[must_use]
    pub fn is_current(&self, context: &ContextKey) -> bool {
        self.current.as_ref() == Some(context)
    }

    #[must_use]
    pub fn listener_attempts(&self) -> u8 {
        self.listener_attempts
    }
}

/// How a dock, undock or close settled in the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    Applied,
    /// Nothing to send: the table already shows the requested state.
    Unchanged,
    /// The host no longer knew the window; the stale row was dropped.
    PrunedStale,
}

/// The UI-side mirror of every tool window the native host owns.
///
/// All writes go through this type. It is driven from one event loop: a
/// command is awaited to completion before its result touches the table, so
/// the table only ever holds settled state.
pub struct ToolWindowSession<T> {
    gateway: CommandGateway<T>,
    table: ToolWindowTable,
    context: SessionContext,
    subscription: Option<EventSubscription>,
    hints: Option<GeometryHintStore>,
    config: ToolWindowConfig,
}

pub fn create_session<T: HostTransport>(
    transport: T,
    config: ToolWindowConfig,
) -> ToolWindowSession<T> {
    ToolWindowSession::new(transport, config)
}

impl<T: HostTransport> ToolWindowSession<T> {
    pub fn new(transport: T, config: ToolWindowConfig) -> Self {
        let hints = config.hint_store_path.clone().map(GeometryHintStore::load);
        Self {
            gateway: CommandGateway::new(transport, config.command_timeout()),
            table: ToolWindowTable::default(),
            context: SessionContext::default(),
            subscription: None,
            hints,
            config,
        }
    }

    pub fn transport(&self) -> &T {
        self.gateway.transport()
    }

    pub fn config(&self) -> &ToolWindowConfig {
        &self.config
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn current_context(&self) -> Option<&ContextKey> {
        self.context.current.as_ref()
    }

    pub fn table(&self) -> &ToolWindowTable {
        &self.table
    }

    pub fn geometry_hints(&self) -> Option<&GeometryHintStore> {
        self.hints.as_ref()
    }

    /// Switches the editing context, installs the event listener if needed and
    /// resyncs the new context from the host.
    ///
    /// The switch itself always takes effect; a failed resync leaves the
    /// context's cached rows as they were and reports the error.
    pub async fn set_context(
        &mut self,
        book_id: impl Into<String>,
        version_id: impl Into<String>,
    ) -> Result<ReconcileOutcome, ToolWindowError> {
        let context = ContextKey::new(book_id, version_id);
        if !self.context.is_current(&context) {
            tracing::info!(context = %context, "tool window context switched");
        }
        self.context.current = Some(context.clone());
        self.ensure_listener().await;
        self.resync(&context).await
    }

    pub async fn refresh(&mut self) -> Result<ReconcileOutcome, ToolWindowError> {
        let context = self.require_any_context()?;
        self.resync(&context).await
    }

    pub async fn open_tool(
        &mut self,
        kind: ToolKind,
        book_id: &str,
        version_id: &str,
    ) -> Result<ToolWindowRecord, ToolWindowError> {
        let context = ContextKey::new(book_id, version_id);
        self.require_current(&context)?;
        self.pump_events();

        let id = context.window_id(kind);
        if let Some(existing) = self.table.get(&id) {
            if !existing.docked {
                return Ok(existing.clone());
            }
            match self.undock_window(&id).await? {
                CommandOutcome::Applied | CommandOutcome::Unchanged => {
                    return self
                        .table
                        .get(&id)
                        .cloned()
                        .ok_or(ToolWindowError::UnknownWindow(id));
                }
                CommandOutcome::PrunedStale => {}
            }
        }

        let (position, size) = self.initial_geometry(kind, &context);
        let record = self.gateway.open(kind, &context, position, size).await?;
        self.pump_events();
        let outcome = self.table.apply_local(LocalWrite::Opened(record.clone()));
        tracing::info!(id = %record.id, outcome = ?outcome, "tool window opened");
        Ok(self.table.get(&id).cloned().unwrap_or(record))
    }

    pub async fn dock_window(&mut self, id: &str) -> Result<CommandOutcome, ToolWindowError> {
        self.pump_events();
        let record = self.tracked(id)?;
        if record.docked {
            return Ok(CommandOutcome::Unchanged);
        }
        match self.gateway.dock(id, Some(record.host_handle.as_str())).await {
            Ok(()) => {
                self.pump_events();
                self.table.apply_local(LocalWrite::Docked { id: id.to_string() });
                self.remember_geometry(&record);
                Ok(CommandOutcome::Applied)
            }
            Err(error) => self.settle_failure(id, error),
        }
    }

    pub async fn undock_window(&mut self, id: &str) -> Result<CommandOutcome, ToolWindowError> {
        self.pump_events();
        let record = self.tracked(id)?;
        if !record.docked {
            return Ok(CommandOutcome::Unchanged);
        }
        let (position, size) = (record.last_position, record.last_size);
        match self
            .gateway
            .undock(id, Some(record.host_handle.as_str()), position, size)
            .await
        {
            Ok(()) => {
                self.pump_events();
                self.table.apply_local(LocalWrite::Undocked {
                    id: id.to_string(),
                    position,
                    size,
                });
                Ok(CommandOutcome::Applied)
            }
            Err(error) => self.settle_failure(id, error),
        }
    }

    /// Closes a window. Ids the table does not know are still sent to the host,
    /// which treats closing an absent window as success.
    pub async fn close_tool(&mut self, id: &str) -> Result<CommandOutcome, ToolWindowError> {
        self.pump_events();
        let record = self.table.get(id).cloned();
        let handle = record.as_ref().map(|record| record.host_handle.as_str());
        match self.gateway.close(id, handle).await {
            Ok(()) => {
                self.pump_events();
                self.table.apply_local(LocalWrite::Closed { id: id.to_string() });
                if let Some(record) = &record {
                    self.remember_geometry(record);
                }
                Ok(CommandOutcome::Applied)
            }
            Err(error) => self.settle_failure(id, error),
        }
    }

    /// Closes every window of the current context; other contexts keep theirs.
    pub async fn close_all_tools(&mut self) -> Result<usize, ToolWindowError> {
        let context = self.require_any_context()?;
        self.gateway.close_all(&context).await?;
        self.pump_events();
        let closing = self
            .table
            .records_for(&context)
            .into_iter()
            .cloned()
            .collect::<Vec<_>>();
        for record in &closing {
            self.remember_geometry(record);
        }
        let outcome = self.table.apply_local(LocalWrite::ContextClosed(context.clone()));
        tracing::info!(context = %context, outcome = ?outcome, "closed all tool windows");
        Ok(closing.len())
    }

    /// Rows for a context, defaulting each missing part to the current context.
    pub fn get_tool_windows(
        &self,
        book_id: Option<&str>,
        version_id: Option<&str>,
    ) -> Vec<&ToolWindowRecord> {
        let current = self.context.current.as_ref();
        let book = book_id.or_else(|| current.map(|context| context.book_id.as_str()));
        let version = version_id.or_else(|| current.map(|context| context.version_id.as_str()));
        match (book, version) {
            (Some(book), Some(version)) => self.table.records_for(&ContextKey::new(book, version)),
            _ => Vec::new(),
        }
    }

    pub fn set_dock_panel_visible(&mut self, visible: bool) {
        self.context.dock_panel_visible = visible;
    }

    pub fn toggle_dock_panel(&mut self) -> bool {
        self.context.dock_panel_visible = !self.context.dock_panel_visible;
        self.context.dock_panel_visible
    }

    /// Applies every host event already queued. Returns how many were applied.
    pub fn pump_events(&mut self) -> usize {
        let Some(subscription) = self.subscription.as_mut() else {
            return 0;
        };
        let events = subscription.drain();
        let closed = subscription.is_closed();
        for event in &events {
            self.apply_remote(event);
        }
        if closed {
            self.drop_listener();
        }
        events.len()
    }

    /// Waits for the next host event and applies it. `None` when no listener is
    /// installed or the host hung up.
    pub async fn next_event(&mut self) -> Option<ReconcileOutcome> {
        let subscription = self.subscription.as_mut()?;
        let next = subscription.next().await;
        match next {
            Some(event) => Some(self.apply_remote(&event)),
            None => {
                self.drop_listener();
                None
            }
        }
    }

    /// Ends the session and hands the transport back.
    pub fn teardown(mut self) -> T {
        tracing::info!(
            windows = self.table.len(),
            contexts = self.table.contexts().len(),
            "tool window session torn down"
        );
        self.subscription = None;
        self.table.clear();
        self.gateway.into_transport()
    }

    async fn ensure_listener(&mut self) {
        if self.context.listener_installed {
            return;
        }
        if self.context.listener_attempts >= self.config.listener_install_attempts {
            return;
        }
        self.context.listener_attempts = self.context.listener_attempts.saturating_add(1);
        match EventSubscription::install(self.gateway.transport()).await {
            Ok(subscription) => {
                self.subscription = Some(subscription);
                self.context.listener_installed = true;
                tracing::debug!(
                    attempt = self.context.listener_attempts,
                    "tool window listener installed"
                );
            }
            Err(fault) => {
                tracing::warn!(
                    attempt = self.context.listener_attempts,
                    max_attempts = self.config.listener_install_attempts,
                    reason = %fault,
                    "tool window listener install failed; remote updates unavailable"
                );
            }
        }
    }

    fn drop_listener(&mut self) {
        self.subscription = None;
        self.context.listener_installed = false;
    }

    async fn resync(&mut self, context: &ContextKey) -> Result<ReconcileOutcome, ToolWindowError> {
        let snapshot = self.gateway.list_for_context(context).await?;
        // Events queued while the snapshot was in flight arrived before it.
        self.pump_events();
        let outcome = self.table.replace_context(context, snapshot);
        tracing::debug!(context = %context, outcome = ?outcome, "tool window context resynced");
        Ok(outcome)
    }

    fn apply_remote(&mut self, event: &ToolWindowEvent) -> ReconcileOutcome {
        let outcome = self.table.apply_event(event);
        if let ReconcileOutcome::Rejected(reason) = &outcome {
            tracing::warn!(event = event.kind().as_str(), reason = %reason, "host event rejected");
            return outcome;
        }
        tracing::debug!(
            event = event.kind().as_str(),
            id = %event.record().id,
            outcome = ?outcome,
            "host event applied"
        );
        if matches!(event, ToolWindowEvent::Docked(_) | ToolWindowEvent::Closed(_)) {
            self.remember_geometry(event.record());
        }
        outcome
    }

    fn settle_failure(
        &mut self,
        id: &str,
        error: ToolWindowError,
    ) -> Result<CommandOutcome, ToolWindowError> {
        if let ToolWindowError::UnknownWindow(_) = error {
            tracing::warn!(id = %id, "host lost track of tool window; pruning cached row");
            self.table.apply_local(LocalWrite::Closed { id: id.to_string() });
            return Ok(CommandOutcome::PrunedStale);
        }
        Err(error)
    }

    fn tracked(&self, id: &str) -> Result<ToolWindowRecord, ToolWindowError> {
        self.table
            .get(id)
            .cloned()
            .ok_or_else(|| ToolWindowError::UnknownWindow(id.to_string()))
    }

    fn require_current(&self, context: &ContextKey) -> Result<(), ToolWindowError> {
        if self.context.is_current(context) {
            Ok(())
        } else {
            Err(ToolWindowError::context_mismatch(
                context,
                self.context.current.as_ref(),
            ))
        }
    }

    fn require_any_context(&self) -> Result<ContextKey, ToolWindowError> {
        self.context
            .current
            .clone()
            .ok_or_else(ToolWindowError::no_context)
    }

    fn initial_geometry(&self, kind: ToolKind, context: &ContextKey) -> (WindowPosition, WindowSize) {
        if let Some(hint) = self.hints.as_ref().and_then(|hints| hints.hint(kind)) {
            return hint;
        }
        let spec = kind.spec();
        let floating = self
            .table
            .records_for(context)
            .iter()
            .filter(|record| !record.docked)
            .count();
        let step = self.config.cascade_offset * (floating as f64 + 1.0);
        (
            WindowPosition::new(step, step),
            WindowSize::new(spec.default_width, spec.default_height),
        )
    }

    fn remember_geometry(&mut self, record: &ToolWindowRecord) {
        let Some(hints) = self.hints.as_mut() else {
            return;
        };
        if let Err(error) = hints.remember(record.tool_kind, record.last_position, record.last_size)
        {
            tracing::warn!(id = %record.id, reason = %error, "failed to persist geometry hint");
        }
    }
}
