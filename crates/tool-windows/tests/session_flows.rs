use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tool_windows::{
    CommandOutcome, ContextKey, DockSidebar, HostCommand, HostEventEnvelope, HostEventKind,
    LauncherAffordance, MemoryHost, ReconcileOutcome, ToolKind, ToolLauncher, ToolWindowConfig,
    ToolWindowError, ToolWindowRecord, ToolWindowSession, WindowPosition, WindowSize,
    WindowState, create_session, window_identity,
};

type Session = ToolWindowSession<Arc<MemoryHost>>;

fn session(host: &Arc<MemoryHost>) -> Session {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    create_session(Arc::clone(host), ToolWindowConfig::ephemeral())
}

fn state_of(session: &Session, id: &str) -> Option<WindowState> {
    session.table().get(id).map(ToolWindowRecord::state)
}

fn docked_record(book: &str, version: &str, kind: ToolKind) -> ToolWindowRecord {
    ToolWindowRecord {
        id: window_identity(book, version, kind),
        tool_kind: kind,
        book_id: book.to_string(),
        version_id: version.to_string(),
        docked: true,
        visible: false,
        title: kind.spec().title.to_string(),
        icon_ref: None,
        last_position: WindowPosition::new(300.0, 120.0),
        last_size: WindowSize::new(kind.spec().default_width, kind.spec().default_height),
        host_handle: String::new(),
    }
}

#[tokio::test]
async fn dock_remote_restore_and_context_switch_scenario() -> Result<()> {
    let host = Arc::new(MemoryHost::new());
    let mut session = session(&host);
    session.set_context("b1", "v1").await?;

    let opened = session
        .open_tool(ToolKind::NameGenerator, "b1", "v1")
        .await?;
    assert_eq!(opened.id, "b1-v1-name-generator");
    assert_eq!(session.table().len(), 1);
    assert_eq!(state_of(&session, &opened.id), Some(WindowState::Floating));

    assert_eq!(
        session.dock_window(&opened.id).await?,
        CommandOutcome::Applied
    );
    assert_eq!(state_of(&session, &opened.id), Some(WindowState::Docked));

    let sidebar = DockSidebar::new(ContextKey::new("b1", "v1"));
    let entries = sidebar.entries(&session).context("sidebar is current")?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, opened.id);

    assert!(host.user_undock(&opened.id).await);
    assert_eq!(session.pump_events(), 1);
    assert_eq!(state_of(&session, &opened.id), Some(WindowState::Floating));
    assert_eq!(sidebar.entries(&session), Some(Vec::new()));

    let outcome = session.set_context("b2", "v2").await?;
    assert_eq!(
        outcome,
        ReconcileOutcome::Replaced {
            previous: 0,
            current: 0,
            rejected: 0
        }
    );
    assert!(session.table().contains(&opened.id));
    assert!(session.get_tool_windows(None, None).is_empty());
    assert_eq!(session.get_tool_windows(Some("b1"), Some("v1")).len(), 1);
    assert_eq!(sidebar.entries(&session), None);
    assert_eq!(
        DockSidebar::new(ContextKey::new("b2", "v2")).entries(&session),
        Some(Vec::new())
    );
    Ok(())
}

#[tokio::test]
async fn opening_twice_yields_one_window() -> Result<()> {
    let host = Arc::new(MemoryHost::new());
    let mut session = session(&host);
    session.set_context("b1", "v1").await?;

    let first = session
        .open_tool(ToolKind::CharacterTracker, "b1", "v1")
        .await?;
    let second = session
        .open_tool(ToolKind::CharacterTracker, "b1", "v1")
        .await?;

    assert_eq!(first, second);
    assert_eq!(session.table().len(), 1);
    assert_eq!(host.window_count().await, 1);
    let opens = host
        .command_log()
        .await
        .into_iter()
        .filter(|command| *command == HostCommand::OpenToolWindow)
        .count();
    assert_eq!(opens, 1);
    Ok(())
}

#[tokio::test]
async fn opening_a_docked_tool_restores_it() -> Result<()> {
    let host = Arc::new(MemoryHost::new());
    let mut session = session(&host);
    session.set_context("b1", "v1").await?;

    let opened = session.open_tool(ToolKind::PlotTimeline, "b1", "v1").await?;
    session.dock_window(&opened.id).await?;
    let reopened = session.open_tool(ToolKind::PlotTimeline, "b1", "v1").await?;

    assert_eq!(reopened.id, opened.id);
    assert_eq!(reopened.state(), WindowState::Floating);
    assert_eq!(reopened.last_position, opened.last_position);
    assert_eq!(
        host.command_log().await.last(),
        Some(&HostCommand::RestoreToolWindow)
    );
    assert_eq!(host.window_count().await, 1);
    Ok(())
}

#[tokio::test]
async fn docked_then_undocked_converges_with_local_dock_in_flight() -> Result<()> {
    let host = Arc::new(MemoryHost::new());
    let mut session = session(&host);
    session.set_context("b1", "v1").await?;
    let opened = session.open_tool(ToolKind::ResearchNotes, "b1", "v1").await?;

    host.set_echo_command_events(true).await;
    session.dock_window(&opened.id).await?;
    assert!(host.user_undock(&opened.id).await);
    session.pump_events();
    let settled = session.table().get(&opened.id).context("row present")?;
    assert!(!settled.docked && settled.visible);

    let snapshot = host.window(&opened.id).await.context("host window")?;
    let mut docked = snapshot.clone();
    docked.mark_docked();
    host.emit_raw(HostEventEnvelope::new(
        HostEventKind::Docked,
        serde_json::to_value(&docked)?,
    ))
    .await;
    host.emit_raw(HostEventEnvelope::new(
        HostEventKind::Undocked,
        serde_json::to_value(&snapshot)?,
    ))
    .await;
    assert_eq!(session.pump_events(), 2);
    let settled = session.table().get(&opened.id).context("row present")?;
    assert!(!settled.docked && settled.visible);
    assert_eq!(session.table().len(), 1);
    Ok(())
}

#[tokio::test]
async fn resync_empties_queried_context_and_keeps_others() -> Result<()> {
    let host = Arc::new(MemoryHost::new());
    let mut session = session(&host);

    session.set_context("a", "1").await?;
    let a_names = session.open_tool(ToolKind::NameGenerator, "a", "1").await?;
    let a_plot = session.open_tool(ToolKind::PlotTimeline, "a", "1").await?;
    session.set_context("b", "1").await?;
    let b_names = session.open_tool(ToolKind::NameGenerator, "b", "1").await?;

    // Host loses a's windows without telling us.
    host.forget_window(&a_names.id).await;
    host.forget_window(&a_plot.id).await;

    let outcome = session.set_context("a", "1").await?;
    assert_eq!(
        outcome,
        ReconcileOutcome::Replaced {
            previous: 2,
            current: 0,
            rejected: 0
        }
    );
    assert!(!session.table().contains(&a_names.id));
    assert!(!session.table().contains(&a_plot.id));
    assert!(session.table().contains(&b_names.id));
    Ok(())
}

#[tokio::test]
async fn resync_adopts_windows_restored_by_the_host() -> Result<()> {
    let host = Arc::new(MemoryHost::new());
    host.restore_from_previous_session(docked_record("b1", "v1", ToolKind::CharacterBuilder))
        .await;
    let mut session = session(&host);

    session.set_context("b1", "v1").await?;

    let id = window_identity("b1", "v1", ToolKind::CharacterBuilder);
    assert_eq!(state_of(&session, &id), Some(WindowState::Docked));
    let entries = DockSidebar::new(ContextKey::new("b1", "v1"))
        .entries(&session)
        .context("sidebar is current")?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].icon_ref.as_deref(), Some("user-pen"));
    Ok(())
}

#[tokio::test]
async fn stale_views_render_nothing_and_refuse_actions() -> Result<()> {
    let host = Arc::new(MemoryHost::new());
    let mut session = session(&host);
    session.set_context("x", "1").await?;
    let opened = session.open_tool(ToolKind::NameGenerator, "x", "1").await?;
    session.dock_window(&opened.id).await?;

    session.set_context("y", "1").await?;
    let stale_context = ContextKey::new("x", "1");
    let sidebar = DockSidebar::new(stale_context.clone());
    let launcher = ToolLauncher::new(stale_context);

    assert!(session.table().contains(&opened.id));
    assert_eq!(sidebar.entries(&session), None);
    assert_eq!(launcher.slots(&session), None);

    let activate = launcher.activate(&mut session, ToolKind::NameGenerator).await;
    assert!(matches!(
        activate,
        Err(ToolWindowError::ContextMismatch { .. })
    ));
    let restore = sidebar.restore(&mut session, &opened.id).await;
    assert!(matches!(restore, Err(ToolWindowError::ContextMismatch { .. })));
    let direct = session.open_tool(ToolKind::NameGenerator, "x", "1").await;
    assert!(matches!(direct, Err(ToolWindowError::ContextMismatch { .. })));
    assert_eq!(state_of(&session, &opened.id), Some(WindowState::Docked));
    Ok(())
}

#[tokio::test]
async fn closed_twice_or_after_local_close_is_a_no_op() -> Result<()> {
    let host = Arc::new(MemoryHost::new());
    let mut session = session(&host);
    session.set_context("b1", "v1").await?;
    let opened = session.open_tool(ToolKind::NameGenerator, "b1", "v1").await?;

    assert_eq!(session.close_tool(&opened.id).await?, CommandOutcome::Applied);
    let payload = serde_json::to_value(&opened)?;
    host.emit_raw(HostEventEnvelope::new(HostEventKind::Closed, payload.clone()))
        .await;
    host.emit_raw(HostEventEnvelope::new(HostEventKind::Closed, payload))
        .await;
    assert_eq!(session.pump_events(), 2);
    assert!(session.table().is_empty());

    assert_eq!(session.close_tool(&opened.id).await?, CommandOutcome::Applied);
    assert!(session.table().is_empty());
    Ok(())
}

#[tokio::test]
async fn remote_close_removes_the_row() -> Result<()> {
    let host = Arc::new(MemoryHost::new());
    let mut session = session(&host);
    session.set_context("b1", "v1").await?;
    let opened = session.open_tool(ToolKind::CharacterTracker, "b1", "v1").await?;

    assert!(host.user_close(&opened.id).await);
    assert_eq!(
        session.next_event().await,
        Some(ReconcileOutcome::Removed(1))
    );
    assert!(!session.table().contains(&opened.id));
    assert!(!host.user_close(&opened.id).await);
    Ok(())
}

#[tokio::test]
async fn unknown_window_prunes_the_stale_row() -> Result<()> {
    let host = Arc::new(MemoryHost::new());
    let mut session = session(&host);
    session.set_context("b1", "v1").await?;
    let opened = session.open_tool(ToolKind::ResearchNotes, "b1", "v1").await?;
    session.dock_window(&opened.id).await?;

    host.forget_window(&opened.id).await;
    assert_eq!(
        session.undock_window(&opened.id).await?,
        CommandOutcome::PrunedStale
    );
    assert!(session.table().is_empty());
    Ok(())
}

#[tokio::test]
async fn open_replaces_a_docked_row_the_host_forgot() -> Result<()> {
    let host = Arc::new(MemoryHost::new());
    let mut session = session(&host);
    session.set_context("b1", "v1").await?;
    let opened = session.open_tool(ToolKind::PlotTimeline, "b1", "v1").await?;
    session.dock_window(&opened.id).await?;
    host.forget_window(&opened.id).await;

    let reopened = session.open_tool(ToolKind::PlotTimeline, "b1", "v1").await?;
    assert_eq!(reopened.id, opened.id);
    assert_eq!(reopened.state(), WindowState::Floating);
    assert_ne!(reopened.host_handle, opened.host_handle);
    assert_eq!(host.window_count().await, 1);
    assert_eq!(session.table().len(), 1);
    Ok(())
}

#[tokio::test]
async fn failed_commands_leave_the_table_untouched() -> Result<()> {
    let host = Arc::new(MemoryHost::new());
    let mut session = session(&host);
    session.set_context("b1", "v1").await?;
    let opened = session.open_tool(ToolKind::NameGenerator, "b1", "v1").await?;

    host.fail_next_open().await;
    let failed_open = session.open_tool(ToolKind::PlotTimeline, "b1", "v1").await;
    assert!(matches!(
        failed_open,
        Err(ToolWindowError::WindowCreationFailed(_))
    ));
    assert_eq!(session.table().len(), 1);

    host.set_available(false).await;
    let failed_dock = session.dock_window(&opened.id).await;
    assert!(matches!(failed_dock, Err(ToolWindowError::HostUnavailable(_))));
    assert_eq!(state_of(&session, &opened.id), Some(WindowState::Floating));

    let failed_resync = session.set_context("b2", "v2").await;
    assert!(matches!(
        failed_resync,
        Err(ToolWindowError::HostUnavailable(_))
    ));
    assert_eq!(session.current_context(), Some(&ContextKey::new("b2", "v2")));
    assert!(session.table().contains(&opened.id));
    Ok(())
}

#[tokio::test]
async fn listener_install_is_retried_once_then_abandoned() -> Result<()> {
    let host = Arc::new(MemoryHost::new());
    host.fail_subscribe(5).await;
    let mut session = session(&host);

    session.set_context("b1", "v1").await?;
    session.set_context("b1", "v2").await?;
    session.set_context("b1", "v3").await?;
    assert_eq!(session.context().listener_attempts(), 2);
    assert!(!session.context().listener_installed);

    // Local commands still settle without the listener.
    let opened = session.open_tool(ToolKind::NameGenerator, "b1", "v3").await?;
    assert!(host.user_dock(&opened.id).await);
    assert_eq!(session.pump_events(), 0);
    assert_eq!(state_of(&session, &opened.id), Some(WindowState::Floating));

    // A refresh still brings the remote change in.
    session.refresh().await?;
    assert_eq!(state_of(&session, &opened.id), Some(WindowState::Docked));
    Ok(())
}

#[tokio::test]
async fn listener_installs_on_the_retry() -> Result<()> {
    let host = Arc::new(MemoryHost::new());
    host.fail_subscribe(1).await;
    let mut session = session(&host);

    session.set_context("b1", "v1").await?;
    assert!(!session.context().listener_installed);
    session.set_context("b1", "v1").await?;
    assert!(session.context().listener_installed);

    let opened = session.open_tool(ToolKind::NameGenerator, "b1", "v1").await?;
    assert!(host.user_dock(&opened.id).await);
    assert_eq!(session.pump_events(), 1);
    assert_eq!(state_of(&session, &opened.id), Some(WindowState::Docked));
    Ok(())
}

#[tokio::test]
async fn host_hangup_drops_the_listener() -> Result<()> {
    let host = Arc::new(MemoryHost::new());
    let mut session = session(&host);
    session.set_context("b1", "v1").await?;
    assert!(session.context().listener_installed);

    host.hang_up_subscribers().await;
    assert_eq!(session.pump_events(), 0);
    assert!(!session.context().listener_installed);
    assert_eq!(session.next_event().await, None);
    Ok(())
}

#[tokio::test]
async fn close_all_only_touches_the_current_context() -> Result<()> {
    let host = Arc::new(MemoryHost::new());
    let mut session = session(&host);

    session.set_context("b", "1").await?;
    let other = session.open_tool(ToolKind::ResearchNotes, "b", "1").await?;
    session.set_context("a", "1").await?;
    session.open_tool(ToolKind::NameGenerator, "a", "1").await?;
    session.open_tool(ToolKind::PlotTimeline, "a", "1").await?;

    assert_eq!(session.close_all_tools().await?, 2);
    assert!(session.get_tool_windows(None, None).is_empty());
    assert!(session.table().contains(&other.id));
    assert!(host.window(&other.id).await.is_some());
    assert_eq!(host.window_count().await, 1);
    Ok(())
}

#[tokio::test]
async fn commands_without_a_context_are_refused() -> Result<()> {
    let host = Arc::new(MemoryHost::new());
    let mut session = session(&host);

    let close_all = session.close_all_tools().await;
    assert!(matches!(
        close_all,
        Err(ToolWindowError::ContextMismatch { current: None, .. })
    ));
    let refresh = session.refresh().await;
    assert!(matches!(refresh, Err(ToolWindowError::ContextMismatch { .. })));
    let open = session.open_tool(ToolKind::NameGenerator, "b1", "v1").await;
    assert!(matches!(open, Err(ToolWindowError::ContextMismatch { .. })));
    assert!(host.command_log().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn launcher_slots_follow_window_state() -> Result<()> {
    let host = Arc::new(MemoryHost::new());
    let mut session = session(&host);
    session.set_context("b1", "v1").await?;
    let launcher = ToolLauncher::new(ContextKey::new("b1", "v1"));

    launcher.activate(&mut session, ToolKind::NameGenerator).await?;
    launcher.activate(&mut session, ToolKind::CharacterTracker).await?;
    launcher.dock(&mut session, ToolKind::CharacterTracker).await?;

    let slots = launcher.slots(&session).context("launcher is current")?;
    let affordances = slots
        .iter()
        .map(|slot| (slot.tool_kind, slot.affordance()))
        .collect::<Vec<_>>();
    assert_eq!(
        affordances,
        vec![
            (ToolKind::NameGenerator, LauncherAffordance::Dock),
            (ToolKind::CharacterTracker, LauncherAffordance::Restore),
            (ToolKind::CharacterBuilder, LauncherAffordance::Open),
            (ToolKind::PlotTimeline, LauncherAffordance::Open),
            (ToolKind::ResearchNotes, LauncherAffordance::Open),
        ]
    );

    launcher.close(&mut session, ToolKind::NameGenerator).await?;
    let Some(slots) = launcher.slots(&session) else {
        bail!("launcher went stale");
    };
    assert_eq!(slots[0].affordance(), LauncherAffordance::Open);
    Ok(())
}

#[tokio::test]
async fn dock_panel_visibility_gates_the_sidebar() -> Result<()> {
    let host = Arc::new(MemoryHost::new());
    let mut session = session(&host);
    session.set_context("b1", "v1").await?;
    let sidebar = DockSidebar::new(ContextKey::new("b1", "v1"));

    assert!(!sidebar.is_shown(&session));
    assert!(session.toggle_dock_panel());
    assert!(sidebar.is_shown(&session));
    session.set_context("b1", "v2").await?;
    assert!(!sidebar.is_shown(&session));
    session.set_dock_panel_visible(false);
    assert!(!session.context().dock_panel_visible);
    Ok(())
}

#[tokio::test]
async fn geometry_hints_carry_across_sessions() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let hint_path = temp.path().join("tool-window-geometry.v1.json");
    let host = Arc::new(MemoryHost::new());

    let mut first = create_session(
        Arc::clone(&host),
        ToolWindowConfig {
            hint_store_path: Some(hint_path.clone()),
            ..ToolWindowConfig::ephemeral()
        },
    );
    first.set_context("b1", "v1").await?;
    let opened = first.open_tool(ToolKind::NameGenerator, "b1", "v1").await?;
    assert_eq!(opened.last_position, WindowPosition::new(24.0, 24.0));
    first.close_tool(&opened.id).await?;
    let host = first.teardown();

    let mut second = create_session(
        host,
        ToolWindowConfig {
            hint_store_path: Some(hint_path),
            cascade_offset: 100.0,
            ..ToolWindowConfig::ephemeral()
        },
    );
    second.set_context("b2", "v1").await?;
    let reopened = second.open_tool(ToolKind::NameGenerator, "b2", "v1").await?;
    assert_eq!(reopened.last_position, WindowPosition::new(24.0, 24.0));

    let fresh = second.open_tool(ToolKind::PlotTimeline, "b2", "v1").await?;
    assert_eq!(fresh.last_position, WindowPosition::new(200.0, 200.0));
    Ok(())
}

#[tokio::test]
async fn dashed_book_and_version_ids_open_separate_windows() -> Result<()> {
    let host = Arc::new(MemoryHost::new());
    let mut session = session(&host);

    session.set_context("a", "b-c").await?;
    let first = session.open_tool(ToolKind::NameGenerator, "a", "b-c").await?;
    session.set_context("a-b", "c").await?;
    let second = session.open_tool(ToolKind::NameGenerator, "a-b", "c").await?;

    assert_ne!(first.id, second.id);
    assert_eq!(second.context(), ContextKey::new("a-b", "c"));
    assert_eq!(host.window_count().await, 2);
    assert_eq!(session.table().len(), 2);
    assert_eq!(session.get_tool_windows(Some("a-b"), Some("c")).len(), 1);
    assert_eq!(session.get_tool_windows(Some("a"), Some("b-c")).len(), 1);

    assert!(host.user_dock(&second.id).await);
    session.pump_events();
    assert_eq!(state_of(&session, &second.id), Some(WindowState::Docked));
    assert_eq!(state_of(&session, &first.id), Some(WindowState::Floating));
    Ok(())
}

#[tokio::test]
async fn rejected_events_do_not_touch_geometry_hints() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let hint_path = temp.path().join("tool-window-geometry.v1.json");
    let host = Arc::new(MemoryHost::new());
    let mut session = create_session(
        Arc::clone(&host),
        ToolWindowConfig {
            hint_store_path: Some(hint_path.clone()),
            ..ToolWindowConfig::ephemeral()
        },
    );
    session.set_context("b1", "v1").await?;

    let mut forged = docked_record("b1", "v1", ToolKind::ResearchNotes);
    forged.id = "b1-v1-notes".to_string();
    forged.last_position = WindowPosition::new(999.0, 999.0);
    host.emit_raw(HostEventEnvelope::new(
        HostEventKind::Docked,
        serde_json::to_value(&forged)?,
    ))
    .await;
    assert_eq!(
        session.next_event().await,
        Some(ReconcileOutcome::Rejected(
            "event for b1-v1-notes does not match its identity".to_string()
        ))
    );
    let hints = session.geometry_hints().context("hint store enabled")?;
    assert_eq!(hints.hint(ToolKind::ResearchNotes), None);
    assert!(!hint_path.exists());

    let opened = session.open_tool(ToolKind::ResearchNotes, "b1", "v1").await?;
    assert!(host.user_dock(&opened.id).await);
    session.pump_events();
    let hints = session.geometry_hints().context("hint store enabled")?;
    assert_eq!(
        hints.hint(ToolKind::ResearchNotes),
        Some((opened.last_position, opened.last_size))
    );
    Ok(())
}

#[tokio::test]
async fn missing_context_errors_say_so() -> Result<()> {
    let host = Arc::new(MemoryHost::new());
    let mut session = session(&host);

    let error = session
        .close_all_tools()
        .await
        .err()
        .context("close_all without a context must fail")?;
    assert_eq!(error.to_string(), "no session context is set");
    assert_eq!(error.code(), "context_mismatch");
    Ok(())
}
