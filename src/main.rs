//! statusbar
//!
//! Top-of-screen status bar for X11 desktops: active window title, the
//! focused application's global menu, window controls and a clock.

mod activity;
mod appmenu;
mod apps;
mod config;
mod dbus;
mod input;
mod shared;
mod shell;
mod wm;
mod x11_async;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{AtomEnum, ChangeWindowAttributesAux, ConnectionExt, EventMask, Window};
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

use activity::control::WindowController;
use activity::{Activity, ActivityEvent};
use appmenu::model::{MenuEvent, MenuOutcome};
use appmenu::AppMenu;
use apps::AppRegistry;
use config::Config;
use dbus::dbusmenu::MenuEntry;
use dbus::statusbar::{ShellCommand, StatusbarService};
use input::{TitleAction, TitleGesture};
use shell::layout::{format_clock, Hit};
use shell::{BarState, Stacking, StatusBar};
use wm::ewmh::Atoms;

/// Receivers the main loop selects on next to the X11 socket
struct Inbox {
    menu_events: UnboundedReceiver<MenuEvent>,
    shell_commands: UnboundedReceiver<ShellCommand>,
}

/// Main application state
struct StatusBarApp {
    /// X11 connection (Arc for sharing with the controller and event stream)
    conn: Arc<RustConnection>,

    /// X11 async event stream (non-blocking polling)
    x11_stream: x11_async::X11EventStream,

    atoms: Arc<Atoms>,
    root: Window,

    config: Config,

    bar: StatusBar,
    activity: Activity,
    registry: AppRegistry,
    controller: WindowController,
    app_menu: AppMenu,

    /// Keeps the session bus and the exported service alive
    _dbus: Option<dbus::DbusManager>,

    /// Active window whose property changes we listen to
    watched: Option<Window>,

    /// Press/drag/double-click state on the title
    gesture: TitleGesture,

    /// Top-level entry waiting for its submenu, or showing it
    open_menu: Option<i32>,

    clock: String,
}

impl StatusBarApp {
    async fn new() -> Result<(Self, Inbox)> {
        let (conn, screen_num) = x11rb::connect(None).context("Failed to connect to X server")?;
        let conn = Arc::new(conn);
        let root = conn.setup().roots[screen_num].root;
        info!("Connected to X server, screen {}, root window {:#x}", screen_num, root);

        let config = Config::load().unwrap_or_else(|e| {
            warn!("Failed to load configuration, using defaults: {:#}", e);
            Config::default()
        });

        let atoms = Arc::new(Atoms::new(conn.as_ref()).context("Failed to intern atoms")?);

        conn.change_window_attributes(
            root,
            &ChangeWindowAttributesAux::new().event_mask(EventMask::PROPERTY_CHANGE),
        )?;
        if let Err(e) = wm::screen::select_screen_changes(conn.as_ref(), root) {
            warn!("RandR unavailable, bar will not follow monitor changes: {}", e);
        }

        let registry = AppRegistry::scan();
        info!("Application registry: {} entries", registry.len());

        let bar = StatusBar::new(conn.as_ref(), &atoms, screen_num, &config)
            .context("Failed to create bar window")?;

        let (menu_tx, menu_events) = mpsc::unbounded_channel();
        let (command_tx, shell_commands) = mpsc::unbounded_channel();

        let dbus = match dbus::DbusManager::new().await {
            Ok(manager) => {
                let service = StatusbarService::new(
                    config.clock.twenty_four_time,
                    config.battery.show_battery_percentage,
                    command_tx,
                );
                if let Err(e) = dbus::statusbar::serve(manager.connection(), service).await {
                    warn!("Statusbar D-Bus service disabled: {:#}", e);
                }
                Some(manager)
            }
            Err(e) => {
                warn!("No session bus, global menu disabled: {:#}", e);
                None
            }
        };
        let bus = dbus.as_ref().map(|d| d.connection().clone());

        let x11_stream = x11_async::X11EventStream::new(conn.clone())
            .context("Failed to initialize X11 event stream")?;

        let app = Self {
            activity: Activity::new(&config.activity.launcher_class, &config.activity.block_list),
            controller: WindowController::new(conn.clone(), atoms.clone(), root),
            app_menu: AppMenu::new(bus, menu_tx),
            conn,
            x11_stream,
            atoms,
            root,
            config,
            bar,
            registry,
            _dbus: dbus,
            watched: None,
            gesture: TitleGesture::new(),
            open_menu: None,
            clock: String::new(),
        };

        Ok((
            app,
            Inbox {
                menu_events,
                shell_commands,
            },
        ))
    }

    async fn run(mut self, mut inbox: Inbox) -> Result<()> {
        info!("Starting main event loop");

        let mut menu_poll =
            tokio::time::interval(Duration::from_millis(self.config.menu.poll_interval_ms.max(50)));
        let mut clock_tick = tokio::time::interval(Duration::from_secs(1));

        if let Err(e) = self.on_active_window_changed() {
            warn!("Failed to read the active window: {:#}", e);
        }
        self.update_clock();
        self.repaint();

        loop {
            if let Err(e) = self.x11_stream.flush() {
                if x11_async::is_connection_lost(&e) {
                    info!("X11 connection lost, exiting cleanly");
                    return Ok(());
                }
                warn!("Failed to flush X11 requests: {}", e);
            }

            // Replies read during the last iteration may have queued events
            match self.x11_stream.drain() {
                Ok(events) if !events.is_empty() => {
                    for event in events {
                        if let Err(e) = self.handle_event(event) {
                            warn!("Failed to handle X11 event: {:#}", e);
                        }
                    }
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    if x11_async::is_connection_lost(&e) {
                        error!("X11 connection lost, exiting cleanly");
                        return Ok(());
                    }
                    error!("Error polling for X11 events: {}", e);
                }
            }

            tokio::select! {
                () = self.x11_stream.wait_readable() => {}

                _ = menu_poll.tick() => {
                    match self.app_menu.poll(self.conn.as_ref(), &self.atoms, self.root) {
                        Ok(true) => self.repaint(),
                        Ok(false) => {}
                        Err(e) => debug!("Menu poll failed: {}", e),
                    }
                }

                _ = clock_tick.tick() => {
                    if self.update_clock() {
                        self.repaint();
                    }
                }

                Some(event) = inbox.menu_events.recv() => {
                    if let Err(e) = self.on_menu_event(event) {
                        warn!("Failed to apply menu update: {:#}", e);
                    }
                }

                Some(command) = inbox.shell_commands.recv() => {
                    self.on_shell_command(command);
                }
            }
        }
    }

    fn handle_event(&mut self, event: Event) -> Result<()> {
        match event {
            Event::PropertyNotify(e) => {
                if e.window == self.root && e.atom == self.atoms._net_active_window {
                    self.on_active_window_changed()?;
                } else if Some(e.window) == self.watched && self.is_tracked_property(e.atom) {
                    self.refresh_activity()?;
                }
            }
            Event::Expose(e) if e.count == 0 => {
                if e.window == self.bar.window() {
                    self.repaint();
                } else if self.bar.popup().is_some_and(|p| p.window() == e.window) {
                    self.bar.draw_popup(self.conn.as_ref(), None)?;
                }
            }
            Event::ButtonPress(e) => self.on_button_press(e.detail, e.time, e.root_x, e.root_y)?,
            Event::ButtonRelease(_) => self.gesture.release(),
            Event::MotionNotify(e) => self.on_motion(e.root_x, e.root_y)?,
            Event::RandrScreenChangeNotify(_) | Event::RandrNotify(_) => {
                if self.bar.update_geometry(self.conn.as_ref(), &self.atoms)? {
                    self.repaint();
                }
            }
            Event::Error(e) => {
                // Mostly requests racing a window that just went away
                debug!("X11 error: {:?}", e);
            }
            _ => {}
        }
        Ok(())
    }

    fn is_tracked_property(&self, atom: u32) -> bool {
        atom == self.atoms._net_wm_name
            || atom == self.atoms._net_wm_visible_name
            || atom == u32::from(AtomEnum::WM_NAME)
            || atom == self.atoms._net_wm_state
            || atom == self.atoms._net_wm_window_type
    }

    /// Move the property subscription to the new active window and refresh
    fn on_active_window_changed(&mut self) -> Result<()> {
        let conn = self.conn.as_ref();
        let active = self.atoms.active_window(conn, self.root)?;

        if active != self.watched {
            if let Some(old) = self.watched.take() {
                if old != self.bar.window() {
                    // The window may already be gone; that error is harmless
                    conn.change_window_attributes(old, &ChangeWindowAttributesAux::new().event_mask(EventMask::NO_EVENT))?;
                }
            }
            if let Some(window) = active.filter(|&w| w != self.bar.window()) {
                conn.change_window_attributes(
                    window,
                    &ChangeWindowAttributesAux::new().event_mask(EventMask::PROPERTY_CHANGE),
                )?;
                self.watched = Some(window);
            }
        }

        self.refresh_activity()?;

        // Follow focus immediately instead of waiting for the next poll
        if self.app_menu.poll(self.conn.as_ref(), &self.atoms, self.root)? {
            self.repaint();
        }
        Ok(())
    }

    fn refresh_activity(&mut self) -> Result<()> {
        let conn = self.conn.as_ref();
        let info = match self.atoms.active_window(conn, self.root)? {
            Some(window) => wm::window_info::ForegroundWindowInfo::fetch(conn, &self.atoms, self.root, window)
                .unwrap_or_else(|e| {
                    debug!("Active window {:#x} unreadable: {}", window, e);
                    None
                }),
            None => None,
        };

        let events = self.activity.update(info.as_ref(), &self.registry);
        if events.contains(&ActivityEvent::LaunchPadChanged) {
            let stacking = Stacking::for_launch_pad(self.activity.launch_pad());
            self.bar.set_stacking(conn, &self.atoms, self.root, stacking)?;
        }
        if events.contains(&ActivityEvent::IconChanged) || events.contains(&ActivityEvent::TitleChanged) {
            self.repaint();
        }
        Ok(())
    }

    fn on_button_press(&mut self, button: u8, time: u32, root_x: i16, root_y: i16) -> Result<()> {
        let (x, y) = (root_x as i32, root_y as i32);

        if let Some(popup) = self.bar.popup() {
            if popup.contains_root(x, y) {
                let entry = popup.entry_at_root(x, y).cloned();
                if let Some(entry) = entry {
                    self.close_popup()?;
                    self.activate_entry(&entry, time);
                }
                return Ok(());
            }
            let parent = popup.parent;
            self.close_popup()?;
            // A second click on the same label only closes
            if matches!(self.hit(x, y), Some(Hit::Menu { id, .. }) if id == parent) {
                return Ok(());
            }
        }

        match self.hit(x, y) {
            Some(Hit::Menu { id, .. }) if button == 1 => {
                if let Some(entry) = self.app_menu.model().entry(id).cloned() {
                    self.activate_entry(&entry, time);
                }
            }
            Some(Hit::Title) => {
                if let Some(action) = self.gesture.press(button, time, root_x, root_y) {
                    self.run_title_action(action)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn on_motion(&mut self, root_x: i16, root_y: i16) -> Result<()> {
        if let Some(popup) = self.bar.popup() {
            let hover = popup.entry_at_root(root_x as i32, root_y as i32).map(|e| e.id);
            return self.bar.draw_popup(self.conn.as_ref(), hover);
        }
        if let Some(action) = self.gesture.motion(root_x, root_y) {
            self.run_title_action(action)?;
        }
        Ok(())
    }

    /// What a root position lands on, if it is on the bar
    fn hit(&self, x: i32, y: i32) -> Option<Hit> {
        let rect = self.bar.rect();
        rect.contains(x, y).then(|| self.bar.hit_test(x - rect.x))
    }

    fn run_title_action(&mut self, action: TitleAction) -> Result<()> {
        debug!("Title action: {:?}", action);
        match action {
            TitleAction::Move => self.controller.start_move(),
            TitleAction::ToggleMaximize => self.controller.toggle_maximize(),
            TitleAction::Close => self.controller.close(),
            TitleAction::Minimize => self.controller.minimize(),
        }
    }

    fn activate_entry(&mut self, entry: &MenuEntry, time: u32) {
        if entry.submenu {
            self.open_menu = Some(entry.id);
            self.repaint();
        }
        self.app_menu.activate(entry, time);
    }

    fn close_popup(&mut self) -> Result<()> {
        self.open_menu = None;
        if self.bar.close_popup(self.conn.as_ref())? {
            self.repaint();
        }
        Ok(())
    }

    fn on_menu_event(&mut self, event: MenuEvent) -> Result<()> {
        match self.app_menu.handle(event) {
            MenuOutcome::Unchanged => {}
            MenuOutcome::Changed => self.repaint(),
            MenuOutcome::CloseSession => {
                self.close_popup()?;
                self.repaint();
            }
            MenuOutcome::ActivateIndex(index) => {
                let entry = self.app_menu.model().shown().nth(index).cloned();
                if let Some(entry) = entry {
                    self.close_popup()?;
                    self.activate_entry(&entry, x11rb::CURRENT_TIME);
                }
            }
            MenuOutcome::ShowSubmenu { parent, entries } => {
                // Dismissed while the children were loading
                if self.open_menu != Some(parent) {
                    return Ok(());
                }
                self.bar.open_popup(self.conn.as_ref(), parent, entries)?;
                self.repaint();
            }
        }
        Ok(())
    }

    fn on_shell_command(&mut self, command: ShellCommand) {
        match command {
            ShellCommand::SetTwentyFourTime(enabled) => {
                self.config.clock.twenty_four_time = enabled;
                if self.update_clock() {
                    self.repaint();
                }
            }
            ShellCommand::SetBatteryPercentage(enabled) => {
                self.config.battery.show_battery_percentage = enabled;
            }
        }
        if let Err(e) = self.config.save() {
            warn!("Failed to save configuration: {:#}", e);
        }
    }

    /// Returns whether the text changed
    fn update_clock(&mut self) -> bool {
        let clock = format_clock(&chrono::Local::now(), self.config.clock.twenty_four_time);
        if clock == self.clock {
            return false;
        }
        self.clock = clock;
        true
    }

    fn repaint(&mut self) {
        let model = self.app_menu.model();
        let state = BarState {
            icon: self.activity.icon(),
            title: self.activity.title(),
            menu: model.shown().collect(),
            menu_visible: model.visible() && model.menu_available(),
            clock: &self.clock,
            open_menu: self.open_menu,
        };
        if let Err(e) = self.bar.repaint(self.conn.as_ref(), &state) {
            warn!("Failed to paint the bar: {:#}", e);
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "statusbar=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting statusbar");

    // Setup signal handlers for graceful shutdown
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);

    // Handle SIGTERM and SIGINT
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let tx = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    let _ = tx.send(()).await;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    let _ = tx.send(()).await;
                }
            }
        });
    }

    let (app, inbox) = StatusBarApp::new().await?;

    tokio::select! {
        result = app.run(inbox) => {
            if let Err(e) = result {
                error!("Application error: {}", e);
                return Err(e);
            }
        }
        _ = shutdown_rx.recv() => {
            // The bar window goes away with the X connection
            info!("Shutdown signal received, exiting");
        }
    }

    Ok(())
}
