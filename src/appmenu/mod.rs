//! Menu Bridge
//!
//! Polls the active window for `_KDE_NET_WM_APPMENU_SERVICE_NAME` /
//! `_KDE_NET_WM_APPMENU_OBJECT_PATH`, keeps at most one import session for
//! the endpoint they name and mirrors its top-level entries for the bar.

pub mod model;
pub mod session;

use anyhow::Result;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::Window;

use crate::dbus::dbusmenu::MenuEntry;
use crate::wm::ewmh::Atoms;
use model::{AppMenuModel, MenuEndpoint, MenuEvent, MenuOutcome, Observation};
use session::{MenuSession, SessionCommand};

pub struct AppMenu {
    model: AppMenuModel,
    /// `None` when there is no session bus; the bar then never shows a menu
    bus: Option<zbus::Connection>,
    session: Option<MenuSession>,
    events: UnboundedSender<MenuEvent>,
}

impl AppMenu {
    pub fn new(bus: Option<zbus::Connection>, events: UnboundedSender<MenuEvent>) -> Self {
        Self {
            model: AppMenuModel::new(),
            bus,
            session: None,
            events,
        }
    }

    pub fn model(&self) -> &AppMenuModel {
        &self.model
    }

    /// Read the active window's endpoint; returns whether the bar needs a repaint
    pub fn poll<C: Connection>(&mut self, conn: &C, atoms: &Atoms, root: Window) -> Result<bool> {
        let active = atoms.active_window(conn, root)?;
        let endpoint = match active {
            Some(window) => read_endpoint(conn, atoms, window),
            None => None,
        };
        Ok(self.observe(active, endpoint))
    }

    fn observe(&mut self, active: Option<Window>, endpoint: Option<MenuEndpoint>) -> bool {
        let before = (self.model.visible(), self.model.menu_available());

        match self.model.observe(active, endpoint) {
            Observation::Unchanged => {}
            Observation::Refresh => {
                if let Some(session) = &self.session {
                    session.send(SessionCommand::Refresh);
                }
            }
            Observation::Open { endpoint, generation } => {
                // Old session goes first so its task stops posting
                self.session = None;
                if let Some(bus) = &self.bus {
                    self.session = Some(MenuSession::spawn(
                        bus.clone(),
                        endpoint,
                        generation,
                        self.events.clone(),
                    ));
                }
            }
        }

        before != (self.model.visible(), self.model.menu_available())
    }

    pub fn handle(&mut self, event: MenuEvent) -> MenuOutcome {
        let outcome = self.model.handle(event);
        debug!("Menu bridge {:?}: {:?}", self.model.state(), outcome);
        if outcome == MenuOutcome::CloseSession {
            self.session = None;
        }
        outcome
    }

    /// Forward a click on a top-level or popup entry to the application
    pub fn activate(&self, entry: &MenuEntry, timestamp: u32) {
        let Some(session) = &self.session else {
            return;
        };
        if !entry.enabled || entry.separator {
            return;
        }
        debug!("Activating menu item {} ({})", entry.id, entry.label);
        session.send(SessionCommand::Activate {
            id: entry.id,
            submenu: entry.submenu,
            timestamp,
        });
    }
}

fn read_endpoint<C: Connection>(conn: &C, atoms: &Atoms, window: Window) -> Option<MenuEndpoint> {
    let read = |property| match atoms.text_property(conn, window, property) {
        Ok(value) => value,
        Err(e) => {
            warn!("Failed to read appmenu property of {:#x}: {}", window, e);
            None
        }
    };
    MenuEndpoint::new(
        read(atoms._kde_net_wm_appmenu_service_name),
        read(atoms._kde_net_wm_appmenu_object_path),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::MenuEventKind;
    use tokio::sync::mpsc;

    fn endpoint() -> Option<MenuEndpoint> {
        MenuEndpoint::new(Some(":1.42".into()), Some("/MenuBar/1".into()))
    }

    #[tokio::test]
    async fn test_events_flow_back_through_channel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut menu = AppMenu::new(None, tx.clone());

        assert!(menu.observe(Some(0x400001), endpoint()));
        assert!(menu.session.is_none());

        let generation = menu.model().generation();
        tx.send(MenuEvent {
            generation,
            kind: MenuEventKind::LayoutImported(vec![MenuEntry::new(1)]),
        })
        .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(menu.handle(event), MenuOutcome::Changed);
        assert!(menu.model().menu_available());

        tx.send(MenuEvent {
            generation,
            kind: MenuEventKind::ServiceLost,
        })
        .unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(menu.handle(event), MenuOutcome::CloseSession);
        assert!(!menu.model().menu_available());
    }

    #[test]
    fn test_hidden_without_active_window() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut menu = AppMenu::new(None, tx);

        menu.observe(Some(0x400001), endpoint());
        assert!(menu.model().visible());
        assert!(menu.observe(None, None));
        assert!(!menu.model().visible());
        // nothing changed the second time
        assert!(!menu.observe(None, None));
    }
}
