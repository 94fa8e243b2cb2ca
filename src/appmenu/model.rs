//! Menu Bridge state machine
//!
//! Pure bookkeeping: which endpoint is active, which session generation is
//! current, and the mirrored top-level entries. Talking to the bus is left to
//! [`super::session`], so everything here runs without a session bus.

use tracing::debug;
use x11rb::protocol::xproto::Window;

use crate::dbus::dbusmenu::{MenuEntry, PropertyPatch};

/// Longest wait, in polls, before a failed endpoint is tried again
const MAX_RETRY_POLLS: u32 = 32;

/// `(service, object path)` named by the active window's appmenu properties
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEndpoint {
    pub service: String,
    pub path: String,
}

impl MenuEndpoint {
    /// Both halves must be present and non-empty
    pub fn new(service: Option<String>, path: Option<String>) -> Option<Self> {
        match (service, path) {
            (Some(service), Some(path)) if !service.is_empty() && !path.is_empty() => {
                Some(Self { service, path })
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    NoMenu,
    Resolving,
    Active,
}

/// What the runtime has to do after an observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// Nothing to do on the bus
    Unchanged,
    /// Same endpoint: let the running session re-check its layout
    Refresh,
    /// Drop the running session (if any) and open one for the endpoint
    Open { endpoint: MenuEndpoint, generation: u64 },
}

/// Message from a session task, tagged with the generation it was opened for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEvent {
    pub generation: u64,
    pub kind: MenuEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuEventKind {
    /// Fresh top-level entry list
    LayoutImported(Vec<MenuEntry>),
    PropertiesUpdated(Vec<PropertyPatch>),
    /// The application asked for one of its menus to be opened
    ActivationRequested(i32),
    SubmenuLoaded { parent: i32, entries: Vec<MenuEntry> },
    /// The service lost its bus name
    ServiceLost,
    Failed(String),
}

/// Reaction the shell has to take after an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuOutcome {
    Unchanged,
    /// Entries or flags changed, repaint
    Changed,
    /// Session is dead, drop it
    CloseSession,
    /// Open the shown entry at this index
    ActivateIndex(usize),
    ShowSubmenu { parent: i32, entries: Vec<MenuEntry> },
}

#[derive(Debug)]
pub struct AppMenuModel {
    endpoint: Option<MenuEndpoint>,
    generation: u64,
    state: BridgeState,
    entries: Vec<MenuEntry>,
    menu_available: bool,
    visible: bool,
    /// Consecutive failed sessions for the current endpoint
    failures: u32,
    /// Polls to skip before reopening after a failure
    retry_in: u32,
}

impl Default for AppMenuModel {
    fn default() -> Self {
        Self::new()
    }
}

impl AppMenuModel {
    pub fn new() -> Self {
        Self {
            endpoint: None,
            generation: 0,
            state: BridgeState::NoMenu,
            entries: Vec::new(),
            menu_available: false,
            visible: false,
            failures: 0,
            retry_in: 0,
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn menu_available(&self) -> bool {
        self.menu_available
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    /// Entries the bar draws, in order
    pub fn shown(&self) -> impl Iterator<Item = &MenuEntry> {
        self.entries.iter().filter(|e| e.is_shown())
    }

    pub fn entry(&self, id: i32) -> Option<&MenuEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Result of one poll of the active window's appmenu properties
    pub fn observe(&mut self, active: Option<Window>, endpoint: Option<MenuEndpoint>) -> Observation {
        if active.is_none() {
            self.visible = false;
            return Observation::Unchanged;
        }

        let Some(endpoint) = endpoint else {
            // The session stays; a different endpoint replaces it
            self.visible = false;
            return Observation::Unchanged;
        };

        self.visible = true;

        if self.endpoint.as_ref() == Some(&endpoint) {
            return match self.state {
                BridgeState::Active => Observation::Refresh,
                BridgeState::Resolving => Observation::Unchanged,
                BridgeState::NoMenu if self.retry_in > 0 => {
                    self.retry_in -= 1;
                    Observation::Unchanged
                }
                BridgeState::NoMenu => {
                    debug!("Retrying menu endpoint after {} failure(s)", self.failures);
                    self.open(endpoint)
                }
            };
        }

        self.failures = 0;
        self.retry_in = 0;
        self.open(endpoint)
    }

    fn open(&mut self, endpoint: MenuEndpoint) -> Observation {
        self.generation += 1;
        debug!(
            "Menu endpoint {} {} (generation {})",
            endpoint.service, endpoint.path, self.generation
        );
        self.endpoint = Some(endpoint.clone());
        self.state = BridgeState::Resolving;
        self.entries.clear();
        self.set_menu_available(false);

        Observation::Open {
            endpoint,
            generation: self.generation,
        }
    }

    pub fn handle(&mut self, event: MenuEvent) -> MenuOutcome {
        if event.generation != self.generation || self.state == BridgeState::NoMenu {
            debug!("Dropping stale menu event for generation {}", event.generation);
            return MenuOutcome::Unchanged;
        }

        match event.kind {
            MenuEventKind::LayoutImported(entries) => {
                self.entries = entries;
                self.state = BridgeState::Active;
                self.failures = 0;
                self.set_menu_available(true);
                MenuOutcome::Changed
            }
            MenuEventKind::PropertiesUpdated(patches) => {
                let mut changed = false;
                for patch in &patches {
                    if let Some(entry) = self.entries.iter_mut().find(|e| e.id == patch.id) {
                        let before = entry.clone();
                        entry.apply(patch);
                        changed |= *entry != before;
                    }
                }
                if changed {
                    MenuOutcome::Changed
                } else {
                    MenuOutcome::Unchanged
                }
            }
            MenuEventKind::ActivationRequested(id) => match self.shown().position(|e| e.id == id) {
                Some(index) => MenuOutcome::ActivateIndex(index),
                None => MenuOutcome::Unchanged,
            },
            MenuEventKind::SubmenuLoaded { parent, entries } => {
                MenuOutcome::ShowSubmenu { parent, entries }
            }
            MenuEventKind::ServiceLost => {
                debug!("Menu service gone, forgetting endpoint");
                // Forgotten so the next poll may try again if the name returns
                self.endpoint = None;
                self.tear_down();
                MenuOutcome::CloseSession
            }
            MenuEventKind::Failed(reason) => {
                // Kept, so a later poll of the same endpoint tries again
                self.failures += 1;
                self.retry_in = retry_delay(self.failures);
                debug!(
                    "Menu import failed ({}), retrying in {} poll(s)",
                    reason, self.retry_in
                );
                self.tear_down();
                MenuOutcome::CloseSession
            }
        }
    }

    fn tear_down(&mut self) {
        self.state = BridgeState::NoMenu;
        self.entries.clear();
        self.set_menu_available(false);
    }

    fn set_menu_available(&mut self, available: bool) {
        if self.menu_available != available {
            self.menu_available = available;
            self.visible = true;
        }
    }
}

/// 1, 2, 4, ... polls, capped
fn retry_delay(failures: u32) -> u32 {
    1u32.checked_shl(failures.saturating_sub(1))
        .unwrap_or(MAX_RETRY_POLLS)
        .min(MAX_RETRY_POLLS)
}
