//! Snapshot of the active (foreground) window

use anyhow::Result;
use tracing::debug;
use x11rb::connection::Connection;
use x11rb::properties::WmClass;
use x11rb::protocol::xproto::*;

use crate::wm::ewmh::Atoms;
use crate::wm::window_type::{WindowState, WindowType, WindowTypeMask};

/// Everything the tracker needs to know about the active window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForegroundWindowInfo {
    pub window: Window,
    pub title: String,
    pub window_type: WindowType,
    pub state: WindowState,
    pub pid: Option<u32>,
    /// Lower-cased `WM_CLASS` class part
    pub class: String,
    /// Type of the window this one is transient for; `None` when not
    /// transient (or transient for itself / the root)
    pub transient_parent: Option<WindowType>,
    pub desktop: Option<u32>,
}

impl ForegroundWindowInfo {
    /// Read the window's properties. `Ok(None)` means the window is gone.
    pub fn fetch<C: Connection>(
        conn: &C,
        atoms: &Atoms,
        root: Window,
        window: Window,
    ) -> Result<Option<Self>> {
        if conn.get_window_attributes(window)?.reply().is_err() {
            debug!("Active window {:#x} is no longer valid", window);
            return Ok(None);
        }

        let window_type = WindowType::from_atoms(&atoms.window_types(conn, window)?, atoms);
        let state = WindowState::from_atoms(&atoms.window_states(conn, window)?, atoms);
        let title = atoms.visible_name(conn, window)?;
        let pid = atoms.cardinal(conn, window, atoms._net_wm_pid)?;
        let desktop = atoms.cardinal(conn, window, atoms._net_wm_desktop)?;

        let class = WmClass::get(conn, window)?
            .reply()
            .ok()
            .flatten()
            .map(|c| String::from_utf8_lossy(c.class()).to_lowercase())
            .unwrap_or_default();

        let transient_parent = match atoms.transient_for(conn, window)? {
            Some(parent) if parent != window && parent != root => Some(WindowType::from_atoms(
                &atoms.window_types(conn, parent).unwrap_or_default(),
                atoms,
            )),
            _ => None,
        };

        Ok(Some(Self {
            window,
            title,
            window_type,
            state,
            pid,
            class,
            transient_parent,
            desktop,
        }))
    }

    /// Whether this is a real application window worth naming in the bar
    pub fn is_acceptable(&self) -> bool {
        if self.window_type.matches(WindowTypeMask::ignored()) {
            return false;
        }

        if self
            .state
            .intersects(WindowState::SKIP_TASKBAR | WindowState::SKIP_PAGER)
        {
            return false;
        }

        match self.transient_parent {
            None => true,
            Some(parent) => !parent.matches(WindowTypeMask::managed_parents()),
        }
    }

    /// Whether window-management actions (move, maximize) make sense
    pub fn is_manageable(&self) -> bool {
        if self.window_type == WindowType::Desktop {
            return false;
        }
        !(self.window_type == WindowType::Utility && self.state.contains(WindowState::SKIP_TASKBAR))
    }

    /// On the given desktop, or sticky on all of them
    pub fn is_on_desktop(&self, current: Option<u32>) -> bool {
        match (self.desktop, current) {
            (Some(0xFFFF_FFFF), _) | (None, _) | (_, None) => true,
            (Some(d), Some(c)) => d == c,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_window(window_type: WindowType) -> ForegroundWindowInfo {
    ForegroundWindowInfo {
        window: 0x3a00004,
        title: "notes.txt - Editor".to_string(),
        window_type,
        state: WindowState::empty(),
        pid: None,
        class: "editor".to_string(),
        transient_parent: None,
        desktop: Some(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_window_is_acceptable() {
        assert!(sample_window(WindowType::Normal).is_acceptable());
        assert!(sample_window(WindowType::Unknown).is_acceptable());
        assert!(sample_window(WindowType::Dialog).is_acceptable());
    }

    #[test]
    fn test_shell_types_are_rejected() {
        for t in [
            WindowType::Desktop,
            WindowType::Dock,
            WindowType::Splash,
            WindowType::Toolbar,
            WindowType::Menu,
            WindowType::PopupMenu,
            WindowType::Notification,
        ] {
            assert!(!sample_window(t).is_acceptable(), "{:?}", t);
        }
    }

    #[test]
    fn test_skip_hints_are_rejected() {
        let mut info = sample_window(WindowType::Normal);
        info.state = WindowState::SKIP_TASKBAR;
        assert!(!info.is_acceptable());

        info.state = WindowState::SKIP_PAGER;
        assert!(!info.is_acceptable());
    }

    #[test]
    fn test_transient_for_application_window_is_rejected() {
        let mut info = sample_window(WindowType::Dialog);

        info.transient_parent = Some(WindowType::Normal);
        assert!(!info.is_acceptable());

        info.transient_parent = Some(WindowType::Utility);
        assert!(!info.is_acceptable());

        // transient for something that is not an application window
        info.transient_parent = Some(WindowType::Unknown);
        assert!(info.is_acceptable());
        info.transient_parent = Some(WindowType::Dock);
        assert!(info.is_acceptable());
    }

    #[test]
    fn test_manageable() {
        assert!(sample_window(WindowType::Normal).is_manageable());
        assert!(!sample_window(WindowType::Desktop).is_manageable());

        let mut utility = sample_window(WindowType::Utility);
        assert!(utility.is_manageable());
        utility.state = WindowState::SKIP_TASKBAR;
        assert!(!utility.is_manageable());
    }

    #[test]
    fn test_desktop_membership() {
        let mut info = sample_window(WindowType::Normal);
        info.desktop = Some(1);
        assert!(info.is_on_desktop(Some(1)));
        assert!(!info.is_on_desktop(Some(0)));

        info.desktop = Some(0xFFFF_FFFF);
        assert!(info.is_on_desktop(Some(3)));

        info.desktop = None;
        assert!(info.is_on_desktop(Some(3)));
    }
}
