//! Window Controller
//!
//! Fire-and-forget requests against whatever window is active when the
//! request is made. The window manager does the actual work.

use anyhow::Result;
use std::sync::Arc;
use tracing::debug;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{ConnectionExt as _, Window};
use x11rb::rust_connection::RustConnection;
use x11rb::CURRENT_TIME;

use crate::wm::ewmh::{send_to_root, Atoms};
use crate::wm::window_info::ForegroundWindowInfo;

/// What a toggle should do given the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaximizeAction {
    Maximize,
    Restore,
}

impl MaximizeAction {
    pub fn for_window(info: &ForegroundWindowInfo) -> Option<Self> {
        if !info.is_manageable() {
            return None;
        }
        Some(if info.state.is_maximized() {
            Self::Restore
        } else {
            Self::Maximize
        })
    }
}

pub struct WindowController {
    conn: Arc<RustConnection>,
    atoms: Arc<Atoms>,
    root: Window,
}

impl WindowController {
    pub fn new(conn: Arc<RustConnection>, atoms: Arc<Atoms>, root: Window) -> Self {
        Self { conn, atoms, root }
    }

    fn active(&self) -> Result<Option<Window>> {
        self.atoms.active_window(self.conn.as_ref(), self.root)
    }

    fn active_info(&self) -> Result<Option<ForegroundWindowInfo>> {
        match self.active()? {
            Some(window) => {
                ForegroundWindowInfo::fetch(self.conn.as_ref(), &self.atoms, self.root, window)
            }
            None => Ok(None),
        }
    }

    pub fn close(&self) -> Result<()> {
        if let Some(window) = self.active()? {
            debug!("Requesting close of {:#x}", window);
            send_to_root(self.conn.as_ref(), self.root, self.atoms.close_request(window))?;
        }
        Ok(())
    }

    pub fn minimize(&self) -> Result<()> {
        if let Some(window) = self.active()? {
            debug!("Requesting iconify of {:#x}", window);
            send_to_root(self.conn.as_ref(), self.root, self.atoms.iconify_request(window))?;
        }
        Ok(())
    }

    pub fn maximize(&self) -> Result<()> {
        if let Some(window) = self.active()? {
            send_to_root(
                self.conn.as_ref(),
                self.root,
                self.atoms.maximize_request(window, true),
            )?;
        }
        Ok(())
    }

    pub fn restore(&self) -> Result<()> {
        if let Some(window) = self.active()? {
            send_to_root(
                self.conn.as_ref(),
                self.root,
                self.atoms.maximize_request(window, false),
            )?;
        }
        Ok(())
    }

    pub fn toggle_maximize(&self) -> Result<()> {
        let Some(info) = self.active_info()? else {
            return Ok(());
        };

        match MaximizeAction::for_window(&info) {
            Some(MaximizeAction::Maximize) => self.maximize(),
            Some(MaximizeAction::Restore) => self.restore(),
            None => Ok(()),
        }
    }

    /// Hand an interactive, pointer-driven move over to the window manager
    pub fn start_move(&self) -> Result<()> {
        let Some(info) = self.active_info()? else {
            return Ok(());
        };
        if !info.is_manageable() {
            return Ok(());
        }

        let conn = self.conn.as_ref();
        let current = self.atoms.current_desktop(conn, self.root)?;
        if !info.is_on_desktop(current) {
            if let Some(desktop) = info.desktop {
                send_to_root(conn, self.root, self.atoms.current_desktop_request(self.root, desktop))?;
            }
            send_to_root(conn, self.root, self.atoms.activate_request(info.window))?;
        }

        let pointer = conn.query_pointer(self.root)?.reply()?;
        // Release our implicit grab so the window manager can take the pointer
        conn.ungrab_pointer(CURRENT_TIME)?;
        conn.flush()?;

        debug!(
            "Requesting move of {:#x} from ({}, {})",
            info.window, pointer.root_x, pointer.root_y
        );
        send_to_root(
            conn,
            self.root,
            self.atoms
                .move_request(info.window, pointer.root_x as i32, pointer.root_y as i32),
        )
    }
}
