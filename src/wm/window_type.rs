//! Window type and state flags
//!
//! EWMH `_NET_WM_WINDOW_TYPE` / `_NET_WM_STATE` decoded into Rust types, plus
//! the "is this a real application window" classification.

use bitflags::bitflags;
use x11rb::protocol::xproto::Atom;

use crate::wm::ewmh::Atoms;

/// Window type (EWMH _NET_WM_WINDOW_TYPE)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowType {
    /// No recognised type atom
    Unknown,
    Normal,
    Desktop,
    Dock,
    Dialog,
    Toolbar,
    Menu,
    Utility,
    Splash,
    DropdownMenu,
    PopupMenu,
    Tooltip,
    Notification,
    Combo,
    Dnd,
}

bitflags! {
    /// Set of window types, used to test a type against a group
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WindowTypeMask: u32 {
        const NORMAL        = 1 << 0;
        const DESKTOP       = 1 << 1;
        const DOCK          = 1 << 2;
        const DIALOG        = 1 << 3;
        const TOOLBAR       = 1 << 4;
        const MENU          = 1 << 5;
        const UTILITY       = 1 << 6;
        const SPLASH        = 1 << 7;
        const DROPDOWN_MENU = 1 << 8;
        const POPUP_MENU    = 1 << 9;
        const TOOLTIP       = 1 << 10;
        const NOTIFICATION  = 1 << 11;
        const COMBO         = 1 << 12;
        const DND           = 1 << 13;
    }
}

impl WindowTypeMask {
    /// Types that never count as an application window
    pub fn ignored() -> Self {
        Self::DESKTOP
            | Self::DOCK
            | Self::SPLASH
            | Self::TOOLBAR
            | Self::MENU
            | Self::POPUP_MENU
            | Self::DROPDOWN_MENU
            | Self::NOTIFICATION
    }

    /// Types a transient child may legitimately belong to
    pub fn managed_parents() -> Self {
        Self::NORMAL | Self::DIALOG | Self::UTILITY
    }
}

impl WindowType {
    /// Pick the first type atom we understand, in the order the client listed them
    pub fn from_atoms(types: &[Atom], atoms: &Atoms) -> Self {
        types
            .iter()
            .map(|&atom| Self::from_atom(atom, atoms))
            .find(|t| *t != Self::Unknown)
            .unwrap_or(Self::Unknown)
    }

    pub fn from_atom(atom: Atom, atoms: &Atoms) -> Self {
        if atom == atoms._net_wm_window_type_normal {
            Self::Normal
        } else if atom == atoms._net_wm_window_type_desktop {
            Self::Desktop
        } else if atom == atoms._net_wm_window_type_dock {
            Self::Dock
        } else if atom == atoms._net_wm_window_type_dialog {
            Self::Dialog
        } else if atom == atoms._net_wm_window_type_toolbar {
            Self::Toolbar
        } else if atom == atoms._net_wm_window_type_menu {
            Self::Menu
        } else if atom == atoms._net_wm_window_type_utility {
            Self::Utility
        } else if atom == atoms._net_wm_window_type_splash {
            Self::Splash
        } else if atom == atoms._net_wm_window_type_dropdown_menu {
            Self::DropdownMenu
        } else if atom == atoms._net_wm_window_type_popup_menu {
            Self::PopupMenu
        } else if atom == atoms._net_wm_window_type_tooltip {
            Self::Tooltip
        } else if atom == atoms._net_wm_window_type_notification {
            Self::Notification
        } else if atom == atoms._net_wm_window_type_combo {
            Self::Combo
        } else if atom == atoms._net_wm_window_type_dnd {
            Self::Dnd
        } else {
            Self::Unknown
        }
    }

    pub fn mask(self) -> WindowTypeMask {
        match self {
            Self::Unknown => WindowTypeMask::empty(),
            Self::Normal => WindowTypeMask::NORMAL,
            Self::Desktop => WindowTypeMask::DESKTOP,
            Self::Dock => WindowTypeMask::DOCK,
            Self::Dialog => WindowTypeMask::DIALOG,
            Self::Toolbar => WindowTypeMask::TOOLBAR,
            Self::Menu => WindowTypeMask::MENU,
            Self::Utility => WindowTypeMask::UTILITY,
            Self::Splash => WindowTypeMask::SPLASH,
            Self::DropdownMenu => WindowTypeMask::DROPDOWN_MENU,
            Self::PopupMenu => WindowTypeMask::POPUP_MENU,
            Self::Tooltip => WindowTypeMask::TOOLTIP,
            Self::Notification => WindowTypeMask::NOTIFICATION,
            Self::Combo => WindowTypeMask::COMBO,
            Self::Dnd => WindowTypeMask::DND,
        }
    }

    pub fn matches(self, mask: WindowTypeMask) -> bool {
        mask.intersects(self.mask())
    }
}

bitflags! {
    /// EWMH window state (_NET_WM_STATE)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WindowState: u32 {
        const MAXIMIZED_VERT    = 1 << 0;
        const MAXIMIZED_HORZ    = 1 << 1;
        const HIDDEN            = 1 << 2;
        const SHADED            = 1 << 3;
        const STICKY            = 1 << 4;
        const MODAL             = 1 << 5;
        const SKIP_PAGER        = 1 << 6;
        const SKIP_TASKBAR      = 1 << 7;
        const ABOVE             = 1 << 8;
        const BELOW             = 1 << 9;
        const FULLSCREEN        = 1 << 10;
        const DEMANDS_ATTENTION = 1 << 11;
    }
}

impl WindowState {
    pub fn from_atoms(states: &[Atom], atoms: &Atoms) -> Self {
        let table = [
            (atoms._net_wm_state_maximized_vert, Self::MAXIMIZED_VERT),
            (atoms._net_wm_state_maximized_horz, Self::MAXIMIZED_HORZ),
            (atoms._net_wm_state_hidden, Self::HIDDEN),
            (atoms._net_wm_state_shaded, Self::SHADED),
            (atoms._net_wm_state_sticky, Self::STICKY),
            (atoms._net_wm_state_modal, Self::MODAL),
            (atoms._net_wm_state_skip_pager, Self::SKIP_PAGER),
            (atoms._net_wm_state_skip_taskbar, Self::SKIP_TASKBAR),
            (atoms._net_wm_state_above, Self::ABOVE),
            (atoms._net_wm_state_below, Self::BELOW),
            (atoms._net_wm_state_fullscreen, Self::FULLSCREEN),
            (atoms._net_wm_state_demands_attention, Self::DEMANDS_ATTENTION),
        ];

        states.iter().fold(Self::empty(), |acc, atom| {
            table
                .iter()
                .find(|(a, _)| a == atom)
                .map(|(_, flag)| acc | *flag)
                .unwrap_or(acc)
        })
    }

    /// Both axes maximized
    pub fn is_maximized(&self) -> bool {
        self.contains(Self::MAXIMIZED_VERT | Self::MAXIMIZED_HORZ)
    }
}
