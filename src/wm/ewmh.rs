//! EWMH (Extended Window Manager Hints) client side
//!
//! Interned atoms, property readers for other clients' windows, and the
//! client messages a pager/panel sends to the window manager.

use anyhow::Result;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{ClientMessageEvent, *};
use x11rb::CURRENT_TIME;

/// Source indication for EWMH requests: 2 = pager / taskbar
pub const SOURCE_PAGER: u32 = 2;

/// `_NET_WM_MOVERESIZE` direction for a keyboard-less move
pub const MOVERESIZE_MOVE: u32 = 8;

/// `_NET_WM_STATE` actions
pub const STATE_REMOVE: u32 = 0;
pub const STATE_ADD: u32 = 1;

/// ICCCM IconicState for `WM_CHANGE_STATE`
const ICONIC_STATE: u32 = 3;

/// Upper bound (in 32-bit units) for string properties
const MAX_PROP_LENGTH: u32 = 10000;

macro_rules! ewmh_atoms {
    ($($field:ident => $name:expr,)*) => {
        /// Holds all interned atoms used by the bar
        #[derive(Debug, Clone)]
        pub struct Atoms {
            $(pub $field: Atom,)*
        }

        impl Atoms {
            /// Intern all required atoms
            pub fn new<C: Connection>(conn: &C) -> Result<Self> {
                // Send every request before waiting on any reply
                $(let $field = conn.intern_atom(false, $name.as_bytes())?;)*
                Ok(Self {
                    $($field: $field.reply()?.atom,)*
                })
            }

            /// Distinct fake atom values, for tests that never talk to a server
            #[cfg(test)]
            pub fn sequential() -> Self {
                let mut next: Atom = 1000;
                let mut take = || {
                    next += 1;
                    next
                };
                Self {
                    $($field: take(),)*
                }
            }
        }
    };
}

ewmh_atoms! {
    _net_active_window => "_NET_ACTIVE_WINDOW",
    _net_current_desktop => "_NET_CURRENT_DESKTOP",
    _net_close_window => "_NET_CLOSE_WINDOW",
    _net_wm_moveresize => "_NET_WM_MOVERESIZE",
    _net_wm_name => "_NET_WM_NAME",
    _net_wm_visible_name => "_NET_WM_VISIBLE_NAME",
    _net_wm_pid => "_NET_WM_PID",
    _net_wm_desktop => "_NET_WM_DESKTOP",
    _net_wm_window_type => "_NET_WM_WINDOW_TYPE",
    _net_wm_window_type_normal => "_NET_WM_WINDOW_TYPE_NORMAL",
    _net_wm_window_type_desktop => "_NET_WM_WINDOW_TYPE_DESKTOP",
    _net_wm_window_type_dock => "_NET_WM_WINDOW_TYPE_DOCK",
    _net_wm_window_type_dialog => "_NET_WM_WINDOW_TYPE_DIALOG",
    _net_wm_window_type_toolbar => "_NET_WM_WINDOW_TYPE_TOOLBAR",
    _net_wm_window_type_menu => "_NET_WM_WINDOW_TYPE_MENU",
    _net_wm_window_type_utility => "_NET_WM_WINDOW_TYPE_UTILITY",
    _net_wm_window_type_splash => "_NET_WM_WINDOW_TYPE_SPLASH",
    _net_wm_window_type_dropdown_menu => "_NET_WM_WINDOW_TYPE_DROPDOWN_MENU",
    _net_wm_window_type_popup_menu => "_NET_WM_WINDOW_TYPE_POPUP_MENU",
    _net_wm_window_type_tooltip => "_NET_WM_WINDOW_TYPE_TOOLTIP",
    _net_wm_window_type_notification => "_NET_WM_WINDOW_TYPE_NOTIFICATION",
    _net_wm_window_type_combo => "_NET_WM_WINDOW_TYPE_COMBO",
    _net_wm_window_type_dnd => "_NET_WM_WINDOW_TYPE_DND",
    _net_wm_state => "_NET_WM_STATE",
    _net_wm_state_maximized_vert => "_NET_WM_STATE_MAXIMIZED_VERT",
    _net_wm_state_maximized_horz => "_NET_WM_STATE_MAXIMIZED_HORZ",
    _net_wm_state_hidden => "_NET_WM_STATE_HIDDEN",
    _net_wm_state_shaded => "_NET_WM_STATE_SHADED",
    _net_wm_state_sticky => "_NET_WM_STATE_STICKY",
    _net_wm_state_modal => "_NET_WM_STATE_MODAL",
    _net_wm_state_skip_pager => "_NET_WM_STATE_SKIP_PAGER",
    _net_wm_state_skip_taskbar => "_NET_WM_STATE_SKIP_TASKBAR",
    _net_wm_state_above => "_NET_WM_STATE_ABOVE",
    _net_wm_state_below => "_NET_WM_STATE_BELOW",
    _net_wm_state_fullscreen => "_NET_WM_STATE_FULLSCREEN",
    _net_wm_state_demands_attention => "_NET_WM_STATE_DEMANDS_ATTENTION",
    _net_wm_strut => "_NET_WM_STRUT",
    _net_wm_strut_partial => "_NET_WM_STRUT_PARTIAL",
    _kde_net_wm_appmenu_service_name => "_KDE_NET_WM_APPMENU_SERVICE_NAME",
    _kde_net_wm_appmenu_object_path => "_KDE_NET_WM_APPMENU_OBJECT_PATH",
    wm_change_state => "WM_CHANGE_STATE",
    utf8_string => "UTF8_STRING",
}

impl Atoms {
    /// Read `_NET_ACTIVE_WINDOW` from the root window
    pub fn active_window<C: Connection>(&self, conn: &C, root: Window) -> Result<Option<Window>> {
        let reply = conn
            .get_property(false, root, self._net_active_window, AtomEnum::WINDOW, 0, 1)?
            .reply()?;
        Ok(reply
            .value32()
            .and_then(|mut v| v.next())
            .filter(|&w| w != x11rb::NONE))
    }

    /// Read `_NET_CURRENT_DESKTOP` from the root window
    pub fn current_desktop<C: Connection>(&self, conn: &C, root: Window) -> Result<Option<u32>> {
        self.cardinal(conn, root, self._net_current_desktop)
    }

    /// Get _NET_WM_WINDOW_TYPE property for a window
    pub fn window_types<C: Connection>(&self, conn: &C, window: Window) -> Result<Vec<Atom>> {
        self.atom_list(conn, window, self._net_wm_window_type)
    }

    /// Get _NET_WM_STATE property for a window
    pub fn window_states<C: Connection>(&self, conn: &C, window: Window) -> Result<Vec<Atom>> {
        self.atom_list(conn, window, self._net_wm_state)
    }

    fn atom_list<C: Connection>(&self, conn: &C, window: Window, property: Atom) -> Result<Vec<Atom>> {
        let reply = conn
            .get_property(false, window, property, AtomEnum::ATOM, 0, 1024)?
            .reply()?;
        Ok(reply.value32().map(|v| v.collect()).unwrap_or_default())
    }

    /// Read a single CARDINAL
    pub fn cardinal<C: Connection>(&self, conn: &C, window: Window, property: Atom) -> Result<Option<u32>> {
        let reply = conn
            .get_property(false, window, property, AtomEnum::CARDINAL, 0, 1)?
            .reply()?;
        Ok(reply.value32().and_then(|mut v| v.next()))
    }

    /// `WM_TRANSIENT_FOR`, `None` when unset
    pub fn transient_for<C: Connection>(&self, conn: &C, window: Window) -> Result<Option<Window>> {
        let reply = conn
            .get_property(false, window, AtomEnum::WM_TRANSIENT_FOR, AtomEnum::WINDOW, 0, 1)?
            .reply()?;
        Ok(reply
            .value32()
            .and_then(|mut v| v.next())
            .filter(|&w| w != x11rb::NONE))
    }

    /// Read an 8-bit text property of any string type
    pub fn text_property<C: Connection>(
        &self,
        conn: &C,
        window: Window,
        property: Atom,
    ) -> Result<Option<String>> {
        let reply = conn
            .get_property(false, window, property, AtomEnum::ANY, 0, MAX_PROP_LENGTH)?
            .reply()?;

        let is_text = reply.type_ == u32::from(AtomEnum::STRING) || reply.type_ == self.utf8_string;
        if !is_text || reply.format != 8 {
            return Ok(None);
        }

        Ok(decode_text(&reply.value))
    }

    /// Title as the window manager shows it: visible name, then `_NET_WM_NAME`, then `WM_NAME`
    pub fn visible_name<C: Connection>(&self, conn: &C, window: Window) -> Result<String> {
        for property in [
            self._net_wm_visible_name,
            self._net_wm_name,
            u32::from(AtomEnum::WM_NAME),
        ] {
            if let Some(name) = self.text_property(conn, window, property)? {
                return Ok(name);
            }
        }
        Ok(String::new())
    }

    /// `_NET_CLOSE_WINDOW` request for `window`
    pub fn close_request(&self, window: Window) -> ClientMessageEvent {
        ClientMessageEvent::new(
            32,
            window,
            self._net_close_window,
            [CURRENT_TIME, SOURCE_PAGER, 0, 0, 0],
        )
    }

    /// ICCCM iconify request
    pub fn iconify_request(&self, window: Window) -> ClientMessageEvent {
        ClientMessageEvent::new(32, window, self.wm_change_state, [ICONIC_STATE, 0, 0, 0, 0])
    }

    /// `_NET_WM_STATE` change of up to two properties
    pub fn state_request(
        &self,
        window: Window,
        action: u32,
        first: Atom,
        second: Atom,
    ) -> ClientMessageEvent {
        ClientMessageEvent::new(
            32,
            window,
            self._net_wm_state,
            [action, first, second, SOURCE_PAGER, 0],
        )
    }

    /// Add or remove both maximized states
    pub fn maximize_request(&self, window: Window, maximize: bool) -> ClientMessageEvent {
        self.state_request(
            window,
            if maximize { STATE_ADD } else { STATE_REMOVE },
            self._net_wm_state_maximized_vert,
            self._net_wm_state_maximized_horz,
        )
    }

    /// Interactive move starting at the pointer position (root coordinates)
    pub fn move_request(&self, window: Window, root_x: i32, root_y: i32) -> ClientMessageEvent {
        ClientMessageEvent::new(
            32,
            window,
            self._net_wm_moveresize,
            [root_x as u32, root_y as u32, MOVERESIZE_MOVE, 1, SOURCE_PAGER],
        )
    }

    pub fn current_desktop_request(&self, root: Window, desktop: u32) -> ClientMessageEvent {
        ClientMessageEvent::new(
            32,
            root,
            self._net_current_desktop,
            [desktop, CURRENT_TIME, 0, 0, 0],
        )
    }

    pub fn activate_request(&self, window: Window) -> ClientMessageEvent {
        ClientMessageEvent::new(
            32,
            window,
            self._net_active_window,
            [SOURCE_PAGER, CURRENT_TIME, 0, 0, 0],
        )
    }
}

/// Send a client message to the window manager via the root window
pub fn send_to_root<C: Connection>(conn: &C, root: Window, event: ClientMessageEvent) -> Result<()> {
    conn.send_event(
        false,
        root,
        EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY,
        event,
    )?;
    conn.flush()?;
    Ok(())
}

/// Property bytes to text; a trailing NUL is dropped, an empty value is absent
fn decode_text(value: &[u8]) -> Option<String> {
    let trimmed = match value.last() {
        Some(0) => &value[..value.len() - 1],
        _ => value,
    };
    if trimmed.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(trimmed).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_text_strips_trailing_nul() {
        assert_eq!(decode_text(b":1.42\0").as_deref(), Some(":1.42"));
        assert_eq!(decode_text(b"/MenuBar/1").as_deref(), Some("/MenuBar/1"));
        assert_eq!(decode_text(b"\0"), None);
        assert_eq!(decode_text(b""), None);
    }

    #[test]
    fn test_close_request_targets_window() {
        let atoms = Atoms::sequential();
        let event = atoms.close_request(0x400007);

        assert_eq!(event.window, 0x400007);
        assert_eq!(event.type_, atoms._net_close_window);
        assert_eq!(event.format, 32);
        assert_eq!(event.data.as_data32(), [CURRENT_TIME, SOURCE_PAGER, 0, 0, 0]);
    }

    #[test]
    fn test_maximize_and_restore_requests() {
        let atoms = Atoms::sequential();

        let max = atoms.maximize_request(7, true);
        assert_eq!(max.type_, atoms._net_wm_state);
        assert_eq!(
            max.data.as_data32(),
            [
                STATE_ADD,
                atoms._net_wm_state_maximized_vert,
                atoms._net_wm_state_maximized_horz,
                SOURCE_PAGER,
                0
            ]
        );

        let restore = atoms.maximize_request(7, false);
        assert_eq!(restore.data.as_data32()[0], STATE_REMOVE);
    }

    #[test]
    fn test_move_request_uses_pointer_position() {
        let atoms = Atoms::sequential();
        let event = atoms.move_request(9, 640, 12);

        assert_eq!(event.type_, atoms._net_wm_moveresize);
        assert_eq!(event.data.as_data32(), [640, 12, MOVERESIZE_MOVE, 1, SOURCE_PAGER]);
    }

    #[test]
    fn test_iconify_request() {
        let atoms = Atoms::sequential();
        let event = atoms.iconify_request(3);

        assert_eq!(event.type_, atoms.wm_change_state);
        assert_eq!(event.data.as_data32()[0], 3);
    }

    #[test]
    fn test_sequential_atoms_are_distinct() {
        let atoms = Atoms::sequential();
        assert_ne!(atoms._net_active_window, atoms._net_current_desktop);
        assert_ne!(atoms._kde_net_wm_appmenu_service_name, atoms._kde_net_wm_appmenu_object_path);
    }
}
