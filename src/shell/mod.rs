//! Status Bar Shell
//!
//! The dock window along the top of the primary monitor: geometry, strut
//! reservation, stacking against the launcher, painting, and the submenu
//! popup.

pub mod icon;
pub mod layout;
pub mod popup;
pub mod render;

use anyhow::{Context, Result};
use tracing::{debug, info};
use x11rb::connection::Connection;
use x11rb::properties::WmHints;
use x11rb::protocol::xproto::*;
use x11rb::wrapper::ConnectionExt as _;
use x11rb::COPY_DEPTH_FROM_PARENT;

use crate::config::Config;
use crate::dbus::dbusmenu::MenuEntry;
use crate::shared::{ScreenRect, StrutPartial};
use crate::wm::ewmh::{send_to_root, Atoms, STATE_ADD, STATE_REMOVE};
use crate::wm::screen;
use icon::{IconCache, PixelFormat};
use layout::{BarContent, BarLayout, Hit};
use popup::{MenuPopup, PopupRows};
use render::{elide, Painter};

/// `WM_CLASS` instance and class of the bar
pub const BAR_CLASS: &str = "cutefish-statusbar";

/// `_NET_WM_DESKTOP` value for "all desktops"
const ALL_DESKTOPS: u32 = 0xFFFF_FFFF;

/// Space above and below the application icon
const ICON_MARGIN: u32 = 4;

/// Where the bar sits in the stacking order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stacking {
    Above,
    Below,
}

impl Stacking {
    /// Below while the launcher is focused, above otherwise
    pub fn for_launch_pad(launch_pad: bool) -> Self {
        if launch_pad {
            Self::Below
        } else {
            Self::Above
        }
    }
}

/// Bar bounds and strut for a monitor
pub fn bar_geometry(monitor: ScreenRect, height: u32) -> (ScreenRect, StrutPartial) {
    let bar = monitor.top_strip(height);
    (bar, StrutPartial::top(bar, monitor.y))
}

/// `_NET_WM_STATE` messages taking `window` from `current` to `target`:
/// drop the opposite state, then add the new one. Empty when unchanged.
pub fn stacking_requests(
    atoms: &Atoms,
    window: Window,
    current: Stacking,
    target: Stacking,
) -> Vec<ClientMessageEvent> {
    if current == target {
        return Vec::new();
    }
    let (add, remove) = match target {
        Stacking::Above => (atoms._net_wm_state_above, atoms._net_wm_state_below),
        Stacking::Below => (atoms._net_wm_state_below, atoms._net_wm_state_above),
    };
    vec![
        atoms.state_request(window, STATE_REMOVE, remove, 0),
        atoms.state_request(window, STATE_ADD, add, 0),
    ]
}

/// What gets painted
pub struct BarState<'a> {
    /// Icon name or path of the active application
    pub icon: &'a str,
    pub title: &'a str,
    pub menu: Vec<&'a MenuEntry>,
    pub menu_visible: bool,
    pub clock: &'a str,
    /// Entry whose popup is open
    pub open_menu: Option<i32>,
}

pub struct StatusBar {
    window: Window,
    screen_num: usize,
    rect: ScreenRect,
    height: u32,
    padding: u32,
    stacking: Stacking,
    painter: Painter,
    /// `None` when the root visual cannot show the icon
    pixel_format: Option<PixelFormat>,
    icons: IconCache,
    layout: BarLayout,
    popup: Option<MenuPopup>,
    /// Left edge of the label the current popup chain started from
    popup_anchor: i32,
}

impl StatusBar {
    pub fn new<C: Connection>(conn: &C, atoms: &Atoms, screen_num: usize, config: &Config) -> Result<Self> {
        let screen = &conn.setup().roots[screen_num];
        let height = config.bar.height;
        let (rect, strut) = bar_geometry(screen::primary_geometry(conn, screen_num), height);

        let window = conn.generate_id()?;
        conn.create_window(
            COPY_DEPTH_FROM_PARENT,
            window,
            screen.root,
            rect.x as i16,
            rect.y as i16,
            rect.width as u16,
            rect.height as u16,
            0,
            WindowClass::INPUT_OUTPUT,
            0,
            &CreateWindowAux::new()
                .background_pixel(config.colors.background)
                .event_mask(
                    EventMask::EXPOSURE
                        | EventMask::STRUCTURE_NOTIFY
                        | EventMask::BUTTON_PRESS
                        | EventMask::BUTTON_RELEASE
                        | EventMask::BUTTON1_MOTION,
                ),
        )
        .context("Failed to create bar window")?;

        let class = format!("{BAR_CLASS}\0{BAR_CLASS}\0");
        conn.change_property8(
            PropMode::REPLACE,
            window,
            AtomEnum::WM_CLASS,
            AtomEnum::STRING,
            class.as_bytes(),
        )?;
        conn.change_property8(
            PropMode::REPLACE,
            window,
            atoms._net_wm_name,
            atoms.utf8_string,
            BAR_CLASS.as_bytes(),
        )?;
        conn.change_property32(
            PropMode::REPLACE,
            window,
            atoms._net_wm_window_type,
            AtomEnum::ATOM,
            &[atoms._net_wm_window_type_dock],
        )?;
        conn.change_property32(
            PropMode::REPLACE,
            window,
            atoms._net_wm_desktop,
            AtomEnum::CARDINAL,
            &[ALL_DESKTOPS],
        )?;
        // Initial state; later changes go through the window manager
        conn.change_property32(
            PropMode::REPLACE,
            window,
            atoms._net_wm_state,
            AtomEnum::ATOM,
            &[
                atoms._net_wm_state_above,
                atoms._net_wm_state_sticky,
                atoms._net_wm_state_skip_taskbar,
                atoms._net_wm_state_skip_pager,
            ],
        )?;

        let mut hints = WmHints::new();
        hints.input = Some(false);
        hints.set(conn, window)?;

        let painter = Painter::new(conn, window, &config.bar.font, config.colors.clone())?;
        let pixel_format = PixelFormat::for_screen(conn.setup(), screen);

        let bar = Self {
            window,
            screen_num,
            rect,
            height,
            padding: config.bar.padding,
            stacking: Stacking::Above,
            painter,
            pixel_format,
            icons: IconCache::new(height.saturating_sub(2 * ICON_MARGIN)),
            layout: BarLayout::default(),
            popup: None,
            popup_anchor: rect.x,
        };
        bar.apply_strut(conn, atoms, strut)?;

        conn.map_window(window)?;
        conn.flush()?;

        info!("Bar window {:#x} at {:?}", window, rect);
        Ok(bar)
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn rect(&self) -> ScreenRect {
        self.rect
    }

    /// Follow the primary monitor; returns whether the bar moved
    pub fn update_geometry<C: Connection>(&mut self, conn: &C, atoms: &Atoms) -> Result<bool> {
        let (rect, strut) = bar_geometry(screen::primary_geometry(conn, self.screen_num), self.height);
        if rect == self.rect {
            return Ok(false);
        }

        debug!("Bar geometry {:?} -> {:?}", self.rect, rect);
        self.rect = rect;
        conn.configure_window(
            self.window,
            &ConfigureWindowAux::new()
                .x(rect.x)
                .y(rect.y)
                .width(rect.width)
                .height(rect.height),
        )?;
        self.apply_strut(conn, atoms, strut)?;
        conn.flush()?;
        Ok(true)
    }

    fn apply_strut<C: Connection>(&self, conn: &C, atoms: &Atoms, strut: StrutPartial) -> Result<()> {
        conn.change_property32(
            PropMode::REPLACE,
            self.window,
            atoms._net_wm_strut_partial,
            AtomEnum::CARDINAL,
            &strut.to_cardinals(),
        )?;
        conn.change_property32(
            PropMode::REPLACE,
            self.window,
            atoms._net_wm_strut,
            AtomEnum::CARDINAL,
            &strut.to_legacy(),
        )?;
        debug!("Strut: {:?}", strut);
        Ok(())
    }

    /// Ask the window manager to keep the bar above or below other windows
    pub fn set_stacking<C: Connection>(
        &mut self,
        conn: &C,
        atoms: &Atoms,
        root: Window,
        stacking: Stacking,
    ) -> Result<()> {
        let requests = stacking_requests(atoms, self.window, self.stacking, stacking);
        if requests.is_empty() {
            return Ok(());
        }
        for request in requests {
            send_to_root(conn, root, request)?;
        }

        debug!("Bar stacking {:?} -> {:?}", self.stacking, stacking);
        self.stacking = stacking;
        Ok(())
    }

    pub fn hit_test(&self, x: i32) -> Hit {
        self.layout.hit_test(x)
    }

    pub fn repaint<C: Connection>(&mut self, conn: &C, state: &BarState<'_>) -> Result<()> {
        let menu = if state.menu_visible {
            state.menu.iter().map(|e| (e.id, e.label.as_str(), e.enabled)).collect()
        } else {
            Vec::new()
        };
        let app_icon = match self.pixel_format {
            Some(format) => self.icons.get(state.icon).map(|image| (format, image)),
            None => None,
        };
        let content = BarContent {
            icon: app_icon.map(|(_, image)| image.side).unwrap_or(0),
            title: state.title,
            menu,
            clock: state.clock,
        };
        let measure = |text: &str| self.painter.measure(conn, text);
        self.layout = BarLayout::compute(self.rect.width, self.padding, &content, measure);

        let (width, height) = (self.rect.width as u16, self.rect.height as u16);
        self.painter.clear(conn, self.window, width, height)?;

        let padding = self.padding;
        if let (Some(span), Some((format, image))) = (self.layout.icon, app_icon) {
            let data = icon::to_zpixmap(&image.rgba, self.painter.colors().background, format.lsb_first);
            let y = (self.rect.height.saturating_sub(image.side) / 2) as i32;
            self.painter
                .image(conn, self.window, span.x + padding as i32 / 2, y, image.side, format.depth, &data)?;
        }
        if let Some(span) = self.layout.title {
            let room = span.width.saturating_sub(2 * padding);
            let title = elide(state.title, room, |t| self.painter.measure(conn, t));
            self.painter
                .text(conn, self.window, span.text_x(padding), 0, self.rect.height, &title, true, None)?;
        }

        for slot in &self.layout.menu {
            let background = (state.open_menu == Some(slot.id)).then(|| self.painter.colors().highlight);
            if let Some(color) = background {
                self.painter.fill(
                    conn,
                    self.window,
                    color,
                    Rectangle {
                        x: slot.span.x as i16,
                        y: 0,
                        width: slot.span.width as u16,
                        height,
                    },
                )?;
            }
            self.painter.text(
                conn,
                self.window,
                slot.span.text_x(padding),
                0,
                self.rect.height,
                &slot.label,
                slot.enabled,
                background,
            )?;
        }

        if let Some(span) = self.layout.clock {
            self.painter
                .text(conn, self.window, span.text_x(padding), 0, self.rect.height, state.clock, true, None)?;
        }

        conn.flush()?;
        Ok(())
    }

    pub fn popup(&self) -> Option<&MenuPopup> {
        self.popup.as_ref()
    }

    /// Show `entries` below the label of `parent`; nested submenus reuse
    /// the anchor of the popup they were opened from
    pub fn open_popup<C: Connection>(&mut self, conn: &C, parent: i32, entries: Vec<MenuEntry>) -> Result<()> {
        self.close_popup(conn)?;

        if let Some(slot) = self.layout.menu_slot(parent) {
            self.popup_anchor = self.rect.x + slot.span.x;
        }
        let anchor_x = self.popup_anchor;

        let row_height = self.painter.line_height() + self.padding;
        let rows = PopupRows::new(entries, row_height, self.padding, |t| self.painter.measure(conn, t));
        if rows.entries.is_empty() {
            return Ok(());
        }

        let monitor = screen::primary_geometry(conn, self.screen_num);
        let rect = rows.placement(anchor_x, self.rect.y + self.rect.height as i32, monitor);
        let screen = &conn.setup().roots[self.screen_num];
        let popup = MenuPopup::open(
            conn,
            screen,
            parent,
            rows,
            rect,
            self.padding,
            self.painter.colors().background,
        )?;
        popup.draw(conn, &self.painter, None)?;
        self.popup = Some(popup);
        Ok(())
    }

    pub fn draw_popup<C: Connection>(&self, conn: &C, hover: Option<i32>) -> Result<()> {
        if let Some(popup) = &self.popup {
            popup.draw(conn, &self.painter, hover)?;
            conn.flush()?;
        }
        Ok(())
    }

    /// Returns whether a popup was open
    pub fn close_popup<C: Connection>(&mut self, conn: &C) -> Result<bool> {
        match self.popup.take() {
            Some(popup) => {
                popup.close(conn)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wm::ewmh::SOURCE_PAGER;

    #[test]
    fn test_bar_geometry_on_primary_monitor() {
        let (bar, strut) = bar_geometry(ScreenRect::new(0, 0, 1920, 1080), 25);
        assert_eq!(bar, ScreenRect::new(0, 0, 1920, 25));
        assert_eq!(strut.top, 24);
        assert_eq!(strut.top_start_x, 0);
        assert_eq!(strut.top_end_x, 1919);
    }

    #[test]
    fn test_bar_geometry_on_offset_monitor() {
        let (bar, strut) = bar_geometry(ScreenRect::new(1920, 200, 2560, 1440), 25);
        assert_eq!(bar, ScreenRect::new(1920, 200, 2560, 25));
        assert_eq!(strut.top, 25 + 200 - 1);
        assert_eq!(strut.top_start_x, 1920);
        assert_eq!(strut.top_end_x, 1920 + 2560 - 1);
        assert_eq!(strut.to_legacy(), [0, 0, 224, 0]);
    }

    #[test]
    fn test_stacking_requests_in_both_directions() {
        let atoms = Atoms::sequential();
        let (above, below) = (atoms._net_wm_state_above, atoms._net_wm_state_below);

        let down = stacking_requests(&atoms, 0x600001, Stacking::Above, Stacking::Below);
        assert_eq!(down.len(), 2);
        for request in &down {
            assert_eq!(request.window, 0x600001);
            assert_eq!(request.type_, atoms._net_wm_state);
        }
        assert_eq!(down[0].data.as_data32(), [STATE_REMOVE, above, 0, SOURCE_PAGER, 0]);
        assert_eq!(down[1].data.as_data32(), [STATE_ADD, below, 0, SOURCE_PAGER, 0]);

        let up = stacking_requests(&atoms, 0x600001, Stacking::Below, Stacking::Above);
        assert_eq!(up[0].data.as_data32(), [STATE_REMOVE, below, 0, SOURCE_PAGER, 0]);
        assert_eq!(up[1].data.as_data32(), [STATE_ADD, above, 0, SOURCE_PAGER, 0]);
    }

    #[test]
    fn test_unchanged_stacking_sends_nothing() {
        let atoms = Atoms::sequential();
        assert!(stacking_requests(&atoms, 1, Stacking::Above, Stacking::Above).is_empty());
        assert!(stacking_requests(&atoms, 1, Stacking::Below, Stacking::Below).is_empty());
    }

    #[test]
    fn test_stacking_follows_launch_pad() {
        assert_eq!(Stacking::for_launch_pad(false), Stacking::Above);
        assert_eq!(Stacking::for_launch_pad(true), Stacking::Below);
    }
}
