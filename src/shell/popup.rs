//! Submenu popup
//!
//! Override-redirect window listing the children of a top-level menu entry.
//! It holds a pointer grab while open so a click anywhere else closes it.

use anyhow::Result;
use tracing::{debug, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::{COPY_DEPTH_FROM_PARENT, CURRENT_TIME, NONE};

use super::render::Painter;
use crate::dbus::dbusmenu::MenuEntry;
use crate::shared::ScreenRect;

const MIN_WIDTH: u32 = 160;

/// Row geometry, independent of the window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupRows {
    pub entries: Vec<MenuEntry>,
    pub row_height: u32,
    pub width: u32,
}

impl PopupRows {
    pub fn new(entries: Vec<MenuEntry>, row_height: u32, padding: u32, measure: impl Fn(&str) -> u32) -> Self {
        let entries: Vec<MenuEntry> = entries.into_iter().filter(|e| e.visible).collect();
        let widest = entries.iter().map(|e| measure(&e.label)).max().unwrap_or(0);
        Self {
            entries,
            row_height,
            width: (widest + 4 * padding).max(MIN_WIDTH),
        }
    }

    pub fn height(&self) -> u32 {
        (self.entries.len() as u32 * self.row_height).max(self.row_height)
    }

    /// Activatable entry under a point relative to the popup
    pub fn entry_at(&self, x: i32, y: i32) -> Option<&MenuEntry> {
        if x < 0 || y < 0 || x >= self.width as i32 || self.row_height == 0 {
            return None;
        }
        self.entries
            .get(y as usize / self.row_height as usize)
            .filter(|e| e.enabled && !e.separator)
    }

    /// Place below `anchor`, pushed left if it would leave the screen
    pub fn placement(&self, anchor_x: i32, anchor_bottom: i32, screen: ScreenRect) -> ScreenRect {
        let right = screen.x + screen.width as i32;
        let x = if anchor_x + self.width as i32 > right {
            (right - self.width as i32).max(screen.x)
        } else {
            anchor_x
        };
        ScreenRect::new(x, anchor_bottom, self.width, self.height())
    }
}

pub struct MenuPopup {
    window: Window,
    /// Id of the top-level entry this popup belongs to
    pub parent: i32,
    pub rows: PopupRows,
    rect: ScreenRect,
    padding: u32,
}

impl MenuPopup {
    pub fn open<C: Connection>(
        conn: &C,
        screen: &Screen,
        parent: i32,
        rows: PopupRows,
        rect: ScreenRect,
        padding: u32,
        background: u32,
    ) -> Result<Self> {
        let window = conn.generate_id()?;
        conn.create_window(
            COPY_DEPTH_FROM_PARENT,
            window,
            screen.root,
            rect.x as i16,
            rect.y as i16,
            rect.width as u16,
            rect.height as u16,
            1,
            WindowClass::INPUT_OUTPUT,
            0,
            &CreateWindowAux::new()
                .background_pixel(background)
                .border_pixel(screen.black_pixel)
                .override_redirect(1)
                .save_under(1)
                .event_mask(
                    EventMask::EXPOSURE
                        | EventMask::BUTTON_PRESS
                        | EventMask::BUTTON_RELEASE
                        | EventMask::POINTER_MOTION
                        | EventMask::LEAVE_WINDOW,
                ),
        )?;
        conn.map_window(window)?;

        let grab = conn
            .grab_pointer(
                true,
                window,
                EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE | EventMask::POINTER_MOTION,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
                NONE,
                NONE,
                CURRENT_TIME,
            )?
            .reply()?;
        if grab.status != GrabStatus::SUCCESS {
            warn!("Pointer grab for menu popup failed: {:?}", grab.status);
        }
        conn.flush()?;

        debug!("Opened popup for menu item {} at {:?}", parent, rect);
        Ok(Self {
            window,
            parent,
            rows,
            rect,
            padding,
        })
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn entry_at_root(&self, root_x: i32, root_y: i32) -> Option<&MenuEntry> {
        self.rows.entry_at(root_x - self.rect.x, root_y - self.rect.y)
    }

    pub fn contains_root(&self, root_x: i32, root_y: i32) -> bool {
        self.rect.contains(root_x, root_y)
    }

    pub fn draw<C: Connection>(&self, conn: &C, painter: &Painter, hover: Option<i32>) -> Result<()> {
        let width = self.rows.width as u16;
        painter.clear(conn, self.window, width, self.rows.height() as u16)?;

        let row_height = self.rows.row_height;
        for (i, entry) in self.rows.entries.iter().enumerate() {
            let y = (i as u32 * row_height) as i32;
            if entry.separator {
                painter.fill(
                    conn,
                    self.window,
                    painter.colors().disabled,
                    Rectangle {
                        x: self.padding as i16,
                        y: (y + row_height as i32 / 2) as i16,
                        width: width.saturating_sub(2 * self.padding as u16),
                        height: 1,
                    },
                )?;
                continue;
            }

            let highlighted = hover == Some(entry.id) && entry.enabled;
            let background = highlighted.then_some(painter.colors().highlight);
            if let Some(color) = background {
                painter.fill(
                    conn,
                    self.window,
                    color,
                    Rectangle {
                        x: 0,
                        y: y as i16,
                        width,
                        height: row_height as u16,
                    },
                )?;
            }
            let label = if entry.submenu {
                format!("{} >", entry.label)
            } else {
                entry.label.clone()
            };
            painter.text(
                conn,
                self.window,
                2 * self.padding as i32,
                y,
                row_height,
                &label,
                entry.enabled,
                background,
            )?;
        }
        Ok(())
    }

    pub fn close<C: Connection>(self, conn: &C) -> Result<()> {
        conn.ungrab_pointer(CURRENT_TIME)?;
        conn.destroy_window(self.window)?;
        conn.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i32, label: &str) -> MenuEntry {
        MenuEntry {
            label: label.to_string(),
            ..MenuEntry::new(id)
        }
    }

    fn rows() -> PopupRows {
        let separator = MenuEntry {
            separator: true,
            ..MenuEntry::new(3)
        };
        let hidden = MenuEntry {
            visible: false,
            ..entry(4, "Hidden")
        };
        let disabled = MenuEntry {
            enabled: false,
            ..entry(5, "Print")
        };
        PopupRows::new(
            vec![entry(1, "Open"), entry(2, "Save"), separator, hidden, disabled],
            20,
            8,
            |t| t.len() as u32 * 7,
        )
    }

    #[test]
    fn test_rows_skip_hidden_entries() {
        let rows = rows();
        assert_eq!(rows.entries.len(), 4);
        assert_eq!(rows.height(), 80);
        assert_eq!(rows.width, MIN_WIDTH);
    }

    #[test]
    fn test_entry_at() {
        let rows = rows();
        assert_eq!(rows.entry_at(10, 5).map(|e| e.id), Some(1));
        assert_eq!(rows.entry_at(10, 25).map(|e| e.id), Some(2));
        // separator and disabled rows are inert
        assert_eq!(rows.entry_at(10, 45), None);
        assert_eq!(rows.entry_at(10, 65), None);
        assert_eq!(rows.entry_at(10, 85), None);
        assert_eq!(rows.entry_at(-1, 5), None);
    }

    #[test]
    fn test_placement_stays_on_screen() {
        let rows = rows();
        let screen = ScreenRect::new(0, 0, 1000, 800);

        assert_eq!(rows.placement(100, 25, screen), ScreenRect::new(100, 25, 160, 80));
        assert_eq!(rows.placement(950, 25, screen), ScreenRect::new(840, 25, 160, 80));
    }
}
