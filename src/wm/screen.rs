//! Screen Module
//!
//! Monitor geometry via XRandR, used to place the bar on the primary output.

use anyhow::Result;
use tracing::{debug, warn};
use x11rb::connection::Connection;
use x11rb::protocol::randr::{self, ConnectionExt as _};
use x11rb::protocol::xproto::Window;

use crate::shared::ScreenRect;

/// Monitor/Output device information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Monitor {
    pub rect: ScreenRect,
    pub name: String,
    pub primary: bool,
}

/// Ask for screen change notifications on the root window
pub fn select_screen_changes<C: Connection>(conn: &C, root: Window) -> Result<()> {
    conn.randr_query_version(1, 5)?.reply()?;
    conn.randr_select_input(
        root,
        randr::NotifyMask::SCREEN_CHANGE | randr::NotifyMask::CRTC_CHANGE | randr::NotifyMask::OUTPUT_CHANGE,
    )?;
    Ok(())
}

/// Enumerate active outputs
pub fn monitors<C: Connection>(conn: &C, root: Window) -> Result<Vec<Monitor>> {
    let resources = conn.randr_get_screen_resources_current(root)?.reply()?;
    let primary = conn.randr_get_output_primary(root)?.reply()?.output;

    let mut monitors = Vec::new();
    for &output in &resources.outputs {
        let info = conn
            .randr_get_output_info(output, resources.config_timestamp)?
            .reply()?;
        if info.crtc == x11rb::NONE || info.connection != randr::Connection::CONNECTED {
            continue;
        }

        let crtc = conn
            .randr_get_crtc_info(info.crtc, resources.config_timestamp)?
            .reply()?;
        if crtc.width == 0 || crtc.height == 0 {
            continue;
        }

        monitors.push(Monitor {
            rect: ScreenRect::new(
                crtc.x as i32,
                crtc.y as i32,
                crtc.width as u32,
                crtc.height as u32,
            ),
            name: String::from_utf8_lossy(&info.name).into_owned(),
            primary: output == primary,
        });
    }

    debug!("Detected {} monitor(s): {:?}", monitors.len(), monitors);
    Ok(monitors)
}

/// Primary output, else the first active one
pub fn pick_primary(monitors: &[Monitor]) -> Option<&Monitor> {
    monitors.iter().find(|m| m.primary).or_else(|| monitors.first())
}

/// Geometry of the monitor the bar belongs on. Falls back to the whole
/// root window when RandR is unavailable or reports nothing.
pub fn primary_geometry<C: Connection>(conn: &C, screen_num: usize) -> ScreenRect {
    let screen = &conn.setup().roots[screen_num];
    let fallback = ScreenRect::new(
        0,
        0,
        screen.width_in_pixels as u32,
        screen.height_in_pixels as u32,
    );

    match monitors(conn, screen.root) {
        Ok(list) => pick_primary(&list).map(|m| m.rect).unwrap_or(fallback),
        Err(e) => {
            warn!("RandR query failed, using root geometry: {}", e);
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(name: &str, x: i32, primary: bool) -> Monitor {
        Monitor {
            rect: ScreenRect::new(x, 0, 1920, 1080),
            name: name.to_string(),
            primary,
        }
    }

    #[test]
    fn test_pick_primary_prefers_flagged_output() {
        let list = vec![monitor("HDMI-1", 0, false), monitor("eDP-1", 1920, true)];
        assert_eq!(pick_primary(&list).map(|m| m.name.as_str()), Some("eDP-1"));
    }

    #[test]
    fn test_pick_primary_falls_back_to_first() {
        let list = vec![monitor("DP-2", 0, false), monitor("DP-3", 1920, false)];
        assert_eq!(pick_primary(&list).map(|m| m.name.as_str()), Some("DP-2"));
        assert!(pick_primary(&[]).is_none());
    }
}
