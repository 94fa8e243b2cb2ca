//! Shared geometry types
//!
//! Screen rectangles and the strut reservation derived from the bar's bounds.

/// Rectangle in root window coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScreenRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ScreenRect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Thin strip spanning the top edge of this rectangle
    pub fn top_strip(&self, height: u32) -> Self {
        Self {
            x: self.x,
            y: self.y,
            width: self.width,
            height,
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x
            && y >= self.y
            && x < self.x + self.width as i32
            && y < self.y + self.height as i32
    }
}

/// `_NET_WM_STRUT_PARTIAL` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StrutPartial {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
    pub left_start_y: u32,
    pub left_end_y: u32,
    pub right_start_y: u32,
    pub right_end_y: u32,
    pub top_start_x: u32,
    pub top_end_x: u32,
    pub bottom_start_x: u32,
    pub bottom_end_x: u32,
}

impl StrutPartial {
    /// Top reservation for a bar placed at the top of a monitor whose top
    /// edge is at `screen_top`.
    pub fn top(bar: ScreenRect, screen_top: i32) -> Self {
        let top = (bar.height as i32 + screen_top - 1).max(0) as u32;
        let start = bar.x.max(0) as u32;
        let end = (bar.x + bar.width as i32 - 1).max(0) as u32;

        Self {
            top,
            top_start_x: start,
            top_end_x: end,
            ..Self::default()
        }
    }

    pub fn to_cardinals(&self) -> [u32; 12] {
        [
            self.left,
            self.right,
            self.top,
            self.bottom,
            self.left_start_y,
            self.left_end_y,
            self.right_start_y,
            self.right_end_y,
            self.top_start_x,
            self.top_end_x,
            self.bottom_start_x,
            self.bottom_end_x,
        ]
    }

    /// Legacy `_NET_WM_STRUT` (left, right, top, bottom)
    pub fn to_legacy(&self) -> [u32; 4] {
        [self.left, self.right, self.top, self.bottom]
    }
}
