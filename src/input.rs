//! Pointer gestures on the bar's title area
//!
//! Turns raw button and motion events into window actions: press and drag
//! moves, double click toggles maximize, middle click closes, right click
//! minimizes.

/// Double-click window, same as window titlebars
const DOUBLE_CLICK_TIME_MS: u32 = 300;
const DOUBLE_CLICK_DISTANCE: i16 = 6;

/// Pointer travel before a press becomes a move
const DRAG_THRESHOLD: i16 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleAction {
    Move,
    ToggleMaximize,
    Close,
    Minimize,
}

#[derive(Debug, Default)]
pub struct TitleGesture {
    /// Last primary click: (time, x, y)
    last_click: Option<(u32, i16, i16)>,
    /// Primary button held since this position
    pressed_at: Option<(i16, i16)>,
}

impl TitleGesture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, button: u8, time: u32, x: i16, y: i16) -> Option<TitleAction> {
        match button {
            1 => {
                let is_double_click = self.last_click.is_some_and(|(last_time, last_x, last_y)| {
                    time.wrapping_sub(last_time) < DOUBLE_CLICK_TIME_MS
                        && (x - last_x).abs() < DOUBLE_CLICK_DISTANCE
                        && (y - last_y).abs() < DOUBLE_CLICK_DISTANCE
                });

                if is_double_click {
                    self.last_click = None;
                    self.pressed_at = None;
                    return Some(TitleAction::ToggleMaximize);
                }

                self.last_click = Some((time, x, y));
                self.pressed_at = Some((x, y));
                None
            }
            2 => Some(TitleAction::Close),
            3 => Some(TitleAction::Minimize),
            _ => None,
        }
    }

    pub fn motion(&mut self, x: i16, y: i16) -> Option<TitleAction> {
        let (start_x, start_y) = self.pressed_at?;
        if (x - start_x).abs() < DRAG_THRESHOLD && (y - start_y).abs() < DRAG_THRESHOLD {
            return None;
        }
        // The window manager owns the pointer from here on
        self.pressed_at = None;
        self.last_click = None;
        Some(TitleAction::Move)
    }

    pub fn release(&mut self) {
        self.pressed_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_click_toggles_maximize() {
        let mut gesture = TitleGesture::new();
        assert_eq!(gesture.press(1, 1000, 50, 10), None);
        gesture.release();
        assert_eq!(gesture.press(1, 1200, 52, 11), Some(TitleAction::ToggleMaximize));

        // a third click starts over
        assert_eq!(gesture.press(1, 1300, 52, 11), None);
    }

    #[test]
    fn test_slow_or_distant_clicks_are_single() {
        let mut gesture = TitleGesture::new();
        gesture.press(1, 1000, 50, 10);
        gesture.release();
        assert_eq!(gesture.press(1, 1400, 50, 10), None);
        gesture.release();
        assert_eq!(gesture.press(1, 1500, 80, 10), None);
    }

    #[test]
    fn test_drag_starts_move_once() {
        let mut gesture = TitleGesture::new();
        gesture.press(1, 1000, 50, 10);
        assert_eq!(gesture.motion(52, 10), None);
        assert_eq!(gesture.motion(60, 12), Some(TitleAction::Move));
        assert_eq!(gesture.motion(70, 12), None);
    }

    #[test]
    fn test_motion_without_press_does_nothing() {
        let mut gesture = TitleGesture::new();
        assert_eq!(gesture.motion(60, 12), None);

        gesture.press(1, 1000, 50, 10);
        gesture.release();
        assert_eq!(gesture.motion(90, 12), None);
    }

    #[test]
    fn test_other_buttons() {
        let mut gesture = TitleGesture::new();
        assert_eq!(gesture.press(2, 1000, 0, 0), Some(TitleAction::Close));
        assert_eq!(gesture.press(3, 1000, 0, 0), Some(TitleAction::Minimize));
        assert_eq!(gesture.press(4, 1000, 0, 0), None);
    }
}
