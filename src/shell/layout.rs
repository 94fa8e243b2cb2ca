//! Bar layout
//!
//! Places the application icon, the title, the menu labels and the clock along the bar and maps
//! pointer positions back to them. Text measuring is passed in so this stays
//! independent of the X server.

use chrono::{DateTime, TimeZone};

/// Horizontal extent of one item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub x: i32,
    pub width: u32,
}

impl Span {
    pub fn contains(&self, x: i32) -> bool {
        x >= self.x && x < self.x + self.width as i32
    }

    /// Where the text starts inside the padded span
    pub fn text_x(&self, padding: u32) -> i32 {
        self.x + padding as i32
    }
}

/// A menu label as laid out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuSlot {
    pub id: i32,
    pub label: String,
    pub enabled: bool,
    pub span: Span,
}

/// What a pointer position lands on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hit {
    Title,
    Menu { id: i32 },
    Clock,
    Empty,
}

/// Input for one layout pass
pub struct BarContent<'a> {
    /// Side of the square application icon, 0 when there is none
    pub icon: u32,
    pub title: &'a str,
    /// `(id, label, enabled)` of the entries to show
    pub menu: Vec<(i32, &'a str, bool)>,
    pub clock: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BarLayout {
    pub icon: Option<Span>,
    pub title: Option<Span>,
    pub menu: Vec<MenuSlot>,
    pub clock: Option<Span>,
}

impl BarLayout {
    pub fn compute(
        width: u32,
        padding: u32,
        content: &BarContent<'_>,
        measure: impl Fn(&str) -> u32,
    ) -> Self {
        let padded = |text: &str| measure(text) + 2 * padding;
        let right_edge = width as i32;

        let clock = (!content.clock.is_empty()).then(|| {
            let w = padded(content.clock);
            Span {
                x: (right_edge - w as i32).max(0),
                width: w,
            }
        });
        let limit = clock.map(|c| c.x).unwrap_or(right_edge);

        let mut cursor = 0;
        let icon = (content.icon > 0 && content.icon + padding <= limit.max(0) as u32).then(|| {
            let span = Span {
                x: 0,
                width: content.icon + padding,
            };
            cursor = span.width as i32;
            span
        });
        let title = (!content.title.is_empty()).then(|| {
            let w = padded(content.title).min((limit - cursor).max(0) as u32);
            let span = Span { x: cursor, width: w };
            cursor += w as i32;
            span
        });

        let mut menu = Vec::new();
        for &(id, label, enabled) in &content.menu {
            let w = padded(label);
            // Labels that do not fit are dropped rather than overlapping the clock
            if cursor + w as i32 > limit {
                break;
            }
            menu.push(MenuSlot {
                id,
                label: label.to_string(),
                enabled,
                span: Span { x: cursor, width: w },
            });
            cursor += w as i32;
        }

        Self {
            icon,
            title,
            menu,
            clock,
        }
    }

    pub fn hit_test(&self, x: i32) -> Hit {
        if self.icon.is_some_and(|s| s.contains(x)) || self.title.is_some_and(|s| s.contains(x)) {
            return Hit::Title;
        }
        if let Some(slot) = self.menu.iter().find(|m| m.span.contains(x)) {
            return Hit::Menu { id: slot.id };
        }
        if self.clock.is_some_and(|s| s.contains(x)) {
            return Hit::Clock;
        }
        Hit::Empty
    }

    pub fn menu_slot(&self, id: i32) -> Option<&MenuSlot> {
        self.menu.iter().find(|m| m.id == id)
    }
}

pub fn format_clock<Tz: TimeZone>(now: &DateTime<Tz>, twenty_four_time: bool) -> String
where
    Tz::Offset: std::fmt::Display,
{
    if twenty_four_time {
        now.format("%H:%M").to_string()
    } else {
        now.format("%-I:%M %p").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    /// 7 pixels per character, like the `fixed` font
    fn measure(text: &str) -> u32 {
        text.chars().count() as u32 * 7
    }

    fn content<'a>(menu: Vec<(i32, &'a str, bool)>) -> BarContent<'a> {
        BarContent {
            icon: 0,
            title: "Files",
            menu,
            clock: "12:30",
        }
    }

    #[test]
    fn test_items_are_packed_left_and_clock_right() {
        let layout = BarLayout::compute(
            1920,
            8,
            &content(vec![(1, "File", true), (2, "Edit", true)]),
            measure,
        );

        assert_eq!(layout.title, Some(Span { x: 0, width: 51 }));
        assert_eq!(layout.menu[0].span, Span { x: 51, width: 44 });
        assert_eq!(layout.menu[1].span, Span { x: 95, width: 44 });
        assert_eq!(layout.clock, Some(Span { x: 1869, width: 51 }));
    }

    #[test]
    fn test_hit_test_maps_positions() {
        let layout = BarLayout::compute(
            1920,
            8,
            &content(vec![(10, "File", true), (20, "Edit", true)]),
            measure,
        );

        assert_eq!(layout.hit_test(5), Hit::Title);
        assert_eq!(layout.hit_test(60), Hit::Menu { id: 10 });
        assert_eq!(layout.hit_test(95), Hit::Menu { id: 20 });
        assert_eq!(layout.hit_test(500), Hit::Empty);
        assert_eq!(layout.hit_test(1900), Hit::Clock);
    }

    #[test]
    fn test_labels_past_the_clock_are_dropped() {
        let layout = BarLayout::compute(
            200,
            8,
            &content(vec![(1, "File", true), (2, "Edit", true), (3, "Selection", true)]),
            measure,
        );

        assert_eq!(layout.menu.len(), 2);
        assert!(layout.menu.last().map(|m| m.span.x + m.span.width as i32).unwrap_or(0) <= 149);
    }

    #[test]
    fn test_empty_title_starts_menu_at_edge() {
        let layout = BarLayout::compute(
            800,
            8,
            &BarContent {
                icon: 0,
                title: "",
                menu: vec![(1, "File", true)],
                clock: "",
            },
            measure,
        );

        assert_eq!(layout.title, None);
        assert_eq!(layout.clock, None);
        assert_eq!(layout.menu[0].span.x, 0);
        assert_eq!(layout.hit_test(799), Hit::Empty);
    }

    #[test]
    fn test_icon_shifts_title_and_clicks_as_title() {
        let layout = BarLayout::compute(
            1920,
            8,
            &BarContent {
                icon: 16,
                ..content(vec![(1, "File", true)])
            },
            measure,
        );

        assert_eq!(layout.icon, Some(Span { x: 0, width: 24 }));
        assert_eq!(layout.title, Some(Span { x: 24, width: 51 }));
        assert_eq!(layout.menu[0].span.x, 75);
        assert_eq!(layout.hit_test(3), Hit::Title);
        assert_eq!(layout.hit_test(30), Hit::Title);
        assert_eq!(layout.hit_test(80), Hit::Menu { id: 1 });
    }

    #[test]
    fn test_icon_without_room_is_dropped() {
        let layout = BarLayout::compute(
            20,
            8,
            &BarContent {
                icon: 16,
                title: "",
                menu: Vec::new(),
                clock: "",
            },
            measure,
        );

        assert_eq!(layout.icon, None);
    }

    #[test]
    fn test_clock_formats() {
        let afternoon = Utc.with_ymd_and_hms(2024, 3, 1, 15, 7, 0).unwrap();
        assert_eq!(format_clock(&afternoon, true), "15:07");
        assert_eq!(format_clock(&afternoon, false), "3:07 PM");

        let morning = Utc.with_ymd_and_hms(2024, 3, 1, 9, 45, 0).unwrap();
        assert_eq!(format_clock(&morning, true), "09:45");
        assert_eq!(format_clock(&morning, false), "9:45 AM");
    }
}
