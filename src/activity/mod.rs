//! Window Tracker
//!
//! Follows the active window and resolves what the bar should call it:
//! a registry name and icon, the window manager's visible name, or nothing
//! when the active window is not a real application window.

pub mod control;

use tracing::debug;

use crate::apps::AppRegistry;
use crate::wm::window_info::ForegroundWindowInfo;
use crate::wm::window_type::WindowType;

/// Label shown while the desktop background is focused
pub const DESKTOP_TITLE: &str = "Desktop";

/// Change notifications for the bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityEvent {
    TitleChanged,
    IconChanged,
    LaunchPadChanged,
}

/// Active window presentation state
#[derive(Debug)]
pub struct Activity {
    title: String,
    icon: String,
    launch_pad: bool,
    pid: Option<u32>,
    window_class: String,
    launcher_class: String,
    block_list: Vec<String>,
}

impl Activity {
    pub fn new(launcher_class: &str, block_list: &[String]) -> Self {
        Self {
            title: String::new(),
            icon: String::new(),
            launch_pad: false,
            pid: None,
            window_class: String::new(),
            launcher_class: launcher_class.to_lowercase(),
            block_list: block_list.iter().map(|c| c.to_lowercase()).collect(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn icon(&self) -> &str {
        &self.icon
    }

    /// Whether the launcher currently holds focus
    pub fn launch_pad(&self) -> bool {
        self.launch_pad
    }

    /// Re-resolve after the active window changed. `None` means no active
    /// window, or one that could not be read.
    pub fn update(
        &mut self,
        active: Option<&ForegroundWindowInfo>,
        registry: &AppRegistry,
    ) -> Vec<ActivityEvent> {
        let mut events = Vec::new();

        let launch_pad = active
            .map(|info| info.class == self.launcher_class)
            .unwrap_or(false);
        if launch_pad != self.launch_pad {
            self.launch_pad = launch_pad;
            events.push(ActivityEvent::LaunchPadChanged);
        }

        let Some(info) = active else {
            self.clear_title(&mut events);
            self.clear_icon(&mut events);
            return events;
        };

        if info.window_type == WindowType::Desktop {
            self.title = DESKTOP_TITLE.to_string();
            events.push(ActivityEvent::TitleChanged);
            self.clear_icon(&mut events);
            return events;
        }

        if !info.is_acceptable() || self.block_list.contains(&info.class) {
            debug!("Ignoring window {:#x} ({})", info.window, info.class);
            self.clear_title(&mut events);
            self.clear_icon(&mut events);
            return events;
        }

        self.pid = info.pid;
        self.window_class = info.class.clone();

        match registry.match_item(self.pid, &self.window_class) {
            Some(app) => {
                self.title = app.name.clone();
                events.push(ActivityEvent::TitleChanged);

                if self.icon != app.icon {
                    self.icon = app.icon.clone();
                    events.push(ActivityEvent::IconChanged);
                }
            }
            None => {
                if info.title != self.title {
                    self.title = info.title.clone();
                    events.push(ActivityEvent::TitleChanged);
                    self.clear_icon(&mut events);
                }
            }
        }

        events
    }

    fn clear_title(&mut self, events: &mut Vec<ActivityEvent>) {
        self.title.clear();
        events.push(ActivityEvent::TitleChanged);
    }

    fn clear_icon(&mut self, events: &mut Vec<ActivityEvent>) {
        self.icon.clear();
        events.push(ActivityEvent::IconChanged);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::AppEntry;
    use crate::wm::window_info::sample_window;
    use crate::wm::window_type::WindowState;

    fn activity() -> Activity {
        Activity::new(
            "cutefish-launcher",
            &["cutefish-launcher".to_string(), "cutefish-statusbar".to_string()],
        )
    }

    fn registry() -> AppRegistry {
        AppRegistry::from_entries(vec![AppEntry {
            id: "org.example.terminal".into(),
            name: "Terminal".into(),
            icon: "utilities-terminal".into(),
            exec: "term".into(),
            wm_class: Some("terminal".into()),
        }])
    }

    #[test]
    fn test_shell_windows_report_no_title() {
        for t in [
            WindowType::Dock,
            WindowType::Splash,
            WindowType::Toolbar,
            WindowType::Menu,
            WindowType::PopupMenu,
            WindowType::Notification,
        ] {
            let mut activity = activity();
            activity.update(Some(&sample_window(WindowType::Normal)), &registry());
            assert!(!activity.title().is_empty());

            activity.update(Some(&sample_window(t)), &registry());
            assert_eq!(activity.title(), "", "{:?}", t);
            assert_eq!(activity.icon(), "", "{:?}", t);
        }
    }

    #[test]
    fn test_desktop_gets_fixed_label() {
        let mut activity = activity();
        activity.update(Some(&sample_window(WindowType::Desktop)), &registry());
        assert_eq!(activity.title(), DESKTOP_TITLE);
        assert_eq!(activity.icon(), "");
    }

    #[test]
    fn test_registry_match_wins() {
        let mut activity = activity();
        let mut info = sample_window(WindowType::Normal);
        info.class = "terminal".into();
        info.title = "user@host: ~".into();

        let events = activity.update(Some(&info), &registry());
        assert_eq!(activity.title(), "Terminal");
        assert_eq!(activity.icon(), "utilities-terminal");
        assert!(events.contains(&ActivityEvent::TitleChanged));
        assert!(events.contains(&ActivityEvent::IconChanged));

        // same icon again: no icon notification
        let events = activity.update(Some(&info), &registry());
        assert_eq!(events, vec![ActivityEvent::TitleChanged]);
    }

    #[test]
    fn test_unknown_app_uses_visible_name() {
        let mut activity = activity();
        let info = sample_window(WindowType::Normal);

        activity.update(Some(&info), &registry());
        assert_eq!(activity.title(), "notes.txt - Editor");
        assert_eq!(activity.icon(), "");

        // unchanged title emits nothing
        assert!(activity.update(Some(&info), &registry()).is_empty());
    }

    #[test]
    fn test_blocked_and_skipped_windows_clear() {
        let mut activity = activity();
        let mut info = sample_window(WindowType::Normal);
        activity.update(Some(&info), &registry());

        info.class = "cutefish-statusbar".into();
        activity.update(Some(&info), &registry());
        assert_eq!(activity.title(), "");

        let mut skipped = sample_window(WindowType::Normal);
        skipped.state = WindowState::SKIP_TASKBAR;
        activity.update(Some(&skipped), &registry());
        assert_eq!(activity.title(), "");
    }

    #[test]
    fn test_launch_pad_flag() {
        let mut activity = activity();
        let mut launcher = sample_window(WindowType::Normal);
        launcher.class = "cutefish-launcher".into();

        let events = activity.update(Some(&launcher), &registry());
        assert!(activity.launch_pad());
        assert!(events.contains(&ActivityEvent::LaunchPadChanged));
        assert_eq!(activity.title(), "");

        let events = activity.update(Some(&sample_window(WindowType::Normal)), &registry());
        assert!(!activity.launch_pad());
        assert!(events.contains(&ActivityEvent::LaunchPadChanged));
    }

    #[test]
    fn test_no_active_window_clears() {
        let mut activity = activity();
        activity.update(Some(&sample_window(WindowType::Normal)), &registry());
        activity.update(None, &registry());
        assert_eq!(activity.title(), "");
        assert!(!activity.launch_pad());
    }
}
