//! Application registry
//!
//! Indexes `.desktop` files so the bar can show an application's display
//! name and icon instead of the raw window title.

use freedesktop_desktop_entry::DesktopEntry;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// An application entry from .desktop files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppEntry {
    /// Desktop file id without the `.desktop` suffix, lower-cased
    pub id: String,
    pub name: String,
    pub icon: String,
    /// Basename of the executable in `Exec=`, lower-cased
    pub exec: String,
    /// `StartupWMClass=`, lower-cased
    pub wm_class: Option<String>,
}

/// Known applications
#[derive(Debug, Default)]
pub struct AppRegistry {
    entries: Vec<AppEntry>,
}

impl AppRegistry {
    /// Scan the XDG application directories
    pub fn scan() -> Self {
        Self::scan_dirs(&application_dirs())
    }

    pub fn scan_dirs(dirs: &[PathBuf]) -> Self {
        let locales = current_locales();
        let mut entries: Vec<AppEntry> = Vec::new();

        for dir in dirs {
            let Ok(read) = fs::read_dir(dir) else {
                continue;
            };

            for entry in read.flatten() {
                let path = entry.path();
                if path.extension().map(|e| e == "desktop").unwrap_or(false) {
                    if let Some(app) = load_desktop_file(&path, &locales) {
                        // Earlier directories take precedence
                        if !entries.iter().any(|e| e.id == app.id) {
                            entries.push(app);
                        }
                    }
                }
            }
        }

        info!("Indexed {} applications", entries.len());
        Self { entries }
    }

    pub fn from_entries(entries: Vec<AppEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Find the application owning a window, by process id and lower-cased window class
    pub fn match_item(&self, pid: Option<u32>, class: &str) -> Option<&AppEntry> {
        if !class.is_empty() {
            let by_class = self
                .entries
                .iter()
                .find(|e| e.wm_class.as_deref() == Some(class))
                .or_else(|| self.entries.iter().find(|e| e.id == class))
                .or_else(|| self.entries.iter().find(|e| e.exec == class));
            if by_class.is_some() {
                return by_class;
            }
        }

        let command = pid.and_then(process_command)?;
        debug!("Matching pid {:?} by command {:?}", pid, command);
        self.entries.iter().find(|e| e.exec == command)
    }
}

/// `$XDG_DATA_HOME/applications` then each `$XDG_DATA_DIRS/applications`
fn application_dirs() -> Vec<PathBuf> {
    match xdg::BaseDirectories::new() {
        Ok(base) => std::iter::once(base.get_data_home())
            .chain(base.get_data_dirs())
            .map(|dir| dir.join("applications"))
            .collect(),
        Err(e) => {
            warn!("Failed to resolve XDG data directories: {}", e);
            vec![PathBuf::from("/usr/share/applications")]
        }
    }
}

/// Locale names to look up `Name[..]` with, most specific first:
/// `zh_CN.UTF-8` gives `zh_CN`, `zh`
fn current_locales() -> Vec<String> {
    let Some(locale) = ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|v| !v.is_empty() && v.as_str() != "C" && v.as_str() != "POSIX")
    else {
        return Vec::new();
    };
    locales_for(&locale)
}

fn locales_for(locale: &str) -> Vec<String> {
    let full = locale.split(['.', '@']).next().unwrap_or_default();
    let mut locales = vec![full.to_string()];
    if let Some((language, _)) = full.split_once('_') {
        locales.push(language.to_string());
    }
    locales
}

fn load_desktop_file(path: &Path, locales: &[String]) -> Option<AppEntry> {
    let entry = match DesktopEntry::from_path(path.to_path_buf(), Some(locales)) {
        Ok(entry) => entry,
        Err(e) => {
            debug!("Skipping {:?}: {}", path, e);
            return None;
        }
    };
    if entry.no_display() || entry.desktop_entry("Hidden") == Some("true") {
        return None;
    }

    let id = path.file_stem()?.to_string_lossy().to_lowercase();
    Some(AppEntry {
        id,
        name: entry.name(locales)?.into_owned(),
        icon: entry.icon().unwrap_or_default().to_string(),
        exec: entry
            .exec()
            .and_then(|exec| exec.split_whitespace().next())
            .map(exec_basename)
            .unwrap_or_default(),
        wm_class: entry.startup_wm_class().map(|c| c.to_lowercase()),
    })
}

fn exec_basename(command: &str) -> String {
    let command = command.trim_matches('"');
    Path::new(command)
        .file_name()
        .map(|f| f.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Executable basename of a running process, from `/proc/<pid>/cmdline`
fn process_command(pid: u32) -> Option<String> {
    let cmdline = fs::read(format!("/proc/{}/cmdline", pid)).ok()?;
    let first = cmdline.split(|&b| b == 0).next()?;
    let command = exec_basename(&String::from_utf8_lossy(first));
    (!command.is_empty()).then_some(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILES: &str = "[Desktop Entry]
Type=Application
Name=Files
Name[de]=Dateien
Name[zh_CN]=文件管理器
Exec=/usr/bin/cutefish-filemanager %U
Icon=file-manager
StartupWMClass=Cutefish-FileManager

[Desktop Action new-window]
Name=New Window
Exec=cutefish-filemanager --new
";

    fn load(content: &str, locale: &str) -> Option<AppEntry> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cutefish-filemanager.desktop");
        fs::write(&path, content).unwrap();
        load_desktop_file(&path, &locales_for(locale))
    }

    #[test]
    fn test_load_desktop_file() {
        let entry = load(FILES, "C").unwrap();
        assert_eq!(entry.id, "cutefish-filemanager");
        assert_eq!(entry.name, "Files");
        assert_eq!(entry.icon, "file-manager");
        assert_eq!(entry.exec, "cutefish-filemanager");
        assert_eq!(entry.wm_class.as_deref(), Some("cutefish-filemanager"));
    }

    #[test]
    fn test_localized_name() {
        assert_eq!(load(FILES, "zh_CN.UTF-8").unwrap().name, "文件管理器");
        assert_eq!(load(FILES, "de_AT.UTF-8").unwrap().name, "Dateien");
        assert_eq!(load(FILES, "fr_FR.UTF-8").unwrap().name, "Files");
    }

    #[test]
    fn test_locales_for() {
        assert_eq!(locales_for("zh_CN.UTF-8"), vec!["zh_CN", "zh"]);
        assert_eq!(locales_for("de"), vec!["de"]);
        assert_eq!(locales_for("sr_RS@latin"), vec!["sr_RS", "sr"]);
    }

    #[test]
    fn test_hidden_entries_are_skipped() {
        assert!(load("[Desktop Entry]\nName=Helper\nExec=helper\nNoDisplay=true\n", "C").is_none());
        assert!(load("[Desktop Entry]\nName=Gone\nExec=gone\nHidden=true\n", "C").is_none());
    }

    #[test]
    fn test_exec_basename() {
        assert_eq!(exec_basename("/usr/bin/Foo"), "foo");
        assert_eq!(exec_basename("\"/opt/My App/run\""), "run");
        assert_eq!(exec_basename("env"), "env");
    }

    #[test]
    fn test_match_order() {
        let registry = AppRegistry::from_entries(vec![
            AppEntry {
                id: "org.example.terminal".into(),
                name: "Terminal".into(),
                icon: "utilities-terminal".into(),
                exec: "term".into(),
                wm_class: Some("xterm-like".into()),
            },
            AppEntry {
                id: "editor".into(),
                name: "Text Editor".into(),
                icon: "accessories-text-editor".into(),
                exec: "edit".into(),
                wm_class: None,
            },
        ]);

        assert_eq!(registry.match_item(None, "xterm-like").map(|e| e.name.as_str()), Some("Terminal"));
        assert_eq!(registry.match_item(None, "editor").map(|e| e.name.as_str()), Some("Text Editor"));
        assert_eq!(registry.match_item(None, "term").map(|e| e.name.as_str()), Some("Terminal"));
        assert!(registry.match_item(None, "unknown").is_none());
        assert!(registry.match_item(None, "").is_none());
    }

    #[test]
    fn test_scan_dirs_prefers_first_directory() {
        let user = tempfile::tempdir().unwrap();
        let system = tempfile::tempdir().unwrap();
        fs::write(
            user.path().join("editor.desktop"),
            "[Desktop Entry]\nName=My Editor\nExec=edit\nIcon=mine\n",
        )
        .unwrap();
        fs::write(
            system.path().join("editor.desktop"),
            "[Desktop Entry]\nName=Editor\nExec=edit\nIcon=stock\n",
        )
        .unwrap();
        fs::write(system.path().join("README"), "not a desktop file").unwrap();

        let registry =
            AppRegistry::scan_dirs(&[user.path().to_path_buf(), system.path().to_path_buf()]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.match_item(None, "editor").map(|e| e.icon.as_str()), Some("mine"));
    }
}
