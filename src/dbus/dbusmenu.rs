//! DBusMenu client (`com.canonical.dbusmenu`)
//!
//! Proxy for menus exported by applications, and conversion of the layout
//! tree into flat entry lists.

use serde::Deserialize;
use std::collections::HashMap;
use zbus::proxy;
use zbus::zvariant::{OwnedValue, Type, Value};

/// Proxy for an application's exported menu
#[proxy(interface = "com.canonical.dbusmenu", gen_blocking = false)]
pub trait DBusMenu {
    /// Layout of `parent_id` down to `recursion_depth` levels (-1 = all)
    fn get_layout(
        &self,
        parent_id: i32,
        recursion_depth: i32,
        property_names: &[&str],
    ) -> zbus::Result<(u32, MenuLayout)>;

    /// Deliver an event ("clicked", "opened", ...) to an item
    fn event(&self, id: i32, event_id: &str, data: &Value<'_>, timestamp: u32) -> zbus::Result<()>;

    /// Tell the application a submenu is about to be shown; returns whether
    /// the layout needs refreshing
    fn about_to_show(&self, id: i32) -> zbus::Result<bool>;

    #[zbus(signal)]
    fn layout_updated(&self, revision: u32, parent: i32) -> zbus::Result<()>;

    #[zbus(signal)]
    fn items_properties_updated(
        &self,
        updated_props: Vec<(i32, HashMap<String, OwnedValue>)>,
        removed_props: Vec<(i32, Vec<String>)>,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    fn item_activation_requested(&self, id: i32, timestamp: u32) -> zbus::Result<()>;
}

/// `(ia{sv}av)` layout node
#[derive(Debug, Deserialize, Type)]
pub struct MenuLayout {
    pub id: i32,
    pub properties: HashMap<String, OwnedValue>,
    pub children: Vec<OwnedValue>,
}

/// One item of a menu level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub id: i32,
    pub label: String,
    pub enabled: bool,
    pub visible: bool,
    pub separator: bool,
    pub submenu: bool,
}

impl MenuEntry {
    pub fn new(id: i32) -> Self {
        Self {
            id,
            label: String::new(),
            enabled: true,
            visible: true,
            separator: false,
            submenu: false,
        }
    }

    pub fn from_properties(id: i32, properties: &HashMap<String, OwnedValue>) -> Self {
        let mut entry = Self::new(id);
        entry.apply(&PropertyPatch::from_properties(id, properties));
        entry
    }

    /// Overwrite the fields the patch carries
    pub fn apply(&mut self, patch: &PropertyPatch) {
        if let Some(label) = &patch.label {
            self.label = label.clone();
        }
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(visible) = patch.visible {
            self.visible = visible;
        }
        if let Some(separator) = patch.separator {
            self.separator = separator;
        }
        if let Some(submenu) = patch.submenu {
            self.submenu = submenu;
        }
    }

    /// Shown in the bar / popup at all
    pub fn is_shown(&self) -> bool {
        self.visible && !self.separator
    }
}

/// Decoded subset of an item's properties; `None` leaves a field alone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyPatch {
    pub id: i32,
    pub label: Option<String>,
    pub enabled: Option<bool>,
    pub visible: Option<bool>,
    pub separator: Option<bool>,
    pub submenu: Option<bool>,
}

impl PropertyPatch {
    pub fn from_properties(id: i32, properties: &HashMap<String, OwnedValue>) -> Self {
        let mut patch = Self {
            id,
            ..Self::default()
        };
        for (key, value) in properties {
            match key.as_str() {
                "label" => patch.label = <&str>::try_from(value).ok().map(strip_mnemonic),
                "enabled" => patch.enabled = bool::try_from(value).ok(),
                "visible" => patch.visible = bool::try_from(value).ok(),
                "type" => {
                    patch.separator = <&str>::try_from(value).ok().map(|t| t == "separator")
                }
                "children-display" => {
                    patch.submenu = <&str>::try_from(value).ok().map(|d| d == "submenu")
                }
                _ => {}
            }
        }
        patch
    }

    /// Removed properties fall back to their protocol defaults
    pub fn removed(id: i32, names: &[String]) -> Self {
        let mut patch = Self {
            id,
            ..Self::default()
        };
        for name in names {
            match name.as_str() {
                "label" => patch.label = Some(String::new()),
                "enabled" => patch.enabled = Some(true),
                "visible" => patch.visible = Some(true),
                "type" => patch.separator = Some(false),
                "children-display" => patch.submenu = Some(false),
                _ => {}
            }
        }
        patch
    }
}

/// Direct children of a layout node, in order
pub fn child_entries(layout: &MenuLayout) -> Vec<MenuEntry> {
    layout
        .children
        .iter()
        .filter_map(|child| parse_child(child))
        .map(|(id, properties)| MenuEntry::from_properties(id, &properties))
        .collect()
}

fn parse_child(value: &Value<'_>) -> Option<(i32, HashMap<String, OwnedValue>)> {
    match value {
        Value::Value(inner) => parse_child(inner),
        Value::Structure(structure) => {
            let fields = structure.fields();
            let id = match fields.first()? {
                Value::I32(id) => *id,
                _ => return None,
            };
            let properties = match fields.get(1) {
                Some(dict @ Value::Dict(_)) => {
                    HashMap::<String, OwnedValue>::try_from(dict.try_clone().ok()?).ok()?
                }
                _ => HashMap::new(),
            };
            Some((id, properties))
        }
        _ => None,
    }
}

/// `_File` -> `File`, `__` -> `_`
pub fn strip_mnemonic(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut chars = label.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '_' {
            if chars.peek() == Some(&'_') {
                chars.next();
                out.push('_');
            }
            continue;
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use zbus::zvariant::Structure;

    fn owned<T>(value: T) -> OwnedValue
    where
        Value<'static>: From<T>,
    {
        OwnedValue::try_from(Value::from(value)).unwrap()
    }

    fn props(pairs: &[(&str, OwnedValue)]) -> HashMap<String, OwnedValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.try_clone().unwrap()))
            .collect()
    }

    fn child(id: i32, properties: HashMap<String, OwnedValue>) -> OwnedValue {
        let children: Vec<OwnedValue> = Vec::new();
        owned(Structure::from((id, properties, children)))
    }

    #[test]
    fn test_strip_mnemonic() {
        assert_eq!(strip_mnemonic("_File"), "File");
        assert_eq!(strip_mnemonic("Save _As..."), "Save As...");
        assert_eq!(strip_mnemonic("snake__case"), "snake_case");
        assert_eq!(strip_mnemonic("Plain"), "Plain");
    }

    #[test]
    fn test_entry_defaults_and_properties() {
        let entry = MenuEntry::from_properties(
            4,
            &props(&[
                ("label", owned("_Edit")),
                ("enabled", owned(false)),
                ("children-display", owned("submenu")),
            ]),
        );

        assert_eq!(entry.id, 4);
        assert_eq!(entry.label, "Edit");
        assert!(!entry.enabled);
        assert!(entry.visible);
        assert!(entry.submenu);
        assert!(entry.is_shown());
    }

    #[test]
    fn test_separator_and_hidden_are_not_shown() {
        let separator = MenuEntry::from_properties(1, &props(&[("type", owned("separator"))]));
        assert!(!separator.is_shown());

        let hidden = MenuEntry::from_properties(2, &props(&[("visible", owned(false))]));
        assert!(!hidden.is_shown());
    }

    #[test]
    fn test_patches() {
        let mut entry = MenuEntry::from_properties(
            1,
            &props(&[("label", owned("View")), ("enabled", owned(false))]),
        );

        entry.apply(&PropertyPatch::from_properties(1, &props(&[("label", owned("_Go"))])));
        assert_eq!(entry.label, "Go");
        assert!(!entry.enabled);

        entry.apply(&PropertyPatch::removed(1, &["enabled".to_string()]));
        assert!(entry.enabled);
        assert_eq!(entry.label, "Go");
    }

    #[test]
    fn test_child_entries_from_layout() {
        let layout = MenuLayout {
            id: 0,
            properties: HashMap::new(),
            children: vec![
                child(1, props(&[("label", owned("_File")), ("children-display", owned("submenu"))])),
                child(2, props(&[("label", owned("_Edit"))])),
                owned("not a node"),
            ],
        };

        let entries = child_entries(&layout);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].label, "File");
        assert!(entries[0].submenu);
        assert_eq!(entries[1].id, 2);
        assert_eq!(entries[1].label, "Edit");
    }
}
