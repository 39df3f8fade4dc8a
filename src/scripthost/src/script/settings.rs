//! Per-script INI settings
//!
//! Format:
//!
//! ```text
//! ; comment
//! // comment
//! [Section]
//! Key = Value
//! Quoted = "value with // slashes"
//! Key = second value   // stored as Key//1
//! ```
//!
//! Section and key lookups are case-insensitive. A repeated key within a
//! section is stored under `key//1`, `key//2`, ... so every value can be
//! retrieved with [`ScriptSettings::get_all`].

use crate::{Error, Result};

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Entry {
    /// Key as written, for saving
    key: String,
    value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Section {
    name: String,
    /// Lowercased key (with duplicate suffix) to entry, in insertion order
    entries: Vec<(String, Entry)>,
}

impl Section {
    fn find(&self, key: &str) -> Option<&Entry> {
        let key = key.to_ascii_lowercase();
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, e)| e)
    }

    fn find_mut(&mut self, key: &str) -> Option<&mut Entry> {
        let key = key.to_ascii_lowercase();
        self.entries
            .iter_mut()
            .find(|(k, _)| *k == key)
            .map(|(_, e)| e)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptSettings {
    path: Option<PathBuf>,
    sections: BTreeMap<String, Section>,
}

fn is_comment(line: &str) -> bool {
    line.starts_with(';') || line.starts_with("//")
}

/// Strip a trailing `//` comment that is not inside quotes
fn strip_inline_comment(value: &str) -> &str {
    let mut quoted = false;
    let bytes = value.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'"' => quoted = !quoted,
            b'/' if !quoted && bytes.get(i + 1) == Some(&b'/') => return &value[..i],
            _ => {}
        }
    }
    value
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

impl ScriptSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Self {
        let mut settings = Self::new();
        let mut current = String::new();

        for raw in text.lines() {
            let line = raw.trim();
            if line.is_empty() || is_comment(line) {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                current = name.trim().to_string();
                settings.section_mut(&current);
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                tracing::debug!(line = %line, "ignoring settings line without '='");
                continue;
            };
            let key = key.trim();
            let value = unquote(strip_inline_comment(value).trim());

            let section = settings.section_mut(&current);
            let base = key.to_ascii_lowercase();
            let mut stored = base.clone();
            let mut n = 0;
            while section.entries.iter().any(|(k, _)| *k == stored) {
                n += 1;
                stored = format!("{}//{}", base, n);
            }
            let written = if n == 0 {
                key.to_string()
            } else {
                format!("{}//{}", key, n)
            };
            section.entries.push((
                stored,
                Entry {
                    key: written,
                    value: value.to_string(),
                },
            ));
        }

        settings
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut settings = Self::parse(&text);
        settings.path = Some(path.to_path_buf());
        Ok(settings)
    }

    /// Load `path`, or start empty if the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self {
                path: Some(path.to_path_buf()),
                ..Self::default()
            })
        }
    }

    /// File this was loaded from
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn section_mut(&mut self, name: &str) -> &mut Section {
        self.sections
            .entry(name.to_ascii_lowercase())
            .or_insert_with(|| Section {
                name: name.to_string(),
                entries: Vec::new(),
            })
    }

    fn raw(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(&section.to_ascii_lowercase())?
            .find(key)
            .map(|e| e.value.as_str())
    }

    /// Parse the value at `section`/`key`; `Ok(None)` if absent
    pub fn get<T: FromStr>(&self, section: &str, key: &str) -> Result<Option<T>> {
        match self.raw(section, key) {
            None => Ok(None),
            Some(value) => value.parse().map(Some).map_err(|_| {
                Error::Settings(format!(
                    "[{}] {} = {:?} is not a valid {}",
                    section,
                    key,
                    value,
                    std::any::type_name::<T>()
                ))
            }),
        }
    }

    /// Value at `section`/`key`, or `default` when absent or unparsable
    pub fn get_or<T: FromStr>(&self, section: &str, key: &str, default: T) -> T {
        self.get(section, key).ok().flatten().unwrap_or(default)
    }

    /// Every value stored for `key`, first occurrence first
    pub fn get_all<T: FromStr>(&self, section: &str, key: &str) -> Vec<T> {
        let mut values = Vec::new();
        let mut n = 0;
        let mut name = key.to_string();
        while let Some(raw) = self.raw(section, &name) {
            if let Ok(value) = raw.parse() {
                values.push(value);
            }
            n += 1;
            name = format!("{}//{}", key, n);
        }
        values
    }

    pub fn set(&mut self, section: &str, key: &str, value: impl ToString) {
        let value = value.to_string();
        let section = self.section_mut(section);
        match section.find_mut(key) {
            Some(entry) => entry.value = value,
            None => section.entries.push((
                key.to_ascii_lowercase(),
                Entry {
                    key: key.to_string(),
                    value,
                },
            )),
        }
    }

    /// Remove one key; returns whether it existed
    pub fn remove(&mut self, section: &str, key: &str) -> bool {
        let Some(section) = self.sections.get_mut(&section.to_ascii_lowercase()) else {
            return false;
        };
        let key = key.to_ascii_lowercase();
        let before = section.entries.len();
        section.entries.retain(|(k, _)| *k != key);
        section.entries.len() != before
    }

    /// Section names as written
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.sections.values().map(|s| s.name.as_str())
    }

    /// Key/value pairs of one section as written
    pub fn entries(&self, section: &str) -> impl Iterator<Item = (&str, &str)> {
        self.sections
            .get(&section.to_ascii_lowercase())
            .into_iter()
            .flat_map(|s| s.entries.iter())
            .map(|(_, e)| (e.key.as_str(), e.value.as_str()))
    }

    pub fn to_ini(&self) -> String {
        let mut out = String::new();
        for section in self.sections.values() {
            if section.entries.is_empty() && section.name.is_empty() {
                continue;
            }
            if !section.name.is_empty() {
                let _ = writeln!(out, "[{}]", section.name);
            }
            for (_, entry) in &section.entries {
                let needs_quotes = entry.value.contains("//") || entry.value != entry.value.trim();
                if needs_quotes {
                    let _ = writeln!(out, "{} = \"{}\"", entry.key, entry.value);
                } else {
                    let _ = writeln!(out, "{} = {}", entry.key, entry.value);
                }
            }
            out.push('\n');
        }
        out
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_ini())?;
        Ok(())
    }

    /// Save back to the file this was loaded from
    pub fn save_in_place(&self) -> Result<()> {
        let path = self
            .path
            .as_deref()
            .ok_or_else(|| Error::Settings("Settings have no backing file".to_string()))?;
        self.save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
; top comment
// another comment
[General]
Enabled = true
Interval=250
Name = "Vehicle Spawner"
Url = "http://example.com" // trailing comment
Speed = 12.5 // km/h

[Hotkeys]
Toggle = F5
Toggle = F6
toggle = F7
broken line
"#;

    #[test]
    fn test_parse_values_and_comments() {
        let ini = ScriptSettings::parse(SAMPLE);
        assert_eq!(ini.get::<bool>("General", "Enabled").unwrap(), Some(true));
        assert_eq!(ini.get::<u32>("general", "INTERVAL").unwrap(), Some(250));
        assert_eq!(
            ini.get::<String>("General", "Name").unwrap().as_deref(),
            Some("Vehicle Spawner")
        );
        assert_eq!(
            ini.get::<String>("General", "Url").unwrap().as_deref(),
            Some("http://example.com")
        );
        assert_eq!(ini.get::<f32>("General", "Speed").unwrap(), Some(12.5));
        assert_eq!(ini.get::<u32>("General", "Missing").unwrap(), None);
        assert!(ini.get::<u32>("General", "Name").is_err());
        assert_eq!(ini.get_or("General", "Name", 3u32), 3);
    }

    #[test]
    fn test_duplicate_keys_are_suffixed() {
        let ini = ScriptSettings::parse(SAMPLE);
        assert_eq!(
            ini.get_all::<String>("Hotkeys", "Toggle"),
            vec!["F5", "F6", "F7"]
        );
        assert_eq!(
            ini.get::<String>("Hotkeys", "Toggle//2").unwrap().as_deref(),
            Some("F7")
        );
        let keys: Vec<_> = ini.entries("Hotkeys").map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["Toggle", "Toggle//1", "toggle//2"]);
    }

    #[test]
    fn test_set_remove_and_sections() {
        let mut ini = ScriptSettings::parse(SAMPLE);
        ini.set("General", "interval", 500);
        ini.set("New", "Key", "value");
        assert_eq!(ini.get_or("General", "Interval", 0u32), 500);
        assert!(ini.remove("General", "Enabled"));
        assert!(!ini.remove("General", "Enabled"));
        assert!(!ini.remove("Nope", "Enabled"));

        let mut names: Vec<_> = ini.sections().collect();
        names.sort();
        assert_eq!(names, vec!["General", "Hotkeys", "New"]);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("Script.ini");

        let mut ini = ScriptSettings::load_or_default(&path).unwrap();
        assert_eq!(ini.path(), Some(path.as_path()));
        ini.set("Main", "Url", "a//b");
        ini.set("Main", "Count", 3);
        ini.save_in_place().unwrap();

        let reloaded = ScriptSettings::load(&path).unwrap();
        assert_eq!(reloaded.get_or("Main", "Url", String::new()), "a//b");
        assert_eq!(reloaded.get_or("Main", "Count", 0), 3);
    }

    #[test]
    fn test_keys_before_first_section() {
        let ini = ScriptSettings::parse("Loose = 1\n[A]\nB = 2\n");
        assert_eq!(ini.get_or("", "Loose", 0), 1);
        assert_eq!(ini.get_or("A", "B", 0), 2);
    }
}
