//! Persisted mapping store.
//!
//! [`MappingStore`] is an ordered section → (key → value, optional comment)
//! mapping with a plain-text representation. It is the only durable state the
//! engine owns: `VERSION` carries the schema version, `SCROLLS` the
//! source→derived identifier mapping, `FUSION` the fusion records, and
//! `SETTINGS` the feature toggles.
//!
//! Round-trip guarantee: rendering a store parsed from its own output is
//! byte-identical for unchanged logical entries. Comment lines ride with the
//! entry they precede, so persisted display-name comments survive rewrites of
//! unrelated entries.

use std::path::{Path, PathBuf};

use crate::error::{ForgeResult, StoreError};

/// Well-known section names.
pub const SECTION_VERSION: &str = "VERSION";
pub const SECTION_SCROLLS: &str = "SCROLLS";
pub const SECTION_FUSION: &str = "FUSION";
pub const SECTION_SETTINGS: &str = "SETTINGS";

#[derive(Debug, Clone)]
struct Entry {
    key: String,
    value: String,
    /// Full comment line (including the leading `#`) rendered above the entry.
    comment: Option<String>,
}

#[derive(Debug, Clone)]
struct Section {
    name: String,
    entries: Vec<Entry>,
}

/// Ordered, comment-preserving key-value store backing the persisted mapping.
#[derive(Debug, Clone, Default)]
pub struct MappingStore {
    sections: Vec<Section>,
    path: Option<PathBuf>,
}

impl MappingStore {
    /// Create an empty in-memory store with no backing file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from `path`. A missing file yields an empty store bound
    /// to that path, matching first-run behavior.
    pub fn load(path: impl AsRef<Path>) -> ForgeResult<Self> {
        let path = path.as_ref();
        let mut store = if path.exists() {
            let text = std::fs::read_to_string(path)
                .map_err(|source| StoreError::Io { source })?;
            Self::parse(&text)?
        } else {
            Self::new()
        };
        store.path = Some(path.to_path_buf());
        Ok(store)
    }

    /// Parse a store from its text representation.
    pub fn parse(text: &str) -> ForgeResult<Self> {
        let mut store = Self::new();
        let mut current: Option<usize> = None;
        let mut pending_comment: Option<String> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim_end();
            if line.trim().is_empty() {
                continue;
            }
            if line.starts_with('#') || line.starts_with(';') {
                pending_comment = Some(line.to_string());
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                current = Some(store.section_index_or_create(name));
                pending_comment = None;
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(StoreError::Parse {
                    line: idx + 1,
                    content: line.to_string(),
                }
                .into());
            };
            let Some(section) = current else {
                return Err(StoreError::Parse {
                    line: idx + 1,
                    content: line.to_string(),
                }
                .into());
            };
            store.sections[section].entries.push(Entry {
                key: key.trim().to_string(),
                value: value.trim().to_string(),
                comment: pending_comment.take(),
            });
        }
        Ok(store)
    }

    /// Render the store to its canonical text representation.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            out.push('[');
            out.push_str(&section.name);
            out.push_str("]\n");
            for entry in &section.entries {
                if let Some(comment) = &entry.comment {
                    out.push_str(comment);
                    out.push('\n');
                }
                out.push_str(&entry.key);
                out.push_str(" = ");
                out.push_str(&entry.value);
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }

    /// Flush the store to its backing file.
    pub fn save(&self) -> ForgeResult<()> {
        if let Some(path) = &self.path {
            std::fs::write(path, self.render())
                .map_err(|source| StoreError::Io { source })?;
        }
        Ok(())
    }

    fn section_index(&self, name: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.name == name)
    }

    fn section_index_or_create(&mut self, name: &str) -> usize {
        match self.section_index(name) {
            Some(idx) => idx,
            None => {
                self.sections.push(Section {
                    name: name.to_string(),
                    entries: Vec::new(),
                });
                self.sections.len() - 1
            }
        }
    }

    /// Whether `key` exists under `section`.
    pub fn has(&self, section: &str, key: &str) -> bool {
        self.get(section, key).is_some()
    }

    /// Whether `section` exists at all.
    pub fn has_section(&self, section: &str) -> bool {
        self.section_index(section).is_some()
    }

    /// Fetch a value.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        let idx = self.section_index(section)?;
        self.sections[idx]
            .entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    /// Fetch a value as an integer; absent or unparseable yields 0.
    pub fn get_long(&self, section: &str, key: &str) -> i64 {
        self.get(section, key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// Fetch a value as a boolean; absent or unparseable yields `false`.
    pub fn get_bool(&self, section: &str, key: &str) -> bool {
        matches!(self.get(section, key), Some("true") | Some("1"))
    }

    /// Set a value, updating in place if the key exists (its comment is kept
    /// unless a new one is supplied) or appending otherwise.
    pub fn set(&mut self, section: &str, key: &str, value: &str, comment: Option<&str>) {
        let idx = self.section_index_or_create(section);
        let entries = &mut self.sections[idx].entries;
        if let Some(entry) = entries.iter_mut().find(|e| e.key == key) {
            entry.value = value.to_string();
            if comment.is_some() {
                entry.comment = comment.map(str::to_string);
            }
        } else {
            entries.push(Entry {
                key: key.to_string(),
                value: value.to_string(),
                comment: comment.map(str::to_string),
            });
        }
    }

    /// Set an integer value.
    pub fn set_long(&mut self, section: &str, key: &str, value: i64, comment: Option<&str>) {
        self.set(section, key, &value.to_string(), comment);
    }

    /// Set a boolean value.
    pub fn set_bool(&mut self, section: &str, key: &str, value: bool, comment: Option<&str>) {
        self.set(section, key, if value { "true" } else { "false" }, comment);
    }

    /// Remove a key (and its comment) from a section.
    pub fn delete(&mut self, section: &str, key: &str) {
        if let Some(idx) = self.section_index(section) {
            self.sections[idx].entries.retain(|e| e.key != key);
        }
    }

    /// Remove an entire section.
    pub fn delete_section(&mut self, section: &str) {
        self.sections.retain(|s| s.name != section);
    }

    /// All `(key, value)` pairs of a section, in persisted order.
    pub fn all_pairs(&self, section: &str) -> Vec<(String, String)> {
        match self.section_index(section) {
            Some(idx) => self.sections[idx]
                .entries
                .iter()
                .map(|e| (e.key.clone(), e.value.clone()))
                .collect(),
            None => Vec::new(),
        }
    }
}
