//! TOML file backed configuration store
//!
//! Layout: one table per root, one sub-table per sub path, one key per name:
//!
//! ```toml
//! [modhost."modules/heartbeat"]
//! configuration = { interval_ms = 5000 }
//!
//! [modhost."modules/heartbeat/parameters"]
//! last_beat = 42
//! ```
//!
//! The whole document is kept in memory and rewritten on every `set`.

use crate::config::error::{ConfigError, ConfigResult};
use crate::config::store::{ConfigStore, ConfigValue};
use crate::core::sync::{read_lock, write_lock};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

#[derive(Debug)]
pub struct TomlConfigStore {
    path: PathBuf,
    document: RwLock<toml::Table>,
}

fn poisoned(message: String) -> ConfigError {
    ConfigError::Poisoned { message }
}

impl TomlConfigStore {
    /// Open the store at `path`. A missing file is an empty store; it is
    /// created on the first write.
    pub fn open(path: impl Into<PathBuf>) -> ConfigResult<Self> {
        let path = path.into();
        let document = match std::fs::read_to_string(&path) {
            Ok(contents) => toml::from_str::<toml::Table>(&contents).map_err(|source| {
                ConfigError::Parse {
                    path: path.display().to_string(),
                    source,
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => toml::Table::new(),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        log::debug!(
            "Opened configuration store '{}' ({} roots)",
            path.display(),
            document.len()
        );

        Ok(Self {
            path,
            document: RwLock::new(document),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, document: &toml::Table) -> ConfigResult<()> {
        let io_error = |source| ConfigError::Io {
            path: self.path.display().to_string(),
            source,
        };

        let rendered =
            toml::to_string_pretty(document).map_err(|e| ConfigError::Unrepresentable {
                key: self.path.display().to_string(),
                reason: e.to_string(),
            })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }

        // Write then rename so a crash never leaves a truncated file behind.
        let staging = self.path.with_extension("toml.tmp");
        std::fs::write(&staging, rendered).map_err(io_error)?;
        std::fs::rename(&staging, &self.path).map_err(io_error)?;
        Ok(())
    }
}

fn display_key(root: &str, sub: &str, name: &str) -> String {
    format!("{root}.{sub}.{name}")
}

impl ConfigStore for TomlConfigStore {
    fn get(&self, root: &str, sub: &str, name: &str) -> ConfigResult<Option<ConfigValue>> {
        let document = read_lock(&self.document, "toml config store", poisoned)?;

        let value = document
            .get(root)
            .and_then(|r| r.as_table())
            .and_then(|r| r.get(sub))
            .and_then(|s| s.as_table())
            .and_then(|s| s.get(name));

        value
            .map(|v| {
                serde_json::to_value(v).map_err(|source| ConfigError::Convert {
                    key: display_key(root, sub, name),
                    source,
                })
            })
            .transpose()
    }

    fn set(
        &self,
        root: &str,
        sub: &str,
        name: &str,
        value: Option<ConfigValue>,
    ) -> ConfigResult<()> {
        let converted = value
            .map(|v| {
                toml::Value::try_from(&v).map_err(|e| ConfigError::Unrepresentable {
                    key: display_key(root, sub, name),
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let mut document = write_lock(&self.document, "toml config store", poisoned)?;
        // Edit a copy; the in-memory document only changes once the file does.
        let mut next = document.clone();

        match converted {
            Some(value) => {
                let root_table = next
                    .entry(root.to_string())
                    .or_insert_with(|| toml::Value::Table(toml::Table::new()));
                let root_table = as_table_mut(root_table, root)?;
                let sub_table = root_table
                    .entry(sub.to_string())
                    .or_insert_with(|| toml::Value::Table(toml::Table::new()));
                as_table_mut(sub_table, sub)?.insert(name.to_string(), value);
            }
            None => {
                let Some(root_table) = next.get_mut(root).and_then(|v| v.as_table_mut()) else {
                    return Ok(());
                };
                let removed = root_table
                    .get_mut(sub)
                    .and_then(|v| v.as_table_mut())
                    .and_then(|s| s.remove(name))
                    .is_some();
                if !removed {
                    return Ok(());
                }
                // Prune tables left empty by the delete.
                if root_table
                    .get(sub)
                    .and_then(|v| v.as_table())
                    .is_some_and(|s| s.is_empty())
                {
                    root_table.remove(sub);
                }
                if root_table.is_empty() {
                    next.remove(root);
                }
            }
        }

        self.persist(&next)?;
        *document = next;
        Ok(())
    }
}

fn as_table_mut<'a>(value: &'a mut toml::Value, key: &str) -> ConfigResult<&'a mut toml::Table> {
    value
        .as_table_mut()
        .ok_or_else(|| ConfigError::Unrepresentable {
            key: key.to_string(),
            reason: "an existing non-table value occupies this path".to_string(),
        })
}
