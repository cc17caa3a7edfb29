use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::ToolWindowError;
use crate::record::{WindowPosition, WindowSize};
use crate::tool_registry::ToolKind;

const HINT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryHint {
    pub tool_kind: ToolKind,
    pub position: WindowPosition,
    pub size: WindowSize,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct GeometryHintDocument {
    version: u32,
    entries: Vec<GeometryHint>,
}

/// Last known geometry per tool, the only window state kept across restarts.
#[derive(Debug, Clone)]
pub struct GeometryHintStore {
    path: PathBuf,
    entries: HashMap<ToolKind, GeometryHint>,
}

impl GeometryHintStore {
    pub fn load(path: PathBuf) -> Self {
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) => {
                return Self {
                    path,
                    entries: HashMap::new(),
                };
            }
        };
        let mut entries = HashMap::new();
        match serde_json::from_str::<GeometryHintDocument>(raw.as_str()) {
            Ok(document) if document.version == HINT_SCHEMA_VERSION => {
                for entry in document.entries {
                    entries.insert(entry.tool_kind, entry);
                }
            }
            Ok(document) => {
                tracing::warn!(
                    path = %path.display(),
                    version = document.version,
                    "ignoring geometry hints with unsupported version"
                );
            }
            Err(error) => {
                tracing::warn!(path = %path.display(), reason = %error, "ignoring corrupt geometry hints");
            }
        }
        Self { path, entries }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn hint(&self, kind: ToolKind) -> Option<(WindowPosition, WindowSize)> {
        self.entries
            .get(&kind)
            .map(|entry| (entry.position, entry.size))
    }

    pub fn remember(
        &mut self,
        kind: ToolKind,
        position: WindowPosition,
        size: WindowSize,
    ) -> Result<(), ToolWindowError> {
        if self.hint(kind) == Some((position, size)) {
            return Ok(());
        }
        self.entries.insert(
            kind,
            GeometryHint {
                tool_kind: kind,
                position,
                size,
                updated_at: Utc::now().to_rfc3339(),
            },
        );
        self.flush()
    }

    fn flush(&self) -> Result<(), ToolWindowError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|error| ToolWindowError::HintStore(format!("mkdir failed: {error}")))?;
        }
        let mut entries = self.entries.values().cloned().collect::<Vec<_>>();
        entries.sort_by_key(|entry| entry.tool_kind.spec().launcher_order);
        let encoded = serde_json::to_string_pretty(&GeometryHintDocument {
            version: HINT_SCHEMA_VERSION,
            entries,
        })
        .map_err(|error| ToolWindowError::HintStore(format!("encode failed: {error}")))?;
        fs::write(&self.path, encoded)
            .map_err(|error| ToolWindowError::HintStore(format!("write failed: {error}")))
    }
}
