use serde::{Deserialize, Serialize};

use crate::identity::window_identity;
use crate::tool_registry::ToolKind;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowPosition {
    pub x: f64,
    pub y: f64,
}

impl WindowPosition {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowSize {
    #[serde(rename = "w")]
    pub width: f64,
    #[serde(rename = "h")]
    pub height: f64,
}

impl WindowSize {
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowState {
    Floating,
    Docked,
}

impl WindowState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Floating => "floating",
            Self::Docked => "docked",
        }
    }
}

/// One live tool window as last reported by (or settled with) the native host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolWindowRecord {
    pub id: String,
    pub tool_kind: ToolKind,
    pub book_id: String,
    pub version_id: String,
    pub docked: bool,
    pub visible: bool,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_ref: Option<String>,
    #[serde(default)]
    pub last_position: WindowPosition,
    #[serde(default)]
    pub last_size: WindowSize,
    pub host_handle: String,
}

impl ToolWindowRecord {
    #[must_use]
    pub fn context(&self) -> ContextKey {
        ContextKey::new(self.book_id.clone(), self.version_id.clone())
    }

    #[must_use]
    pub fn state(&self) -> WindowState {
        if self.docked {
            WindowState::Docked
        } else {
            WindowState::Floating
        }
    }

    #[must_use]
    pub fn identity_matches(&self) -> bool {
        self.id == window_identity(&self.book_id, &self.version_id, self.tool_kind)
    }

    pub fn mark_docked(&mut self) {
        self.docked = true;
        self.visible = false;
    }

    pub fn mark_floating(&mut self) {
        self.docked = false;
        self.visible = true;
    }
}

/// An editing context: one version of one book.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextKey {
    pub book_id: String,
    pub version_id: String,
}

impl ContextKey {
    #[must_use]
    pub fn new(book_id: impl Into<String>, version_id: impl Into<String>) -> Self {
        Self {
            book_id: book_id.into(),
            version_id: version_id.into(),
        }
    }

    #[must_use]
    pub fn matches(&self, record: &ToolWindowRecord) -> bool {
        self.book_id == record.book_id && self.version_id == record.version_id
    }

    #[must_use]
    pub fn window_id(&self, kind: ToolKind) -> String {
        window_identity(&self.book_id, &self.version_id, kind)
    }
}

impl std::fmt::Display for ContextKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.book_id, self.version_id)
    }
}
