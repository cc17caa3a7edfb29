use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolKind {
    NameGenerator,
    CharacterTracker,
    CharacterBuilder,
    PlotTimeline,
    ResearchNotes,
}

impl ToolKind {
    pub const ALL: [ToolKind; 5] = [
        ToolKind::NameGenerator,
        ToolKind::CharacterTracker,
        ToolKind::CharacterBuilder,
        ToolKind::PlotTimeline,
        ToolKind::ResearchNotes,
    ];

    /// Wire name shared with the native host. Also the last segment of a window id.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NameGenerator => "name-generator",
            Self::CharacterTracker => "character-tracker",
            Self::CharacterBuilder => "character-builder",
            Self::PlotTimeline => "plot-timeline",
            Self::ResearchNotes => "research-notes",
        }
    }

    #[must_use]
    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == slug)
    }

    #[must_use]
    pub fn spec(self) -> &'static ToolSpec {
        tool_spec(self)
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToolSpec {
    pub kind: ToolKind,
    pub title: &'static str,
    pub icon: &'static str,
    pub default_width: f64,
    pub default_height: f64,
    pub launcher_order: u8,
}

pub fn tool_specs() -> &'static [ToolSpec] {
    &TOOL_SPECS
}

pub fn tool_spec(kind: ToolKind) -> &'static ToolSpec {
    match kind {
        ToolKind::NameGenerator => &TOOL_SPECS[0],
        ToolKind::CharacterTracker => &TOOL_SPECS[1],
        ToolKind::CharacterBuilder => &TOOL_SPECS[2],
        ToolKind::PlotTimeline => &TOOL_SPECS[3],
        ToolKind::ResearchNotes => &TOOL_SPECS[4],
    }
}

const TOOL_SPECS: [ToolSpec; 5] = [
    ToolSpec {
        kind: ToolKind::NameGenerator,
        title: "Name Generator",
        icon: "sparkles",
        default_width: 420.0,
        default_height: 560.0,
        launcher_order: 0,
    },
    ToolSpec {
        kind: ToolKind::CharacterTracker,
        title: "Character Tracker",
        icon: "users",
        default_width: 480.0,
        default_height: 640.0,
        launcher_order: 1,
    },
    ToolSpec {
        kind: ToolKind::CharacterBuilder,
        title: "Character Builder",
        icon: "user-pen",
        default_width: 720.0,
        default_height: 640.0,
        launcher_order: 2,
    },
    ToolSpec {
        kind: ToolKind::PlotTimeline,
        title: "Plot Timeline",
        icon: "git-commit",
        default_width: 880.0,
        default_height: 420.0,
        launcher_order: 3,
    },
    ToolSpec {
        kind: ToolKind::ResearchNotes,
        title: "Research Notes",
        icon: "notebook",
        default_width: 520.0,
        default_height: 600.0,
        launcher_order: 4,
    },
];
