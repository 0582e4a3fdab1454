//! Split definitions

use serde::{Deserialize, Serialize};

/// Visual style of a loading transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoadType {
    /// Plain fade to black between areas
    #[default]
    RegularFade,
    /// Fade used when entering towers and castles
    TowerCastle,
    /// Fade used when entering ghost houses
    GhostHouse,
    /// Level-opening banner screen
    BannerLoad,
}

impl LoadType {
    /// All variants, banner first
    pub const ALL: [LoadType; 4] = [
        LoadType::BannerLoad,
        LoadType::RegularFade,
        LoadType::TowerCastle,
        LoadType::GhostHouse,
    ];

    /// Name used in route documents and config sections
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadType::RegularFade => "regular_fade",
            LoadType::TowerCastle => "tower_castle",
            LoadType::GhostHouse => "ghost_house",
            LoadType::BannerLoad => "banner_load",
        }
    }

    /// Whether this is one of the fade variants
    pub fn is_fade(&self) -> bool {
        !matches!(self, LoadType::BannerLoad)
    }
}

impl std::fmt::Display for LoadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens on the timer when a split's load target is met
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SplitAction {
    /// Send a `split` command
    #[default]
    Split,
    /// Advance silently
    SkipSplit,
}

/// A named sub-step of a split (kept for route documents)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_activations")]
    pub activations: u32,
}

fn default_activations() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_split_name() -> String {
    "Unnamed Split".to_string()
}

/// A segment of the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    #[serde(default = "default_split_name")]
    pub name: String,
    /// Free-form category label
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub components: Vec<Component>,
    /// Whether completing this split may touch the timer at all
    #[serde(default = "default_true")]
    pub split: bool,
    /// Whether entering this split restarts the load counter
    #[serde(default = "default_true")]
    pub reset_load_count: bool,
    /// Load transitions that complete this split
    #[serde(default)]
    pub expected_loads: u32,
    #[serde(default)]
    pub load_type: LoadType,
    #[serde(default)]
    pub split_action: SplitAction,
    /// Loads counted during the current run
    #[serde(skip)]
    pub actual_loads: u32,
}

impl Split {
    /// Create a split with document defaults
    pub fn new(name: impl Into<String>, expected_loads: u32) -> Self {
        Self {
            name: name.into(),
            kind: String::new(),
            components: Vec::new(),
            split: true,
            reset_load_count: true,
            expected_loads,
            load_type: LoadType::default(),
            split_action: SplitAction::default(),
            actual_loads: 0,
        }
    }

    pub fn with_load_type(mut self, load_type: LoadType) -> Self {
        self.load_type = load_type;
        self
    }

    pub fn with_action(mut self, action: SplitAction) -> Self {
        self.split_action = action;
        self
    }

    pub fn with_reset_load_count(mut self, reset: bool) -> Self {
        self.reset_load_count = reset;
        self
    }

    /// Whether completing this split sends a `split` command
    pub fn sends_split(&self) -> bool {
        self.split && self.split_action == SplitAction::Split
    }
}
