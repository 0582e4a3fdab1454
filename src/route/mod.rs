//! Route model
//!
//! A route is the ordered list of splits a run walks through. It is loaded
//! from a `.nsmbw` JSON document or converted from a LiveSplit `.lss`
//! segment file, and stays immutable for the duration of a run.

mod lss;
mod split;

pub use split::{Component, LoadType, Split, SplitAction};

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Result;

/// Route document version written by this crate
pub const ROUTE_VERSION: &str = "0.1.0";

/// How a run gets started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StartCondition {
    /// Only an explicit `start()` starts the run
    #[default]
    Manual,
    /// The first external advance starts the timer
    FirstSplit,
    /// The run starts when the timer reports a nonzero time
    #[serde(alias = "livesplit")]
    TimerSignal,
}

/// How the final split gets completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EndCondition {
    /// Final split ends on its load target or an external advance
    #[default]
    Manual,
    /// Final split also ends when the end-of-level switch is hit
    Switch,
}

fn default_version() -> String {
    ROUTE_VERSION.to_string()
}

fn default_route_name() -> String {
    "Unnamed Route".to_string()
}

/// An ordered list of splits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_route_name")]
    pub name: String,
    #[serde(rename = "start_detector", default)]
    pub start_condition: StartCondition,
    #[serde(rename = "ending_detector", default)]
    pub end_condition: EndCondition,
    #[serde(default)]
    pub splits: Vec<Split>,
}

impl Default for Route {
    fn default() -> Self {
        Self::new(default_route_name())
    }
}

impl Route {
    /// Create an empty route
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: default_version(),
            name: name.into(),
            start_condition: StartCondition::default(),
            end_condition: EndCondition::default(),
            splits: Vec::new(),
        }
    }

    pub fn with_start(mut self, condition: StartCondition) -> Self {
        self.start_condition = condition;
        self
    }

    pub fn with_end(mut self, condition: EndCondition) -> Self {
        self.end_condition = condition;
        self
    }

    pub fn with_split(mut self, split: Split) -> Self {
        self.splits.push(split);
        self
    }

    /// Parse a `.nsmbw` JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to a pretty-printed JSON document
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Convert a LiveSplit segment file
    pub fn from_lss(name: impl Into<String>, xml: &str) -> Result<Self> {
        let mut route = Route::new(name);
        route.splits = lss::segment_names(xml)?
            .into_iter()
            .map(|name| Split::new(name, 0))
            .collect();
        Ok(route)
    }

    /// Load a route file, converting `.lss` files on the fly
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_lss = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("lss"))
            .unwrap_or(false);

        let route = if is_lss {
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(default_route_name);
            Self::from_lss(name, &content)?
        } else {
            Self::from_json(&content)?
        };

        log::info!(
            "Loaded route '{}' ({} splits, {} expected loads) from {}",
            route.name,
            route.len(),
            route.total_expected_loads(),
            path.display()
        );
        Ok(route)
    }

    /// Write the route as JSON, replacing the file atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp);

        if let Err(e) = std::fs::write(&tmp, json).and_then(|_| std::fs::rename(&tmp, path)) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    /// Look up a split by index
    pub fn split(&self, index: usize) -> Option<&Split> {
        self.splits.get(index)
    }

    pub fn len(&self) -> usize {
        self.splits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.splits.is_empty()
    }

    /// Sum of expected loads across all splits
    pub fn total_expected_loads(&self) -> u32 {
        self.splits
            .iter()
            .fold(0u32, |total, s| total.saturating_add(s.expected_loads))
    }

    /// Clear per-run counters on every split
    pub fn reset_counters(&mut self) {
        for split in &mut self.splits {
            split.actual_loads = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_document() {
        let route = Route::from_json(r#"{"splits": [{"name": "1-1"}]}"#).unwrap();
        assert_eq!(route.name, "Unnamed Route");
        assert_eq!(route.version, ROUTE_VERSION);
        assert_eq!(route.start_condition, StartCondition::Manual);
        assert_eq!(route.end_condition, EndCondition::Manual);
        assert_eq!(route.len(), 1);
    }

    #[test]
    fn test_livesplit_start_alias() {
        let route = Route::from_json(r#"{"start_detector": "livesplit"}"#).unwrap();
        assert_eq!(route.start_condition, StartCondition::TimerSignal);
        assert!(route.is_empty());
    }

    #[test]
    fn test_total_expected_loads() {
        let route = Route::new("any%")
            .with_split(Split::new("a", 2))
            .with_split(Split::new("b", 1))
            .with_split(Split::new("c", 3));
        assert_eq!(route.total_expected_loads(), 6);
        assert!(route.split(3).is_none());
    }

    #[test]
    fn test_total_expected_loads_saturates() {
        let route = Route::from_json(
            r#"{"splits": [{"name": "a", "expected_loads": 4294967295}, {"name": "b", "expected_loads": 2}]}"#,
        )
        .unwrap();
        assert_eq!(route.total_expected_loads(), u32::MAX);
    }

    #[test]
    fn test_malformed_document_is_error() {
        assert!(Route::from_json("{not json").is_err());
        assert!(Route::from_json(r#"{"splits": [{"expected_loads": -1}]}"#).is_err());
    }
}
