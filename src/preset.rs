//! Named search policies.
//!
//! A preset maps a caller [`Preference`] to a [`Plan`]: which adapters to
//! query, with what weights, how many records to return and whether to
//! apply recency filters.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::{Adapter, Engine};
use crate::engines::{Bing, DuckDuckGo, So360, Sogou};
use crate::fetcher::PageFetcher;
use crate::query::{PageRequest, SearchOptions};
use crate::search::EngineConfig;
use crate::{Result, SearchError};

/// What the caller cares about most.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preference {
    /// Default trade-off.
    #[default]
    Balance,
    /// Recent results only.
    Latest,
    /// A longer result list.
    MoreResults,
}

impl Preference {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Preference::Balance => "balance",
            Preference::Latest => "latest",
            Preference::MoreResults => "more_results",
        }
    }
}

impl fmt::Display for Preference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preference {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "balance" => Ok(Preference::Balance),
            "latest" => Ok(Preference::Latest),
            "more_results" => Ok(Preference::MoreResults),
            other => Err(SearchError::InvalidQuery(format!("Unknown preference: {}", other))),
        }
    }
}

/// A resolved preset: weighted adapters plus the result goal.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Adapters with weights.
    pub engines: Vec<EngineConfig>,
    /// Records to return.
    pub num: usize,
    /// Apply recency filters.
    pub latest: bool,
}

impl Plan {
    /// Builds the aggregate request for `query`.
    pub fn request(&self, query: &str, options: SearchOptions) -> PageRequest {
        PageRequest::new(query)
            .with_num(self.num as i64)
            .with_latest(self.latest)
            .with_options(options)
    }
}

/// A named search policy.
pub trait Preset: Send + Sync {
    /// Returns the registry name.
    fn name(&self) -> &str;

    /// Returns a description for callers choosing a preset.
    fn description(&self) -> &str;

    /// Resolves a preference into a plan.
    fn resolve(&self, preference: Preference) -> Plan;
}

/// Preset over a fixed weighted adapter list.
///
/// `balance` returns 20 records, `more_results` 30, and `latest` 20 with
/// recency filters on.
pub struct WeightedPreset {
    name: String,
    description: String,
    engines: Vec<EngineConfig>,
}

impl WeightedPreset {
    /// Creates a preset.
    pub fn new(name: &str, description: &str, engines: Vec<EngineConfig>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            engines,
        }
    }

    /// Creates a preset giving each engine weight 1.
    pub fn uniform(
        name: &str,
        description: &str,
        engines: Vec<Arc<dyn Engine>>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        let engines = engines
            .into_iter()
            .map(|engine| EngineConfig::new(Arc::new(Adapter::new(engine, fetcher.clone())), 1))
            .collect();
        Self::new(name, description, engines)
    }

    /// Returns the weighted adapters.
    pub fn engines(&self) -> &[EngineConfig] {
        &self.engines
    }
}

impl Preset for WeightedPreset {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn resolve(&self, preference: Preference) -> Plan {
        let (num, latest) = match preference {
            Preference::Balance => (20, false),
            Preference::MoreResults => (30, false),
            Preference::Latest => (20, true),
        };
        Plan {
            engines: self.engines.clone(),
            num,
            latest,
        }
    }
}

/// Name of the preset used when the caller names none.
pub const DEFAULT_PRESET: &str = "default";

/// DuckDuckGo, Bing, 360 Search and Sogou at equal weight.
pub fn default_preset(fetcher: Arc<dyn PageFetcher>) -> WeightedPreset {
    WeightedPreset::uniform(
        DEFAULT_PRESET,
        "Suitable for most of the cases.",
        vec![
            Arc::new(DuckDuckGo::new()),
            Arc::new(Bing::new()),
            Arc::new(So360::new()),
            Arc::new(Sogou::new()),
        ],
        fetcher,
    )
}

/// Presets by case-insensitive name.
#[derive(Default)]
pub struct PresetRegistry {
    presets: HashMap<String, Arc<dyn Preset>>,
}

impl PresetRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the default preset.
    pub fn with_defaults(fetcher: Arc<dyn PageFetcher>) -> Self {
        let mut registry = Self::new();
        registry.register(default_preset(fetcher));
        registry
    }

    /// Adds a preset, replacing any preset with the same name.
    pub fn register<P: Preset + 'static>(&mut self, preset: P) {
        self.presets
            .insert(preset.name().to_lowercase(), Arc::new(preset));
    }

    /// Looks up a preset.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Preset>> {
        self.presets
            .get(&name.trim().to_lowercase())
            .cloned()
            .ok_or_else(|| SearchError::UnknownPreset(name.to_string()))
    }

    /// Returns preset names mapped to descriptions.
    pub fn descriptions(&self) -> BTreeMap<String, String> {
        self.presets
            .iter()
            .map(|(name, preset)| (name.clone(), preset.description().to_string()))
            .collect()
    }

    /// Returns the number of presets.
    pub fn len(&self) -> usize {
        self.presets.len()
    }

    /// Returns whether no preset is registered.
    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}
