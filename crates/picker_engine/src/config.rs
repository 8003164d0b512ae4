use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fetch::FetchSettings;
use crate::filename::DEFAULT_FILENAME_MAX_LEN;
use crate::srcset::SrcsetRanking;

pub const DEFAULT_MIN_DIMENSION: u32 = 1000;

pub const DEFAULT_LAZY_LOAD_ATTRS: &[&str] = &[
    "data-src",
    "data-lazy-src",
    "data-original",
    "data-lazy",
    "data-srcset",
    "data-bg",
    "data-background",
    "data-image",
    "data-full-src",
    "data-hi-res",
    "data-zoom-image",
    "data-large",
];

/// URL fragments that waive the minimum-size check.
pub const DEFAULT_SIZE_GATE_BYPASS: &[&str] = &["cdn", "media", "images"];

/// Wall clock used for ids and archive names; injectable for tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// CSS selectors describing a lightbox overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LightboxSelectors {
    pub container: String,
    pub item: String,
    pub active_item: String,
    pub image: String,
}

impl Default for LightboxSelectors {
    fn default() -> Self {
        Self {
            container: ".pswp__container, #pswp__items".to_string(),
            item: ".pswp__item".to_string(),
            active_item: ".pswp__item[aria-hidden=\"false\"]".to_string(),
            image: ".pswp__img img, img".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorConfig {
    pub min_width: u32,
    pub min_height: u32,
    pub custom_selectors: Vec<String>,
    pub lazy_load_attrs: Vec<String>,
    pub size_gate_bypass: Vec<String>,
    pub srcset_ranking: SrcsetRanking,
    pub lightbox: LightboxSelectors,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_width: DEFAULT_MIN_DIMENSION,
            min_height: DEFAULT_MIN_DIMENSION,
            custom_selectors: Vec::new(),
            lazy_load_attrs: DEFAULT_LAZY_LOAD_ATTRS.iter().map(|s| s.to_string()).collect(),
            size_gate_bypass: DEFAULT_SIZE_GATE_BYPASS.iter().map(|s| s.to_string()).collect(),
            srcset_ranking: SrcsetRanking::default(),
            lightbox: LightboxSelectors::default(),
        }
    }
}

impl DetectorConfig {
    /// Applies persisted user settings. Zero thresholds and an empty selector
    /// list keep the current values.
    pub fn apply(&mut self, settings: &UserSettings) {
        if settings.min_width > 0 {
            self.min_width = settings.min_width;
        }
        if settings.min_height > 0 {
            self.min_height = settings.min_height;
        }
        let selectors = settings.flattened_selectors();
        if !selectors.is_empty() {
            self.custom_selectors = selectors;
        }
        if let Some(ranking) = settings.srcset_ranking {
            self.srcset_ranking = ranking;
        }
        if let Some(lightbox) = &settings.lightbox {
            self.lightbox = lightbox.clone();
        }
    }
}

/// A named group of CSS selectors from the settings page.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorGroup {
    pub name: String,
    pub selectors: Vec<String>,
}

/// Settings as persisted by the user and pushed with `updateConfig`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettings {
    pub min_width: u32,
    pub min_height: u32,
    pub custom_selectors: Vec<SelectorGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub srcset_ranking: Option<SrcsetRanking>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lightbox: Option<LightboxSelectors>,
}

impl UserSettings {
    pub fn flattened_selectors(&self) -> Vec<String> {
        self.custom_selectors
            .iter()
            .flat_map(|group| group.selectors.iter())
            .map(|selector| selector.trim())
            .filter(|selector| !selector.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchSettings {
    pub fallback_poll: Duration,
    pub slide_poll: Duration,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            fallback_poll: Duration::from_millis(500),
            slide_poll: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionSettings {
    pub download_delay: Duration,
    pub filename_max_len: usize,
    pub compression_level: i32,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            download_delay: Duration::from_millis(200),
            filename_max_len: DEFAULT_FILENAME_MAX_LEN,
            compression_level: 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalSettings {
    pub legacy_timeout: Duration,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            legacy_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Clone)]
pub struct EngineConfig {
    pub detector: DetectorConfig,
    pub watch: WatchSettings,
    pub acquisition: AcquisitionSettings,
    pub retrieval: RetrievalSettings,
    pub fetch: FetchSettings,
    pub output_dir: PathBuf,
    pub clock: Clock,
}

impl EngineConfig {
    pub fn default_with_output(output_dir: PathBuf) -> Self {
        Self {
            detector: DetectorConfig::default(),
            watch: WatchSettings::default(),
            acquisition: AcquisitionSettings::default(),
            retrieval: RetrievalSettings::default(),
            fetch: FetchSettings::default(),
            output_dir,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("detector", &self.detector)
            .field("watch", &self.watch)
            .field("acquisition", &self.acquisition)
            .field("retrieval", &self.retrieval)
            .field("fetch", &self.fetch)
            .field("output_dir", &self.output_dir)
            .finish_non_exhaustive()
    }
}
