use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path};

use crate::{prompt::PromptFragment, Error, InternalResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Default streaming mode for `gen`.
    #[serde(default)]
    pub stream: bool,

    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,

    #[serde(default)]
    pub sampling: SamplingConfig,

    #[serde(default)]
    pub fragment_filter: FragmentFilter,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            stream: false,
            event_buffer_size: default_event_buffer_size(),
            sampling: SamplingConfig::default(),
            fragment_filter: FragmentFilter::default(),
        }
    }
}

impl AgentConfig {
    // JSONファイルから設定を読み込む
    pub fn from_file<P: AsRef<Path>>(path: P) -> InternalResult<Self> {
        from_file(path)
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// Sampling defaults applied to every `gen` unless overridden by its options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: Option<usize>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_p: None,
            max_tokens: default_max_tokens(),
        }
    }
}

impl SamplingConfig {
    pub fn merge(self, over: SamplingConfig) -> SamplingConfig {
        SamplingConfig {
            temperature: over.temperature,
            top_p: over.top_p.or(self.top_p),
            max_tokens: over.max_tokens.or(self.max_tokens),
        }
    }
}

/// Which fragments an agent stream forwards to its consumer.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FragmentFilter {
    All,
    #[default]
    Generated,
}

impl FragmentFilter {
    pub fn accepts(&self, fragment: &PromptFragment) -> bool {
        match self {
            FragmentFilter::All => true,
            FragmentFilter::Generated => fragment.is_generated(),
        }
    }
}

pub fn from_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> InternalResult<T> {
    let file =
        File::open(path).map_err(|e| Error::Config(format!("Failed to open config file: {}", e)))?;
    let reader = BufReader::new(file);
    let config = serde_json::from_reader(reader)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;
    Ok(config)
}

pub fn from_str<T: for<'de> Deserialize<'de>>(s: &str) -> InternalResult<T> {
    let config = serde_json::from_str(s)
        .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
    Ok(config)
}

// デフォルト値の定義
fn default_event_buffer_size() -> usize {
    64
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> Option<usize> {
    Some(1000)
}
