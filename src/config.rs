//! TOML configuration and setting resolution.
//!
//! Every section has defaults, so an empty (or missing) file is a valid
//! configuration. Settings that may also come from the environment or a
//! secrets file are resolved through [`resolve_first`], which walks an
//! ordered list of sources and returns the first non-empty value.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::chunk::{DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};
use crate::error::{Error, Result};

pub const ENV_DATA_DIR: &str = "KA_DATA_DIR";
pub const ENV_UPLOAD_DIR: &str = "KA_UPLOAD_DIR";
pub const ENV_LLM_ENDPOINT: &str = "KA_LLM_ENDPOINT";
pub const ENV_LLM_TOKEN: &str = "KA_LLM_TOKEN";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    /// Directory holding `documents.json` and `embeddings.bin`.
    pub dir: Option<PathBuf>,
    /// Directory uploaded files are written to and scanned from.
    pub upload_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn data_dir(&self) -> PathBuf {
        resolve_dir(&self.dir, ENV_DATA_DIR, "./data")
    }

    pub fn upload_dir(&self) -> PathBuf {
        resolve_dir(&self.upload_dir, ENV_UPLOAD_DIR, "./uploads")
    }
}

fn resolve_dir(explicit: &Option<PathBuf>, env: &str, fallback: &str) -> PathBuf {
    let sources = [
        SettingSource::Value(explicit.as_ref().map(|p| p.display().to_string())),
        SettingSource::Env(env.to_string()),
    ];
    let resolution = resolve_sources(&sources);
    resolution.warn_failures(env);
    resolution
        .into_value()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(fallback))
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_overlap() -> usize {
    DEFAULT_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the `ollama` provider.
    #[serde(default)]
    pub url: Option<String>,
    /// API key for the `openai` provider; falls back to `OPENAI_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            api_key: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "hashing".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// Chat-completions URL. Falls back to `KA_LLM_ENDPOINT`.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Bearer token. Falls back to `KA_LLM_TOKEN`, then `token_file`.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub token_file: Option<PathBuf>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            token: None,
            token_file: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_max_tokens() -> u32 {
    500
}
fn default_temperature() -> f32 {
    0.7
}

impl LlmConfig {
    pub fn endpoint_sources(&self) -> Vec<SettingSource> {
        vec![
            SettingSource::Value(self.endpoint.clone()),
            SettingSource::Env(ENV_LLM_ENDPOINT.to_string()),
        ]
    }

    pub fn token_sources(&self) -> Vec<SettingSource> {
        let mut sources = vec![
            SettingSource::Value(self.token.clone()),
            SettingSource::Env(ENV_LLM_TOKEN.to_string()),
        ];
        if let Some(path) = &self.token_file {
            sources.push(SettingSource::File(path.clone()));
        }
        sources
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    /// Hits retrieved per question before relevance filtering.
    #[serde(default = "default_n_results")]
    pub n_results: usize,
    /// Hits with a distance at or above this value are dropped.
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: f32,
    /// Number of top hits pasted into the prompt.
    #[serde(default = "default_context_chunks")]
    pub context_chunks: usize,
    #[serde(default = "default_use_llm")]
    pub use_llm: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            n_results: default_n_results(),
            distance_threshold: default_distance_threshold(),
            context_chunks: default_context_chunks(),
            use_llm: default_use_llm(),
        }
    }
}

fn default_n_results() -> usize {
    5
}
fn default_distance_threshold() -> f32 {
    1.0
}
fn default_context_chunks() -> usize {
    3
}
fn default_use_llm() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
    ]
}

/// Load and validate a config file. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        parse_config(&content)?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };
    validate(&config)?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).map_err(|e| Error::Config(format!("failed to parse config: {}", e)))
}

pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        return Err(Error::Config("chunking.chunk_size must be > 0".into()));
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        return Err(Error::Config(
            "chunking.overlap must be smaller than chunking.chunk_size".into(),
        ));
    }
    if config.chat.n_results == 0 {
        return Err(Error::Config("chat.n_results must be >= 1".into()));
    }
    if config.chat.distance_threshold < 0.0 {
        return Err(Error::Config("chat.distance_threshold must be >= 0".into()));
    }
    if config.embedding.batch_size == 0 {
        return Err(Error::Config("embedding.batch_size must be > 0".into()));
    }

    match config.embedding.provider.as_str() {
        "hashing" | "openai" | "ollama" | "local" => {}
        other => {
            return Err(Error::Config(format!(
                "unknown embedding provider: '{}'. Must be hashing, openai, ollama, or local.",
                other
            )))
        }
    }

    if matches!(config.embedding.provider.as_str(), "openai" | "ollama")
        && config.embedding.model.is_none()
    {
        return Err(Error::Config(format!(
            "embedding.model must be specified when provider is '{}'",
            config.embedding.provider
        )));
    }

    Ok(())
}

// ============ Setting resolution ============

/// One place a setting may come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingSource {
    /// A value given directly (config file or CLI flag).
    Value(Option<String>),
    /// An environment variable name.
    Env(String),
    /// A file whose trimmed contents are the value.
    File(PathBuf),
}

/// What a single source produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    Found(String),
    Missing,
    Failed(String),
}

/// Result of walking a source list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// `failures` lists higher-priority sources that errored before the hit.
    Found {
        value: String,
        source: String,
        failures: Vec<(String, String)>,
    },
    /// Nothing produced a value. `failures` lists sources that errored,
    /// as opposed to simply being empty.
    Unset { failures: Vec<(String, String)> },
}

impl Resolution {
    pub fn value(&self) -> Option<&str> {
        match self {
            Resolution::Found { value, .. } => Some(value),
            Resolution::Unset { .. } => None,
        }
    }

    pub fn into_value(self) -> Option<String> {
        match self {
            Resolution::Found { value, .. } => Some(value),
            Resolution::Unset { .. } => None,
        }
    }

    pub fn failures(&self) -> &[(String, String)] {
        match self {
            Resolution::Found { failures, .. } | Resolution::Unset { failures } => failures,
        }
    }

    /// Log each failed source.
    pub fn warn_failures(&self, setting: &str) {
        for (source, reason) in self.failures() {
            tracing::warn!(setting, source = %source, reason = %reason, "setting source failed");
        }
    }
}

impl SettingSource {
    pub fn describe(&self) -> String {
        match self {
            SettingSource::Value(_) => "config".to_string(),
            SettingSource::Env(name) => format!("env:{}", name),
            SettingSource::File(path) => format!("file:{}", path.display()),
        }
    }

    /// Read the source. This is the only place resolution touches I/O.
    pub fn read(&self) -> SourceOutcome {
        let raw = match self {
            SettingSource::Value(v) => v.clone(),
            SettingSource::Env(name) => match std::env::var(name) {
                Ok(v) => Some(v),
                Err(std::env::VarError::NotPresent) => None,
                Err(e) => return SourceOutcome::Failed(e.to_string()),
            },
            SettingSource::File(path) => match std::fs::read_to_string(path) {
                Ok(v) => Some(v),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => return SourceOutcome::Failed(e.to_string()),
            },
        };
        match raw.map(|v| v.trim().to_string()) {
            Some(v) if !v.is_empty() => SourceOutcome::Found(v),
            _ => SourceOutcome::Missing,
        }
    }
}

/// Return the first `Found` outcome in priority order.
///
/// Outcomes are consumed lazily, so sources after the first hit are never
/// read. Failed sources are skipped and carried in the result.
pub fn resolve_first<I>(outcomes: I) -> Resolution
where
    I: IntoIterator<Item = (String, SourceOutcome)>,
{
    let mut failures = Vec::new();
    for (source, outcome) in outcomes {
        match outcome {
            SourceOutcome::Found(value) => {
                return Resolution::Found {
                    value,
                    source,
                    failures,
                }
            }
            SourceOutcome::Missing => {}
            SourceOutcome::Failed(reason) => failures.push((source, reason)),
        }
    }
    Resolution::Unset { failures }
}

/// Read `sources` in order and resolve them with [`resolve_first`].
pub fn resolve_sources(sources: &[SettingSource]) -> Resolution {
    resolve_first(sources.iter().map(|s| (s.describe(), s.read())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(name: &str, o: SourceOutcome) -> (String, SourceOutcome) {
        (name.to_string(), o)
    }

    #[test]
    fn first_found_wins() {
        let r = resolve_first(vec![
            outcome("a", SourceOutcome::Missing),
            outcome("b", SourceOutcome::Found("from-b".into())),
            outcome("c", SourceOutcome::Found("from-c".into())),
        ]);
        assert_eq!(
            r,
            Resolution::Found {
                value: "from-b".into(),
                source: "b".into(),
                failures: vec![],
            }
        );
    }

    #[test]
    fn failures_are_skipped_and_reported() {
        let r = resolve_first(vec![
            outcome("a", SourceOutcome::Failed("boom".into())),
            outcome("b", SourceOutcome::Missing),
        ]);
        assert_eq!(
            r,
            Resolution::Unset {
                failures: vec![("a".into(), "boom".into())]
            }
        );

        let r = resolve_first(vec![
            outcome("a", SourceOutcome::Failed("boom".into())),
            outcome("b", SourceOutcome::Found("ok".into())),
        ]);
        assert_eq!(r.value(), Some("ok"));
        assert_eq!(r.failures(), &[("a".to_string(), "boom".to_string())]);
    }

    #[test]
    fn nothing_configured_is_unset_without_failures() {
        let r = resolve_first(Vec::new());
        assert_eq!(r, Resolution::Unset { failures: vec![] });
    }

    #[test]
    fn blank_values_count_as_missing() {
        assert_eq!(
            SettingSource::Value(Some("   ".into())).read(),
            SourceOutcome::Missing
        );
        assert_eq!(SettingSource::Value(None).read(), SourceOutcome::Missing);
        assert_eq!(
            SettingSource::Value(Some(" tok \n".into())).read(),
            SourceOutcome::Found("tok".into())
        );
    }

    #[test]
    fn file_source_reads_trimmed_contents() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "secret-token\n").unwrap();
        assert_eq!(
            SettingSource::File(path).read(),
            SourceOutcome::Found("secret-token".into())
        );
        assert_eq!(
            SettingSource::File(dir.path().join("absent")).read(),
            SourceOutcome::Missing
        );
    }

    #[test]
    fn unreadable_file_source_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        // Reading a directory as a file is an error other than NotFound.
        assert!(matches!(
            SettingSource::File(dir.path().to_path_buf()).read(),
            SourceOutcome::Failed(_)
        ));
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        validate(&config).unwrap();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.chat.n_results, 5);
        assert_eq!(config.chat.distance_threshold, 1.0);
        assert_eq!(config.chat.context_chunks, 3);
        assert_eq!(config.embedding.provider, "hashing");
        assert_eq!(config.llm.max_tokens, 500);
        assert_eq!(config.server.bind, "127.0.0.1:8000");
    }

    #[test]
    fn rejects_overlap_not_smaller_than_chunk_size() {
        let config = parse_config("[chunking]\nchunk_size = 100\noverlap = 100\n").unwrap();
        assert!(matches!(validate(&config), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_unknown_provider() {
        let config = parse_config("[embedding]\nprovider = \"magic\"\n").unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn remote_provider_requires_model() {
        let config = parse_config("[embedding]\nprovider = \"openai\"\n").unwrap();
        assert!(validate(&config).is_err());
        let config = parse_config(
            "[embedding]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\n",
        )
        .unwrap();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = load_config(&dir.path().join("none.toml")).unwrap();
        assert_eq!(config.chat.n_results, 5);
    }

    #[test]
    fn explicit_storage_dir_wins() {
        let config = parse_config("[storage]\ndir = \"/tmp/kb-data\"\n").unwrap();
        assert_eq!(config.storage.data_dir(), PathBuf::from("/tmp/kb-data"));
    }

    #[test]
    fn token_sources_are_ordered() {
        let llm = LlmConfig {
            token: Some("t".into()),
            token_file: Some(PathBuf::from("/run/secrets/llm")),
            ..LlmConfig::default()
        };
        let sources = llm.token_sources();
        assert_eq!(sources[0], SettingSource::Value(Some("t".into())));
        assert_eq!(sources[1], SettingSource::Env(ENV_LLM_TOKEN.into()));
        assert_eq!(sources[2], SettingSource::File("/run/secrets/llm".into()));
    }

    #[test]
    fn example_config_is_valid() {
        let config = parse_config(include_str!("../config/kba.example.toml")).unwrap();
        validate(&config).unwrap();
        assert_eq!(config.chat.n_results, 5);
        assert_eq!(config.server.allowed_origins.len(), 2);
    }
}
