//! Configuration types for music-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{OutputMode, Provider};

/// Provider behavior configuration (credentials, search, quality gating)
///
/// Groups settings related to the three music providers.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Allow lossless (FLAC) output when the account is entitled to it
    /// (default: false — quality silently downgrades to lossy)
    #[serde(default)]
    pub enable_flac: bool,

    /// Deezer ARL token. Loaded once at startup and immutable for the
    /// process lifetime; rotating it requires a restart.
    #[serde(default)]
    pub deezer_token: Option<String>,

    /// Path to the YouTube cookie file. Re-read before every YouTube fetch;
    /// absence is non-fatal (fetches proceed unauthenticated).
    #[serde(default)]
    pub cookie_file: Option<PathBuf>,

    /// Maximum number of search candidates per provider (default: 5)
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Provider searched when the input is a free-text query (default: deezer)
    #[serde(default = "default_search_provider")]
    pub search_provider: Provider,

    /// Track ordering for album/playlist expansions (default: provider-native)
    #[serde(default)]
    pub album_order: AlbumOrder,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enable_flac: false,
            deezer_token: None,
            cookie_file: None,
            search_limit: default_search_limit(),
            search_provider: default_search_provider(),
            album_order: AlbumOrder::default(),
        }
    }
}

/// Track ordering applied to album and playlist expansions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlbumOrder {
    /// Keep the order the provider reports (default)
    #[default]
    ProviderNative,
    /// Re-sort expanded tracks by title
    ByTitle,
}

/// Download behavior configuration (directories, concurrency, timeouts)
///
/// Groups settings related to how tracks are fetched and encoded.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Working directory for fetched and encoded files (default: "./downloads")
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Global bound on simultaneous in-flight fetches (default: 4)
    ///
    /// Protects outbound bandwidth and provider rate limits.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Per-user bound on simultaneous in-flight fetches (default: 2)
    ///
    /// Prevents one user from starving others.
    #[serde(default = "default_max_fetches_per_user")]
    pub max_fetches_per_user: usize,

    /// Timeout for a single provider fetch call (default: 120 seconds)
    ///
    /// Expiry surfaces as a transient provider failure, subject to the
    /// same retry policy as other transient failures.
    #[serde(default = "default_fetch_timeout", with = "duration_serde")]
    pub fetch_timeout: Duration,

    /// Timeout for a single encoder invocation (default: 300 seconds)
    #[serde(default = "default_encode_timeout", with = "duration_serde")]
    pub encode_timeout: Duration,

    /// Timeout for a cover-art download (default: 15 seconds)
    #[serde(default = "default_cover_timeout", with = "duration_serde")]
    pub cover_timeout: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            max_fetches_per_user: default_max_fetches_per_user(),
            fetch_timeout: default_fetch_timeout(),
            encode_timeout: default_encode_timeout(),
            cover_timeout: default_cover_timeout(),
        }
    }
}

/// Delivery configuration (archive format, covers, relocation)
///
/// Groups settings for how finished artifacts reach the caller.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Default output shape when a request does not choose one explicitly
    #[serde(default)]
    pub format: ArchiveFormat,

    /// Legacy cover flag: when set, album covers are left **out** of encoded
    /// files and archives. The inverted polarity is kept for compatibility
    /// with existing deployment configurations.
    #[serde(default)]
    pub send_album_cover: bool,

    /// Directory that finished files are moved into instead of being
    /// uploaded. Enables relocation delivery together with
    /// [`file_link_template`](Self::file_link_template).
    #[serde(default)]
    pub copy_files_path: Option<PathBuf>,

    /// URL template with a single `{0}` placeholder that is replaced with
    /// the relocated file's name, verbatim.
    #[serde(default)]
    pub file_link_template: Option<String>,
}

impl DeliveryConfig {
    /// Whether cover art is embedded and shipped.
    ///
    /// Centralizes the inverted polarity of [`send_album_cover`](Self::send_album_cover).
    pub fn covers_enabled(&self) -> bool {
        !self.send_album_cover
    }

    /// Whether relocation delivery is configured
    pub fn relocation_enabled(&self) -> bool {
        self.copy_files_path.is_some()
    }

    /// The output shape a request falls back to when it does not pick one
    pub fn default_mode(&self) -> OutputMode {
        match self.format {
            ArchiveFormat::Unpacked => OutputMode::Single,
            ArchiveFormat::Zip => OutputMode::Zip,
        }
    }
}

/// Archive format for delivered output
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    /// Plain audio files (default)
    #[default]
    Unpacked,
    /// Zip archive, split into parts above the size ceiling
    Zip,
}

/// External tool paths
///
/// Groups settings for external binaries.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to the ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            search_path: true,
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Main configuration for the job manager
///
/// Fields are organized into logical sub-configs:
/// - [`providers`](ProviderConfig) — credentials, search, quality gating
/// - [`download`](DownloadConfig) — directories, concurrency, timeouts
/// - [`delivery`](DeliveryConfig) — archive format, covers, relocation
/// - [`tools`](ToolsConfig) — external binary paths
/// - [`retry`](RetryConfig) — transient-failure retry policy
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Provider settings
    #[serde(default)]
    pub providers: ProviderConfig,

    /// Download behavior settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Delivery settings
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// External tool paths
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Retry policy for transient failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Validate the configuration, returning the first problem found
    pub fn validate(&self) -> Result<()> {
        if self.download.max_concurrent_fetches == 0 {
            return Err(Error::Config {
                message: "max_concurrent_fetches must be at least 1".to_string(),
                key: Some("max_concurrent_fetches".to_string()),
            });
        }
        if self.download.max_fetches_per_user == 0 {
            return Err(Error::Config {
                message: "max_fetches_per_user must be at least 1".to_string(),
                key: Some("max_fetches_per_user".to_string()),
            });
        }
        match (
            &self.delivery.copy_files_path,
            &self.delivery.file_link_template,
        ) {
            (Some(_), None) => {
                return Err(Error::Config {
                    message: "copy_files_path requires file_link_template".to_string(),
                    key: Some("file_link_template".to_string()),
                });
            }
            (None, Some(_)) => {
                return Err(Error::Config {
                    message: "file_link_template requires copy_files_path".to_string(),
                    key: Some("copy_files_path".to_string()),
                });
            }
            (Some(_), Some(template)) => {
                if template.matches("{0}").count() != 1 {
                    return Err(Error::Config {
                        message: format!(
                            "file_link_template must contain exactly one {{0}} placeholder: {}",
                            template
                        ),
                        key: Some("file_link_template".to_string()),
                    });
                }
            }
            (None, None) => {}
        }
        Ok(())
    }

    /// Build a configuration from the process environment.
    ///
    /// Recognized variables: `ENABLE_FLAC`, `SEND_ALBUM_COVER`, `FORMAT`
    /// (`zip` or unset), `COPY_FILES_PATH`, `FILE_LINK_TEMPLATE`,
    /// `DEEZER_TOKEN`, `COOKIE_FILE`. Everything else keeps its default.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.providers.enable_flac = env_flag("ENABLE_FLAC");
        config.delivery.send_album_cover = env_flag("SEND_ALBUM_COVER");
        if let Ok(format) = std::env::var("FORMAT") {
            if format.eq_ignore_ascii_case("zip") {
                config.delivery.format = ArchiveFormat::Zip;
            }
        }
        config.delivery.copy_files_path = std::env::var("COPY_FILES_PATH")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        config.delivery.file_link_template = std::env::var("FILE_LINK_TEMPLATE")
            .ok()
            .filter(|s| !s.is_empty());
        config.providers.deezer_token = std::env::var("DEEZER_TOKEN")
            .ok()
            .filter(|s| !s.is_empty());
        config.providers.cookie_file = std::env::var("COOKIE_FILE")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        config
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| {
            let v = v.trim().to_ascii_lowercase();
            v == "1" || v == "true" || v == "yes" || v == "on"
        })
        .unwrap_or(false)
}

fn default_search_limit() -> usize {
    5
}

fn default_search_provider() -> Provider {
    Provider::Deezer
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_max_concurrent_fetches() -> usize {
    4
}

fn default_max_fetches_per_user() -> usize {
    2
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_encode_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_cover_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

/// Serialize/deserialize `Duration` as whole seconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
