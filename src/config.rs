//! Runtime configuration.
//!
//! A [`Config`] is built once at startup and passed by reference to the
//! encoder, transport and persistence layers. Builder setters take
//! precedence over environment variables, which take precedence over
//! defaults.

use crate::error::{GenVideoError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Env var holding the generation endpoint URL.
pub const ENV_ENDPOINT: &str = "GENVIDEO_ENDPOINT";
/// Env var holding the bearer token.
pub const ENV_API_TOKEN: &str = "GENVIDEO_API_TOKEN";
/// Env var holding the request timeout in seconds.
pub const ENV_TIMEOUT_SECS: &str = "GENVIDEO_TIMEOUT_SECS";
/// Env var holding the maximum image size in bytes.
pub const ENV_MAX_IMAGE_BYTES: &str = "GENVIDEO_MAX_IMAGE_BYTES";
/// Env var holding the output directory.
pub const ENV_OUTPUT_DIR: &str = "GENVIDEO_OUTPUT_DIR";
/// Env var holding the model catalog path.
pub const ENV_CATALOG: &str = "GENVIDEO_CATALOG";

/// Default output directory.
pub const DEFAULT_OUTPUT_DIR: &str = "./output/";
/// Default request timeout (video generation is slow).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);
/// Default maximum image size (10 MiB).
pub const DEFAULT_MAX_IMAGE_SIZE: u64 = 10 * 1024 * 1024;
/// Image extensions accepted by default.
pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Limits applied by the image encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLimits {
    /// Maximum file size in bytes.
    pub max_size: u64,
    /// Allowed lowercase extensions, without the leading dot.
    pub allowed_extensions: Vec<String>,
}

impl Default for ImageLimits {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_IMAGE_SIZE,
            allowed_extensions: DEFAULT_IMAGE_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ImageLimits {
    /// Returns true if `ext` (any case, with or without dot) is allowed.
    pub fn allows_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.').to_lowercase();
        self.allowed_extensions.iter().any(|e| *e == ext)
    }
}

/// Immutable runtime configuration.
#[derive(Clone)]
pub struct Config {
    endpoint: String,
    api_token: String,
    timeout: Duration,
    image_limits: ImageLimits,
    output_dir: PathBuf,
    catalog_path: Option<PathBuf>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("endpoint", &self.endpoint)
            .field("api_token", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("image_limits", &self.image_limits)
            .field("output_dir", &self.output_dir)
            .field("catalog_path", &self.catalog_path)
            .finish()
    }
}

impl Config {
    /// Creates a new `ConfigBuilder`.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Generation endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Bearer token sent with every request.
    pub fn api_token(&self) -> &str {
        &self.api_token
    }

    /// Budget for a whole request, connect through last body byte.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Limits applied to input images.
    pub fn image_limits(&self) -> &ImageLimits {
        &self.image_limits
    }

    /// Directory generated videos are written to.
    pub fn output_dir(&self) -> &std::path::Path {
        &self.output_dir
    }

    /// Optional path to a `model.json` catalog.
    pub fn catalog_path(&self) -> Option<&std::path::Path> {
        self.catalog_path.as_deref()
    }
}

/// Builder for [`Config`].
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    endpoint: Option<String>,
    api_token: Option<String>,
    timeout: Option<Duration>,
    max_image_size: Option<u64>,
    allowed_extensions: Option<Vec<String>>,
    output_dir: Option<PathBuf>,
    catalog_path: Option<PathBuf>,
}

impl ConfigBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the endpoint. Falls back to `GENVIDEO_ENDPOINT`.
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Sets the API token. Falls back to `GENVIDEO_API_TOKEN`.
    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Sets the request timeout. Falls back to `GENVIDEO_TIMEOUT_SECS`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the maximum image size. Falls back to `GENVIDEO_MAX_IMAGE_BYTES`.
    pub fn max_image_size(mut self, bytes: u64) -> Self {
        self.max_image_size = Some(bytes);
        self
    }

    /// Replaces the set of accepted image extensions.
    pub fn allowed_extensions<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_extensions = Some(
            exts.into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
        );
        self
    }

    /// Sets the output directory. Falls back to `GENVIDEO_OUTPUT_DIR`.
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Sets the catalog path. Falls back to `GENVIDEO_CATALOG`.
    pub fn catalog_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.catalog_path = Some(path.into());
        self
    }

    /// Builds the configuration, resolving environment fallbacks.
    pub fn build(self) -> Result<Config> {
        let endpoint = self
            .endpoint
            .or_else(|| env_nonempty(ENV_ENDPOINT))
            .ok_or_else(|| {
                GenVideoError::Config(format!("{ENV_ENDPOINT} not set and no endpoint provided"))
            })?;
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(GenVideoError::Config(format!(
                "endpoint must be an http(s) URL, got {endpoint:?}"
            )));
        }

        let api_token = self
            .api_token
            .or_else(|| env_nonempty(ENV_API_TOKEN))
            .ok_or_else(|| {
                GenVideoError::Config(format!("{ENV_API_TOKEN} not set and no token provided"))
            })?;

        let timeout = match self.timeout {
            Some(t) => t,
            None => env_parse::<u64>(ENV_TIMEOUT_SECS)?
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT),
        };
        if timeout.is_zero() {
            return Err(GenVideoError::Config("timeout must be positive".into()));
        }

        let max_size = match self.max_image_size {
            Some(n) => n,
            None => env_parse::<u64>(ENV_MAX_IMAGE_BYTES)?.unwrap_or(DEFAULT_MAX_IMAGE_SIZE),
        };
        let defaults = ImageLimits::default();
        let image_limits = ImageLimits {
            max_size,
            allowed_extensions: self
                .allowed_extensions
                .unwrap_or(defaults.allowed_extensions),
        };

        let output_dir = self
            .output_dir
            .or_else(|| env_nonempty(ENV_OUTPUT_DIR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

        let catalog_path = self
            .catalog_path
            .or_else(|| env_nonempty(ENV_CATALOG).map(PathBuf::from));

        Ok(Config {
            endpoint,
            api_token,
            timeout,
            image_limits,
            output_dir,
            catalog_path,
        })
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match env_nonempty(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| GenVideoError::Config(format!("{key} is not a valid number: {raw:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn explicit() -> ConfigBuilder {
        Config::builder()
            .endpoint("http://127.0.0.1:9/v1/chat/completions")
            .api_token("sk-test")
            .timeout(Duration::from_secs(30))
            .max_image_size(1024)
            .output_dir("/tmp/videos")
    }

    #[test]
    fn test_builder_with_explicit_values() {
        let config = explicit().build().unwrap();
        assert_eq!(config.endpoint(), "http://127.0.0.1:9/v1/chat/completions");
        assert_eq!(config.api_token(), "sk-test");
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.image_limits().max_size, 1024);
        assert_eq!(config.output_dir(), std::path::Path::new("/tmp/videos"));
    }

    #[test]
    fn test_builder_rejects_non_http_endpoint() {
        let err = explicit().endpoint("ftp://example.com").build().unwrap_err();
        assert!(matches!(err, GenVideoError::Config(_)));
    }

    #[test]
    fn test_builder_rejects_zero_timeout() {
        let err = explicit().timeout(Duration::ZERO).build().unwrap_err();
        assert!(matches!(err, GenVideoError::Config(_)));
    }

    #[test]
    fn test_allowed_extensions_normalized() {
        let config = explicit()
            .allowed_extensions([".JPG", "Png"])
            .build()
            .unwrap();
        let limits = config.image_limits();
        assert!(limits.allows_extension("jpg"));
        assert!(limits.allows_extension(".PNG"));
        assert!(!limits.allows_extension("webp"));
    }

    #[test]
    fn test_default_limits() {
        let limits = ImageLimits::default();
        assert_eq!(limits.max_size, DEFAULT_MAX_IMAGE_SIZE);
        assert!(limits.allows_extension("JPEG"));
        assert!(limits.allows_extension("webp"));
        assert!(!limits.allows_extension("gif"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = explicit().build().unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-test"));
        assert!(debug.contains("<redacted>"));
    }
}
