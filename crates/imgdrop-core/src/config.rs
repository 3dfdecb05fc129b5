//! Configuration module
//!
//! Pipeline options (allow-set, size ceiling, reduce policy, naming, gate) and the
//! storage backend selection. `Default` carries the product defaults; hosts may load
//! overrides from the environment with [`UploaderConfig::from_env`].

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::*;
use crate::storage_types::StorageBackend;

/// How the size reducer treats an accepted image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReducePolicy {
    /// Re-encode only when the blob exceeds `threshold_bytes`.
    #[default]
    Conditional,
    /// Always re-encode into the bounding box, regardless of size.
    BoundingBox,
    /// Upload accepted images as they are.
    Disabled,
}

impl FromStr for ReducePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "conditional" => Ok(ReducePolicy::Conditional),
            "bounding-box" | "bounding_box" | "always" => Ok(ReducePolicy::BoundingBox),
            "disabled" | "off" | "none" => Ok(ReducePolicy::Disabled),
            _ => Err(anyhow::anyhow!("Invalid reduce policy: {}", s)),
        }
    }
}

/// Raster format the reducer re-encodes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self, anyhow::Error> {
        match s.to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::WebP),
            _ => Err(anyhow::anyhow!("Invalid format: {}", s)),
        }
    }

    /// Format implied by a candidate extension, if it is a re-encodable raster.
    pub fn from_extension(extension: &str) -> Option<Self> {
        Self::parse(extension).ok()
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ReduceConfig {
    pub policy: ReducePolicy,
    pub threshold_bytes: u64,
    /// Bound for the longer pixel edge.
    pub max_dimension: u32,
    /// Lossy quality factor (1-100); ignored for PNG.
    pub quality: u8,
    /// `None` keeps the candidate's own format.
    pub output_format: Option<OutputFormat>,
}

impl Default for ReduceConfig {
    fn default() -> Self {
        Self {
            policy: ReducePolicy::Conditional,
            threshold_bytes: REDUCE_THRESHOLD_KB * 1024,
            max_dimension: REDUCE_MAX_DIMENSION,
            quality: REDUCE_QUALITY,
            output_format: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub s3_presign_ttl: Option<Duration>,
    pub local_storage_path: String,
    pub local_storage_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            s3_presign_ttl: None,
            local_storage_path: LOCAL_STORAGE_PATH.to_string(),
            local_storage_base_url: LOCAL_STORAGE_BASE_URL.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct UploaderConfig {
    pub allowed_extensions: Vec<String>,
    pub max_file_size_bytes: u64,
    pub reduce: ReduceConfig,
    pub key_prefix: String,
    /// Well-known object holding the server-issued upload token.
    pub server_token_key: String,
    /// Launch query parameter carrying the client token.
    pub token_param: String,
    /// Deadline for each suspending stage; `None` waits forever.
    pub stage_timeout: Option<Duration>,
    pub ffmpeg_path: String,
    pub storage: StorageConfig,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            reduce: ReduceConfig::default(),
            key_prefix: KEY_PREFIX.to_string(),
            server_token_key: SERVER_TOKEN_KEY.to_string(),
            token_param: TOKEN_PARAM.to_string(),
            stage_timeout: Some(Duration::from_secs(STAGE_TIMEOUT_SECS)),
            ffmpeg_path: "ffmpeg".to_string(),
            storage: StorageConfig::default(),
        }
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>, anyhow::Error> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: {}", name, raw)),
        _ => Ok(None),
    }
}

/// `value * unit` in bytes, or an error naming `name` when it overflows.
fn scale_units(name: &str, value: u64, unit: u64) -> Result<u64, anyhow::Error> {
    value
        .checked_mul(unit)
        .ok_or_else(|| anyhow::anyhow!("{} is too large: {}", name, value))
}

impl UploaderConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let mut config = UploaderConfig::default();

        if let Ok(exts) = env::var("ALLOWED_EXTENSIONS") {
            config.allowed_extensions = parse_list(&exts);
        }
        if let Some(mb) = parse_var::<u64>("MAX_FILE_SIZE_MB")? {
            config.max_file_size_bytes = scale_units("MAX_FILE_SIZE_MB", mb, 1024 * 1024)?;
        }

        if let Ok(policy) = env::var("REDUCE_POLICY") {
            config.reduce.policy = policy.parse()?;
        }
        if let Some(kb) = parse_var::<u64>("REDUCE_THRESHOLD_KB")? {
            config.reduce.threshold_bytes = scale_units("REDUCE_THRESHOLD_KB", kb, 1024)?;
        }
        if let Some(dim) = parse_var::<u32>("REDUCE_MAX_DIMENSION")? {
            config.reduce.max_dimension = dim;
        }
        if let Some(quality) = parse_var::<u8>("REDUCE_QUALITY")? {
            config.reduce.quality = quality;
        }
        if let Ok(format) = env::var("REDUCE_OUTPUT_FORMAT") {
            config.reduce.output_format = if format.trim().is_empty() {
                None
            } else {
                Some(OutputFormat::parse(format.trim())?)
            };
        }

        if let Ok(prefix) = env::var("KEY_PREFIX") {
            config.key_prefix = prefix;
        }
        if let Ok(key) = env::var("SERVER_TOKEN_KEY") {
            config.server_token_key = key;
        }
        if let Ok(param) = env::var("TOKEN_PARAM") {
            config.token_param = param;
        }
        if let Some(secs) = parse_var::<u64>("STAGE_TIMEOUT_SECS")? {
            config.stage_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Ok(path) = env::var("FFMPEG_PATH") {
            config.ffmpeg_path = path;
        }

        if let Ok(backend) = env::var("STORAGE_BACKEND") {
            config.storage.backend = backend.parse()?;
        }
        config.storage.s3_bucket = env::var("S3_BUCKET").ok();
        config.storage.s3_region = env::var("S3_REGION")
            .or_else(|_| env::var("AWS_REGION"))
            .ok();
        config.storage.s3_endpoint = env::var("S3_ENDPOINT").ok();
        config.storage.s3_presign_ttl = parse_var::<u64>("S3_PRESIGN_TTL_SECS")?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        if let Ok(path) = env::var("LOCAL_STORAGE_PATH") {
            config.storage.local_storage_path = path;
        }
        if let Ok(url) = env::var("LOCAL_STORAGE_BASE_URL") {
            config.storage.local_storage_base_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.allowed_extensions.is_empty() {
            return Err(anyhow::anyhow!("ALLOWED_EXTENSIONS must not be empty"));
        }
        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than 0"));
        }
        if !(1..=100).contains(&self.reduce.quality) {
            return Err(anyhow::anyhow!(
                "REDUCE_QUALITY must be between 1 and 100, got {}",
                self.reduce.quality
            ));
        }
        if self.reduce.max_dimension == 0 {
            return Err(anyhow::anyhow!("REDUCE_MAX_DIMENSION must be greater than 0"));
        }
        if self.key_prefix.starts_with('/') || self.key_prefix.contains("..") {
            return Err(anyhow::anyhow!(
                "KEY_PREFIX must be relative and must not contain '..'"
            ));
        }
        if self.storage.backend == StorageBackend::S3 {
            if self.storage.s3_bucket.is_none() {
                return Err(anyhow::anyhow!("S3_BUCKET must be set for the s3 backend"));
            }
            if self.storage.s3_region.is_none() {
                return Err(anyhow::anyhow!(
                    "S3_REGION or AWS_REGION must be set for the s3 backend"
                ));
            }
        }
        Ok(())
    }

    pub fn is_allowed_extension(&self, extension: &str) -> bool {
        self.allowed_extensions.iter().any(|e| e == extension)
    }
}
