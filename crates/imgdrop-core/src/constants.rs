//! Default values for the upload pipeline.

/// Extensions accepted by the format validator.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &["png", "jpeg", "jpg", "webp", "heic", "heif"];

/// Extensions that must be converted to PNG before upload.
pub const HEIF_EXTENSIONS: &[&str] = &["heic", "heif"];

pub const MAX_FILE_SIZE_MB: u64 = 10;

/// Byte size above which the conditional reduce policy kicks in.
pub const REDUCE_THRESHOLD_KB: u64 = 200;
pub const REDUCE_MAX_DIMENSION: u32 = 1920;
pub const REDUCE_QUALITY: u8 = 80;

pub const KEY_PREFIX: &str = "images/";
/// Stem every generated object name starts with, after the prefix.
pub const KEY_STEM: &str = "image";
pub const SERVER_TOKEN_KEY: &str = "config/upload_token";
pub const TOKEN_PARAM: &str = "token";

/// Length of the random suffix appended to every storage key.
pub const KEY_SUFFIX_LEN: usize = 8;

pub const STAGE_TIMEOUT_SECS: u64 = 120;

pub const LOCAL_STORAGE_PATH: &str = "./data";
pub const LOCAL_STORAGE_BASE_URL: &str = "http://localhost:8080";
