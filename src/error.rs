use thiserror::Error;

/// Why a visual body could not be produced by the asset loader.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset `{0}` not found")]
    NotFound(String),
    #[error("fetching asset failed: {0}")]
    Fetch(String),
    #[error("asset manifest is malformed: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("asset `{0}` contains no parts")]
    Empty(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not parse tuning: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("third-person distance list must be non-empty with positive entries")]
    InvalidDistanceList,
    #[error("gamepad dead zone {0} is outside [0, 1)")]
    InvalidDeadZone(f32),
}

/// Device reads are best-effort; callers treat any of these as "no input this tick".
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device API unavailable")]
    Unavailable,
    #[error("device query failed: {0}")]
    Query(String),
}
