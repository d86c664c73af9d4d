//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! The main error type [`PuppetError`] covers all failure modes including:
//! - Asset fetching (local files, HTTP, in-memory sources)
//! - Settings, expression and user-data document parsing
//! - Image and voice decoding
//! - Backend (deformation SDK) and GPU upload failures
//! - Configuration and scene selection errors
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for `std::result::Result<T, PuppetError>`.
//!
//! ```rust,ignore
//! use myth_puppet::errors::{PuppetError, Result};
//!
//! fn parse_settings(bytes: &[u8]) -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The main error type for the puppet runtime.
#[derive(Error, Debug)]
pub enum PuppetError {
    // ========================================================================
    // Asset Loading Errors
    // ========================================================================
    /// The requested asset was not found.
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// A required settings entry is missing or empty.
    #[error("Missing asset reference: {0}")]
    MissingReference(&'static str),

    // ========================================================================
    // I/O Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    // ========================================================================
    // HTTP & Network Errors
    // ========================================================================
    /// HTTP request error.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// URL parsing error.
    #[cfg(feature = "http")]
    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    /// HTTP response error with status code.
    #[error("HTTP response error: status {status}")]
    HttpResponseError {
        /// HTTP status code
        status: u16,
    },

    // ========================================================================
    // Decoding Errors
    // ========================================================================
    /// Image decoding error.
    #[error("Image decode error: {0}")]
    ImageDecodeError(String),

    /// Texture load failed for a cache key.
    #[error("Texture '{path}' failed to load: {reason}")]
    TextureError {
        /// Path of the texture
        path: String,
        /// Underlying failure
        reason: String,
    },

    /// Voice (WAV) decoding error.
    #[error("Voice decode error: {0}")]
    VoiceDecodeError(String),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    // ========================================================================
    // Backend & GPU Errors
    // ========================================================================
    /// The deformation backend rejected a resource.
    #[error("Backend error: {0}")]
    BackendError(String),

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// The loader waited too long for a resource.
    #[error("Load stalled at {stage} for {seconds:.1}s")]
    LoadStalled {
        /// Stage the model was waiting in
        stage: String,
        /// Time spent waiting
        seconds: f32,
    },

    /// Scene index out of range.
    #[error("Scene index out of bounds: {index} (scene count: {count})")]
    SceneIndexOutOfBounds {
        /// The invalid index
        index: usize,
        /// Number of configured scenes
        count: usize,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ========================================================================
    // Async & Threading Errors
    // ========================================================================
    /// Task join error (when async tasks fail to complete).
    #[error("Task join error: {0}")]
    TaskJoinError(String),
}

// ============================================================================
// Convenient conversion implementations
// ============================================================================

impl From<image::ImageError> for PuppetError {
    fn from(err: image::ImageError) -> Self {
        PuppetError::ImageDecodeError(err.to_string())
    }
}

impl From<hound::Error> for PuppetError {
    fn from(err: hound::Error) -> Self {
        PuppetError::VoiceDecodeError(err.to_string())
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl From<tokio::task::JoinError> for PuppetError {
    fn from(err: tokio::task::JoinError) -> Self {
        PuppetError::TaskJoinError(err.to_string())
    }
}

/// Alias for `Result<T, PuppetError>`.
pub type Result<T> = std::result::Result<T, PuppetError>;
