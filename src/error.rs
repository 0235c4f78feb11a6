//! Error types shared across the renderer
//!
//! Asset and shader failures are surfaced as values so that callers can decide
//! whether to degrade (log and continue with a null payload) or abort. Texture
//! unit exhaustion is the one condition the scene treats as fatal.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while reading or decoding asset files
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode image '{path}': {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to import model '{path}': {source}")]
    Import {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },

    #[error("Image '{path}' has unsupported channel count {channels}")]
    UnsupportedChannels { path: PathBuf, channels: u8 },
}

/// Failures while assembling or reflecting a shader program
#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("Program '{program}' has no {stage} stage")]
    MissingStage {
        program: String,
        stage: &'static str,
    },

    #[error("Program '{program}' failed to parse:\n{message}")]
    Parse { program: String, message: String },

    #[error("Program '{program}' declares no uniform block at @group(0) @binding(0)")]
    MissingUniformBlock { program: String },

    #[error("Program '{program}' is not linked")]
    NotLinked { program: String },
}

/// Failures in the texture-unit pool
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TextureError {
    #[error("No texture unit available: all {limit} units are in use")]
    UnitsExhausted { limit: u32 },
}
