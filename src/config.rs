use std::path::{Path, PathBuf};

/// Directory searched first for model weights, relative to the working directory
pub const DEFAULT_MODELS_DIR: &str = "weights";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_file_size: usize,
    pub models_dir: PathBuf,
    pub jpeg_quality: u8,
    /// Tile size for super-resolution inference, 0 processes the whole image at once
    pub tile: u32,
    pub tile_pad: u32,
    pub pre_pad: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9393,
            max_file_size: 52_428_800,
            models_dir: PathBuf::from(DEFAULT_MODELS_DIR),
            jpeg_quality: 95,
            tile: 0,
            tile_pad: 10,
            pre_pad: 0,
        }
    }
}

impl Config {
    /// Path of a model file inside the configured models directory
    pub fn model_path(&self, filename: &str) -> PathBuf {
        self.models_dir.join(filename)
    }
}

/// Pick the models directory: an explicit path wins, then `./weights`,
/// then the platform data directory.
pub fn resolve_models_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }

    let local = PathBuf::from(DEFAULT_MODELS_DIR);
    if local.is_dir() {
        return local;
    }

    match dirs::data_dir() {
        Some(data) => {
            let candidate = data.join("photo-enhance").join(DEFAULT_MODELS_DIR);
            if candidate.is_dir() {
                candidate
            } else {
                local
            }
        }
        None => local,
    }
}
