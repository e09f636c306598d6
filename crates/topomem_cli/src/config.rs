use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use topomem_core::{MapConfig, RelaxConfig};
use tracing::{info, warn};

const DATA_DIR: &str = ".topomem";

/// Returns the ~/.topomem directory, creating it if needed.
/// Falls back to a local `.topomem` directory if the home directory cannot be
/// determined or created.
pub fn topomem_data_dir() -> PathBuf {
    data_dir_in(dirs::home_dir().as_deref(), Path::new(DATA_DIR))
}

fn data_dir_in(home: Option<&Path>, fallback: &Path) -> PathBuf {
    match home {
        Some(home) => {
            let path = home.join(DATA_DIR);
            match fs::create_dir_all(&path) {
                Ok(()) => path,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Could not create data directory, falling back to local .topomem"
                    );
                    ensure_fallback(fallback)
                }
            }
        }
        None => {
            warn!("Could not determine home directory, falling back to local .topomem");
            ensure_fallback(fallback)
        }
    }
}

/// The fallback is returned even when it cannot be created; the first read
/// or write below it then reports the failure with its path.
fn ensure_fallback(fallback: &Path) -> PathBuf {
    if let Err(e) = fs::create_dir_all(fallback) {
        warn!(
            path = %fallback.display(),
            error = %e,
            "Could not create fallback data directory"
        );
    }
    fallback.to_path_buf()
}

/// Per-run settings that are not part of the map itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Seed for the ChaCha20 tie-break RNG
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Write dumps zstd-compressed
    #[serde(default)]
    pub compress: bool,
    #[serde(default = "default_zstd_level")]
    pub zstd_level: i32,
    /// Dump file, relative to the data directory unless absolute
    #[serde(default = "default_dump_file")]
    pub dump_file: String,
}

fn default_seed() -> u64 {
    0x7090_4D45
}

fn default_zstd_level() -> i32 {
    3
}

fn default_dump_file() -> String {
    "map.tmem".to_string()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            compress: false,
            zstd_level: default_zstd_level(),
            dump_file: default_dump_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub relax: RelaxConfig,
    #[serde(default)]
    pub run: RunConfig,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let mut path = topomem_data_dir();
        path.push("config.toml");
        path
    }

    /// Load `path`, or the default location when `None`. A missing default
    /// file is created with defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let p = Self::default_path();
                if !p.exists() {
                    let config = Config::default();
                    config.save(&p)?;
                    info!(path = %p.display(), "Wrote default configuration");
                    return Ok(config);
                }
                p
            }
        };

        let content = fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.map.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let toml = toml::to_string_pretty(self)?;
        fs::write(path, toml).with_context(|| format!("writing config {}", path.display()))?;
        Ok(())
    }

    /// Where the map dump lives for this configuration.
    pub fn dump_path(&self) -> PathBuf {
        let file = PathBuf::from(&self.run.dump_file);
        if file.is_absolute() {
            file
        } else {
            topomem_data_dir().join(file)
        }
    }
}
