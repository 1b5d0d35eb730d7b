// Configuration management module
// TOML settings in the data directory plus the OLLAMA_HOST override

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, ConverterConfig, OllamaConfig, RetrievalConfig, ServerConfig,
    StoreConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
