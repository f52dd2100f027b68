// Configuration management module
// TOML settings stored in the user's config directory

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    AssistantConfig, Config, ConfigError, DocsConfig, GithubConfig, OllamaConfig, RetrievalConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("docs-rag"))
        .ok_or(ConfigError::DirectoryError)
}
