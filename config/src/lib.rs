pub mod app_config;
pub mod error;
pub mod paths;
pub mod settings;

pub use app_config::{AppConfig, LlmConfig, RenderConfig, ToolCommand};
pub use error::ConfigError;
pub use paths::PathManager;
pub use settings::{LlmSettings, RenderSettings, Settings};

/// Load environment variables from ./.env and ~/.env.
/// Values from the project directory take precedence over the home directory,
/// and both lose to variables already set in the process environment.
pub fn load_env_file() {
    // dotenv never overwrites a variable that is already set, so the project
    // file has to be applied first for its values to win over ~/.env
    dotenv::dotenv().ok();

    if let Some(home) = dirs::home_dir() {
        let home_env_path = home.join(".env");
        dotenv::from_path(home_env_path).ok();
    }
}
