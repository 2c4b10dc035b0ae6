//! Resolved runtime configuration.
//!
//! Values are layered: built-in defaults, then `settings.toml`, then
//! environment variables. Resolution happens once at startup and any
//! problem is reported as a [`ConfigError`].

use crate::{ConfigError, PathManager, Settings};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://integrate.api.nvidia.com";
pub const DEFAULT_MODEL: &str = "meta/llama-3.3-70b-instruct";
pub const DEFAULT_TEMPERATURE: f32 = 0.01;
pub const DEFAULT_TOP_P: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_MAX_HISTORY_MESSAGES: usize = 20;
pub const DEFAULT_MAX_HISTORY_CHARS: usize = 24_000;
pub const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_DPI: u32 = 150;

const API_KEY_VARS: [&str; 3] = ["TIKZ_API_KEY", "NVIDIA_API_KEY", "OPENAI_API_KEY"];

/// An external program plus its argument template.
///
/// Arguments may contain `{name}` placeholders that are substituted at call
/// time, e.g. `{tex}`, `{outdir}`, `{pdf}`, `{out}` and `{dpi}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        ToolCommand {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn pdflatex() -> Self {
        Self::new(
            "pdflatex",
            &[
                "-interaction=nonstopmode",
                "-halt-on-error",
                "-output-directory",
                "{outdir}",
                "{tex}",
            ],
        )
    }

    pub fn pdftoppm() -> Self {
        Self::new(
            "pdftoppm",
            &["-png", "-r", "{dpi}", "-f", "1", "-l", "1", "-singlefile", "{pdf}", "{out}"],
        )
    }

    /// Arguments with every known placeholder replaced.
    pub fn expand_args(&self, vars: &[(&str, &str)]) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                vars.iter().fold(arg.clone(), |acc, (name, value)| {
                    acc.replace(&format!("{{{}}}", name), value)
                })
            })
            .collect()
    }
}

#[derive(Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub request_timeout: Option<Duration>,
    pub max_history_messages: usize,
    pub max_history_chars: usize,
    pub stream: bool,
}

// Hand-written so the key never reaches a log line.
impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout", &self.request_timeout)
            .field("max_history_messages", &self.max_history_messages)
            .field("max_history_chars", &self.max_history_chars)
            .field("stream", &self.stream)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub compiler: ToolCommand,
    pub rasterizer: ToolCommand,
    pub timeout: Duration,
    pub dpi: u32,
    pub scratch_dir: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            compiler: ToolCommand::pdflatex(),
            rasterizer: ToolCommand::pdftoppm(),
            timeout: Duration::from_secs(DEFAULT_RENDER_TIMEOUT_SECS),
            dpi: DEFAULT_DPI,
            scratch_dir: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub render: RenderConfig,
}

impl AppConfig {
    /// Resolve against the real process environment.
    pub fn from_env(settings: &Settings) -> Result<Self, ConfigError> {
        Self::resolve(settings, |key| std::env::var(key).ok())
    }

    /// Resolve with an explicit variable lookup, so callers (and tests) control
    /// exactly which environment is seen.
    pub fn resolve<F>(settings: &Settings, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let api_key = API_KEY_VARS
            .iter()
            .find_map(|key| env(*key))
            .or_else(|| settings.llm.api_key.clone().filter(|k| !k.trim().is_empty()))
            .map(|k| k.trim().to_string())
            .ok_or_else(|| ConfigError::MissingApiKey {
                settings: PathManager::settings_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "settings.toml".to_string()),
            })?;

        let base_url = env("TIKZ_API_BASE_URL")
            .or_else(|| settings.llm.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::invalid(
                "TIKZ_API_BASE_URL",
                base_url,
                "must start with http:// or https://",
            ));
        }

        let model = env("TIKZ_MODEL")
            .or_else(|| settings.llm.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let temperature = settings.llm.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::invalid(
                "llm.temperature",
                temperature.to_string(),
                "must be between 0 and 2",
            ));
        }
        let top_p = settings.llm.top_p.unwrap_or(DEFAULT_TOP_P);
        if !(top_p > 0.0 && top_p <= 1.0) {
            return Err(ConfigError::invalid(
                "llm.top_p",
                top_p.to_string(),
                "must be in (0, 1]",
            ));
        }

        let llm = LlmConfig {
            api_key,
            base_url,
            model,
            temperature,
            top_p,
            max_tokens: settings.llm.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            request_timeout: settings.llm.request_timeout_secs.map(Duration::from_secs),
            max_history_messages: settings
                .llm
                .max_history_messages
                .unwrap_or(DEFAULT_MAX_HISTORY_MESSAGES)
                .max(1),
            max_history_chars: settings
                .llm
                .max_history_chars
                .unwrap_or(DEFAULT_MAX_HISTORY_CHARS),
            stream: settings.llm.stream.unwrap_or(true),
        };

        let timeout_secs = parse_env(&env, "TIKZ_RENDER_TIMEOUT_SECS")?
            .or(settings.render.timeout_secs)
            .unwrap_or(DEFAULT_RENDER_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "TIKZ_RENDER_TIMEOUT_SECS",
                "0",
                "timeout must be at least one second",
            ));
        }

        let dpi = parse_env(&env, "TIKZ_RENDER_DPI")?
            .or(settings.render.dpi)
            .unwrap_or(DEFAULT_DPI);
        if !(36..=1200).contains(&dpi) {
            return Err(ConfigError::invalid(
                "TIKZ_RENDER_DPI",
                dpi.to_string(),
                "must be between 36 and 1200",
            ));
        }

        let mut compiler = settings
            .render
            .compiler
            .clone()
            .unwrap_or_else(ToolCommand::pdflatex);
        if let Some(program) = env("TIKZ_PDFLATEX") {
            compiler.program = program;
        }
        let mut rasterizer = settings
            .render
            .rasterizer
            .clone()
            .unwrap_or_else(ToolCommand::pdftoppm);
        if let Some(program) = env("TIKZ_PDFTOPPM") {
            rasterizer.program = program;
        }

        let render = RenderConfig {
            compiler,
            rasterizer,
            timeout: Duration::from_secs(timeout_secs),
            dpi,
            scratch_dir: settings.render.scratch_dir.clone(),
        };

        Ok(AppConfig { llm, render })
    }
}

fn parse_env<T, F>(env: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match env(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::invalid(key, raw.clone(), e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_key_is_error() {
        let result = AppConfig::resolve(&Settings::default(), env_of(&[]));
        assert!(matches!(result, Err(ConfigError::MissingApiKey { .. })));
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let result = AppConfig::resolve(&Settings::default(), env_of(&[("TIKZ_API_KEY", "  ")]));
        assert!(matches!(result, Err(ConfigError::MissingApiKey { .. })));
    }

    #[test]
    fn test_defaults_with_env_key() {
        let config =
            AppConfig::resolve(&Settings::default(), env_of(&[("NVIDIA_API_KEY", "nv-123")]))
                .unwrap();

        assert_eq!(config.llm.api_key, "nv-123");
        assert_eq!(config.llm.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.llm.model, DEFAULT_MODEL);
        assert_eq!(config.llm.max_tokens, 1024);
        assert!(config.llm.stream);
        assert_eq!(config.render.timeout, Duration::from_secs(30));
        assert_eq!(config.render.dpi, 150);
        assert_eq!(config.render.compiler.program, "pdflatex");
        assert_eq!(config.render.rasterizer.program, "pdftoppm");
    }

    #[test]
    fn test_env_overrides_settings() {
        let mut settings = Settings::default();
        settings.llm.api_key = Some("from-file".to_string());
        settings.llm.model = Some("file-model".to_string());
        settings.render.dpi = Some(300);

        let config = AppConfig::resolve(
            &settings,
            env_of(&[
                ("TIKZ_API_KEY", "from-env"),
                ("TIKZ_MODEL", "env-model"),
                ("TIKZ_PDFLATEX", "/opt/tex/bin/pdflatex"),
            ]),
        )
        .unwrap();

        assert_eq!(config.llm.api_key, "from-env");
        assert_eq!(config.llm.model, "env-model");
        assert_eq!(config.render.dpi, 300);
        assert_eq!(config.render.compiler.program, "/opt/tex/bin/pdflatex");
        assert_eq!(config.render.compiler.args, ToolCommand::pdflatex().args);
    }

    #[test]
    fn test_settings_key_used_when_env_empty() {
        let mut settings = Settings::default();
        settings.llm.api_key = Some("from-file".to_string());

        let config = AppConfig::resolve(&settings, env_of(&[])).unwrap();
        assert_eq!(config.llm.api_key, "from-file");
    }

    #[test]
    fn test_bad_numeric_env_is_invalid_value() {
        let result = AppConfig::resolve(
            &Settings::default(),
            env_of(&[("TIKZ_API_KEY", "k"), ("TIKZ_RENDER_TIMEOUT_SECS", "soon")]),
        );
        match result {
            Err(ConfigError::InvalidValue { key, value, .. }) => {
                assert_eq!(key, "TIKZ_RENDER_TIMEOUT_SECS");
                assert_eq!(value, "soon");
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = AppConfig::resolve(
            &Settings::default(),
            env_of(&[("TIKZ_API_KEY", "k"), ("TIKZ_RENDER_TIMEOUT_SECS", "0")]),
        );
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_base_url_must_be_http() {
        let result = AppConfig::resolve(
            &Settings::default(),
            env_of(&[("TIKZ_API_KEY", "k"), ("TIKZ_API_BASE_URL", "ftp://x")]),
        );
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config =
            AppConfig::resolve(&Settings::default(), env_of(&[("TIKZ_API_KEY", "sekrit")]))
                .unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("sekrit"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_expand_args_substitutes_placeholders() {
        let args = ToolCommand::pdftoppm().expand_args(&[
            ("dpi", "150"),
            ("pdf", "/tmp/x/diagram.pdf"),
            ("out", "/tmp/x/diagram"),
        ]);
        assert_eq!(
            args,
            vec![
                "-png",
                "-r",
                "150",
                "-f",
                "1",
                "-l",
                "1",
                "-singlefile",
                "/tmp/x/diagram.pdf",
                "/tmp/x/diagram"
            ]
        );
    }

    #[test]
    fn test_expand_args_leaves_unknown_placeholders() {
        let cmd = ToolCommand::new("tool", &["{tex}", "{other}", "--out={outdir}/x"]);
        let args = cmd.expand_args(&[("tex", "a.tex"), ("outdir", "/w")]);
        assert_eq!(args, vec!["a.tex", "{other}", "--out=/w/x"]);
    }
}
