use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter};

use crate::dispatch::TopologyConfig;

/// Credential verifier selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, EnumIter, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VerifierKind {
    /// Fixed token table from `[[auth.credentials]]`
    #[default]
    Static,
    /// HS256 JWT signed with `auth.jwt_secret`
    Jwt,
}

/// 静态配置（从 TOML 加载，启动时使用，之后不可变）
///
/// - server: 监听地址、端口、worker 数量
/// - logging: 日志配置
/// - links: 短码生成参数
/// - auth: 凭证校验
/// - topology: 每个 capability 在本进程执行还是转发到远端
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub links: LinksConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub topology: TopologyConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > TOML 文件 > 默认值
    /// ENV 前缀：ML，分隔符：__
    /// 示例：ML__SERVER__PORT=9999
    pub fn load(path: &str) -> anyhow::Result<Self> {
        use anyhow::Context;
        use config::{Config, Environment, File};

        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("ML")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("failed to read configuration from '{}'", path))?;

        let config: StaticConfig = settings
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        if std::path::Path::new(path).exists() {
            eprintln!("[INFO] Configuration loaded from: {}", path);
        }

        Ok(config)
    }

    /// 示例配置：默认值加一条占位凭证
    pub fn sample() -> Self {
        let mut sample = Self::default();
        sample.auth.credentials.push(CredentialEntry {
            token: "change-me".to_string(),
            user_id: "alice".to_string(),
            display_name: "Alice".to_string(),
        });
        sample
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        toml::to_string_pretty(&Self::sample())
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

/// 短码生成配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksConfig {
    #[serde(default = "default_code_length")]
    pub code_length: usize,
    #[serde(default = "default_max_generation_attempts")]
    pub max_generation_attempts: u32,
}

/// 凭证校验配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub verifier: VerifierKind,
    #[serde(default)]
    pub credentials: Vec<CredentialEntry>,
    #[serde(default)]
    pub jwt_secret: Option<String>,
}

/// Static token table entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialEntry {
    pub token: String,
    pub user_id: String,
    #[serde(default)]
    pub display_name: String,
}

// ============================================================
// Default value functions for static config
// ============================================================

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(32)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

fn default_code_length() -> usize {
    6
}

fn default_max_generation_attempts() -> u32 {
    3
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            workers: default_workers(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            code_length: default_code_length(),
            max_generation_attempts: default_max_generation_attempts(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Capability;
    use crate::dispatch::DispatchMode;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = StaticConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.links.code_length, 6);
        assert_eq!(config.links.max_generation_attempts, 3);
        assert_eq!(config.auth.verifier, VerifierKind::Static);
        assert_eq!(config.topology.default.mode, DispatchMode::Embedded);
        assert_eq!(config.topology.default.timeout_ms, 2000);
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[server]
port = 9100

[links]
code_length = 8

[[auth.credentials]]
token = "t-alice"
user_id = "alice"
display_name = "Alice"

[topology.capabilities.record-click]
mode = "remote"
endpoint = "http://analytics.internal:8080"
timeout_ms = 500
"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = StaticConfig::load(&path).unwrap();

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.links.code_length, 8);
        assert_eq!(config.links.max_generation_attempts, 3);
        assert_eq!(config.auth.credentials.len(), 1);
        assert_eq!(config.auth.credentials[0].user_id, "alice");

        let route = &config.topology.capabilities[&Capability::RecordClick];
        assert_eq!(route.mode, DispatchMode::Remote);
        assert_eq!(
            route.endpoint.as_deref(),
            Some("http://analytics.internal:8080")
        );
        assert_eq!(route.timeout_ms, 500);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = StaticConfig::load("/nonexistent/morphlink-config.toml").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_sample_config_parses_back() {
        let sample = StaticConfig::generate_sample_config();
        let parsed: StaticConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.links.code_length, 6);
        assert_eq!(parsed.auth.credentials[0].token, "change-me");
    }
}
