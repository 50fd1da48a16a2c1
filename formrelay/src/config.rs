use intake::config::Listener;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;

pub const ENV_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_CHAT_ID: &str = "TELEGRAM_CHAT_ID";
pub const ENV_AUTHORIZED_USERS: &str = "AUTHORIZED_USERS";
pub const ENV_PORT: &str = "PORT";

fn default_metrics_prefix() -> String {
    "formrelay".into()
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
    #[serde(default = "default_metrics_prefix")]
    pub prefix: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub sentry_dsn: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    #[serde(default)]
    pub intake: intake::config::Config,
    /// Health and readiness probes. Not started when absent.
    pub admin_listener: Option<Listener>,
    #[serde(default)]
    pub telegram: telegram::config::Config,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }

    /// Reads the optional config file, then lets the process environment override it.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Applies the supported environment variables, looked up through `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(token) = lookup(ENV_BOT_TOKEN) {
            self.telegram.bot_token = token;
        }
        if let Some(chat_id) = lookup(ENV_CHAT_ID) {
            self.telegram.chat_id = chat_id;
        }
        if let Some(users) = lookup(ENV_AUTHORIZED_USERS) {
            self.telegram.authorized_users = parse_user_ids(&users)?;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.intake.listener.port =
                port.trim().parse().map_err(|_| ConfigError::InvalidEnvironment {
                    name: ENV_PORT,
                    value: port.clone(),
                })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.intake.validate()?;
        if let Some(admin) = &self.admin_listener {
            admin.validate()?;
        }
        self.telegram.validate()?;
        if let Some(logging) = &self.common.logging {
            logging
                .sentry_dsn
                .parse::<sentry::types::Dsn>()
                .map_err(|e| ConfigError::InvalidSentryDsn(e.to_string()))?;
        }
        Ok(())
    }
}

/// Comma separated Telegram user ids. Blank entries are skipped.
fn parse_user_ids(value: &str) -> Result<Vec<i64>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse().map_err(|_| ConfigError::InvalidEnvironment {
                name: ENV_AUTHORIZED_USERS,
                value: value.to_string(),
            })
        })
        .collect()
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid value for {name}: {value:?}")]
    InvalidEnvironment { name: &'static str, value: String },
    #[error("invalid intake config: {0}")]
    Intake(#[from] intake::config::ValidationError),
    #[error("invalid telegram config: {0}")]
    Telegram(#[from] telegram::config::ValidationError),
    #[error("invalid sentry dsn: {0}")]
    InvalidSentryDsn(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn full_config() {
        let yaml = r#"
            intake:
                listener:
                    host: 127.0.0.1
                    port: 8080
                uploads:
                    dir: /var/lib/formrelay/uploads
                    max_files: 5
            admin_listener:
                host: 127.0.0.1
                port: 8081
            telegram:
                bot_token: "123:abc"
                chat_id: "-100500"
                authorized_users: [1, 2]
                max_retries: 2
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            logging:
                sentry_dsn: "https://key@sentry.example.com/1"
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");
        config.validate().expect("valid config");

        assert_eq!(config.intake.listener.port, 8080);
        assert_eq!(
            config.intake.uploads.dir,
            PathBuf::from("/var/lib/formrelay/uploads")
        );
        assert_eq!(config.intake.uploads.max_files, 5);
        assert_eq!(config.admin_listener.map(|l| l.port), Some(8081));
        assert_eq!(config.telegram.chat_id, "-100500");
        assert_eq!(config.telegram.authorized_users, vec![1, 2]);
        assert_eq!(config.telegram.max_retries, 2);
        let metrics = config.common.metrics.expect("metrics config");
        assert_eq!(metrics.statsd_port, 8125);
        assert_eq!(metrics.prefix, "formrelay");
    }

    #[test]
    fn env_overrides_file() {
        let yaml = r#"
            intake:
                listener: {host: 0.0.0.0, port: 8080}
            telegram:
                bot_token: "from-file"
                chat_id: "1"
            "#;
        let tmp = write_tmp_file(yaml);
        let mut config = Config::from_file(tmp.path()).expect("load config");

        config
            .apply_env(env(&[
                (ENV_BOT_TOKEN, "from-env"),
                (ENV_AUTHORIZED_USERS, " 10, 20 ,,30"),
                (ENV_PORT, "9000"),
            ]))
            .expect("apply env");

        assert_eq!(config.telegram.bot_token, "from-env");
        assert_eq!(config.telegram.chat_id, "1");
        assert_eq!(config.telegram.authorized_users, vec![10, 20, 30]);
        assert_eq!(config.intake.listener.port, 9000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_only() {
        let mut config = Config::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Telegram(
                telegram::config::ValidationError::MissingBotToken
            ))
        ));

        config
            .apply_env(env(&[(ENV_BOT_TOKEN, "123:abc"), (ENV_CHAT_ID, "42")]))
            .expect("apply env");
        config.validate().expect("valid config");
        assert_eq!(config.intake.listener.port, 3000);
        assert!(config.admin_listener.is_none());
        assert!(!config.telegram.gate_enabled());
    }

    #[test]
    fn invalid_env() {
        let mut config = Config::default();
        assert!(matches!(
            config.apply_env(env(&[(ENV_PORT, "http")])),
            Err(ConfigError::InvalidEnvironment { name: ENV_PORT, .. })
        ));
        assert!(matches!(
            config.apply_env(env(&[(ENV_AUTHORIZED_USERS, "1,bob")])),
            Err(ConfigError::InvalidEnvironment {
                name: ENV_AUTHORIZED_USERS,
                ..
            })
        ));
    }

    #[test]
    fn invalid_files() {
        assert!(matches!(
            Config::from_file(Path::new("/nonexistent/formrelay.yaml")),
            Err(ConfigError::LoadError(_))
        ));

        let tmp = write_tmp_file("intake: {listener: {port: nope}}");
        assert!(matches!(
            Config::from_file(tmp.path()),
            Err(ConfigError::ParseError(_))
        ));

        let tmp = write_tmp_file(
            r#"
            telegram: {bot_token: "t", chat_id: "c"}
            logging: {sentry_dsn: "not a dsn"}
            "#,
        );
        let config = Config::from_file(tmp.path()).expect("load config");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSentryDsn(_))
        ));
    }
}
