use anyhow::Context;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_MODEL_FILE: &str = "models/churn_model.json";
pub const DEFAULT_FEATURES_FILE: &str = "models/feature_columns.json";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub model_path: PathBuf,
    pub features_path: PathBuf,
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// Build the config from environment variables
    ///
    /// Artifact paths resolve against `CHURN_APP_ROOT` (current dir when unset) unless
    /// `CHURN_MODEL_PATH` / `CHURN_FEATURES_PATH` point somewhere else.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let root = match lookup("CHURN_APP_ROOT") {
            Some(root) => PathBuf::from(root),
            None => std::env::current_dir().with_context(|| "Failed to resolve current dir")?,
        };

        let model_path = lookup("CHURN_MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| root.join(DEFAULT_MODEL_FILE));

        let features_path = lookup("CHURN_FEATURES_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| root.join(DEFAULT_FEATURES_FILE));

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        // get port from env or set to 8000
        let port = match lookup("PORT") {
            Some(port) => port
                .parse::<u16>()
                .with_context(|| format!("PORT must be a valid port number, got {}", port))?,
            None => 8000,
        };

        Ok(Self {
            model_path,
            features_path,
            host,
            port,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr, anyhow::Error> {
        format!("{}:{}", self.host, self.port)
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: HashMap<&'static str, &'static str>) -> impl Fn(&str) -> Option<String> {
        move |key| vars.get(key).map(|v| v.to_string())
    }

    #[test]
    fn test_defaults_resolve_against_root() {
        let config =
            ServerConfig::from_lookup(lookup(HashMap::from([("CHURN_APP_ROOT", "/opt/churn")])))
                .unwrap();

        assert_eq!(
            config.model_path,
            PathBuf::from("/opt/churn/models/churn_model.json")
        );
        assert_eq!(
            config.features_path,
            PathBuf::from("/opt/churn/models/feature_columns.json")
        );
        assert_eq!(config.addr().unwrap().port(), 8000);
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(HashMap::from([
            ("CHURN_MODEL_PATH", "/tmp/model.json"),
            ("CHURN_FEATURES_PATH", "/tmp/cols.json"),
            ("HOST", "127.0.0.1"),
            ("PORT", "9100"),
        ])))
        .unwrap();

        assert_eq!(config.model_path, PathBuf::from("/tmp/model.json"));
        assert_eq!(config.features_path, PathBuf::from("/tmp/cols.json"));
        assert_eq!(config.addr().unwrap().to_string(), "127.0.0.1:9100");
    }

    #[test]
    fn test_invalid_port() {
        let result = ServerConfig::from_lookup(lookup(HashMap::from([("PORT", "eighty")])));
        assert!(result.is_err());
    }
}
