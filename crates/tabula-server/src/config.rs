use std::path::PathBuf;

use anyhow::{Result, bail};

const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub db_readers: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("TABULA_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("TABULA_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let port = match get("TABULA_PORT") {
            Some(p) => p.parse()?,
            None => 3000,
        };
        let db_readers = match get("TABULA_DB_READERS") {
            Some(n) => n.parse()?,
            None => tabula_db::DEFAULT_READERS,
        };

        Ok(Self {
            jwt_secret,
            db_path: get("TABULA_DB_PATH").unwrap_or_else(|| "tabula.db".into()).into(),
            host: get("TABULA_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_readers,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[("TABULA_JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.db_path, PathBuf::from("tabula.db"));
        assert_eq!(config.db_readers, 4);
    }

    #[test]
    fn rejects_placeholder_secret() {
        assert!(load(&[]).is_err());
        assert!(load(&[("TABULA_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn rejects_bad_port() {
        assert!(load(&[("TABULA_JWT_SECRET", "x"), ("TABULA_PORT", "http")]).is_err());
    }
}
