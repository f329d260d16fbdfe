use anyhow::{anyhow, Context, Result};
use std::{net::SocketAddr, path::PathBuf};

use crate::inference::device::DevicePreference;

const DEFAULT_MODEL_DIR: &str = "model-weights";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;

/// How the `/predict` payload is put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseEncoding {
    /// `{"prediction": ...}` as a plain JSON document.
    #[default]
    Json,
    /// The JSON document serialized a second time into a JSON string.
    Double,
}

impl ResponseEncoding {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" | "" => Ok(Self::Json),
            "double" | "legacy" => Ok(Self::Double),
            other => Err(anyhow!(
                "unknown response encoding '{other}', expected 'json' or 'double'"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub model_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub device: DevicePreference,
    pub encoding: ResponseEncoding,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            device: DevicePreference::Auto,
            encoding: ResponseEncoding::Json,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = var("CLAIRE_MODEL_DIR") {
            config.model_dir = PathBuf::from(dir.trim());
        }
        if let Some(host) = var("CLAIRE_HOST") {
            config.host = host.trim().to_string();
        }
        if let Some(port) = var("CLAIRE_PORT") {
            config.port = port
                .trim()
                .parse()
                .with_context(|| format!("CLAIRE_PORT must be a port number, got '{port}'"))?;
        }
        if let Some(device) = var("CLAIRE_DEVICE") {
            config.device = DevicePreference::parse(&device);
        }
        if let Some(encoding) = var("CLAIRE_RESPONSE_ENCODING") {
            config.encoding = ResponseEncoding::parse(&encoding)?;
        }

        Ok(config)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_fixed_layout() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.model_dir, PathBuf::from("model-weights"));
        assert_eq!(config.bind_addr().unwrap().to_string(), "127.0.0.1:8000");
        assert_eq!(config.device, DevicePreference::Auto);
        assert_eq!(config.encoding, ResponseEncoding::Json);
    }

    #[test]
    fn overrides_are_applied() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("CLAIRE_MODEL_DIR", "/srv/models/sst2"),
            ("CLAIRE_HOST", "0.0.0.0"),
            ("CLAIRE_PORT", "9100"),
            ("CLAIRE_DEVICE", "cpu"),
            ("CLAIRE_RESPONSE_ENCODING", "double"),
        ]))
        .unwrap();
        assert_eq!(config.model_dir, PathBuf::from("/srv/models/sst2"));
        assert_eq!(config.bind_addr().unwrap().to_string(), "0.0.0.0:9100");
        assert_eq!(config.device, DevicePreference::Cpu);
        assert_eq!(config.encoding, ResponseEncoding::Double);
    }

    #[test]
    fn blank_values_keep_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[("CLAIRE_PORT", "  ")])).unwrap();
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn bad_port_is_rejected() {
        let err = ServerConfig::from_lookup(lookup(&[("CLAIRE_PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("CLAIRE_PORT"));
    }

    #[test]
    fn bad_encoding_is_rejected() {
        assert!(ServerConfig::from_lookup(lookup(&[("CLAIRE_RESPONSE_ENCODING", "xml")])).is_err());
    }
}
