use anyhow::{anyhow, Result};
use clap::ArgMatches;
use lazy_static::lazy_static;
use serde::{de::Error as _, Deserialize, Deserializer};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

pub const DEFAULT_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8443;
pub const DEFAULT_TLS_DIR: &str = "/run/secrets/tls";
pub const DEFAULT_TLS_CERT_FILE: &str = "tls.crt";
pub const DEFAULT_TLS_KEY_FILE: &str = "tls.key";

/// Looked up inside of the configuration directory, the first one found wins
const CONFIG_FILE_NAMES: [&str; 3] = ["config.yaml", "config.yml", "config.json"];

lazy_static! {
    pub(crate) static ref HOSTNAME: String =
        std::env::var("HOSTNAME").unwrap_or_else(|_| String::from("unknown"));
}

pub struct Config {
    pub addr: SocketAddr,
    pub tls_config: Option<TlsConfig>,
    pub default_allow_privilege_escalation: bool,
    pub log_level: String,
    pub log_fmt: String,
    pub log_no_color: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsConfig {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

/// Contents of the optional configuration file. Every value is optional,
/// command line flags and environment variables take precedence over it.
#[derive(Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct FileConfig {
    pub server: ServerFileConfig,
    pub app: AppFileConfig,
}

#[derive(Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerFileConfig {
    pub address: Option<String>,
    pub port: Option<u16>,
    pub tls: TlsFileConfig,
}

#[derive(Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct TlsFileConfig {
    #[serde(deserialize_with = "deserialize_boolish")]
    pub enabled: Option<bool>,
    pub dir: Option<PathBuf>,
    pub cert_file: Option<String>,
    pub key_file: Option<String>,
}

#[derive(Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct AppFileConfig {
    #[serde(deserialize_with = "deserialize_boolish")]
    pub default: Option<bool>,
}

impl Config {
    pub fn from_args(matches: &ArgMatches) -> Result<Self> {
        let config_path = matches
            .get_one::<String>("config-path")
            .map(PathBuf::from)
            .expect("This should not happen, there's a default value for config-path");
        let file_config = read_config_file(&config_path)?;

        let address = matches
            .get_one::<String>("address")
            .cloned()
            .or(file_config.server.address)
            .unwrap_or_else(|| DEFAULT_ADDRESS.to_owned());
        let port = matches
            .get_one::<u16>("port")
            .copied()
            .or(file_config.server.port)
            .unwrap_or(DEFAULT_PORT);
        let addr = api_bind_address(&address, port)?;

        let tls_enabled = matches
            .get_one::<bool>("tls-enabled")
            .copied()
            .or(file_config.server.tls.enabled)
            .unwrap_or_default();
        let tls_config = if tls_enabled {
            Some(tls_files(matches, file_config.server.tls))
        } else {
            None
        };

        let default_allow_privilege_escalation = matches
            .get_one::<bool>("default-allow-privilege-escalation")
            .copied()
            .or(file_config.app.default)
            .unwrap_or_default();

        let log_level = matches
            .get_one::<String>("log-level")
            .expect("This should not happen, there's a default value for log-level")
            .to_owned();
        let log_fmt = matches
            .get_one::<String>("log-fmt")
            .expect("This should not happen, there's a default value for log-fmt")
            .to_owned();
        let log_no_color = matches
            .get_one::<bool>("log-no-color")
            .expect("clap should have assigned a default value")
            .to_owned();

        Ok(Self {
            addr,
            tls_config,
            default_allow_privilege_escalation,
            log_level,
            log_fmt,
            log_no_color,
        })
    }
}

fn api_bind_address(address: &str, port: u16) -> Result<SocketAddr> {
    address
        .parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, port))
        .map_err(|e| anyhow!("error parsing bind address '{}': {}", address, e))
}

fn tls_files(matches: &ArgMatches, file_config: TlsFileConfig) -> TlsConfig {
    let dir = matches
        .get_one::<String>("tls-dir")
        .map(PathBuf::from)
        .or(file_config.dir)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TLS_DIR));
    let cert_file = matches
        .get_one::<String>("tls-cert-file")
        .cloned()
        .or(file_config.cert_file)
        .unwrap_or_else(|| DEFAULT_TLS_CERT_FILE.to_owned());
    let key_file = matches
        .get_one::<String>("tls-key-file")
        .cloned()
        .or(file_config.key_file)
        .unwrap_or_else(|| DEFAULT_TLS_KEY_FILE.to_owned());

    TlsConfig {
        cert_file: dir.join(cert_file),
        key_file: dir.join(key_file),
    }
}

/// Read the configuration file stored inside of `dir`.
/// Not having a configuration file is fine, having one that cannot be
/// parsed is not.
pub fn read_config_file(dir: &Path) -> Result<FileConfig> {
    let Some(path) = CONFIG_FILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
    else {
        return Ok(FileConfig::default());
    };

    let contents = std::fs::read_to_string(&path)
        .map_err(|e| anyhow!("cannot read config file {}: {}", path.display(), e))?;
    if contents.trim().is_empty() {
        return Ok(FileConfig::default());
    }

    // JSON documents are valid YAML too
    serde_yaml::from_str(&contents)
        .map_err(|e| anyhow!("cannot parse config file {}: {}", path.display(), e))
}

fn parse_boolish(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Some(true),
        "0" | "f" | "false" => Some(false),
        _ => None,
    }
}

fn deserialize_boolish<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Boolish {
        Bool(bool),
        Number(u8),
        Text(String),
    }

    match Option::<Boolish>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Boolish::Bool(value)) => Ok(Some(value)),
        Some(Boolish::Number(value)) => parse_boolish(&value.to_string())
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid boolean value: {value}"))),
        Some(Boolish::Text(value)) => parse_boolish(&value)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid boolean value: {value}"))),
    }
}
