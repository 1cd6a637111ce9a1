use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;

/// Default Pub/Sub endpoint used when `PUBSUB_BASE_URL` is not set.
pub const DEFAULT_PUBSUB_BASE_URL: &str = "https://pubsub.googleapis.com";

/// Name of the bound service whose credentials carry the Pub/Sub settings.
pub const DEFAULT_SERVICE_NAME: &str = "pubsub";

// Credential keys exposed by the Pub/Sub service broker binding.
const PROJECT_ID_KEY: &str = "projectId";
const TOPIC_ID_KEY: &str = "topicId";
const PRIVATE_KEY_DATA_KEY: &str = "privateKeyData";

/// Startup configuration errors. Every variant is fatal: the process must not
/// serve traffic without a complete set of publisher settings.
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// A required setting was found neither in the explicit configuration nor
    /// in the bound service credentials.
    MissingSetting(&'static str),
    /// `VCAP_SERVICES` could not be parsed as a bound-services document.
    MalformedServices(String),
    /// No bound service with the configured name exists.
    ServiceNotBound(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::MissingSetting(name) => write!(f, "Couldn't find {name}"),
            ConfigError::MalformedServices(reason) => {
                write!(f, "Couldn't parse VCAP_SERVICES: {reason}")
            }
            ConfigError::ServiceNotBound(name) => {
                write!(f, "Couldn't find bound service named '{name}'")
            }
        }
    }
}

impl StdError for ConfigError {}

/// Fully resolved settings needed to reach one topic.
pub struct PublisherSettings {
    pub project_id: String,
    pub topic_id: String,
    pub private_key_data: SecretString,
    pub base_url: String,
}

impl fmt::Debug for PublisherSettings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PublisherSettings")
            .field("project_id", &self.project_id)
            .field("topic_id", &self.topic_id)
            .field("private_key_data", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct BoundService {
    name: String,
    #[serde(default)]
    credentials: HashMap<String, Value>,
}

#[derive(Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "0.0.0.0")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 8080)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// The Google Cloud project that owns the topic.
    #[arg(long, env = "GOOGLE_CLOUD_PROJECT")]
    project_id: Option<String>,

    /// The Pub/Sub topic messages are published to.
    #[arg(long, env = "PUBSUB_TOPIC")]
    topic_id: Option<String>,

    /// Service account key, either raw JSON or base64 encoded JSON.
    #[arg(long, env = "PUBSUB_PRIVATE_KEY_DATA", hide_env_values = true)]
    private_key_data: Option<String>,

    /// Cloud Foundry bound services document. Settings not given explicitly
    /// are read from the credentials of the service named by `service_name`.
    #[arg(long, env = "VCAP_SERVICES", hide_env_values = true)]
    vcap_services: Option<String>,

    /// Name of the bound Pub/Sub service inside `VCAP_SERVICES`.
    #[arg(long, env = "PUBSUB_SERVICE_NAME", default_value = DEFAULT_SERVICE_NAME)]
    service_name: String,

    /// The Pub/Sub API endpoint.
    /// Override in tests to point at a mock server.
    #[arg(long, env = "PUBSUB_BASE_URL", default_value = DEFAULT_PUBSUB_BASE_URL)]
    pubsub_base_url: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Config")
            .field("interface", &self.interface)
            .field("port", &self.port)
            .field("log_level_filter", &self.log_level_filter)
            .field("project_id", &self.project_id)
            .field("topic_id", &self.topic_id)
            .field(
                "private_key_data",
                &self.private_key_data.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "vcap_services",
                &self.vcap_services.as_ref().map(|_| "[REDACTED]"),
            )
            .field("service_name", &self.service_name)
            .field("pubsub_base_url", &self.pubsub_base_url)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn interface(&self) -> &str {
        self.interface.as_deref().unwrap_or("0.0.0.0")
    }

    /// Returns the Pub/Sub API base URL.
    pub fn pubsub_base_url(&self) -> &str {
        &self.pubsub_base_url
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Resolves the project, topic and key needed to publish.
    ///
    /// Explicitly configured values take precedence over the credentials of
    /// the bound service. Each of the three is required.
    pub fn publisher_settings(&self) -> Result<PublisherSettings, ConfigError> {
        let credentials = match self.vcap_services.as_deref() {
            Some(vcap) if !vcap.trim().is_empty() => {
                Some(bound_service_credentials(vcap, &self.service_name)?)
            }
            _ => None,
        };

        let lookup = |explicit: &Option<String>, key: &'static str| -> Option<String> {
            explicit
                .clone()
                .filter(|value| !value.is_empty())
                .or_else(|| {
                    credentials
                        .as_ref()
                        .and_then(|creds| creds.get(key))
                        .and_then(Value::as_str)
                        .filter(|value| !value.is_empty())
                        .map(str::to_string)
                })
        };

        let project_id =
            lookup(&self.project_id, PROJECT_ID_KEY).ok_or(ConfigError::MissingSetting("project id"))?;
        let topic_id =
            lookup(&self.topic_id, TOPIC_ID_KEY).ok_or(ConfigError::MissingSetting("topic id"))?;
        let private_key_data = lookup(&self.private_key_data, PRIVATE_KEY_DATA_KEY)
            .ok_or(ConfigError::MissingSetting("private key data"))?;

        Ok(PublisherSettings {
            project_id,
            topic_id,
            private_key_data: SecretString::new(private_key_data),
            base_url: self.pubsub_base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// Finds the credentials of the service named `name` in a `VCAP_SERVICES`
/// document, searching across every service label.
fn bound_service_credentials(
    vcap: &str,
    name: &str,
) -> Result<HashMap<String, Value>, ConfigError> {
    let services: HashMap<String, Vec<BoundService>> = serde_json::from_str(vcap)
        .map_err(|err| ConfigError::MalformedServices(err.to_string()))?;

    services
        .into_values()
        .flatten()
        .find(|service| service.name == name)
        .map(|service| service.credentials)
        .ok_or_else(|| ConfigError::ServiceNotBound(name.to_string()))
}
