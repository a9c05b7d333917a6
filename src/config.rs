use std::{
    fmt, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

/// Start-up configuration for the bot.
///
/// Holds the account credentials and the settings for the sed engine and the
/// comment stream. It is read once and never changes while the bot runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// Credentials for the bot's account.
    pub reddit: Credentials,

    /// Explicit path to the sed executable.
    ///
    /// When `None`, sed is looked up on the `PATH`.
    sed_path: Option<PathBuf>,

    /// How long a single sed command may run before it is killed.
    sed_timeout: Duration,

    /// The longest wait between polls for new comments.
    max_backoff: Duration,
}

impl Config {
    /// Creates a configuration with default engine and stream settings.
    #[must_use]
    pub const fn new(reddit: Credentials) -> Self {
        Self {
            reddit,
            sed_path: None,
            sed_timeout: Duration::from_secs(default_sed_timeout_secs()),
            max_backoff: Duration::from_secs(default_max_backoff_secs()),
        }
    }

    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Returns the configured sed executable, if any.
    #[must_use]
    pub fn sed_path(&self) -> Option<&Path> {
        self.sed_path.as_deref()
    }

    /// Returns how long a single sed command may run.
    #[must_use]
    pub const fn sed_timeout(&self) -> Duration {
        self.sed_timeout
    }

    /// Returns the longest wait between polls for new comments.
    #[must_use]
    pub const fn max_backoff(&self) -> Duration {
        self.max_backoff
    }
}

/// Errors that can occur when loading the configuration.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The file could not be read.
    #[error("failed to read config file")]
    Io(#[from] io::Error),

    /// The file is not a valid configuration.
    #[error("failed to parse config file")]
    Toml(#[from] toml::de::Error),
}

/// Script-application credentials for the bot's account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// The OAuth client id of the script application.
    pub client_id: String,
    /// The OAuth client secret of the script application.
    pub client_secret: String,
    /// The bot account's username.
    pub username: String,
    /// The bot account's password.
    pub password: String,
    /// The `User-Agent` sent with every request.
    pub user_agent: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("username", &self.username)
            .field("password", &"***")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

const fn default_sed_timeout_secs() -> u64 {
    5
}

const fn default_max_backoff_secs() -> u64 {
    16
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        reddit: Credentials,

        #[serde(default)]
        sed: SedV1,

        #[serde(default)]
        stream: StreamV1,
    },
}

#[derive(Serialize, Deserialize)]
struct SedV1 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,

    #[serde(default = "default_sed_timeout_secs")]
    timeout_secs: u64,
}

impl Default for SedV1 {
    fn default() -> Self {
        Self {
            path: None,
            timeout_secs: default_sed_timeout_secs(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct StreamV1 {
    #[serde(default = "default_max_backoff_secs")]
    max_backoff_secs: u64,
}

impl Default for StreamV1 {
    fn default() -> Self {
        Self {
            max_backoff_secs: default_max_backoff_secs(),
        }
    }
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                reddit,
                sed,
                stream,
            } => Self {
                reddit,
                sed_path: sed.path,
                sed_timeout: Duration::from_secs(sed.timeout_secs),
                max_backoff: Duration::from_secs(stream.max_backoff_secs),
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            reddit: config.reddit,
            sed: SedV1 {
                path: config.sed_path,
                timeout_secs: config.sed_timeout.as_secs(),
            },
            stream: StreamV1 {
                max_backoff_secs: config.max_backoff.as_secs(),
            },
        }
    }
}
