//! Application error types.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

/// Launcher error carrying a kind and a small key/value payload.
#[derive(Debug)]
pub struct AppError {
    payload: HashMap<String, String>,
    kind: ErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Instance is already starting or running
    InstanceRunning,
    /// Configuration error
    Config,
    /// File system error
    Io,
    /// Network error
    Network,
    /// The dev server binary could not be launched
    Spawn,
    /// The dev server wrote to stderr before it was ready
    StartupOutput,
    /// The dev server exited before it was ready
    EarlyExit,
    /// An on-ready hook failed
    Hook,
    /// Process control error
    Process,
    /// General error
    Other,
}

impl ErrorKind {
    pub fn code(&self) -> u32 {
        match self {
            Self::InstanceRunning => 1002,
            Self::Config => 2001,
            Self::Io => 2002,
            Self::Network => 2003,
            Self::Spawn => 3001,
            Self::StartupOutput => 3002,
            Self::EarlyExit => 3003,
            Self::Hook => 3004,
            Self::Process => 3005,
            Self::Other => 9999,
        }
    }
}

impl AppError {
    pub fn new(kind: ErrorKind, payload: HashMap<String, String>) -> Self {
        Self { payload, kind }
    }

    /// Create an error with a single "detail" key from a non-empty string,
    /// or an empty payload if the string is empty.
    fn with_detail(kind: ErrorKind, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let payload = if detail.is_empty() {
            HashMap::new()
        } else {
            HashMap::from([("detail".to_string(), detail)])
        };
        Self::new(kind, payload)
    }

    pub fn instance_running(name: &str) -> Self {
        Self::new(
            ErrorKind::InstanceRunning,
            HashMap::from([("name".to_string(), name.to_string())]),
        )
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Config, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Io, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Network, message)
    }

    pub fn network_with_url(url: &str, detail: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Network,
            HashMap::from([
                ("url".to_string(), url.to_string()),
                ("detail".to_string(), detail.into()),
            ]),
        )
    }

    pub fn spawn(program: &str, detail: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Spawn,
            HashMap::from([
                ("program".to_string(), program.to_string()),
                ("detail".to_string(), detail.into()),
            ]),
        )
    }

    /// Raw stderr text the process produced before signalling readiness.
    pub fn startup_output(stderr: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::StartupOutput,
            HashMap::from([("stderr".to_string(), stderr.into())]),
        )
    }

    pub fn early_exit(code: Option<i32>) -> Self {
        let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
        Self::new(
            ErrorKind::EarlyExit,
            HashMap::from([("code".to_string(), code)]),
        )
    }

    pub fn hook(command: &str, detail: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Hook,
            HashMap::from([
                ("command".to_string(), command.to_string()),
                ("detail".to_string(), detail.into()),
            ]),
        )
    }

    pub fn process(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Process, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Other, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn payload(&self, key: &str) -> Option<&str> {
        self.payload.get(key).map(String::as_str)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.payload.is_empty() {
            write!(f, "{:?}", self.kind)
        } else {
            let mut pairs: Vec<String> = self
                .payload
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            pairs.sort();
            write!(f, "{:?}: {}", self.kind, pairs.join(", "))
        }
    }
}

impl std::error::Error for AppError {}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct as _;
        let mut s = serializer.serialize_struct("AppError", 2)?;
        s.serialize_field("code", &self.kind.code())?;
        s.serialize_field("payload", &self.payload)?;
        s.end()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::network(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::config(err.to_string())
    }
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, AppError>;
