use thiserror::Error;

/// Failures of the bus itself: routing, calls and hub threads
#[derive(Error, Debug)]
pub enum BusError {
    #[error("Component name already registered: {0}")]
    DuplicateName(String),

    #[error("Component not found: {0}")]
    ComponentNotFound(String),

    #[error("Hub not found: {0}")]
    HubNotFound(usize),

    #[error("Hub {0} is closed")]
    HubClosed(String),

    #[error("Method {method} is not exported by {component}")]
    UnknownMethod { component: String, method: String },

    #[error("Call to {component}.{method} timed out")]
    CallTimeout { component: String, method: String },

    #[error("Call to {component}.{method} failed: {message}")]
    CallFailed {
        component: String,
        method: String,
        message: String,
    },

    #[error("Synchronous call to {0} from its own hub would deadlock")]
    ReentrantCall(String),

    #[error("Failed to start hub thread")]
    ThreadSpawnFailed(#[source] std::io::Error),
}

/// Failures raised by a component while starting, handling a message or
/// serving an exported call.
#[derive(Error, Debug)]
pub enum ComponentError {
    #[error("Invalid argument for {method}: {message}")]
    InvalidArgument { method: String, message: String },

    #[error("Unknown mode: {0}")]
    UnknownMode(String),

    #[error("Unknown component kind: {0}")]
    UnknownKind(String),

    #[error("Failed to start background task")]
    TaskSpawnFailed(#[source] std::io::Error),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Heart(#[from] HeartError),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),
}

impl ComponentError {
    /// The method is not in the component's export table
    pub fn unknown_method(component: &str, method: &str) -> Self {
        BusError::UnknownMethod {
            component: component.to_string(),
            method: method.to_string(),
        }
        .into()
    }

    pub fn invalid_argument(method: &str, message: impl Into<String>) -> Self {
        ComponentError::InvalidArgument {
            method: method.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum HeartError {
    #[error("Failed to open heart-rate source {path}")]
    OpenFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read heart-rate source")]
    ReadFailed(#[source] std::io::Error),

    #[error("Malformed heart-rate record: {line}")]
    Malformed {
        line: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("Failed to read calibration for axis {axis}")]
    LoadFailed {
        axis: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save calibration for axis {axis}")]
    SaveFailed {
        axis: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Failed to connect to controller socket {path}")]
    ConnectFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Controller connection closed")]
    Closed,

    #[error("Controller I/O failed")]
    Io(#[from] std::io::Error),

    #[error("Malformed controller frame")]
    Malformed(#[from] serde_json::Error),

    #[error("Controller call timed out")]
    Timeout,

    #[error("Remote call failed: {0}")]
    Remote(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Type alias for application Results using anyhow for context chaining
pub type AppResult<T> = anyhow::Result<T>;
