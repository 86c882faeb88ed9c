use std::path::PathBuf;

/// Crate-wide result type for WhatsApp adapter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed adapter errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The vendor client rejected a call (invalid address, session not ready, ...).
    #[error("{message}")]
    Delivery {
        message: String,
        /// Raw error value reported by the vendor, when there is one.
        payload: Option<serde_json::Value>,
    },

    /// Downloading the media referenced by a send request failed.
    #[error("failed to fetch media: {message}")]
    MediaFetch { message: String },

    /// No live connection to the sidecar.
    #[error("whatsapp client is not connected")]
    NotConnected,

    /// The sidecar did not answer a request in time.
    #[error("whatsapp client did not answer request {request_id}")]
    Timeout { request_id: String },

    /// Reading or writing the session file failed.
    #[error("session file {}: {source}", path.display())]
    Session {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

impl Error {
    #[must_use]
    pub fn delivery(message: impl std::fmt::Display) -> Self {
        Self::Delivery {
            message: message.to_string(),
            payload: None,
        }
    }

    /// Delivery error carrying the vendor's raw rejection value.
    #[must_use]
    pub fn rejected(payload: serde_json::Value) -> Self {
        let message = match &payload {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Object(obj) => obj
                .get("message")
                .and_then(serde_json::Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| payload.to_string()),
            serde_json::Value::Null => "request rejected".to_string(),
            other => other.to_string(),
        };
        Self::Delivery {
            message,
            payload: Some(payload),
        }
    }

    /// JSON value describing this error for API responses: the vendor's raw
    /// payload when available, the display string otherwise.
    pub fn to_payload(&self) -> serde_json::Value {
        match self {
            Self::Delivery {
                payload: Some(payload),
                ..
            } => payload.clone(),
            other => serde_json::Value::String(other.to_string()),
        }
    }

    #[must_use]
    pub fn media_fetch(message: impl std::fmt::Display) -> Self {
        Self::MediaFetch {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn session(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Session {
            path: path.into(),
            source,
        }
    }

    /// True when the error came from fetching media rather than from the
    /// vendor client.
    pub fn is_media_fetch(&self) -> bool {
        matches!(self, Self::MediaFetch { .. })
    }
}

impl wagate_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

wagate_common::impl_context!();
