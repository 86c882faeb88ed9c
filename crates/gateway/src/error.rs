use std::collections::BTreeMap;

use {
    axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    serde_json::{Value, json},
};

/// Message attached to every field that fails validation.
pub const INVALID_VALUE: &str = "Invalid value";

pub const UNREGISTERED_MESSAGE: &str = "The number is not registered";

pub type Result<T> = std::result::Result<T, Error>;

/// Internal gateway errors (QR rendering).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("QR generation failed: {0}")]
    Qr(#[from] qrcode::types::QrError),

    #[error("PNG encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

// ── API errors ───────────────────────────────────────────────────────────────

/// Errors returned by the HTTP handlers, mapped to JSON responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Required fields missing or empty, keyed by field name.
    #[error("invalid fields: {}", .0.keys().copied().collect::<Vec<_>>().join(", "))]
    Validation(BTreeMap<&'static str, &'static str>),

    #[error("The number is not registered")]
    UnregisteredRecipient,

    /// The request body could not be parsed at all.
    #[error("malformed request body: {0}")]
    MalformedBody(String),

    /// The messaging client failed; `payload` is what the caller sees.
    #[error("{message}")]
    Delivery { message: String, payload: Value },

    #[error("{0}")]
    MediaFetch(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::UnregisteredRecipient => StatusCode::UNPROCESSABLE_ENTITY,
            Self::MalformedBody(_) => StatusCode::BAD_REQUEST,
            Self::Delivery { .. } | Self::MediaFetch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> Value {
        match self {
            Self::Validation(fields) => json!({ "status": false, "message": fields }),
            Self::UnregisteredRecipient | Self::MalformedBody(_) => {
                json!({ "status": false, "message": self.to_string() })
            },
            Self::Delivery { payload, .. } => json!({ "status": false, "response": payload }),
            Self::MediaFetch(message) => json!({ "status": false, "response": message }),
        }
    }
}

impl From<wagate_whatsapp::Error> for ApiError {
    fn from(err: wagate_whatsapp::Error) -> Self {
        if err.is_media_fetch() {
            return Self::MediaFetch(err.to_string());
        }
        Self::Delivery {
            message: err.to_string(),
            payload: err.to_payload(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_lists_each_field() {
        let mut fields = BTreeMap::new();
        fields.insert("number", INVALID_VALUE);
        fields.insert("message", INVALID_VALUE);
        let err = ApiError::Validation(fields);
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            err.body(),
            json!({
                "status": false,
                "message": { "number": "Invalid value", "message": "Invalid value" },
            })
        );
    }

    #[test]
    fn unregistered_is_422_with_plain_message() {
        let err = ApiError::UnregisteredRecipient;
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            err.body(),
            json!({ "status": false, "message": "The number is not registered" })
        );
    }

    #[test]
    fn client_errors_keep_vendor_payload() {
        let err: ApiError =
            wagate_whatsapp::Error::rejected(json!({ "message": "chat not found" })).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.body(),
            json!({ "status": false, "response": { "message": "chat not found" } })
        );

        let err: ApiError = wagate_whatsapp::Error::NotConnected.into();
        assert_eq!(
            err.body()["response"],
            "whatsapp client is not connected"
        );
    }

    #[test]
    fn media_fetch_maps_to_500() {
        let err: ApiError = wagate_whatsapp::Error::media_fetch("HTTP status 404").into();
        assert!(matches!(err, ApiError::MediaFetch(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.body()["response"],
            "failed to fetch media: HTTP status 404"
        );
    }
}
