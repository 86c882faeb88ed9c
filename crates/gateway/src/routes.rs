//! `POST /send-message` and `POST /send-media`.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use {
    axum::{
        Json,
        body::Bytes,
        extract::{FromRequest, Multipart, Request, State},
        http::header::CONTENT_TYPE,
        response::{IntoResponse, Response},
    },
    serde_json::{Value, json},
    tracing::{debug, info, warn},
    wagate_whatsapp::{DeliveryReceipt, format_phone_number},
};

use crate::{
    error::{ApiError, INVALID_VALUE},
    state::GatewayState,
};

// ── Request fields ───────────────────────────────────────────────────────────

/// Flat string fields of a JSON object, urlencoded form or multipart form
/// body.
///
/// JSON numbers and booleans are kept as their text; `null`, arrays and
/// objects count as absent.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RequestFields(HashMap<String, String>);

impl RequestFields {
    /// Parse `body` according to `content_type`. A body without a content
    /// type is read as JSON when it looks like an object, as a form
    /// otherwise.
    pub fn parse(content_type: Option<&str>, body: &[u8]) -> Result<Self, ApiError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        let as_json = match content_type {
            Some(ct) => is_json_content_type(ct),
            None => body.trim_ascii_start().starts_with(b"{"),
        };
        if as_json {
            Self::from_json(body)
        } else {
            let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)
                .map_err(|e| ApiError::MalformedBody(e.to_string()))?;
            Ok(Self(pairs.into_iter().collect()))
        }
    }

    /// Text parts of a multipart form. File parts are skipped.
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut fields = HashMap::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::MalformedBody(e.body_text()))?
        {
            let Some(name) = field.name().map(String::from) else {
                continue;
            };
            if field.file_name().is_some() {
                debug!(field = %name, "skipping multipart file part");
                continue;
            }
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::MalformedBody(e.body_text()))?;
            fields.insert(name, text);
        }
        Ok(Self(fields))
    }

    fn from_json(body: &[u8]) -> Result<Self, ApiError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| ApiError::MalformedBody(e.to_string()))?;
        let Value::Object(map) = value else {
            return Err(ApiError::MalformedBody("expected a JSON object".into()));
        };
        let fields = map
            .into_iter()
            .filter_map(|(key, value)| {
                let text = match value {
                    Value::String(s) => s,
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    Value::Null | Value::Array(_) | Value::Object(_) => return None,
                };
                Some((key, text))
            })
            .collect();
        Ok(Self(fields))
    }

    /// Non-empty value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Values of all `names`, or a validation error listing every missing
    /// or empty one.
    pub fn require<const N: usize>(
        &self,
        names: [&'static str; N],
    ) -> Result<[&str; N], ApiError> {
        let mut invalid = BTreeMap::new();
        let values = names.map(|name| {
            self.get(name).unwrap_or_else(|| {
                invalid.insert(name, INVALID_VALUE);
                ""
            })
        });
        if invalid.is_empty() {
            Ok(values)
        } else {
            Err(ApiError::Validation(invalid))
        }
    }
}

fn is_json_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || mime.ends_with("+json")
}

fn is_multipart_content_type(content_type: &str) -> bool {
    content_type
        .trim_start()
        .to_ascii_lowercase()
        .starts_with("multipart/form-data")
}

impl<S> FromRequest<S> for RequestFields
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        if content_type.as_deref().is_some_and(is_multipart_content_type) {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            return Self::from_multipart(multipart)
                .await
                .map_err(IntoResponse::into_response);
        }
        let body = Bytes::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;
        Self::parse(content_type.as_deref(), &body).map_err(IntoResponse::into_response)
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

fn delivered(receipt: DeliveryReceipt) -> Json<Value> {
    Json(json!({ "status": true, "response": receipt }))
}

async fn ensure_registered(state: &GatewayState, address: &str) -> Result<(), ApiError> {
    match state.client.is_registered(address).await {
        Ok(true) => Ok(()),
        Ok(false) => {
            info!(to = %address, "recipient is not registered");
            Err(ApiError::UnregisteredRecipient)
        },
        Err(e) => {
            warn!(to = %address, error = %e, "registration check failed");
            Err(e.into())
        },
    }
}

/// `POST /send-message { number, message }`
pub async fn send_message(
    State(state): State<Arc<GatewayState>>,
    fields: RequestFields,
) -> Result<Json<Value>, ApiError> {
    let [number, message] = fields.require(["number", "message"])?;
    let address = format_phone_number(number, &state.country_code);
    ensure_registered(&state, &address).await?;

    match state.client.send_text(&address, message).await {
        Ok(receipt) => {
            info!(to = %address, "message sent");
            Ok(delivered(receipt))
        },
        Err(e) => {
            warn!(to = %address, error = %e, "failed to send message");
            Err(e.into())
        },
    }
}

/// `POST /send-media { number, caption?, file }` where `file` is a URL.
pub async fn send_media(
    State(state): State<Arc<GatewayState>>,
    fields: RequestFields,
) -> Result<Json<Value>, ApiError> {
    let [number, file] = fields.require(["number", "file"])?;
    let caption = fields.get("caption");
    let address = format_phone_number(number, &state.country_code);
    ensure_registered(&state, &address).await?;

    let media = state.media.fetch(file).await.map_err(|e| {
        warn!(url = %file, error = %e, "failed to fetch media");
        ApiError::from(e)
    })?;

    match state.client.send_media(&address, media, caption).await {
        Ok(receipt) => {
            info!(to = %address, url = %file, "media sent");
            Ok(delivered(receipt))
        },
        Err(e) => {
            warn!(to = %address, error = %e, "failed to send media");
            Err(e.into())
        },
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_numbers_become_text() {
        let fields = RequestFields::parse(
            Some("application/json"),
            br#"{"number": 6281234, "message": "hi", "caption": null}"#,
        )
        .unwrap();
        assert_eq!(fields.get("number"), Some("6281234"));
        assert_eq!(fields.get("message"), Some("hi"));
        assert_eq!(fields.get("caption"), None);
    }

    #[test]
    fn parses_urlencoded_forms() {
        let fields = RequestFields::parse(
            Some("application/x-www-form-urlencoded"),
            b"number=0812+3456&message=halo%21",
        )
        .unwrap();
        assert_eq!(fields.get("number"), Some("0812 3456"));
        assert_eq!(fields.get("message"), Some("halo!"));
    }

    #[test]
    fn sniffs_json_without_content_type() {
        let fields = RequestFields::parse(None, br#" {"number":"1"}"#).unwrap();
        assert_eq!(fields.get("number"), Some("1"));
    }

    #[test]
    fn json_content_type_with_charset() {
        assert!(is_json_content_type("application/json; charset=utf-8"));
        assert!(is_json_content_type("application/vnd.api+json"));
        assert!(!is_json_content_type("text/plain"));
    }

    #[test]
    fn multipart_content_type_detection() {
        assert!(is_multipart_content_type("multipart/form-data; boundary=XB"));
        assert!(is_multipart_content_type("Multipart/Form-Data;boundary=x"));
        assert!(!is_multipart_content_type("application/x-www-form-urlencoded"));
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = RequestFields::parse(Some("application/json"), b"{nope").unwrap_err();
        assert!(matches!(err, ApiError::MalformedBody(_)));
        let err = RequestFields::parse(Some("application/json"), b"[1, 2]").unwrap_err();
        assert!(matches!(err, ApiError::MalformedBody(_)));
    }

    #[test]
    fn require_reports_every_missing_field() {
        let fields =
            RequestFields::parse(Some("application/json"), br#"{"number": ""}"#).unwrap();
        match fields.require(["number", "message"]) {
            Err(ApiError::Validation(invalid)) => {
                assert_eq!(invalid.len(), 2);
                assert_eq!(invalid["number"], INVALID_VALUE);
                assert_eq!(invalid["message"], INVALID_VALUE);
            },
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn empty_body_has_no_fields() {
        let fields = RequestFields::parse(Some("application/json"), b"").unwrap();
        assert_eq!(fields, RequestFields::default());
    }
}
