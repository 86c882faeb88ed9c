//! Message types shared between the WhatsApp adapter and the auto-reply rules.

use serde::{Deserialize, Serialize};

/// A message received by the connected account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    /// Vendor message ID, used to quote the message in a reply.
    pub id: String,
    /// Chat address the message came from (`<digits>@c.us` or a group ID).
    pub from: String,
    #[serde(default)]
    pub body: String,
    /// True when the account itself sent the message from another device.
    #[serde(default)]
    pub from_me: bool,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_camel_case_with_defaults() {
        let msg: InboundMessage =
            serde_json::from_str(r#"{"id":"ABC","from":"6281234@c.us","fromMe":true}"#).unwrap();
        assert_eq!(msg.body, "");
        assert!(msg.from_me);
    }
}
