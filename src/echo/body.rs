use base64::{Engine, engine::general_purpose};
use serde::{Deserialize, Serialize};

/// How the `body` field of an echo document is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyType {
    /// The payload was valid UTF-8 and is carried verbatim
    Text,
    /// The payload was binary and is carried as padded standard base64
    Base64,
}

impl BodyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BodyType::Text => "text",
            BodyType::Base64 => "base64",
        }
    }
}

/// Picks a JSON-safe rendering for a raw request payload.
///
/// Valid UTF-8 (including the empty payload) is returned as text, byte for
/// byte, so a leading BOM or embedded NULs survive. Anything else is encoded
/// with the RFC 4648 standard alphabet and `=` padding. The `Content-Type`
/// header is deliberately not consulted.
pub fn classify_body(raw: &[u8]) -> (String, BodyType) {
    match std::str::from_utf8(raw) {
        Ok(text) => (text.to_owned(), BodyType::Text),
        Err(_) => (general_purpose::STANDARD.encode(raw), BodyType::Base64),
    }
}
