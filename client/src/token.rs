use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum TokenDecodeError {
    #[error("Token is not a JWT")]
    Format,
    #[error("Token claims are not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("Token claims are not valid: {0}")]
    Claims(#[from] serde_json::Error),
}

/// Extracts the subject from an access token.
pub trait TokenDecoder {
    fn subject(&self, token: &str) -> Result<String, TokenDecodeError>;
}

/// Reads the `sub` claim of a JWT. The signature is not verified; the
/// server does that.
#[derive(Debug, Clone, Copy, Default)]
pub struct JwtSubjectDecoder;

#[derive(Deserialize)]
struct Claims {
    sub: String,
}

impl TokenDecoder for JwtSubjectDecoder {
    fn subject(&self, token: &str) -> Result<String, TokenDecodeError> {
        let claims = token.split('.').nth(1).ok_or(TokenDecodeError::Format)?;
        let claims = URL_SAFE_NO_PAD.decode(claims.trim_end_matches('='))?;
        let claims: Claims = serde_json::from_slice(&claims)?;
        Ok(claims.sub)
    }
}
