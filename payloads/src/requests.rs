use serde::{Deserialize, Serialize};

/// Body of a token renewal request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewTokens {
    pub refresh_token: String,
}
