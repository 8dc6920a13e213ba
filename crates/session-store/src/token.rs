//! Login and renewal response payloads
//!
//! Both endpoints answer with a camelCase JSON object carrying `accessToken`.
//! A 2xx response without a usable token is treated as a failed exchange,
//! never as "logged in with no credential".

use serde::{Deserialize, Serialize};

use crate::credentials::Credential;
use crate::error::{Error, Result};

/// Body of a successful renewal call.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewalResponse {
    #[serde(default)]
    pub access_token: Option<String>,
}

/// Body of a successful login call.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    /// Profile of the logged-in staff member, cached alongside the token
    #[serde(default)]
    pub user: Option<serde_json::Value>,
}

fn require_token(token: Option<String>, endpoint: &str) -> Result<Credential> {
    match token {
        Some(t) if !t.is_empty() => Ok(Credential::new(t)),
        _ => Err(Error::MissingToken(format!("no access token in {endpoint} response"))),
    }
}

/// Extract the new credential from a renewal response body.
pub fn parse_renewal(body: &[u8]) -> Result<Credential> {
    let response: RenewalResponse = serde_json::from_slice(body)
        .map_err(|e| Error::Parse(format!("invalid renewal response: {e}")))?;
    require_token(response.access_token, "renewal")
}

/// Extract the credential and optional user profile from a login response body.
pub fn parse_login(body: &[u8]) -> Result<(Credential, Option<serde_json::Value>)> {
    let response: LoginResponse = serde_json::from_slice(body)
        .map_err(|e| Error::Parse(format!("invalid login response: {e}")))?;
    let credential = require_token(response.access_token, "login")?;
    Ok((credential, response.user))
}
