//! Session provider backed by the Azure CLI's signed-in account.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;

use super::az_cli::{first_error_line, AzCli};
use super::{Session, SessionProvider};
use crate::error::PluginError;

/// Tokens expiring sooner than this are refreshed instead of reused.
const REFRESH_MARGIN: Duration = Duration::from_secs(300);

const NOT_SIGNED_IN: &str = "Not signed in to Azure. Run 'az login' and try again.";

/// Relevant fields of `az account get-access-token --output json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessTokenResponse {
    access_token: String,
    tenant: Option<String>,
    /// Unix seconds; present in az >= 2.54.
    #[serde(rename = "expires_on")]
    expires_on: Option<i64>,
}

/// Resolves sessions from `az account get-access-token`, caching the token
/// until shortly before it expires.
pub struct AzCliSessionProvider {
    az: AzCli,
    resource: String,
    cached: Mutex<Option<Session>>,
}

impl AzCliSessionProvider {
    /// `arm_endpoint` is the resource the token is requested for.
    pub fn new(az: AzCli, arm_endpoint: &str) -> Self {
        Self {
            az,
            resource: format!("{}/", arm_endpoint.trim_end_matches('/')),
            cached: Mutex::new(None),
        }
    }

    async fn fetch_session(&self) -> crate::Result<Session> {
        let output = self
            .az
            .run(&[
                "account",
                "get-access-token",
                "--resource",
                &self.resource,
                "--output",
                "json",
            ])
            .await
            .map_err(|e| PluginError::AuthNotReady(format!("{} ({})", NOT_SIGNED_IN, e)))?;

        if !output.success {
            let message = match first_error_line(&output.stderr) {
                Some(line) => format!("{} ({})", NOT_SIGNED_IN, line),
                None => NOT_SIGNED_IN.to_string(),
            };
            return Err(PluginError::AuthNotReady(message));
        }

        parse_access_token(&output.stdout)
    }
}

#[async_trait]
impl SessionProvider for AzCliSessionProvider {
    async fn get_ready_session(&self) -> crate::Result<Session> {
        let mut cached = self.cached.lock().await;
        if let Some(session) = cached.as_ref().filter(|s| is_fresh(s, now_unix())) {
            return Ok(session.clone());
        }

        let session = self.fetch_session().await?;
        tracing::debug!(tenant = ?session.tenant_id, "resolved Azure session");
        *cached = Some(session.clone());
        Ok(session)
    }
}

fn parse_access_token(stdout: &str) -> crate::Result<Session> {
    let response: AccessTokenResponse = serde_json::from_str(stdout).map_err(|e| {
        PluginError::AuthNotReady(format!("unexpected az access token output: {}", e))
    })?;

    if response.access_token.is_empty() {
        return Err(PluginError::AuthNotReady(NOT_SIGNED_IN.to_string()));
    }

    Ok(Session {
        access_token: response.access_token,
        tenant_id: response.tenant,
        expires_on: response.expires_on,
    })
}

fn is_fresh(session: &Session, now: i64) -> bool {
    match session.expires_on {
        Some(expires_on) => expires_on - now > REFRESH_MARGIN.as_secs() as i64,
        // Without an expiry we cannot tell; re-resolve every time.
        None => false,
    }
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
