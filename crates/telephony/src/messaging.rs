use std::time::Duration;

use async_trait::async_trait;
use dialtone_core::config::TelephonyConfig;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

const API_VERSION: &str = "2010-04-01";
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub to: String,
    pub from: String,
    pub body: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SentMessage {
    pub sid: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountSummary {
    pub friendly_name: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("provider request failed: {0}")]
    Transport(String),
    #[error("provider rejected request with status {status}: {detail}")]
    Rejected { status: u16, detail: String },
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<SentMessage, SendError>;
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountResource {
    friendly_name: Option<String>,
    status: Option<String>,
}

#[derive(Clone)]
pub struct TwilioMessagingClient {
    client: Client,
    api_base_url: String,
    account_sid: String,
    auth_token: SecretString,
}

impl std::fmt::Debug for TwilioMessagingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioMessagingClient")
            .field("api_base_url", &self.api_base_url)
            .field("account_sid", &self.account_sid)
            .finish_non_exhaustive()
    }
}

impl TwilioMessagingClient {
    pub fn new(
        api_base_url: impl Into<String>,
        account_sid: impl Into<String>,
        auth_token: SecretString,
    ) -> Self {
        let api_base_url = api_base_url.into().trim().trim_end_matches('/').to_string();
        Self { client: Client::new(), api_base_url, account_sid: account_sid.into(), auth_token }
    }

    pub fn from_config(config: &TelephonyConfig) -> Self {
        Self::new(&config.api_base_url, config.account_sid.trim(), config.auth_token.clone())
    }

    fn account_url(&self) -> String {
        format!("{}/{API_VERSION}/Accounts/{}", self.api_base_url, self.account_sid)
    }

    /// Fetches the account resource; succeeds only when the credentials are accepted.
    pub async fn verify_credentials(&self) -> Result<AccountSummary, SendError> {
        let response = self
            .client
            .get(format!("{}.json", self.account_url()))
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .timeout(PROVIDER_TIMEOUT)
            .send()
            .await
            .map_err(|err| SendError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SendError::Rejected { status: status.as_u16(), detail });
        }

        let account: AccountResource =
            response.json().await.map_err(|err| SendError::Transport(err.to_string()))?;
        Ok(AccountSummary { friendly_name: account.friendly_name, status: account.status })
    }
}

#[async_trait]
impl MessageSender for TwilioMessagingClient {
    async fn send(&self, message: &OutboundMessage) -> Result<SentMessage, SendError> {
        let result = self
            .client
            .post(format!("{}/Messages.json", self.account_url()))
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .timeout(PROVIDER_TIMEOUT)
            .form(&[
                ("To", message.to.as_str()),
                ("From", message.from.as_str()),
                ("Body", message.body.as_str()),
            ])
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                error!(
                    event_name = "telephony.send_failed",
                    to = %message.to,
                    error = %err,
                    "sms send request failed"
                );
                return Err(SendError::Transport(err.to_string()));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            error!(
                event_name = "telephony.send_rejected",
                to = %message.to,
                status = status.as_u16(),
                "provider rejected sms"
            );
            return Err(SendError::Rejected { status: status.as_u16(), detail });
        }

        let sid = response.json::<MessageResource>().await.ok().and_then(|resource| resource.sid);
        info!(
            event_name = "telephony.sms_sent",
            to = %message.to,
            message_sid = sid.as_deref().unwrap_or("unknown"),
            "sms reply dispatched"
        );
        Ok(SentMessage { sid })
    }
}

#[cfg(test)]
mod tests {
    use super::TwilioMessagingClient;

    #[test]
    fn debug_output_omits_auth_token() {
        let client = TwilioMessagingClient::new(
            "https://api.twilio.com/",
            "AC0001",
            "very-secret-token".to_string().into(),
        );

        let debug = format!("{client:?}");
        assert!(!debug.contains("very-secret-token"));
        assert_eq!(client.account_url(), "https://api.twilio.com/2010-04-01/Accounts/AC0001");
    }
}
