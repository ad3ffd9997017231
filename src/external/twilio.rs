use crate::config::TwilioConfig;
use crate::error::{AppError, AppResult};
use crate::external::{OtpSender, otp_message};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends codes through Twilio's Messages API.
#[derive(Clone)]
pub struct TwilioService {
    client: Client,
    config: TwilioConfig,
    base_url: String,
}

impl TwilioService {
    pub fn new(config: TwilioConfig) -> Self {
        Self::with_base_url(config, "https://api.twilio.com")
    }

    pub fn with_base_url(config: TwilioConfig, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            config,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.config.account_sid
        )
    }
}

#[async_trait]
impl OtpSender for TwilioService {
    async fn send(&self, phone: &str, code: &str, expires_in: Duration) -> AppResult<()> {
        let body = otp_message(code, expires_in);
        let params = [
            ("To", phone),
            ("From", self.config.from_phone.as_str()),
            ("Body", body.as_str()),
        ];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .timeout(SEND_TIMEOUT)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::DeliveryUnavailable(format!("SMS request failed: {e}")))?;

        if response.status().is_success() {
            log::info!("Verification code SMS sent successfully: {phone}");
            Ok(())
        } else {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            log::error!("Verification code SMS failed to send: {phone}, status: {status}, error: {error_text}");
            Err(AppError::DeliveryUnavailable(format!(
                "SMS provider returned {status}"
            )))
        }
    }
}
