//! Outbound delivery of one-time codes.
//!
//! Delivery is fire-and-forget: a failure is reported to the caller but never touches
//! the challenge that was already issued.

pub mod twilio;

pub use twilio::*;

use crate::error::AppResult;
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait OtpSender: Send + Sync {
    async fn send(&self, phone: &str, code: &str, expires_in: Duration) -> AppResult<()>;
}

pub fn otp_message(code: &str, expires_in: Duration) -> String {
    let minutes = expires_in.as_secs().div_ceil(60).max(1);
    format!("Your verification code is: {code}. It expires in {minutes} minutes.")
}

/// Development sender: writes the code to the log instead of sending an SMS.
#[derive(Clone, Default)]
pub struct LogSender;

#[async_trait]
impl OtpSender for LogSender {
    async fn send(&self, phone: &str, code: &str, expires_in: Duration) -> AppResult<()> {
        log::info!(
            "SMS OTP (DEVELOPMENT MODE) to {phone}: {}",
            otp_message(code, expires_in)
        );
        Ok(())
    }
}
