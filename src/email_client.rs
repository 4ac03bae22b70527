use async_trait::async_trait;
use mail_send::{SmtpClientBuilder, mail_builder::MessageBuilder};

use crate::config::SmtpConfig;

/// Outbound-notification capability. The password-reset flow and the user
/// module depend on this seam, never on the SMTP client directly.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_password_reset_otp(
        &self,
        email: &str,
        name: &str,
        otp: &str,
    ) -> Result<(), mail_send::Error>;

    async fn send_profile_update_notice(
        &self,
        email: &str,
        name: &str,
        content: &str,
    ) -> Result<(), mail_send::Error>;
}

pub struct SmtpNotifier {
    config: SmtpConfig,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    async fn send(&self, to: &str, subject: &str, body: String) -> Result<(), mail_send::Error> {
        let message = MessageBuilder::new()
            .from(self.config.username.as_str())
            .to(to)
            .subject(subject)
            .text_body(body);

        SmtpClientBuilder::new(self.config.server.as_str(), self.config.port)
            .implicit_tls(false)
            .credentials((self.config.username.as_str(), self.config.password.as_str()))
            .connect()
            .await?
            .send(message)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_password_reset_otp(
        &self,
        email: &str,
        name: &str,
        otp: &str,
    ) -> Result<(), mail_send::Error> {
        let body = format!(
            "Hi {name},\n\n\
             Use the OTP below to reset your password. If you did not request this, \
             please ignore this email.\n\n\
             {otp}\n\n\
             This OTP is valid for 10 minutes. Do not share it with anyone.",
        );

        self.send(email, "Reset Your Password - TaskFlow Manager", body)
            .await
    }

    async fn send_profile_update_notice(
        &self,
        email: &str,
        name: &str,
        content: &str,
    ) -> Result<(), mail_send::Error> {
        let body = format!(
            "Hi {name},\n\n\
             {content}\n\n\
             If these changes were not made by you, please contact support.",
        );

        self.send(email, "Profile Updated - TaskFlow Manager", body)
            .await
    }
}
