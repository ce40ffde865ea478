/// Outbound email over SMTP.
///
/// With no SMTP host configured the service runs in no-op mode and logs the
/// message instead of sending it, which keeps local development and the
/// test suite free of mail infrastructure. Delivery failures are logged and
/// never surfaced to the request path; every send is fire-and-forget from
/// the caller's point of view.
use crate::config::EmailSettings;
use crate::error::{AuthError, Result};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, warn};

#[derive(Clone)]
pub struct EmailService {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
    frontend_base_url: String,
}

impl EmailService {
    pub fn new(settings: &EmailSettings) -> Result<Self> {
        let from: Mailbox = settings
            .smtp_from
            .parse()
            .map_err(|_| AuthError::Internal("invalid SMTP_FROM address".to_string()))?;

        let transport = if settings.smtp_host.is_empty() {
            info!("no SMTP host configured, email delivery disabled");
            None
        } else {
            let mut builder =
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_host)
                    .map_err(|e| AuthError::Internal(format!("smtp transport: {e}")))?
                    .port(settings.smtp_port);
            if let (Some(user), Some(pass)) = (&settings.smtp_username, &settings.smtp_password) {
                builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
            }
            Some(builder.build())
        };

        Ok(Self {
            transport,
            from,
            frontend_base_url: settings.frontend_base_url.clone(),
        })
    }

    pub async fn send_otp_code(&self, to: &str, code: &str) {
        let body = format!(
            "Your Shopedia verification code is {code}.\n\n\
             The code expires in a few minutes. If you did not request it, \
             ignore this message."
        );
        self.send(to, "Your Shopedia verification code", body).await;
    }

    pub async fn send_invite(&self, to: &str, token: &str) {
        let link = format!("{}/accept-invite?token={token}", self.frontend_base_url);
        let body = format!(
            "You have been invited to Shopedia.\n\n\
             Accept the invitation and choose a password here:\n{link}\n\n\
             The invitation expires in 24 hours."
        );
        self.send(to, "You have been invited to Shopedia", body).await;
    }

    pub async fn send_password_reset(&self, to: &str, token: &str) {
        let link = format!("{}/reset-password?token={token}", self.frontend_base_url);
        let body = format!(
            "A password reset was requested for your Shopedia account.\n\n\
             Reset your password here:\n{link}\n\n\
             If you did not request this, you can ignore this message."
        );
        self.send(to, "Reset your Shopedia password", body).await;
    }

    async fn send(&self, to: &str, subject: &str, body: String) {
        let Some(transport) = &self.transport else {
            info!(to, subject, "email delivery disabled, dropping message");
            return;
        };

        let to_mailbox: Mailbox = match to.parse() {
            Ok(m) => m,
            Err(e) => {
                warn!(to, error = %e, "invalid recipient address, dropping message");
                return;
            }
        };

        let message = match Message::builder()
            .from(self.from.clone())
            .to(to_mailbox)
            .subject(subject)
            .body(body)
        {
            Ok(m) => m,
            Err(e) => {
                warn!(to, error = %e, "failed to build message");
                return;
            }
        };

        if let Err(e) = transport.send(message).await {
            warn!(to, subject, error = %e, "email delivery failed");
        }
    }
}
