//! System email service for magic-link sign-in messages.
//!
//! Uses the SMTP configuration from the main config file. When SMTP is not
//! configured, sends are skipped with a warning rather than failing the
//! caller; the flow that requested the email still completes.

use anyhow::Result;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::EmailConfig;

/// Service for sending system emails
#[derive(Clone)]
pub struct SystemEmailService {
    config: EmailConfig,
}

impl SystemEmailService {
    /// Create a new system email service
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Check if email sending is configured and enabled
    pub fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    /// Send a magic-link sign-in email
    pub async fn send_magic_link_email(
        &self,
        to_email: &str,
        organization: &str,
        link_url: &str,
        expires_in_minutes: i64,
    ) -> Result<()> {
        if !self.is_enabled() {
            tracing::warn!(
                "Email not configured, skipping magic-link email to {}",
                to_email
            );
            return Ok(());
        }

        let subject = "Your sign-in link";

        let html_body = render_magic_link_html(organization, link_url, expires_in_minutes);
        let text_body = render_magic_link_text(organization, link_url, expires_in_minutes);

        self.send_email(to_email, subject, &html_body, &text_body)
            .await
    }

    /// Send an email with HTML and plain text versions
    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<()> {
        let smtp_host = self
            .config
            .smtp_host
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("SMTP host not configured"))?;
        let from_address = self
            .config
            .from_address
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("From address not configured"))?;

        // Build the from mailbox with name
        let from_mailbox = format!("{} <{}>", self.config.from_name, from_address);
        let from: Mailbox = from_mailbox.parse()?;
        let to: Mailbox = to_email.parse()?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        // Build SMTP transport
        let mailer = if self.config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host)
        }
        .port(self.config.smtp_port);

        let mailer = if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            mailer.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            mailer
        };

        mailer.build().send(email).await?;

        tracing::info!(
            to = %to_email,
            subject = %subject,
            "Email sent successfully"
        );

        Ok(())
    }
}

/// Render the HTML version of the magic-link email
fn render_magic_link_html(organization: &str, link_url: &str, expires_in_minutes: i64) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Sign in</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, 'Helvetica Neue', Arial, sans-serif;
            margin: 0;
            padding: 0;
            background-color: #f5f5f5;
        }}
        .container {{
            max-width: 560px;
            margin: 0 auto;
            padding: 40px 20px;
        }}
        .card {{
            background-color: #ffffff;
            border-radius: 8px;
            box-shadow: 0 2px 8px rgba(0, 0, 0, 0.06);
            overflow: hidden;
        }}
        .header {{
            background-color: #111827;
            color: white;
            padding: 32px 24px;
            text-align: center;
        }}
        .content {{
            padding: 32px 24px;
            color: #374151;
            line-height: 1.6;
        }}
        .button-container {{
            text-align: center;
            margin: 32px 0;
        }}
        .button {{
            display: inline-block;
            background-color: #111827;
            color: #ffffff;
            padding: 12px 28px;
            border-radius: 6px;
            text-decoration: none;
            font-weight: 600;
        }}
        .footer {{
            padding: 16px 24px;
            text-align: center;
            color: #9ca3af;
            font-size: 12px;
        }}
    </style>
</head>
<body>
    <div class="container">
        <div class="card">
            <div class="header">
                <h1>Sign in to your member portal</h1>
            </div>
            <div class="content">
                <p>A sign-in link was requested for the {organization} account.</p>
                <div class="button-container">
                    <a class="button" href="{link_url}">Sign in</a>
                </div>
                <p>This link can be used once and expires in {expires_in_minutes} minutes.
                If you did not request it, you can safely ignore this email.</p>
            </div>
            <div class="footer">Veilport</div>
        </div>
    </div>
</body>
</html>
"#
    )
}

/// Render the plain text version of the magic-link email
fn render_magic_link_text(organization: &str, link_url: &str, expires_in_minutes: i64) -> String {
    format!(
        "Sign in to your member portal\n\n\
         A sign-in link was requested for the {organization} account:\n\n\
         {link_url}\n\n\
         This link can be used once and expires in {expires_in_minutes} minutes.\n\
         If you did not request it, you can safely ignore this email.\n\n\
         Veilport"
    )
}
