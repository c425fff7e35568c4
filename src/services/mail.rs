//! Outbound mail
//!
//! `MailTransport` is the seam between the code that composes messages and
//! the way they leave the process: SMTP in production, the log during
//! development, lettre's stub transport in tests.

use crate::config::{MailConfig, MailTransportKind, ServerConfig};
use crate::models::{Package, PublicUser, User};
use crate::templates::{TemplateEngine, FLAG_EMAIL_BODY, FLAG_EMAIL_SUBJECT};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::{smtp::authentication::Credentials, stub::AsyncStubTransport},
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;
use tera::Context as TeraContext;

/// Something that can deliver a composed message
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, message: Message) -> Result<()>;
}

#[async_trait]
impl MailTransport for AsyncSmtpTransport<Tokio1Executor> {
    async fn deliver(&self, message: Message) -> Result<()> {
        self.send(message)
            .await
            .map_err(|e| anyhow!("SMTP delivery failed: {}", e))?;
        Ok(())
    }
}

#[async_trait]
impl MailTransport for AsyncStubTransport {
    async fn deliver(&self, message: Message) -> Result<()> {
        self.send(message)
            .await
            .map_err(|e| anyhow!("Stub delivery failed: {}", e))?;
        Ok(())
    }
}

/// Writes messages to the log instead of sending them
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn deliver(&self, message: Message) -> Result<()> {
        let envelope = message.envelope();
        let recipients: Vec<String> = envelope.to().iter().map(ToString::to_string).collect();
        tracing::info!(
            from = ?envelope.from().map(ToString::to_string),
            to = %recipients.join(", "),
            "Outgoing mail (log transport)\n{}",
            String::from_utf8_lossy(&message.formatted())
        );
        Ok(())
    }
}

/// Build the transport selected in the configuration
pub fn build_transport(config: &MailConfig) -> Result<Arc<dyn MailTransport>> {
    match config.transport {
        MailTransportKind::Log => Ok(Arc::new(LogTransport)),
        MailTransportKind::Smtp => {
            let mut builder = if !config.tls {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
            } else if config.smtp_port == 465 {
                AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
                    .context("Failed to create SMTP transport")?
            } else {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                    .context("Failed to create SMTP transport")?
            };

            builder = builder.port(config.smtp_port);
            if let Some(username) = &config.username {
                let password = config.password.clone().unwrap_or_default();
                builder = builder.credentials(Credentials::new(username.clone(), password));
            }

            tracing::info!(
                "Mail via SMTP {}:{} (tls: {})",
                config.smtp_host,
                config.smtp_port,
                config.tls
            );
            Ok(Arc::new(builder.build()))
        }
    }
}

/// Sends package flag notifications to the managers
pub struct FlagNotifier {
    templates: Arc<TemplateEngine>,
    transport: Arc<dyn MailTransport>,
    server: ServerConfig,
    from: Mailbox,
    managers: Vec<Mailbox>,
}

impl FlagNotifier {
    /// Validate the configured addresses up front so a typo fails at startup
    pub fn new(
        templates: Arc<TemplateEngine>,
        transport: Arc<dyn MailTransport>,
        server: ServerConfig,
        mail: &MailConfig,
    ) -> Result<Self> {
        let from: Mailbox = mail
            .from
            .parse()
            .with_context(|| format!("Invalid mail.from address: {}", mail.from))?;

        let managers = mail
            .managers
            .iter()
            .map(|manager| {
                let address: Address = manager
                    .email
                    .parse()
                    .with_context(|| format!("Invalid manager address: {}", manager.email))?;
                Ok(Mailbox::new(Some(manager.name.clone()), address))
            })
            .collect::<Result<Vec<_>>>()?;

        if managers.is_empty() {
            tracing::warn!("No managers configured; package flags cannot be delivered");
        }

        Ok(Self {
            templates,
            transport,
            server,
            from,
            managers,
        })
    }

    /// Render and send one flag e-mail addressed to every manager
    pub async fn notify(&self, user: &User, package: &Package, reason: &str) -> Result<()> {
        if self.managers.is_empty() {
            bail!("No managers configured to receive flag notifications");
        }

        let mut context = TeraContext::new();
        context.insert("user", &PublicUser::from(user));
        context.insert("user_url", &self.server.absolute_url(&user.url_path()));
        context.insert("package", package);
        context.insert("package_url", &self.server.absolute_url(&package.url_path()));
        context.insert("reason", reason);

        let subject = self.templates.render_line(FLAG_EMAIL_SUBJECT, &context)?;
        let body = self.templates.render(FLAG_EMAIL_BODY, &context)?;

        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN);
        for manager in &self.managers {
            builder = builder.to(manager.clone());
        }
        let message = builder.body(body).context("Failed to build flag e-mail")?;

        self.transport.deliver(message).await
    }
}
