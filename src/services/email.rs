//! Outbound transactional email.
//!
//! A thin wrapper over an async SMTP transport. When SMTP is disabled
//! (the development default) messages are logged instead of sent, so the
//! rest of the system can treat delivery as always available. Callers on
//! the request path use [`EmailService::send_detached`]; delivery failures
//! are logged and never surface to the client.

use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::SmtpConfig;
use crate::errors::ServiceError;

/// One invoice line as rendered into the notification body.
#[derive(Debug, Clone)]
pub struct InvoiceEmailLine {
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: String,
    pub line_total: String,
}

/// Message bodies for every notification the system sends.
#[derive(Debug, Clone)]
pub enum EmailTemplate {
    InvoiceCreated {
        recipient_name: String,
        invoice_number: String,
        items: Vec<InvoiceEmailLine>,
        total_amount: String,
        due_date: String,
        issued_by: String,
        issuer_role: String,
    },
    Welcome {
        recipient_name: String,
        login_email: String,
        password: String,
    },
    PasswordReset {
        recipient_name: String,
        password: String,
    },
    TrialExtended {
        recipient_name: String,
        trial_expiry: String,
    },
    AccountStatusChanged {
        recipient_name: String,
        status: String,
    },
}

impl EmailTemplate {
    pub fn subject(&self) -> String {
        match self {
            Self::InvoiceCreated { invoice_number, .. } => {
                format!("Invoice {} issued", invoice_number)
            }
            Self::Welcome { .. } => "Welcome to your new account".to_string(),
            Self::PasswordReset { .. } => "Your password has been reset".to_string(),
            Self::TrialExtended { .. } => "Your trial has been extended".to_string(),
            Self::AccountStatusChanged { .. } => "Your account status has changed".to_string(),
        }
    }

    pub fn body(&self) -> String {
        match self {
            Self::InvoiceCreated {
                recipient_name,
                invoice_number,
                items,
                total_amount,
                due_date,
                issued_by,
                issuer_role,
            } => {
                let lines: String = items
                    .iter()
                    .map(|line| {
                        format!(
                            "  - {} x{} @ {} = {}\n",
                            line.product_name, line.quantity, line.unit_price, line.line_total
                        )
                    })
                    .collect();
                format!(
                    "Hello {recipient_name},\n\n\
                     A new invoice {invoice_number} has been issued to your account \
                     by {issued_by} ({issuer_role}).\n\n\
                     Items:\n{lines}\n\
                     Amount due: {total_amount}\n\
                     Due date: {due_date}\n\n\
                     Please log in to view the details."
                )
            }
            Self::Welcome {
                recipient_name,
                login_email,
                password,
            } => format!(
                "Hello {recipient_name},\n\n\
                 An account has been created for you.\n\
                 Login: {login_email}\n\
                 Temporary password: {password}\n\n\
                 Please sign in and change your password."
            ),
            Self::PasswordReset {
                recipient_name,
                password,
            } => format!(
                "Hello {recipient_name},\n\n\
                 Your password has been reset by an administrator.\n\
                 New password: {password}\n\n\
                 Please sign in and change it as soon as possible."
            ),
            Self::TrialExtended {
                recipient_name,
                trial_expiry,
            } => format!(
                "Hello {recipient_name},\n\n\
                 Your trial period has been extended until {trial_expiry}."
            ),
            Self::AccountStatusChanged {
                recipient_name,
                status,
            } => format!(
                "Hello {recipient_name},\n\n\
                 Your account status is now: {status}."
            ),
        }
    }
}

#[derive(Clone)]
pub struct EmailService {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
}

impl EmailService {
    pub fn new(config: &SmtpConfig) -> Result<Self, ServiceError> {
        let from: Mailbox = format!("{} <{}>", config.from_name, config.from_email)
            .parse()
            .map_err(|e| ServiceError::EmailError(format!("invalid from address: {}", e)))?;

        let transport = if config.enabled {
            let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| ServiceError::EmailError(format!("SMTP relay setup failed: {}", e)))?
                .port(config.port);
            if !config.user.is_empty() {
                builder = builder
                    .credentials(Credentials::new(config.user.clone(), config.password.clone()));
            }
            Some(builder.build())
        } else {
            None
        };

        Ok(Self { transport, from })
    }

    /// Deliver one message, or log it when SMTP is disabled.
    pub async fn send(&self, to: &str, template: &EmailTemplate) -> Result<(), ServiceError> {
        let subject = template.subject();

        let Some(transport) = &self.transport else {
            info!(to, subject, "SMTP disabled; logging email instead of sending");
            return Ok(());
        };

        let mailbox: Mailbox = to
            .parse()
            .map_err(|e| ServiceError::EmailError(format!("invalid recipient '{}': {}", to, e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(mailbox)
            .subject(subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(template.body())
            .map_err(|e| ServiceError::EmailError(format!("message build failed: {}", e)))?;

        transport
            .send(message)
            .await
            .map_err(|e| ServiceError::EmailError(format!("SMTP send failed: {}", e)))?;

        info!(to, subject, "email sent");
        Ok(())
    }

    /// Fire-and-forget delivery off the request path. Failures are logged.
    pub fn send_detached(self: &Arc<Self>, to: String, template: EmailTemplate) {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = service.send(&to, &template).await {
                error!(to, error = %e, "detached email delivery failed");
            }
        });
    }

    /// Like [`send_detached`](Self::send_detached) but tolerates a missing
    /// address, which several profile rows legitimately have.
    pub fn send_detached_opt(self: &Arc<Self>, to: Option<String>, template: EmailTemplate) {
        match to {
            Some(to) if !to.trim().is_empty() => self.send_detached(to, template),
            _ => warn!(subject = %template.subject(), "recipient has no email; skipping notification"),
        }
    }
}
