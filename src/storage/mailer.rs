use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::GatewayError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailReceipt {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// Outbound transactional email.
pub trait Mailer: Send + Sync {
    fn send(&self, to: &str, subject: &str, html: &str) -> Result<EmailReceipt, GatewayError>;
}

/// Writes messages to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, to: &str, subject: &str, html: &str) -> Result<EmailReceipt, GatewayError> {
        let message_id = Uuid::new_v4().to_string();
        tracing::info!(%to, %subject, bytes = html.len(), %message_id, "email logged");
        Ok(EmailReceipt {
            success: true,
            message_id: Some(message_id),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Keeps sent messages in memory; can be switched to fail every send.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    outbox: Mutex<Vec<SentEmail>>,
    failing: bool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            outbox: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        match self.outbox.lock() {
            Ok(outbox) => outbox.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Mailer for MemoryMailer {
    fn send(&self, to: &str, subject: &str, html: &str) -> Result<EmailReceipt, GatewayError> {
        if self.failing {
            return Err(GatewayError::Rpc {
                name: "send_email",
                message: "mail provider unavailable".into(),
            });
        }
        let mut outbox = self
            .outbox
            .lock()
            .map_err(|_| GatewayError::Network("mail outbox poisoned".into()))?;
        outbox.push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        });
        Ok(EmailReceipt {
            success: true,
            message_id: Some(format!("mem-{}", outbox.len())),
        })
    }
}
