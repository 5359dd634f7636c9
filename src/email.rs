//! Outbound email seam
//!
//! The core does not speak SMTP. Invitation and notification email goes
//! through [`Mailer`]; the default implementation logs the message so
//! development environments see what would have been sent.

use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: Option<String>,
}

pub trait Mailer: Send + Sync {
    fn send(&self, email: OutboundEmail);
}

/// Default mailer: logs instead of delivering.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, email: OutboundEmail) {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "outbound email (delivery disabled)"
        );
    }
}

pub fn default_mailer() -> Arc<dyn Mailer> {
    Arc::new(LogMailer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CapturingMailer(Mutex<Vec<OutboundEmail>>);

    impl Mailer for CapturingMailer {
        fn send(&self, email: OutboundEmail) {
            self.0.lock().unwrap().push(email);
        }
    }

    #[test]
    fn test_mailer_trait_object() {
        let mailer: Arc<dyn Mailer> = Arc::new(CapturingMailer(Mutex::new(Vec::new())));
        mailer.send(OutboundEmail {
            to: "a@b.test".into(),
            subject: "hi".into(),
            html: "<p>hi</p>".into(),
            text: None,
        });
    }
}
