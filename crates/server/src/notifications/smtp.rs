use super::{Mail, MailTransport};
use crate::config::SmtpConfig;
use crate::error::MailError;
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart, SinglePart, header};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// Delivers mail through an SMTP relay.
pub struct SmtpTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpTransport {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.server)
            .map_err(|e| MailError::Build(e.to_string()))?
            .port(config.port)
            .credentials(creds)
            .build();
        let from = config
            .from
            .parse()
            .map_err(|e: lettre::address::AddressError| MailError::Address(e.to_string()))?;
        Ok(Self { mailer, from })
    }
}

/// Build a multipart/alternative message with a text and an HTML part.
pub fn build_message(from: &Mailbox, mail: &Mail) -> Result<Message, MailError> {
    let mut builder = Message::builder()
        .from(from.clone())
        .subject(mail.subject.clone())
        .header(header::MIME_VERSION_1_0);
    for recipient in &mail.to {
        let to: Mailbox = recipient
            .parse()
            .map_err(|e: lettre::address::AddressError| MailError::Address(e.to_string()))?;
        builder = builder.to(to);
    }

    builder
        .multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(header::ContentType::TEXT_PLAIN)
                        .body(mail.text.clone()),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(header::ContentType::TEXT_HTML)
                        .body(mail.html.clone()),
                ),
        )
        .map_err(|e| MailError::Build(e.to_string()))
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn deliver(&self, mail: &Mail) -> Result<(), MailError> {
        let message = build_message(&self.from, mail)?;
        self.mailer
            .send(message)
            .await
            .map_err(|e| MailError::Delivery(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail(to: Vec<&str>) -> Mail {
        Mail {
            to: to.into_iter().map(String::from).collect(),
            subject: "Confirm".into(),
            html: "<p>hi</p>".into(),
            text: "hi".into(),
        }
    }

    #[test]
    fn message_has_both_parts() {
        let from: Mailbox = "Whisper <whisper@example.org>".parse().unwrap();
        let message = build_message(&from, &mail(vec!["alice@x.com", "bob@x.com"])).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/plain"));
        assert!(raw.contains("text/html"));
        assert!(raw.contains("alice@x.com"));
        assert!(raw.contains("bob@x.com"));
    }

    #[test]
    fn bad_recipient_is_rejected() {
        let from: Mailbox = "whisper@example.org".parse().unwrap();
        assert!(matches!(
            build_message(&from, &mail(vec!["not an address"])),
            Err(MailError::Address(_))
        ));
    }

    #[test]
    fn no_recipient_fails_to_build() {
        let from: Mailbox = "whisper@example.org".parse().unwrap();
        assert!(matches!(
            build_message(&from, &mail(vec![])),
            Err(MailError::Build(_))
        ));
    }
}
