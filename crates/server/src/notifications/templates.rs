//! Mail composition for account flows.

use super::{Mail, Outbox};
use crate::error::MailError;
use askama::Template;
use time::Duration;

#[derive(Template)]
#[template(path = "mail/email_confirmation.html")]
pub struct EmailConfirmationTemplate<'a> {
    pub username: &'a str,
    pub link: &'a str,
    pub valid_minutes: i64,
}

impl EmailConfirmationTemplate<'_> {
    pub fn render_text(&self) -> String {
        format!(
            r#"Hello {},

Please confirm your email address by opening the link below (valid for {} minutes):
{}

If you did not create an account, you can ignore this email."#,
            self.username, self.valid_minutes, self.link
        )
    }
}

#[derive(Template)]
#[template(path = "mail/password_reset.html")]
pub struct PasswordResetTemplate<'a> {
    pub username: &'a str,
    pub link: &'a str,
    pub valid_minutes: i64,
}

impl PasswordResetTemplate<'_> {
    pub fn render_text(&self) -> String {
        format!(
            r#"Hello {},

Someone asked to change the password of your account. Open the link below to choose a new one (valid for {} minutes):
{}

If you did not ask for this, you can ignore this email. Your password stays unchanged."#,
            self.username, self.valid_minutes, self.link
        )
    }
}

/// Renders account mails and queues them on the outbox.
#[derive(Clone, Debug)]
pub struct Mailer {
    outbox: Outbox,
    public_url: String,
    valid_minutes: i64,
}

impl Mailer {
    pub fn new(outbox: Outbox, public_url: &str, token_lifetime: Duration) -> Self {
        Self {
            outbox,
            public_url: public_url.trim_end_matches('/').to_owned(),
            valid_minutes: token_lifetime.whole_minutes(),
        }
    }

    pub fn confirmation_link(&self, token: &str) -> String {
        format!(
            "{}/email-confirmation?token={}",
            self.public_url,
            urlencoding::encode(token)
        )
    }

    pub fn password_reset_link(&self, token: &str) -> String {
        format!(
            "{}/change-password/step-2?token={}",
            self.public_url,
            urlencoding::encode(token)
        )
    }

    /// Render the confirmation mail without queuing it.
    pub fn compose_email_confirmation(
        &self,
        username: &str,
        email: &str,
        token: &str,
    ) -> Result<Mail, MailError> {
        let link = self.confirmation_link(token);
        let template = EmailConfirmationTemplate {
            username,
            link: &link,
            valid_minutes: self.valid_minutes,
        };
        let html = template
            .render()
            .map_err(|e| MailError::Render(e.to_string()))?;
        Ok(Mail {
            to: vec![email.to_owned()],
            subject: "Confirm your email address".into(),
            html,
            text: template.render_text(),
        })
    }

    pub fn compose_password_reset(
        &self,
        username: &str,
        email: &str,
        token: &str,
    ) -> Result<Mail, MailError> {
        let link = self.password_reset_link(token);
        let template = PasswordResetTemplate {
            username,
            link: &link,
            valid_minutes: self.valid_minutes,
        };
        let html = template
            .render()
            .map_err(|e| MailError::Render(e.to_string()))?;
        Ok(Mail {
            to: vec![email.to_owned()],
            subject: "Reset your password".into(),
            html,
            text: template.render_text(),
        })
    }

    /// Hand a composed mail to the dispatcher.
    pub fn send(&self, mail: Mail) {
        self.outbox.enqueue(mail);
    }

    #[tracing::instrument(skip(self, token))]
    pub fn email_confirmation(&self, username: &str, email: &str, token: &str) -> Result<(), MailError> {
        let mail = self.compose_email_confirmation(username, email, token)?;
        self.send(mail);
        Ok(())
    }

    #[tracing::instrument(skip(self, token))]
    pub fn password_reset(&self, username: &str, email: &str, token: &str) -> Result<(), MailError> {
        let mail = self.compose_password_reset(username, email, token)?;
        self.send(mail);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::channel;

    #[test]
    fn confirmation_mail_links_to_public_url() {
        let (outbox, mut inbox) = channel();
        let mailer = Mailer::new(outbox, "https://id.example.org/", Duration::minutes(10));
        mailer
            .email_confirmation("alice", "alice@x.com", "abc.def.ghi")
            .unwrap();

        let mail = inbox.try_recv().unwrap();
        assert_eq!(mail.to, vec!["alice@x.com"]);
        assert!(
            mail.text
                .contains("https://id.example.org/email-confirmation?token=abc.def.ghi")
        );
        assert!(mail.text.contains("10 minutes"));
        assert!(mail.html.contains("Hello alice"));
    }

    #[test]
    fn reset_mail_links_to_step_two() {
        let (outbox, mut inbox) = channel();
        let mailer = Mailer::new(outbox, "https://id.example.org", Duration::minutes(10));
        mailer.password_reset("bob", "bob@x.com", "tok").unwrap();

        let mail = inbox.try_recv().unwrap();
        assert_eq!(mail.subject, "Reset your password");
        assert!(
            mail.text
                .contains("https://id.example.org/change-password/step-2?token=tok")
        );
    }

    #[test]
    fn composing_does_not_queue() {
        let (outbox, mut inbox) = channel();
        let mailer = Mailer::new(outbox, "https://id.example.org", Duration::minutes(10));
        let mail = mailer
            .compose_email_confirmation("alice", "alice@x.com", "tok")
            .unwrap();
        assert!(inbox.try_recv().is_none());

        mailer.send(mail.clone());
        assert_eq!(inbox.try_recv(), Some(mail));
    }

    #[test]
    fn username_is_escaped_in_html() {
        let (outbox, mut inbox) = channel();
        let mailer = Mailer::new(outbox, "https://id.example.org", Duration::minutes(10));
        mailer
            .email_confirmation("<b>eve</b>", "eve@x.com", "tok")
            .unwrap();
        let mail = inbox.try_recv().unwrap();
        assert!(!mail.html.contains("<b>eve</b>"));
    }
}
