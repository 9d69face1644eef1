//! Asynchronous mail delivery.
//!
//! Request handlers push rendered [`Mail`] into an [`Outbox`] and return
//! immediately. A single [`Dispatcher`] task drains the queue in FIFO order
//! and hands each mail to a [`MailTransport`]. Failed deliveries are logged
//! and dropped.

pub mod smtp;
pub mod templates;

use crate::error::MailError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

pub use smtp::SmtpTransport;
pub use templates::Mailer;

/// A fully rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, mail: &Mail) -> Result<(), MailError>;
}

/// Sending half of the queue. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Mail>,
}

/// Receiving half of the queue, consumed by [`Dispatcher::start`].
#[derive(Debug)]
pub struct Inbox {
    rx: mpsc::UnboundedReceiver<Mail>,
}

pub fn channel() -> (Outbox, Inbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Outbox { tx }, Inbox { rx })
}

impl Outbox {
    /// Queue a mail for delivery. Never blocks.
    pub fn enqueue(&self, mail: Mail) {
        if let Err(e) = self.tx.send(mail) {
            tracing::warn!(
                name = "notifications.enqueue.closed",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                subject = %e.0.subject,
                message = "Mail dropped because the dispatcher has stopped"
            );
        }
    }
}

impl Inbox {
    pub fn try_recv(&mut self) -> Option<Mail> {
        self.rx.try_recv().ok()
    }
}

/// Handle to the running delivery task.
#[derive(Debug)]
pub struct Dispatcher {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Dispatcher {
    pub fn start(inbox: Inbox, transport: Arc<dyn MailTransport>) -> Self {
        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run(inbox, transport, stop_rx));
        tracing::info!(
            name = "notifications.dispatcher.started",
            target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
            message = "Mail dispatcher started"
        );
        Self { stop, handle }
    }

    /// Ask the worker to exit. A delivery in progress completes first.
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Wait for the worker to exit.
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            tracing::error!(
                name = "notifications.dispatcher.join_failed",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                error = %e,
                message = "Mail dispatcher task ended abnormally"
            );
        }
    }
}

async fn run(mut inbox: Inbox, transport: Arc<dyn MailTransport>, mut stop: watch::Receiver<bool>) {
    loop {
        if *stop.borrow() {
            break;
        }
        tokio::select! {
            biased;
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
            mail = inbox.rx.recv() => match mail {
                Some(mail) => deliver(transport.as_ref(), &mail).await,
                None => break,
            },
        }
    }
    tracing::info!(
        name = "notifications.dispatcher.stopped",
        target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
        message = "Mail dispatcher stopped"
    );
}

async fn deliver(transport: &dyn MailTransport, mail: &Mail) {
    match transport.deliver(mail).await {
        Ok(()) => tracing::debug!(
            name = "notifications.deliver.succeeded",
            target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
            recipients = mail.to.len(),
            subject = %mail.subject,
            message = "Mail delivered"
        ),
        Err(e) => tracing::error!(
            name = "notifications.deliver.failed",
            target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
            error = %e,
            subject = %mail.subject,
            message = "Mail delivery failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Capture {
        delivered: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MailTransport for Capture {
        async fn deliver(&self, mail: &Mail) -> Result<(), MailError> {
            if mail.subject == "fail" {
                return Err(MailError::Delivery("refused".into()));
            }
            self.delivered.lock().unwrap().push(mail.subject.clone());
            Ok(())
        }
    }

    fn mail(subject: &str) -> Mail {
        Mail {
            to: vec!["alice@x.com".into()],
            subject: subject.into(),
            html: String::new(),
            text: String::new(),
        }
    }

    async fn wait_for(capture: &Capture, count: usize) {
        for _ in 0..100 {
            if capture.delivered.lock().unwrap().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn delivers_in_order_and_survives_failures() {
        let capture = Arc::new(Capture::default());
        let (outbox, inbox) = channel();
        let dispatcher = Dispatcher::start(inbox, capture.clone());

        outbox.enqueue(mail("one"));
        outbox.enqueue(mail("fail"));
        outbox.enqueue(mail("two"));
        wait_for(&capture, 2).await;

        assert_eq!(*capture.delivered.lock().unwrap(), vec!["one", "two"]);
        assert!(dispatcher.is_running());
        dispatcher.stop();
        dispatcher.join().await;
    }

    #[tokio::test]
    async fn stop_terminates_worker() {
        let capture = Arc::new(Capture::default());
        let (outbox, inbox) = channel();
        let dispatcher = Dispatcher::start(inbox, capture.clone());
        dispatcher.stop();
        tokio::time::timeout(Duration::from_secs(1), dispatcher.join())
            .await
            .expect("dispatcher did not stop");

        // enqueue after stop must not panic or block
        outbox.enqueue(mail("late"));
        assert!(capture.delivered.lock().unwrap().is_empty());
    }

    #[test]
    fn outbox_queues_without_consumer() {
        let (outbox, mut inbox) = channel();
        outbox.enqueue(mail("a"));
        outbox.enqueue(mail("b"));
        assert_eq!(inbox.try_recv().unwrap().subject, "a");
        assert_eq!(inbox.try_recv().unwrap().subject, "b");
        assert!(inbox.try_recv().is_none());
    }
}
