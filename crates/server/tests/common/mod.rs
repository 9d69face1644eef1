//! Shared fixtures for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use whisper::AppState;
use whisper::config::{AppConfig, GrantScope, HashingConfig, HydraConfig, SmtpConfig};
use whisper::error::HydraError;
use whisper::hydra::{
    AcceptConsentRequest, AcceptLoginRequest, AuthorizationServer, CompletedRequest,
    ConsentRequestInfo, IntrospectedToken, LoginRequestInfo, OAuth2Client, RejectRequest,
};
use whisper::notifications::{self, Inbox, Mail};

pub const SECRET: &str = "0123456789abcdef0123456789abcdef";
pub const STRONG_PASSWORD: &str = "kq8#Vz1mPw3!Lr7t";
pub const OTHER_PASSWORD: &str = "Zy9$Qw2^Er4&Tu6*";

/// In-memory SQLite database with the credential table. A single pooled
/// connection keeps every query on the same database.
pub async fn test_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await.expect("connect");
    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        r#"CREATE TABLE user_credential (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            salt TEXT NOT NULL,
            email_validated INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );"#,
    ))
    .await
    .expect("create user_credential table");
    db
}

pub fn test_config(hydra_admin_url: &str) -> AppConfig {
    let mut grant_scopes = BTreeMap::new();
    grant_scopes.insert(
        "openid".to_string(),
        GrantScope {
            description: "Verify your identity".into(),
            details: "Lets the application know who you are".into(),
        },
    );
    AppConfig {
        listen_addr: "127.0.0.1:0".into(),
        base_ui_path: "ui".into(),
        public_url: "https://id.example.org".into(),
        database_url: "sqlite::memory:".into(),
        db_max_connections: 1,
        db_min_connections: 1,
        secret_key: SECRET.into(),
        action_token_lifetime_secs: 600,
        log_level: "debug".into(),
        hashing: HashingConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        },
        hydra: HydraConfig {
            admin_url: hydra_admin_url.into(),
            public_url: "https://hydra.example.org".into(),
            remember_for: 3600,
            request_timeout_secs: 5,
        },
        smtp: SmtpConfig {
            server: "localhost".into(),
            port: 25,
            username: "u".into(),
            password: "p".into(),
            from: "whisper@example.org".into(),
        },
        grant_scopes,
    }
}

/// Application state wired to `server`, with the mail queue left undrained
/// so tests can inspect it.
pub async fn test_state(server: Arc<dyn AuthorizationServer>) -> (AppState, Inbox) {
    let db = Arc::new(test_db().await);
    let (outbox, inbox) = notifications::channel();
    let state = AppState::build(test_config("http://hydra.invalid"), db, server, outbox)
        .expect("build state");
    (state, inbox)
}

pub fn drain(inbox: &mut Inbox) -> Vec<Mail> {
    std::iter::from_fn(|| inbox.try_recv()).collect()
}

/// Pull the `token` query parameter out of the link in a mail.
pub fn token_from_mail(mail: &Mail) -> String {
    let start = mail.text.find("token=").expect("mail contains a token") + "token=".len();
    mail.text[start..]
        .split_whitespace()
        .next()
        .expect("token value")
        .to_string()
}

/// Register `username` and confirm the email so the account can sign in.
pub async fn register_confirmed(state: &AppState, inbox: &mut Inbox, username: &str, email: &str) {
    state
        .accounts
        .register(username, email, STRONG_PASSWORD, STRONG_PASSWORD, "")
        .await
        .expect("register");
    let mails = drain(inbox);
    let token = token_from_mail(mails.last().expect("confirmation mail"));
    state.accounts.confirm_email(&token).await.expect("confirm");
}

/// In-process authorization server that records every call.
#[derive(Default)]
pub struct FakeHydra {
    pub login_skip_subject: Option<String>,
    pub consent_skip: bool,
    pub requested_scope: Vec<String>,
    pub requested_audience: Vec<String>,
    pub active_tokens: Mutex<HashMap<String, String>>,
    pub calls: Mutex<Vec<String>>,
    pub accepted_logins: Mutex<Vec<(String, AcceptLoginRequest)>>,
    pub accepted_consents: Mutex<Vec<(String, AcceptConsentRequest)>>,
    pub rejected_consents: Mutex<Vec<(String, RejectRequest)>>,
}

impl FakeHydra {
    pub fn with_token(self, token: &str, subject: &str) -> Self {
        self.active_tokens
            .lock()
            .unwrap()
            .insert(token.to_string(), subject.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

fn completed(kind: &str, challenge: &str) -> CompletedRequest {
    CompletedRequest {
        redirect_to: format!("https://hydra.example.org/{kind}?challenge={challenge}"),
    }
}

#[async_trait]
impl AuthorizationServer for FakeHydra {
    async fn get_login_request(&self, challenge: &str) -> Result<LoginRequestInfo, HydraError> {
        self.record(format!("get_login:{challenge}"));
        Ok(LoginRequestInfo {
            challenge: challenge.to_string(),
            skip: self.login_skip_subject.is_some(),
            subject: self.login_skip_subject.clone().unwrap_or_default(),
            requested_scope: self.requested_scope.clone(),
            client: Some(OAuth2Client {
                client_id: "app".into(),
                client_name: "Example App".into(),
                client_uri: "https://app.example.org".into(),
            }),
        })
    }

    async fn accept_login_request(
        &self,
        challenge: &str,
        body: &AcceptLoginRequest,
    ) -> Result<CompletedRequest, HydraError> {
        self.record(format!("accept_login:{challenge}"));
        self.accepted_logins
            .lock()
            .unwrap()
            .push((challenge.to_string(), body.clone()));
        Ok(completed("login", challenge))
    }

    async fn get_consent_request(&self, challenge: &str) -> Result<ConsentRequestInfo, HydraError> {
        self.record(format!("get_consent:{challenge}"));
        Ok(ConsentRequestInfo {
            challenge: challenge.to_string(),
            skip: self.consent_skip,
            subject: "alice".into(),
            requested_scope: self.requested_scope.clone(),
            requested_access_token_audience: self.requested_audience.clone(),
            client: Some(OAuth2Client {
                client_id: "app".into(),
                client_name: "Example App".into(),
                client_uri: "https://app.example.org".into(),
            }),
        })
    }

    async fn accept_consent_request(
        &self,
        challenge: &str,
        body: &AcceptConsentRequest,
    ) -> Result<CompletedRequest, HydraError> {
        self.record(format!("accept_consent:{challenge}"));
        self.accepted_consents
            .lock()
            .unwrap()
            .push((challenge.to_string(), body.clone()));
        Ok(completed("consent", challenge))
    }

    async fn reject_consent_request(
        &self,
        challenge: &str,
        body: &RejectRequest,
    ) -> Result<CompletedRequest, HydraError> {
        self.record(format!("reject_consent:{challenge}"));
        self.rejected_consents
            .lock()
            .unwrap()
            .push((challenge.to_string(), body.clone()));
        Ok(completed("consent", challenge))
    }

    async fn accept_logout_request(&self, challenge: &str) -> Result<CompletedRequest, HydraError> {
        self.record(format!("accept_logout:{challenge}"));
        Ok(completed("logout", challenge))
    }

    async fn introspect_token(&self, token: &str) -> Result<IntrospectedToken, HydraError> {
        self.record("introspect".to_string());
        let subject = self.active_tokens.lock().unwrap().get(token).cloned();
        Ok(IntrospectedToken {
            active: subject.is_some(),
            sub: subject,
            scope: Some("openid".into()),
            ..Default::default()
        })
    }
}
