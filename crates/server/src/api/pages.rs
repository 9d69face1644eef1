//! HTML pages rendered with askama.

use crate::challenge::ConsentPrompt;
use crate::error::AppError;
use askama::Template;
use axum::{
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginPage {
    pub challenge: String,
    pub client_name: String,
}

#[derive(Template)]
#[template(path = "consent.html")]
pub struct ConsentPage {
    pub prompt: ConsentPrompt,
}

#[derive(Template)]
#[template(path = "registration.html")]
pub struct RegistrationPage {
    pub challenge: String,
    pub password_rules: String,
}

#[derive(Template)]
#[template(path = "email_confirmed.html")]
pub struct EmailConfirmedPage {
    pub successful: bool,
    pub message: String,
    pub redirect_to: Option<String>,
}

#[derive(Template)]
#[template(path = "change_password_step1.html")]
pub struct ChangePasswordStep1Page {
    pub redirect_to: String,
}

#[derive(Template)]
#[template(path = "change_password_step2.html")]
pub struct ChangePasswordStep2Page {
    pub token: String,
    pub password_rules: String,
}

#[derive(Template)]
#[template(path = "update.html")]
pub struct UpdatePage {
    pub username: String,
    pub email: String,
    pub bearer: String,
    pub redirect_to: String,
    pub password_rules: String,
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorPage<'a> {
    message: &'a str,
}

/// Render a page, or a plain 500 if the template fails.
pub fn render<T: Template>(page: &T) -> Response {
    match page.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!(
                name = "http.page.render_failed",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                error = %e,
                message = "Failed to render page"
            );
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

/// 302 Found to an external location.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_owned())]).into_response()
}

/// An [`AppError`] rendered as an HTML page instead of JSON, for browser
/// navigations.
#[derive(Debug)]
pub struct PageError(pub AppError);

impl From<AppError> for PageError {
    fn from(err: AppError) -> Self {
        PageError(err)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        if status.is_server_error() {
            tracing::error!(
                name = "http.page.error",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                error = %self.0,
                message = "Page request failed"
            );
        }
        let message = self.0.public_message();
        (status, render(&ErrorPage { message: &message })).into_response()
    }
}
