//! OpenAPI document.

use crate::api::{ACCOUNT_TAG, CHALLENGE_TAG, MISC_TAG};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let bearer = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .description(Some(
                    "Access token issued by the authorization server. It is checked through token introspection.",
                ))
                .build();
            components.add_security_scheme("Authorization", SecurityScheme::Http(bearer));
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Whisper",
        version = "1.0.0",
        description = "Login, consent and credential management in front of an OAuth2/OIDC authorization server."
    ),
    tags(
        (name = CHALLENGE_TAG, description = "Login, consent and logout challenges"),
        (name = ACCOUNT_TAG, description = "Registration, email confirmation and password management"),
        (name = MISC_TAG, description = "Miscellaneous endpoints")
    )
)]
pub struct ApiDoc;
