pub mod user_credential;

pub use user_credential::Entity as UserCredential;
