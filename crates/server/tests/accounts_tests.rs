//! Registration, confirmation, update and password-reset flows.

mod common;

use common::{
    FakeHydra, OTHER_PASSWORD, STRONG_PASSWORD, drain, register_confirmed, test_state,
    token_from_mail,
};
use std::sync::Arc;
use whisper::error::{AppError, TokenError};
use whisper::tokens::Purpose;

#[tokio::test]
async fn test_registration_queues_confirmation_with_challenge() {
    let (state, mut inbox) = test_state(Arc::new(FakeHydra::default())).await;
    state
        .accounts
        .register("alice", "alice@x.com", STRONG_PASSWORD, STRONG_PASSWORD, "login-1")
        .await
        .unwrap();

    let mails = drain(&mut inbox);
    assert_eq!(mails.len(), 1);
    assert_eq!(mails[0].to, vec!["alice@x.com"]);
    assert!(
        mails[0]
            .text
            .contains("https://id.example.org/email-confirmation?token=")
    );

    let token = token_from_mail(&mails[0]);
    let confirmation = state.accounts.confirm_email(&token).await.unwrap();
    assert_eq!(confirmation.username, "alice");
    assert_eq!(confirmation.challenge, "login-1");
    assert!(
        state
            .accounts
            .store()
            .find_by_username("alice")
            .await
            .unwrap()
            .email_validated
    );
}

#[tokio::test]
async fn test_mismatched_confirmation_is_rejected() {
    let (state, mut inbox) = test_state(Arc::new(FakeHydra::default())).await;
    let err = state
        .accounts
        .register("alice", "alice@x.com", STRONG_PASSWORD, OTHER_PASSWORD, "")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(drain(&mut inbox).is_empty());
}

#[tokio::test]
async fn test_failed_registration_sends_no_mail() {
    let (state, mut inbox) = test_state(Arc::new(FakeHydra::default())).await;
    register_confirmed(&state, &mut inbox, "alice", "alice@x.com").await;

    let err = state
        .accounts
        .register("alice", "other@x.com", STRONG_PASSWORD, STRONG_PASSWORD, "")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    let err = state
        .accounts
        .register("bob", "bob@x.com", "tooshort", "tooshort", "")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    assert!(drain(&mut inbox).is_empty());
    assert!(state.accounts.store().find_by_username("bob").await.is_err());
}

#[tokio::test]
async fn test_confirmation_for_replaced_address_is_rejected() {
    let (state, mut inbox) = test_state(Arc::new(FakeHydra::default())).await;
    state
        .accounts
        .register("alice", "alice@x.com", STRONG_PASSWORD, STRONG_PASSWORD, "")
        .await
        .unwrap();
    let stale = token_from_mail(&drain(&mut inbox)[0]);

    state
        .accounts
        .store()
        .update_credential("alice", "victim@y.com", "")
        .await
        .unwrap();

    assert!(matches!(
        state.accounts.confirm_email(&stale).await,
        Err(AppError::InvalidToken(TokenError::Superseded))
    ));
    let credential = state.accounts.store().find_by_username("alice").await.unwrap();
    assert_eq!(credential.email, "victim@y.com");
    assert!(!credential.email_validated);
}

#[tokio::test]
async fn test_confirmation_link_is_single_use() {
    let (state, mut inbox) = test_state(Arc::new(FakeHydra::default())).await;
    state
        .accounts
        .register("alice", "alice@x.com", STRONG_PASSWORD, STRONG_PASSWORD, "")
        .await
        .unwrap();
    let token = token_from_mail(&drain(&mut inbox)[0]);

    state.accounts.confirm_email(&token).await.unwrap();
    assert!(matches!(
        state.accounts.confirm_email(&token).await,
        Err(AppError::InvalidToken(TokenError::AlreadyUsed))
    ));
}

#[tokio::test]
async fn test_reset_token_cannot_confirm_email() {
    let (state, mut inbox) = test_state(Arc::new(FakeHydra::default())).await;
    state
        .accounts
        .register("alice", "alice@x.com", STRONG_PASSWORD, STRONG_PASSWORD, "")
        .await
        .unwrap();
    drain(&mut inbox);

    let token = state
        .accounts
        .tokens()
        .issue(Purpose::PasswordReset, "alice", "")
        .unwrap();
    assert!(matches!(
        state.accounts.confirm_email(&token).await,
        Err(AppError::InvalidToken(TokenError::WrongPurpose))
    ));
    assert!(
        !state
            .accounts
            .store()
            .find_by_username("alice")
            .await
            .unwrap()
            .email_validated
    );
}

#[tokio::test]
async fn test_password_reset_round_trip() {
    let (state, mut inbox) = test_state(Arc::new(FakeHydra::default())).await;
    register_confirmed(&state, &mut inbox, "alice", "alice@x.com").await;

    state
        .accounts
        .request_password_reset("alice@x.com", "https://id.example.org/done")
        .await
        .unwrap();
    let mails = drain(&mut inbox);
    assert_eq!(mails.len(), 1);
    assert!(
        mails[0]
            .text
            .contains("https://id.example.org/change-password/step-2?token=")
    );
    let token = token_from_mail(&mails[0]);

    let redirect_to = state
        .accounts
        .reset_password(&token, OTHER_PASSWORD, OTHER_PASSWORD)
        .await
        .unwrap();
    assert_eq!(redirect_to, "https://id.example.org/done");
    state
        .accounts
        .store()
        .verify_credentials("alice", OTHER_PASSWORD)
        .await
        .unwrap();

    // replay
    assert!(matches!(
        state
            .accounts
            .reset_password(&token, STRONG_PASSWORD, STRONG_PASSWORD)
            .await,
        Err(AppError::InvalidToken(TokenError::AlreadyUsed))
    ));
}

#[tokio::test]
async fn test_rejected_new_password_keeps_token_usable() {
    let (state, mut inbox) = test_state(Arc::new(FakeHydra::default())).await;
    register_confirmed(&state, &mut inbox, "alice", "alice@x.com").await;
    state
        .accounts
        .request_password_reset("alice@x.com", "")
        .await
        .unwrap();
    let token = token_from_mail(&drain(&mut inbox)[0]);

    assert!(matches!(
        state
            .accounts
            .reset_password(&token, "tooshort", "tooshort")
            .await,
        Err(AppError::Validation(_))
    ));
    state
        .accounts
        .reset_password(&token, OTHER_PASSWORD, OTHER_PASSWORD)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_reset_redirect_must_stay_on_known_origins() {
    let (state, mut inbox) = test_state(Arc::new(FakeHydra::default())).await;
    register_confirmed(&state, &mut inbox, "alice", "alice@x.com").await;

    for target in ["https://evil.example/phish", "//evil.example", "javascript:alert(1)"] {
        assert!(matches!(
            state.accounts.request_password_reset("alice@x.com", target).await,
            Err(AppError::Validation(_))
        ));
    }
    assert!(drain(&mut inbox).is_empty());

    state
        .accounts
        .request_password_reset("alice@x.com", "https://hydra.example.org/oauth2/auth")
        .await
        .unwrap();
    state
        .accounts
        .request_password_reset("alice@x.com", "/secure/update")
        .await
        .unwrap();
    assert_eq!(drain(&mut inbox).len(), 2);
}

#[tokio::test]
async fn test_unknown_email_reset_is_silent() {
    let (state, mut inbox) = test_state(Arc::new(FakeHydra::default())).await;
    state
        .accounts
        .request_password_reset("ghost@x.com", "")
        .await
        .unwrap();
    assert!(drain(&mut inbox).is_empty());
}

#[tokio::test]
async fn test_update_requires_current_password() {
    let (state, mut inbox) = test_state(Arc::new(FakeHydra::default())).await;
    register_confirmed(&state, &mut inbox, "alice", "alice@x.com").await;

    assert!(matches!(
        state
            .accounts
            .update("alice", OTHER_PASSWORD, "alice@new.com", "", "")
            .await,
        Err(AppError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn test_email_update_sends_new_confirmation() {
    let (state, mut inbox) = test_state(Arc::new(FakeHydra::default())).await;
    register_confirmed(&state, &mut inbox, "alice", "alice@x.com").await;

    let outcome = state
        .accounts
        .update("alice", STRONG_PASSWORD, "alice@new.com", "", "")
        .await
        .unwrap();
    assert!(outcome.email_changed);

    let mails = drain(&mut inbox);
    assert_eq!(mails.len(), 1);
    assert_eq!(mails[0].to, vec!["alice@new.com"]);

    let confirmation = state
        .accounts
        .confirm_email(&token_from_mail(&mails[0]))
        .await
        .unwrap();
    assert_eq!(confirmation.challenge, "");
}
