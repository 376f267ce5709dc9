//! Login state-machine behavior against a scripted browser.

mod common;

use common::{test_config, MockBrowser, MockState};
use pitsync::auth::{AuthController, AuthState, Credentials};
use pitsync::error::AuthFailure;
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn credentials(secret: &str) -> Credentials {
    Credentials {
        identifier: "driver@example.com".into(),
        secret: secret.into(),
    }
}

#[tokio::test]
async fn credential_login_reaches_authenticated() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path().to_path_buf());
    let state = Arc::new(MockState::new(Some("hunter2")));

    let mut controller = AuthController::new(&config);
    let session = controller
        .login_with_credentials(MockBrowser::new(state.clone()), &credentials("hunter2"))
        .await;

    assert!(session.is_ok());
    assert_eq!(*controller.state(), AuthState::Authenticated);
    assert_eq!(
        state.navigations.lock().unwrap().as_slice(),
        &[config.login_url.clone()]
    );
    // The browser handle lives on inside the session.
    assert!(!state.closed.load(Ordering::Relaxed));
}

#[tokio::test]
async fn wrong_secret_fails_with_invalid_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path().to_path_buf());
    let state = Arc::new(MockState::new(Some("hunter2")));

    let mut controller = AuthController::new(&config);
    let result = controller
        .login_with_credentials(MockBrowser::new(state.clone()), &credentials("wrong"))
        .await;

    match result {
        Err(AuthFailure::InvalidCredentials) => {}
        other => panic!("expected InvalidCredentials, got {other:?}"),
    }
    assert_eq!(
        *controller.state(),
        AuthState::Failed(AuthFailure::InvalidCredentials)
    );
    // A failed login never leaves a live browser behind.
    assert!(state.closed.load(Ordering::Relaxed));
}

#[tokio::test]
async fn unresponsive_login_page_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path().to_path_buf());
    // Page never reacts to the submit at all.
    let state = Arc::new(MockState::new(None));

    let mut controller = AuthController::new(&config);
    let result = controller
        .login_with_credentials(MockBrowser::new(state.clone()), &credentials("any"))
        .await;

    match result {
        Err(AuthFailure::Timeout) => {}
        other => panic!("expected Timeout, got {other:?}"),
    }
    assert!(state.closed.load(Ordering::Relaxed));
}

#[tokio::test]
async fn missing_login_form_is_a_browser_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path().to_path_buf());
    let mut state = MockState::new(Some("hunter2"));
    state.has_login_form = false;
    let state = Arc::new(state);

    let mut controller = AuthController::new(&config);
    let result = controller
        .login_with_credentials(MockBrowser::new(state.clone()), &credentials("hunter2"))
        .await;

    match result {
        Err(AuthFailure::Browser(message)) => assert!(message.contains("email field")),
        other => panic!("expected Browser failure, got {other:?}"),
    }
    assert!(state.closed.load(Ordering::Relaxed));
}

#[tokio::test]
async fn interactive_login_succeeds_when_url_reaches_dashboard() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path().to_path_buf());
    let state = Arc::new(MockState::new(None));
    {
        let mut script = state.url_script.lock().unwrap();
        script.push_back(config.login_url.clone());
        script.push_back(config.login_url.clone());
        script.push_back(format!("{}/dashboard", config.base_url));
    }

    let mut controller = AuthController::new(&config);
    let session = controller
        .login_interactive(MockBrowser::new(state.clone()))
        .await;

    assert!(session.is_ok());
    assert_eq!(*controller.state(), AuthState::Authenticated);
}

#[tokio::test]
async fn interactive_login_times_out_without_url_change() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path().to_path_buf());
    let state = Arc::new(MockState::new(None));

    let mut controller = AuthController::new(&config);
    let result = controller
        .login_interactive(MockBrowser::new(state.clone()))
        .await;

    match result {
        Err(AuthFailure::LoginTimeout) => {}
        other => panic!("expected LoginTimeout, got {other:?}"),
    }
    assert_eq!(
        *controller.state(),
        AuthState::Failed(AuthFailure::LoginTimeout)
    );
    // Never constructed a scraping session: nothing was fetched, and the
    // only navigation was the login entry point.
    assert!(state.fetches.lock().unwrap().is_empty());
    assert_eq!(
        state.navigations.lock().unwrap().as_slice(),
        &[config.login_url.clone()]
    );
    assert!(state.closed.load(Ordering::Relaxed));
}
