// ABOUTME: Authentication strategies run against a connected transport.
// ABOUTME: Password with keyboard-interactive fallback, or a single public-key attempt.

use super::credential::KeyPair;
use super::state::AuthMethods;
use crate::ssh::{self, AuthMethod, Challenge, Transport};

/// Responder that answers every prompt of every round with `password`.
pub fn password_responder(password: &str) -> impl Fn(&Challenge) -> Vec<String> + Send + Sync + use<> {
    let password = password.to_string();
    move |challenge: &Challenge| vec![password.clone(); challenge.prompts.len()]
}

/// Ask the transport which of the three methods the server offers `user`.
pub async fn query_auth_methods<T: Transport + ?Sized>(
    transport: &mut T,
    user: &str,
) -> ssh::Result<AuthMethods> {
    let password = transport
        .is_auth_method_available(user, AuthMethod::Password)
        .await?;
    let public_key = transport
        .is_auth_method_available(user, AuthMethod::PublicKey)
        .await?;
    let keyboard_interactive = transport
        .is_auth_method_available(user, AuthMethod::KeyboardInteractive)
        .await?;

    Ok(AuthMethods {
        password,
        keyboard_interactive,
        public_key,
    })
}

/// Password family: plain password first, then keyboard-interactive.
///
/// A transport error ends the attempt without trying the next method.
pub async fn authenticate_with_password<T: Transport + ?Sized>(
    transport: &mut T,
    user: &str,
    password: &str,
    methods: AuthMethods,
) -> bool {
    let mut authenticated = false;

    if methods.password {
        tracing::info!("Trying SSH password authentication");
        match transport.authenticate_with_password(user, password).await {
            Ok(result) => authenticated = result,
            Err(e) => {
                tracing::warn!("SSH password authentication failed: {}", e);
                return false;
            }
        }
    }

    if !authenticated && methods.keyboard_interactive {
        tracing::info!("Trying SSH keyboard-interactive authentication");
        let responder = password_responder(password);
        match transport
            .authenticate_with_keyboard_interactive(user, &responder)
            .await
        {
            Ok(result) => authenticated = result,
            Err(e) => {
                tracing::warn!("SSH keyboard-interactive authentication failed: {}", e);
                return false;
            }
        }
    }

    authenticated
}

/// Public-key family: one attempt with the decrypted key pair, no fallback.
pub async fn authenticate_with_public_key<T: Transport + ?Sized>(
    transport: &mut T,
    user: &str,
    key_pair: KeyPair,
) -> bool {
    tracing::info!("Trying SSH pubkey authentication");
    match transport.authenticate_with_public_key(user, key_pair).await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!("SSH pubkey authentication failed: {}", e);
            false
        }
    }
}
