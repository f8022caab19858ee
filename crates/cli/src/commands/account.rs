//! Account commands.

use pocket_shop_client::{AppState, ClientError};
use pocket_shop_core::Email;
use secrecy::{ExposeSecret, SecretString};

/// Create an account and print the token to reuse as `POCKET_SHOP_TOKEN`.
#[allow(clippy::print_stdout)]
pub async fn signup(
    state: &AppState,
    name: &str,
    email: &str,
    password: String,
) -> Result<(), ClientError> {
    let email = Email::parse(email)?;
    let password = SecretString::from(password);

    let profile = state.sign_up(name, &email, &password).await?;
    tracing::info!(user_id = %profile.id, "Account created");

    println!("Welcome, {} ({})", profile.name, profile.email);
    if let Some(token) = state.session().bearer_token() {
        println!("export POCKET_SHOP_TOKEN={}", token.expose_secret());
    }
    Ok(())
}
