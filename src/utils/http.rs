use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent(concat!("persona-card-server/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(90))
        .build()
        .expect("Failed to build HTTP client")
});

/// Shared client for all outbound AI calls. The builder timeout is a backstop; each
/// call site sets its own per-request timeout.
pub fn get_http_client() -> &'static Client {
    &HTTP_CLIENT
}
