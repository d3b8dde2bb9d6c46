use std::sync::OnceLock;

use tracing::{debug, warn};

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Safe to ignore: can happen if another crate installed it first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Build the `reqwest::Client` used for page fetches.
///
/// Per-request timeouts come from the timeout ladder, so the client itself
/// has none. Redirects and compression are handled by reqwest.
pub fn build_page_client(user_agent: &str) -> reqwest::Client {
    install_rustls_provider();

    reqwest::Client::builder()
        .user_agent(user_agent)
        .gzip(true)
        .deflate(true)
        .pool_max_idle_per_host(2)
        .build()
        .unwrap_or_else(|error| {
            warn!(
                error = %error,
                "Failed to create configured HTTP client; falling back to reqwest defaults"
            );
            reqwest::Client::new()
        })
}
