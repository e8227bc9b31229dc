use std::{sync::OnceLock, time::Duration};

use tracing::debug;

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Safe to ignore: can happen if another crate installed it first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Build the HTTP client used for publishing.
///
/// `connect_timeout` bounds connection setup only; uploads of multi-gigabyte
/// recordings must not be cut off by a whole-request timeout.
pub fn build_client(connect_timeout: Duration) -> reqwest::Result<reqwest::Client> {
    install_rustls_provider();

    let mut builder = reqwest::Client::builder()
        .user_agent(concat!("stream-archiver/", env!("CARGO_PKG_VERSION")));
    if connect_timeout > Duration::ZERO {
        builder = builder.connect_timeout(connect_timeout);
    }
    builder.build()
}
