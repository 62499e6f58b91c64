//! Shared fixtures for the end-to-end tests
//!
//! The tests in `tests/` reach the public internet and are `#[ignore]`d by
//! default. Run them with `cargo test -p e2e-tests -- --ignored`.

use schema::PingDestination;

/// Public site used as a known-good probe target
pub const HAWKULAR_URL: &str = "http://hawkular.github.io";

/// Destination for [`HAWKULAR_URL`] with the given method
pub fn hawkular_destination(http_method: &str) -> PingDestination {
    PingDestination::new(
        "hawkular",
        "e2e",
        format!("hawkular-site-{}", http_method.to_ascii_lowercase()),
        HAWKULAR_URL,
        http_method,
    )
}
