//! Serving-technology traits extracted from HTTP response headers
//!
//! The signature is built from three headers:
//!
//! - `Server`: first occurrence, always first in the signature
//! - `X-Powered-By`: every occurrence, sorted so the output does not depend on
//!   the order in which a proxy chain appended them
//! - `X-Aspnet-Version`: merged into an `X-Powered-By: ASP.NET` value as
//!   `ASP.NET/<version>`
//!
//! The parts are joined with `", "`. Blank header values are ignored and a
//! response without any of these headers yields [`Traits::empty`].

use reqwest::header::{HeaderMap, HeaderValue};
use schema::Traits;

const SERVER: &str = "server";
const X_POWERED_BY: &str = "x-powered-by";
const X_ASPNET_VERSION: &str = "x-aspnet-version";
const ASP_NET: &str = "ASP.NET";

/// Extract the powered-by signature from a set of response headers
pub fn extract_traits(headers: &HeaderMap) -> Traits {
    let server = headers.get(SERVER).and_then(header_text);
    let aspnet_version = headers.get(X_ASPNET_VERSION).and_then(header_text);

    let mut powered_by: Vec<String> = headers
        .get_all(X_POWERED_BY)
        .iter()
        .filter_map(header_text)
        .map(|value| match aspnet_version {
            Some(version) if value == ASP_NET => format!("{ASP_NET}/{version}"),
            _ => value.to_string(),
        })
        .collect();
    powered_by.sort();

    let parts: Vec<String> = server
        .map(str::to_string)
        .into_iter()
        .chain(powered_by)
        .collect();

    if parts.is_empty() {
        Traits::empty()
    } else {
        Traits {
            powered_by: Some(parts.join(", ")),
        }
    }
}

fn header_text(value: &HeaderValue) -> Option<&str> {
    value
        .to_str()
        .ok()
        .map(str::trim)
        .filter(|text| !text.is_empty())
}
