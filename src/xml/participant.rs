//! Phone-number participant URIs

use regex::Regex;
use std::sync::LazyLock;

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9]{3,15}$").expect("number regex"));

fn strip_scheme<'a>(uri: &'a str, scheme: &str) -> Option<&'a str> {
    uri.get(..scheme.len())
        .filter(|p| p.eq_ignore_ascii_case(scheme))
        .map(|_| &uri[scheme.len()..])
}

/// Extract and validate the phone number carried by a participant URI.
///
/// Accepts `tel:` URIs, `sip:`/`sips:` URIs whose user part is a
/// number, and bare numbers, optionally in angle brackets. Visual
/// separators are removed. Returns `None` when no valid number is
/// found.
///
/// ```
/// use cms_sync::xml::phone_number;
///
/// assert_eq!(phone_number("tel:+33642639381").as_deref(), Some("+33642639381"));
/// assert_eq!(
///     phone_number("<sip:+33 6 42 63 93 81@ims.example;user=phone>").as_deref(),
///     Some("+33642639381")
/// );
/// assert_eq!(phone_number("tel:alice"), None);
/// ```
#[must_use]
pub fn phone_number(uri: &str) -> Option<String> {
    let uri = uri.trim();
    let uri = uri
        .strip_prefix('<')
        .and_then(|u| u.strip_suffix('>'))
        .unwrap_or(uri)
        .trim();

    let user = if let Some(rest) = strip_scheme(uri, "tel:") {
        rest
    } else if let Some(rest) = strip_scheme(uri, "sips:").or_else(|| strip_scheme(uri, "sip:")) {
        rest.split('@').next().unwrap_or(rest)
    } else {
        uri
    };
    let user = user.split(';').next().unwrap_or(user);

    let number: String = user
        .chars()
        .filter(|c| !matches!(c, '-' | '.' | ' ' | '(' | ')'))
        .collect();
    NUMBER_RE.is_match(&number).then_some(number)
}

/// Remove a leading `tel:` scheme, if present.
#[must_use]
pub fn strip_tel(address: &str) -> &str {
    let address = address.trim();
    strip_scheme(address, "tel:").unwrap_or(address)
}
