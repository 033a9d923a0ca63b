//! Normalized-URL identity for exact-duplicate detection.
//!
//! Two URLs that differ only by tracking query parameters or a trailing
//! slash must produce the same hash, so the same article syndicated with
//! different campaign tags dedupes to one row.

use sha2::{Digest, Sha256};

/// Query parameters stripped before hashing.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_content",
    "utm_term",
    "ref",
    "source",
    "fbclid",
    "gclid",
    "mc_cid",
    "mc_eid",
    "__s",
    "s_kwcid",
];

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    TRACKING_PARAMS.contains(&key.as_str())
}

/// Normalize a URL: drop tracking parameters, drop the fragment, strip a
/// trailing slash. Non-tracking parameters keep their original order.
/// Unparseable input is returned with only the trailing slash stripped.
pub fn normalize_url(raw: &str) -> String {
    let Ok(parsed) = url::Url::parse(raw.trim()) else {
        return raw.trim().trim_end_matches('/').to_string();
    };

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut normalized = format!(
        "{}://{}{}",
        parsed.scheme(),
        parsed.authority(),
        parsed.path()
    );
    if !kept.is_empty() {
        let query: Vec<String> = kept
            .iter()
            .map(|(k, v)| {
                if v.is_empty() {
                    k.clone()
                } else {
                    format!("{k}={v}")
                }
            })
            .collect();
        normalized.push('?');
        normalized.push_str(&query.join("&"));
    }

    normalized.trim_end_matches('/').to_string()
}

/// 16-hex-char SHA-256 digest of the normalized URL.
pub fn url_hash(raw: &str) -> String {
    let normalized = normalize_url(raw);
    let digest = Sha256::digest(normalized.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..16].to_string()
}

/// Item id derived from source key + URL hash.
pub fn item_id(source: &str, url_hash: &str) -> String {
    format!("{source}_{url_hash}")
}
