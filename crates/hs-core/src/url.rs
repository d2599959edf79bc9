//! URL helpers
//!
//! Slice-based host extraction for page URLs. Page URLs come from the tab, so
//! only the hierarchical `scheme://host` form is handled.

// =============================================================================
// Scheme
// =============================================================================

/// Get the position after "://".
#[inline]
pub fn get_scheme_end(url: &str) -> Option<usize> {
    let bytes = url.as_bytes();

    let colon_pos = bytes.iter().position(|&b| b == b':')?;

    if bytes.len() > colon_pos + 2 && bytes[colon_pos + 1] == b'/' && bytes[colon_pos + 2] == b'/' {
        return Some(colon_pos + 3);
    }

    None
}

// =============================================================================
// Host Extraction
// =============================================================================

/// Get the start and end positions of the hostname in a URL.
#[inline]
pub fn get_host_position(url: &str) -> Option<(usize, usize)> {
    let scheme_end = get_scheme_end(url)?;
    let bytes = url.as_bytes();

    // Skip userinfo
    let mut host_start = scheme_end;
    for i in scheme_end..bytes.len() {
        if bytes[i] == b'@' {
            host_start = i + 1;
            break;
        }
        if matches!(bytes[i], b'/' | b'?' | b'#') {
            break;
        }
    }

    let mut host_end = bytes.len();
    for i in host_start..bytes.len() {
        let b = bytes[i];
        if b == b'/' || b == b'?' || b == b'#' || b == b':' {
            host_end = i;
            break;
        }
    }

    Some((host_start, host_end))
}

/// Host slice of the URL, without port or userinfo.
#[inline]
pub fn extract_host(url: &str) -> Option<&str> {
    let (host_start, host_end) = get_host_position(url)?;
    Some(&url[host_start..host_end])
}

/// Lower-cased host of a page URL; `None` when the URL has no host.
pub fn page_host(url: &str) -> Option<String> {
    extract_host(url.trim())
        .filter(|host| !host.is_empty())
        .map(|host| host.to_ascii_lowercase())
}

/// Host normalized for metrics and whitelist lookups: lower-case, without a
/// leading `www.`. Falls back to the trimmed input when it has no host.
pub fn normalize_domain(url: &str) -> String {
    let host = page_host(url).unwrap_or_else(|| url.trim().to_ascii_lowercase());
    match host.strip_prefix("www.") {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => host,
    }
}
