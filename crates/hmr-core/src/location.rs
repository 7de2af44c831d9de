//! URL normalisation and cache-busting.

use std::cell::Cell;

use url::Url;

/// Path of a URL resolved against the page origin, query and fragment
/// stripped.
///
/// Falls back to truncating at `?` when the URL cannot be resolved.
pub fn normalize_path(url: &str, origin: &Url) -> String {
    match origin.join(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => strip_query(url).to_string(),
    }
}

/// Registry key for a module identifier. Empty identifiers have no key.
pub fn normalize_module_id(candidate: Option<&str>, origin: &Url) -> Option<String> {
    match candidate {
        Some(id) if !id.is_empty() => Some(normalize_path(id, origin)),
        _ => None,
    }
}

/// Set `param=token` on a URL so the browser refetches it.
///
/// An existing `param` is replaced in place and duplicates are dropped.
/// Same-origin URLs come back origin-relative, foreign ones absolute.
pub fn with_cache_buster(url: &str, token: &str, param: &str, origin: &Url) -> String {
    if url.is_empty() {
        return String::new();
    }

    let mut parsed = match origin.join(url) {
        Ok(parsed) => parsed,
        Err(_) => {
            let separator = if url.contains('?') { '&' } else { '?' };
            return format!("{url}{separator}{param}={token}");
        }
    };

    let mut pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
    let mut replaced = false;
    pairs.retain_mut(|(key, value)| {
        if key != param {
            return true;
        }
        if replaced {
            return false;
        }
        *value = token.to_string();
        replaced = true;
        true
    });
    if !replaced {
        pairs.push((param.to_string(), token.to_string()));
    }
    parsed.query_pairs_mut().clear().extend_pairs(&pairs);

    if parsed.origin() != origin.origin() {
        return parsed.to_string();
    }

    let mut relative = parsed.path().to_string();
    if let Some(query) = parsed.query() {
        relative.push('?');
        relative.push_str(query);
    }
    if let Some(fragment) = parsed.fragment() {
        relative.push('#');
        relative.push_str(fragment);
    }
    relative
}

fn strip_query(url: &str) -> &str {
    match url.find('?') {
        Some(index) => &url[..index],
        None => url,
    }
}

/// Issues one cache-busting token per payload.
///
/// Tokens are the base-36 millisecond clock, bumped by one whenever the
/// clock has not advanced since the last token, so they strictly increase.
#[derive(Debug, Default)]
pub struct CacheBuster {
    last: Cell<u64>,
}

impl CacheBuster {
    /// Create a new token issuer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the token for a payload starting at `now_ms`.
    pub fn issue(&self, now_ms: u64) -> String {
        let last = self.last.get();
        let next = if now_ms > last { now_ms } else { last + 1 };
        self.last.set(next);
        to_base36(next)
    }
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::new();
    while value > 0 {
        digits.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}
