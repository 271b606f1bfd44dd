use url::Url;

/// Domain of a URL: the scheme is stripped and the host taken up to the next
/// `/` or `?`. Port and userinfo are kept as written.
///
/// Returns `None` for empty input or when nothing remains after the scheme.
pub fn url2domain(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }

    let rest = match url.find("://") {
        Some(idx) => &url[idx + 3..],
        None => url,
    };
    let end = rest.find(['/', '?']).unwrap_or(rest.len());
    let domain = &rest[..end];

    if domain.is_empty() {
        None
    } else {
        Some(domain.to_ascii_lowercase())
    }
}

/// Canonical form of an absolute URL (`http://a.example` becomes
/// `http://a.example/`). Unparseable input is returned trimmed.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    Url::parse(url).map(String::from).unwrap_or_else(|_| url.to_string())
}

pub fn is_absolute(url: &str) -> bool {
    Url::parse(url).is_ok()
}

/// Resolves `reference` against `base`. Absolute references are returned
/// unchanged; an unusable base yields `None`.
pub fn resolve_url(base: &str, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }
    if is_absolute(reference) {
        return Some(reference.to_string());
    }
    let base = Url::parse(base).ok()?;
    base.join(reference).ok().map(String::from)
}
