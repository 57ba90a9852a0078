//! File names from `Content-Disposition` headers.

use url::Url;

/// Extract the file name from a `Content-Disposition` value.
///
/// `filename*=` (RFC 5987, percent-encoded) is preferred over `filename=`.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for param in value.split(';').map(str::trim) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let raw = raw.trim();

        if key == "filename*" {
            // charset'language'percent-encoded
            let encoded = raw.splitn(3, '\'').nth(2).unwrap_or(raw);
            extended = urlencoding::decode(encoded.trim_matches('"'))
                .ok()
                .map(|s| s.into_owned());
        } else if key == "filename" {
            let name = raw.trim_matches('"');
            plain = Some(
                urlencoding::decode(name)
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|_| name.to_string()),
            );
        }
    }

    extended
        .or(plain)
        .map(|name| sanitize(&name))
        .filter(|name| !name.is_empty())
}

/// Last path segment of a URL, percent-decoded.
pub fn filename_from_url(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let segment = url.path_segments()?.rev().find(|s| !s.is_empty())?;
    let name = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    Some(sanitize(&name)).filter(|name| !name.is_empty())
}

/// Keep only the base name.
fn sanitize(name: &str) -> String {
    name.rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(name)
        .trim()
        .to_string()
}
