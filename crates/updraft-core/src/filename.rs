//! Local file names for downloaded packages.
//!
//! Prefers the server's `Content-Disposition` filename, then the last segment
//! of the URL path, then a name derived from a hash of the URL. Whatever is
//! chosen is made safe to join onto the install directory.

use sha2::{Digest, Sha256};

const NAME_MAX: usize = 255;

/// Name to save the package at `url` under.
///
/// The result never contains a path separator and is never empty, `.` or `..`.
pub fn derive_filename(url: &str, content_disposition: Option<&str>) -> String {
    content_disposition
        .and_then(parse_content_disposition_filename)
        .and_then(|name| sanitize(&name))
        .or_else(|| filename_from_url_path(url).and_then(|name| sanitize(&name)))
        .unwrap_or_else(|| fallback_filename(url))
}

/// Deterministic name for URLs without a usable path segment.
pub fn fallback_filename(url: &str) -> String {
    let digest = hex::encode(Sha256::digest(url.as_bytes()));
    format!("update-{}.bin", &digest[..12])
}

/// Last non-empty path segment of `url`, percent-decoded.
pub fn filename_from_url_path(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let decoded = percent_decode(segment);
    if decoded == "." || decoded == ".." {
        return None;
    }
    Some(decoded)
}

/// Extract the filename from a `Content-Disposition` value.
///
/// Handles `filename="quoted"`, `filename=token` and RFC 5987
/// `filename*=UTF-8''percent%20encoded`; the extended form wins when both appear.
pub fn parse_content_disposition_filename(value: &str) -> Option<String> {
    let mut plain: Option<String> = None;
    let mut extended: Option<String> = None;

    for param in value.split(';').skip(1) {
        let Some((name, raw)) = param.split_once('=') else {
            continue;
        };
        let raw = raw.trim();
        match name.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                // charset'language'value
                let mut parts = raw.splitn(3, '\'');
                let charset = parts.next().unwrap_or("");
                let _lang = parts.next();
                if let Some(encoded) = parts.next() {
                    if charset.eq_ignore_ascii_case("utf-8") || charset.is_empty() {
                        extended = Some(percent_decode(encoded.trim_matches('"')));
                    }
                }
            }
            "filename" => plain = Some(unquote(raw)),
            _ => {}
        }
    }

    extended
        .filter(|s| !s.is_empty())
        .or(plain.filter(|s| !s.is_empty()))
}

fn unquote(raw: &str) -> String {
    let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) else {
        return raw.replace('"', "");
    };
    let mut out = String::with_capacity(inner.len());
    let mut escaped = false;
    for c in inner.chars() {
        if escaped {
            out.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else {
            out.push(c);
        }
    }
    out
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hi = (bytes[i + 1] as char).to_digit(16);
            let lo = (bytes[i + 2] as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Strip anything that would let a name escape the install directory or
/// fail on a desktop filesystem. `None` if nothing usable remains.
fn sanitize(name: &str) -> Option<String> {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = replaced.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '_') {
        return None;
    }

    let mut end = trimmed.len().min(NAME_MAX);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    Some(trimmed[..end].to_string())
}
