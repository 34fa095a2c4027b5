use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use regex::Regex;

/// Bytes escaped in a download path: everything outside the unreserved and
/// reserved URI characters, so `%`, `\` and spaces are escaped while `/`, `?`
/// and `#` keep their meaning. Non-ASCII is always escaped as UTF-8.
const URI_PATH_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Get current Unix timestamp in seconds
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Sanitize filename to remove invalid characters
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            _ => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// File name offered in the save dialog for a finished download.
pub fn suggested_filename(title: &str) -> String {
    let name = sanitize_filename(title);
    let name = name.trim_matches(|c| c == '.' || c == ' ');
    if name.is_empty() {
        "video.mp4".to_string()
    } else if name.rsplit_once('.').is_some_and(|(_, ext)| {
        !ext.is_empty() && ext.len() <= 4 && ext.chars().all(|c| c.is_ascii_alphanumeric())
    }) {
        name.to_string()
    } else {
        format!("{}.mp4", name)
    }
}

/// Turn a path returned by the backend into a fully qualified download URL.
///
/// Absolute `http(s)` URLs pass through untouched, so the function is idempotent
/// on its own output. Anything else is treated as a path below `base`: it gets
/// exactly one leading slash and is percent-encoded byte for byte, with no
/// segment normalisation.
pub fn resolve_download_url(raw_path: &str, base: &str) -> String {
    if raw_path.is_empty() {
        return String::new();
    }
    if raw_path.starts_with("http://") || raw_path.starts_with("https://") {
        return raw_path.to_string();
    }

    let path = format!("/{}", raw_path.trim_start_matches('/'));
    format!(
        "{}{}",
        base.trim_end_matches('/'),
        utf8_percent_encode(&path, URI_PATH_SET)
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    YouTube,
    Instagram,
    TikTok,
    Facebook,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::YouTube => "YouTube",
            Platform::Instagram => "Instagram",
            Platform::TikTok => "TikTok",
            Platform::Facebook => "Facebook",
        };
        f.write_str(name)
    }
}

/// Recognise the social network a link points at. Unknown hosts yield `None`.
pub fn detect_platform(url: &str) -> Option<Platform> {
    let re = Regex::new(
        r"(?i)^https?://(?:[a-z0-9-]+\.)*(youtube\.com|youtu\.be|instagram\.com|tiktok\.com|facebook\.com|fb\.watch)(?:[/:?#]|$)",
    )
    .ok()?;
    let caps = re.captures(url.trim())?;
    match caps[1].to_ascii_lowercase().as_str() {
        "youtube.com" | "youtu.be" => Some(Platform::YouTube),
        "instagram.com" => Some(Platform::Instagram),
        "tiktok.com" => Some(Platform::TikTok),
        "facebook.com" | "fb.watch" => Some(Platform::Facebook),
        _ => None,
    }
}
