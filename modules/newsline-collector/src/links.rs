//! Canonicalization of hyperlinks extracted from post bodies.

/// In-app deep links and invite links are navigation chrome, not content;
/// they canonicalize to the post's own URL instead.
const DEEP_LINK_PREFIXES: [&str; 2] = ["tg://resolve?domain=", "https://t.me/+"];

/// The one host whose playback id lives in the query string; its query
/// must survive canonicalization.
const VIDEO_WATCH_PREFIX: &str = "https://www.youtube.com/watch";

/// Normalize a raw extracted href into a canonical content link.
///
/// Rules, applied in order: no href → fallback; deep-link or invite
/// pattern → fallback; strip a `?utm…` tracking suffix; strip the
/// remaining query string except for video watch URLs; empty result →
/// fallback.
pub fn canonicalize_link(href: Option<&str>, fallback: &str) -> String {
    let href = match href {
        Some(h) => h,
        None => return fallback.to_string(),
    };

    if DEEP_LINK_PREFIXES.iter().any(|p| href.starts_with(p)) {
        return fallback.to_string();
    }

    let link = match href.find("?utm") {
        Some(idx) => &href[..idx],
        None => href,
    };

    let link = if link.starts_with(VIDEO_WATCH_PREFIX) {
        link
    } else {
        link.split('?').next().unwrap_or(link)
    };

    if link.is_empty() {
        fallback.to_string()
    } else {
        link.to_string()
    }
}
