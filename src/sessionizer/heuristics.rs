use chrono::{DateTime, Utc};
use url::Url;

/// Timestamp and URL of a capture; all the idle/domain checks need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureMarker {
    pub ts: DateTime<Utc>,
    pub url: String,
}

impl CaptureMarker {
    pub fn new(ts: DateTime<Utc>, url: impl Into<String>) -> Self {
        Self {
            ts,
            url: url.into(),
        }
    }
}

pub fn extract_hostname(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .host_str()
        .filter(|host| !host.is_empty())
        .map(|host| host.to_ascii_lowercase())
}

/// Last two dot-separated labels of `host`. Not public-suffix aware: `bbc.co.uk` and
/// `gov.co.uk` share a base.
pub fn base_domain(host: &str) -> &str {
    match host.rmatch_indices('.').nth(1) {
        Some((index, _)) => &host[index + 1..],
        None => host,
    }
}

/// True when the hostname of `url` equals, or is a subdomain of, an excluded entry.
pub fn is_domain_excluded<S: AsRef<str>>(url: &str, excluded_domains: &[S]) -> bool {
    let Some(host) = extract_hostname(url) else {
        return false;
    };

    excluded_domains.iter().any(|excluded| {
        let excluded = excluded.as_ref();
        !excluded.is_empty()
            && (host == excluded
                || host
                    .strip_suffix(excluded)
                    .is_some_and(|prefix| prefix.ends_with('.')))
    })
}

/// True for URLs starting with any of `prefixes` (browser-internal pages).
pub fn is_excluded_url<S: AsRef<str>>(url: &str, prefixes: &[S]) -> bool {
    prefixes
        .iter()
        .any(|prefix| url.starts_with(prefix.as_ref()))
}

/// Base domains differ. Unparseable URLs never count as a change.
pub fn has_significant_domain_change(previous_url: &str, current_url: &str) -> bool {
    match (extract_hostname(previous_url), extract_hostname(current_url)) {
        (Some(previous), Some(current)) => base_domain(&previous) != base_domain(&current),
        _ => false,
    }
}

pub fn is_idle_threshold_exceeded(
    last_activity: DateTime<Utc>,
    current: DateTime<Utc>,
    threshold_minutes: u32,
) -> bool {
    let threshold_ms = i64::from(threshold_minutes) * 60_000;
    (current - last_activity).num_milliseconds() > threshold_ms
}

pub fn should_start_new_session(
    last_capture: Option<&CaptureMarker>,
    current_capture: &CaptureMarker,
    idle_threshold_minutes: u32,
) -> bool {
    let Some(last) = last_capture else {
        return true;
    };

    is_idle_threshold_exceeded(last.ts, current_capture.ts, idle_threshold_minutes)
        || has_significant_domain_change(&last.url, &current_capture.url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(ms: i64, url: &str) -> CaptureMarker {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        CaptureMarker::new(t0 + Duration::milliseconds(ms), url)
    }

    #[test]
    fn subdomains_of_excluded_domains_are_excluded() {
        assert!(is_domain_excluded("https://mail.google.com/x", &["google.com"]));
        assert!(is_domain_excluded("https://google.com", &["google.com"]));
        assert!(!is_domain_excluded("https://notgoogle.com", &["google.com"]));
        assert!(!is_domain_excluded("not a url", &["google.com"]));
        assert!(!is_domain_excluded::<&str>("https://google.com", &[]));
    }

    #[test]
    fn base_domain_keeps_last_two_labels() {
        assert_eq!(base_domain("docs.rust-lang.org"), "rust-lang.org");
        assert_eq!(base_domain("a.b.c.example.com"), "example.com");
        assert_eq!(base_domain("example.com"), "example.com");
        assert_eq!(base_domain("localhost"), "localhost");
    }

    #[test]
    fn first_capture_always_starts_a_session() {
        assert!(should_start_new_session(None, &at(0, "https://a.com"), 12));
    }

    #[test]
    fn idle_threshold_is_exclusive() {
        let last = at(0, "https://a.com");
        let threshold_ms = 12 * 60_000;
        assert!(!should_start_new_session(
            Some(&last),
            &at(threshold_ms, "https://www.a.com/page"),
            12
        ));
        assert!(should_start_new_session(
            Some(&last),
            &at(threshold_ms + 1, "https://a.com/page"),
            12
        ));
    }

    #[test]
    fn domain_change_breaks_session_regardless_of_time() {
        let last = at(0, "https://docs.a.com");
        assert!(should_start_new_session(Some(&last), &at(1, "https://b.com"), 12));
        assert!(!should_start_new_session(Some(&last), &at(1, "https://blog.a.com"), 12));
    }

    #[test]
    fn malformed_urls_never_count_as_domain_change() {
        assert!(!has_significant_domain_change("::garbage::", "https://a.com"));
        assert!(!has_significant_domain_change("https://a.com", ""));
        assert!(has_significant_domain_change("https://a.com", "https://b.org"));
    }

    #[test]
    fn internal_pages_match_prefixes() {
        let prefixes = ["chrome://", "chrome-extension://"];
        assert!(is_excluded_url("chrome://settings", &prefixes));
        assert!(is_excluded_url("chrome-extension://abc/popup.html", &prefixes));
        assert!(!is_excluded_url("https://chrome.google.com", &prefixes));
    }
}
