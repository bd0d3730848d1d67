//! Response cacheability policy.
//!
//! Maps a response's status code and `Cache-Control` header to a freshness
//! lifetime. The whole module is pure: no clocks, no I/O, no state.

use std::time::Duration;

use crate::http::StatusCode;

/// Returns how long a response may be cached, or `None` if it must not be.
///
/// A response is cacheable only when its status is in the storable set *and*
/// its `Cache-Control` header grants an explicit lifetime: `s-maxage` when
/// present, otherwise `max-age`. A `private` marking anywhere in the header,
/// a missing header, or missing lifetime directives all veto caching.
/// `max-age=0` yields a zero duration, which callers treat as not worth
/// storing.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use shellac::cache::policy::evaluate;
/// use shellac::http::StatusCode;
///
/// let ttl = evaluate(StatusCode::Ok, Some("public, max-age=60"));
/// assert_eq!(ttl, Some(Duration::from_secs(60)));
///
/// assert_eq!(evaluate(StatusCode::Ok, Some("private, max-age=60")), None);
/// assert_eq!(evaluate(StatusCode::Created, Some("max-age=60")), None);
/// ```
pub fn evaluate(status: StatusCode, cache_control: Option<&str>) -> Option<Duration> {
    if !is_cacheable_status(status) {
        return None;
    }
    cache_control.and_then(max_age).map(Duration::from_secs)
}

/// Statuses eligible for storage. Everything else passes through regardless
/// of headers.
fn is_cacheable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::Ok
            | StatusCode::NonAuthoritativeInformation
            | StatusCode::NoContent
            | StatusCode::MultipleChoices
            | StatusCode::MovedPermanently
            | StatusCode::Found
            | StatusCode::NotModified
            | StatusCode::TemporaryRedirect
            | StatusCode::NotFound
            | StatusCode::Gone
            | StatusCode::UriTooLong
    )
}

/// Extracts the freshness lifetime in seconds from a `Cache-Control` value.
///
/// Directive names are case-insensitive and values may be quoted. The first
/// well-formed occurrence of each lifetime directive counts; malformed
/// values are skipped rather than treated as errors.
fn max_age(value: &str) -> Option<u64> {
    // `private` anywhere in the value wins over everything else.
    if value.to_ascii_lowercase().contains("private") {
        return None;
    }

    let mut s_maxage = None;
    let mut max_age = None;

    for directive in value.split(',') {
        let directive = directive.trim();
        let (name, arg) = match directive.split_once('=') {
            Some((name, arg)) => (name.trim(), Some(arg.trim().trim_matches('"'))),
            None => (directive, None),
        };
        let seconds = arg.and_then(|arg| arg.parse::<u64>().ok());
        if name.eq_ignore_ascii_case("s-maxage") && s_maxage.is_none() {
            s_maxage = seconds;
        } else if name.eq_ignore_ascii_case("max-age") && max_age.is_none() {
            max_age = seconds;
        }
    }

    s_maxage.or(max_age)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Option<Duration> {
        Some(Duration::from_secs(n))
    }

    #[test]
    fn requires_both_status_and_lifetime() {
        assert_eq!(evaluate(StatusCode::Ok, Some("max-age=60")), secs(60));
        assert_eq!(evaluate(StatusCode::Ok, None), None);
        assert_eq!(evaluate(StatusCode::Ok, Some("public")), None);
        assert_eq!(evaluate(StatusCode::Created, Some("max-age=60")), None);
        assert_eq!(
            evaluate(StatusCode::InternalServerError, Some("max-age=60")),
            None
        );
    }

    #[test]
    fn s_maxage_wins_over_max_age() {
        assert_eq!(
            evaluate(StatusCode::Ok, Some("s-maxage=100, max-age=60")),
            secs(100)
        );
        assert_eq!(
            evaluate(StatusCode::Ok, Some("max-age=60, s-maxage=100")),
            secs(100)
        );
    }

    #[test]
    fn private_vetoes_case_insensitively() {
        assert_eq!(evaluate(StatusCode::Ok, Some("private, max-age=60")), None);
        assert_eq!(evaluate(StatusCode::Ok, Some("PRIVATE, max-age=60")), None);
        assert_eq!(evaluate(StatusCode::Ok, Some("max-age=60, Private")), None);
    }

    #[test]
    fn directive_names_are_case_insensitive() {
        assert_eq!(evaluate(StatusCode::Ok, Some("S-MaxAge=10")), secs(10));
        assert_eq!(evaluate(StatusCode::Ok, Some("Max-Age=20")), secs(20));
    }

    #[test]
    fn quoted_and_padded_values_parse() {
        assert_eq!(evaluate(StatusCode::Ok, Some(r#"max-age="60""#)), secs(60));
        assert_eq!(evaluate(StatusCode::Ok, Some(" max-age = 60 ")), secs(60));
    }

    #[test]
    fn malformed_values_are_skipped() {
        assert_eq!(evaluate(StatusCode::Ok, Some("max-age=abc")), None);
        assert_eq!(evaluate(StatusCode::Ok, Some("max-age")), None);
        assert_eq!(evaluate(StatusCode::Ok, Some("")), None);
        // A later well-formed occurrence still counts.
        assert_eq!(
            evaluate(StatusCode::Ok, Some("max-age=abc, max-age=60")),
            secs(60)
        );
    }

    #[test]
    fn zero_lifetime_is_reported_not_dropped() {
        assert_eq!(
            evaluate(StatusCode::Ok, Some("max-age=0")),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn negative_responses_are_cacheable() {
        assert_eq!(evaluate(StatusCode::NotFound, Some("max-age=30")), secs(30));
        assert_eq!(evaluate(StatusCode::Gone, Some("max-age=30")), secs(30));
        assert_eq!(
            evaluate(StatusCode::MovedPermanently, Some("s-maxage=300")),
            secs(300)
        );
    }
}
