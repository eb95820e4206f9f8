//! Shared limits and the domain-name pattern used by validation.

use std::sync::OnceLock;

use regex::Regex;

/// Lowest valid TCP/UDP port.
pub const MIN_PORT: i32 = 1;

/// Highest valid TCP/UDP port.
pub const MAX_PORT: i32 = 65_535;

/// Smallest failure count a circuit breaker may open after.
pub const MIN_CIRCUIT_BREAKER_FAILURES: i32 = 1;

/// Smallest open duration of a circuit breaker, in seconds.
pub const MIN_CIRCUIT_BREAKER_OPEN_SECONDS: i32 = 0;

/// Longest domain name accepted, trailing dot excluded.
pub const MAX_DOMAIN_NAME_LEN: usize = 253;

/// Dot-separated labels; a label is `*` or 1-63 alphanumerics/hyphens that
/// neither start nor end with a hyphen. A single trailing dot is allowed.
const DOMAIN_NAME_PATTERN: &str = r"^(?:\*|[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)(?:\.(?:\*|[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?))*\.?$";

fn domain_name_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(DOMAIN_NAME_PATTERN).expect("domain name pattern compiles"))
}

/// Returns true if `name` is a DNS name, wildcard labels allowed.
pub fn is_valid_domain_name(name: &str) -> bool {
    name.trim_end_matches('.').len() <= MAX_DOMAIN_NAME_LEN && domain_name_regex().is_match(name)
}
