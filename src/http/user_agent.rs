//! User-Agent sanitizing.
//!
//! Platform detail is stripped before a request leaves the relay: the
//! parenthesised comment keeps only its first token and the `rv:` version,
//! and Windows build numbers collapse to `Windows NT;`.

use std::sync::LazyLock;

use regex::Regex;

static PLATFORM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\(([^;]+);.*(rv:[\d.]+)\)").expect("valid regex"));

static WINDOWS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)windows[^;]+;").expect("valid regex"));

/// Remove platform and OS version detail from a User-Agent string.
pub fn prune_user_agent(user_agent: &str) -> String {
    let pruned = PLATFORM.replace(user_agent, "(${1}; ${2})");
    WINDOWS.replace(&pruned, "Windows NT;").into_owned()
}
