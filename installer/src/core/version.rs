//! Runtime version parsing and minimum-version checks.

use std::sync::LazyLock;

use anyhow::{Result, anyhow};
use regex::Regex;
use semver::Version;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?").expect("version regex should compile")
});

/// Extract the first `major.minor[.patch]` from tool output such as
/// `Python 3.12.3` or `3.10`. A missing patch component is treated as 0.
pub fn parse_version(raw: &str) -> Result<Version> {
    let caps = VERSION_RE
        .captures(raw)
        .ok_or_else(|| anyhow!("no version number in '{}'", raw.trim()))?;
    let component = |idx: usize| -> Result<u64> {
        caps.get(idx)
            .map_or(Ok(0), |m| m.as_str().parse::<u64>())
            .map_err(|err| anyhow!("invalid version component in '{}': {err}", raw.trim()))
    };
    Ok(Version::new(component(1)?, component(2)?, component(3)?))
}

pub fn meets_minimum(found: &Version, minimum: &Version) -> bool {
    found >= minimum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_interpreter_banner() {
        assert_eq!(
            parse_version("Python 3.12.3").expect("parse"),
            Version::new(3, 12, 3)
        );
    }

    #[test]
    fn missing_patch_defaults_to_zero() {
        assert_eq!(parse_version("3.10").expect("parse"), Version::new(3, 10, 0));
    }

    #[test]
    fn rejects_text_without_version() {
        assert!(parse_version("command not found").is_err());
    }

    #[test]
    fn minimum_comparison_is_numeric() {
        let minimum = parse_version("3.10").expect("parse");
        assert!(meets_minimum(&parse_version("3.10.0").expect("parse"), &minimum));
        assert!(meets_minimum(&parse_version("3.12.1").expect("parse"), &minimum));
        assert!(!meets_minimum(&parse_version("3.9.18").expect("parse"), &minimum));
    }
}
