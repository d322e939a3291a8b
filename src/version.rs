//! Parsing and comparison of embedded version strings
//!
//! Saved documents carry a `version` attribute on the root element so a
//! newer build can detect configuration written by an older one and vice
//! versa. Comparison is numeric per dotted segment, not lexicographic:
//! `3.10.0` is newer than `3.9.1`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of dotted segments considered for ordering
const SEGMENTS: usize = 4;

/// A parsed dotted version number, ordered numerically segment by segment
///
/// Trailing non-numeric suffixes are tolerated and ignored, so `3.67.0-rc1`
/// compares equal to `3.67.0`. Missing segments compare as zero, so `3.67`
/// equals `3.67.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionNumber([u64; SEGMENTS]);

impl VersionNumber {
    /// Parse a dotted version string
    ///
    /// Returns `None` if the string does not start with a digit. Parsing a
    /// segment stops at the first non-digit character; parsing the whole
    /// string stops at the first segment without leading digits.
    pub fn parse(s: &str) -> Option<Self> {
        let mut segments = [0u64; SEGMENTS];
        let mut any = false;

        for (i, part) in s.split('.').take(SEGMENTS).enumerate() {
            let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
            if digits.is_empty() {
                break;
            }
            segments[i] = digits.parse().ok()?;
            any = true;
            // A suffix like "0-rc1" terminates the numeric portion
            if digits.len() != part.len() {
                break;
            }
        }

        if any {
            Some(VersionNumber(segments))
        } else {
            None
        }
    }

    /// The version of this library build, from the crate manifest
    pub fn own() -> Self {
        // The crate version is always a valid dotted triple
        Self::parse(env!("CARGO_PKG_VERSION")).unwrap_or(VersionNumber([0; SEGMENTS]))
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.0[0], self.0[1], self.0[2])?;
        if self.0[3] != 0 {
            write!(f, ".{}", self.0[3])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_order() {
        let a = VersionNumber::parse("3.9.1").unwrap();
        let b = VersionNumber::parse("3.10.0").unwrap();
        assert!(a < b);
        assert!(VersionNumber::parse("4.0").unwrap() > b);
    }

    #[test]
    fn test_missing_segments_are_zero() {
        assert_eq!(
            VersionNumber::parse("3.67"),
            VersionNumber::parse("3.67.0.0")
        );
    }

    #[test]
    fn test_suffix_ignored() {
        assert_eq!(
            VersionNumber::parse("3.67.0-rc1"),
            VersionNumber::parse("3.67.0")
        );
    }

    #[test]
    fn test_invalid() {
        assert_eq!(VersionNumber::parse(""), None);
        assert_eq!(VersionNumber::parse("beta"), None);
    }

    #[test]
    fn test_own_version_parses() {
        assert!(VersionNumber::own() > VersionNumber::parse("0.0.1").unwrap());
    }
}
