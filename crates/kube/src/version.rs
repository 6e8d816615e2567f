//! Server version parsing and compatibility validation.

use std::fmt;

use crate::error::ClusterError;

/// Minimum Kubernetes API version flowscope supports.
pub const MINIMUM_VERSION: ClusterVersion = ClusterVersion {
    major: 1,
    minor: 16,
};

/// A parsed Kubernetes server version (major.minor).
///
/// Managed clusters report minors like `"24+"`, so parsing strips any
/// trailing non-digit characters before converting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClusterVersion {
    pub major: u32,
    pub minor: u32,
}

impl ClusterVersion {
    /// Parse from the major/minor strings of the version info endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if either component has no leading digits.
    pub fn parse(major: &str, minor: &str) -> Result<Self, ClusterError> {
        Ok(Self {
            major: parse_component(major)?,
            minor: parse_component(minor)?,
        })
    }

    /// Whether this version meets the minimum supported API version.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        *self >= MINIMUM_VERSION
    }
}

impl fmt::Display for ClusterVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

fn parse_component(raw: &str) -> Result<u32, ClusterError> {
    let digits: String = raw.chars().take_while(char::is_ascii_digit).collect();
    digits
        .parse()
        .map_err(|_| ClusterError::Version(raw.to_string()))
}
