use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Client-side problems with a build request. The `Display` text is the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Branch name not set.")]
    MissingBranch,
    #[error("Version not set.")]
    MissingVersion,
    #[error("Invalid branch name.")]
    InvalidBranch,
    #[error("Invalid version.")]
    InvalidVersion,
}

// Version ends up in a file name and an object key.
static VERSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._+-]*$").expect("valid version pattern"));

static BRANCH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^-\s\p{Cc}][^\s\p{Cc}]*$").expect("valid branch pattern"));

/// A validated request to build and publish one branch under one version label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub branch: String,
    pub version: String,
}

impl BuildRequest {
    /// Validates decoded query pairs. The first occurrence of a key wins.
    ///
    /// Checks run branch first, then version, presence before shape.
    pub fn from_query(pairs: &[(String, String)]) -> Result<Self, ValidationError> {
        let first = |name: &str| {
            pairs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str())
                .unwrap_or_default()
        };
        let branch = first("branch");
        let version = first("version");

        if branch.is_empty() {
            return Err(ValidationError::MissingBranch);
        }
        if version.is_empty() {
            return Err(ValidationError::MissingVersion);
        }
        if !BRANCH_PATTERN.is_match(branch) {
            return Err(ValidationError::InvalidBranch);
        }
        if !VERSION_PATTERN.is_match(version) {
            return Err(ValidationError::InvalidVersion);
        }

        Ok(Self {
            branch: branch.to_string(),
            version: version.to_string(),
        })
    }
}
