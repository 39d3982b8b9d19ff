use std::fmt;

use crate::error::UpdaterError;

const STABLE_BASE_URL: &str = "https://updates.smolmanager.org/stable";
const UNSTABLE_BASE_URL: &str = "https://updates.smolmanager.org/unstable";
const TEST_BASE_URL: &str = "https://updates.smolmanager.org/test";

/// Release track a built artifact is published under.
///
/// The set is closed: every channel maps to exactly one remote base URL, and
/// anything else is a configuration error rather than a silent fallback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Stable,
    Unstable,
    Test,
}

impl Channel {
    /// Resolve a channel name, case-insensitively. "main" is an accepted
    /// alias for the stable channel.
    ///
    /// # Errors
    /// Returns `UnknownChannel` naming the bad input for anything outside
    /// {stable, main, unstable, test}.
    pub fn parse(name: &str) -> Result<Self, UpdaterError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "stable" | "main" => Ok(Self::Stable),
            "unstable" => Ok(Self::Unstable),
            "test" => Ok(Self::Test),
            _ => Err(UpdaterError::UnknownChannel {
                name: name.to_owned(),
            }),
        }
    }

    /// Remote root the channel's manifests are published under.
    pub fn base_url(self) -> &'static str {
        match self {
            Self::Stable => STABLE_BASE_URL,
            Self::Unstable => UNSTABLE_BASE_URL,
            Self::Test => TEST_BASE_URL,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stable => "stable",
            Self::Unstable => "unstable",
            Self::Test => "test",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_case_insensitively() {
        assert_eq!(Channel::parse("stable").unwrap(), Channel::Stable);
        assert_eq!(Channel::parse("STABLE").unwrap(), Channel::Stable);
        assert_eq!(Channel::parse("Unstable").unwrap(), Channel::Unstable);
        assert_eq!(Channel::parse("  test ").unwrap(), Channel::Test);
    }

    #[test]
    fn accepts_main_as_stable_alias() {
        assert_eq!(Channel::parse("main").unwrap(), Channel::Stable);
        assert_eq!(
            Channel::parse("main").unwrap().base_url(),
            Channel::parse("stable").unwrap().base_url()
        );
    }

    #[test]
    fn rejects_unknown_channels_by_name() {
        let err = Channel::parse("nightly").unwrap_err();
        assert!(matches!(err, UpdaterError::UnknownChannel { .. }));
        assert!(err.to_string().contains("nightly"));
    }

    #[test]
    fn maps_each_channel_to_a_distinct_url() {
        assert_eq!(Channel::Unstable.base_url(), UNSTABLE_BASE_URL);
        assert_ne!(Channel::Stable.base_url(), Channel::Unstable.base_url());
        assert_ne!(Channel::Unstable.base_url(), Channel::Test.base_url());
        assert_ne!(Channel::Stable.base_url(), Channel::Test.base_url());
    }
}
