use serde::{Deserialize, Serialize};

/// A package as recorded by a package manager, or an advisory pattern.
///
/// Every field except `name` may be empty. In an advisory pattern an empty
/// field matches any value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: String,
    pub release: String,
    pub repository: String,
}

impl Package {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    pub fn with_release(mut self, release: impl Into<String>) -> Self {
        self.release = release.into();
        self
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = repository.into();
        self
    }

    /// Parses an advisory pattern of the form `name-version-release:repository`.
    ///
    /// Trailing parts may be left out; whatever is missing stays empty and
    /// acts as a wildcard.
    ///
    /// ```
    /// use microscope::Package;
    ///
    /// let pkg = Package::parse_pattern("openssl-1.1.1-r0:alpine");
    /// assert_eq!(pkg.name, "openssl");
    /// assert_eq!(pkg.version, "1.1.1");
    /// assert_eq!(pkg.release, "r0");
    /// assert_eq!(pkg.repository, "alpine");
    /// ```
    pub fn parse_pattern(input: &str) -> Self {
        let (name, tail) = split_name_version(input);
        let (version, rest) = cut(&tail, '-');
        let (release, repository) = cut(rest, ':');

        Self {
            name,
            version: version.to_string(),
            release: release.to_string(),
            repository: repository.to_string(),
        }
    }

    /// Parses an installed-package string of the form
    /// `name-version-release.arch`, keeping only the name and version.
    pub fn from_nevra(input: &str) -> Self {
        let (name, tail) = split_name_version(input);
        let (version, _) = cut(&tail, '-');
        Self::new(name, version)
    }
}

impl std::fmt::Display for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}-{}:{}",
            self.name, self.version, self.release, self.repository
        )
    }
}

#[derive(Clone, Copy)]
enum SplitState {
    Name,
    NameDash,
    Version,
}

/// Splits a package token into its name and everything after it.
///
/// Package names may contain dashes, so the only reliable boundary is a dash
/// followed by a digit. A dash followed by anything else stays in the name.
pub fn split_name_version(input: &str) -> (String, String) {
    let mut state = SplitState::Name;
    let mut name = String::new();
    let mut tail = String::new();

    for ch in input.chars() {
        state = match state {
            SplitState::Name if ch == '-' => SplitState::NameDash,
            SplitState::Name => {
                name.push(ch);
                SplitState::Name
            }
            SplitState::NameDash if ch.is_ascii_digit() => {
                tail.push(ch);
                SplitState::Version
            }
            SplitState::NameDash => {
                name.push('-');
                name.push(ch);
                SplitState::Name
            }
            SplitState::Version => {
                tail.push(ch);
                SplitState::Version
            }
        };
    }

    (name, tail)
}

/// Like `str::split_once`, but a missing separator yields an empty second half.
pub(crate) fn cut(input: &str, separator: char) -> (&str, &str) {
    input.split_once(separator).unwrap_or((input, ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_name_with_dashes() {
        let (name, tail) = split_name_version("foo-bar-1.2.3-4.x86_64");
        assert_eq!(name, "foo-bar");
        assert_eq!(tail, "1.2.3-4.x86_64");
    }

    #[test]
    fn test_split_name_only() {
        assert_eq!(
            split_name_version("python3-pip"),
            ("python3-pip".to_string(), String::new())
        );
    }

    #[test]
    fn test_split_drops_trailing_dash() {
        assert_eq!(
            split_name_version("curl-"),
            ("curl".to_string(), String::new())
        );
    }

    #[test]
    fn test_split_double_dash_stays_in_name() {
        let (name, tail) = split_name_version("a--1");
        assert_eq!(name, "a--1");
        assert!(tail.is_empty());
    }

    #[test]
    fn test_from_nevra() {
        let pkg = Package::from_nevra("foo-bar-1.2.3-4.x86_64");
        assert_eq!(pkg.name, "foo-bar");
        assert_eq!(pkg.version, "1.2.3");
        assert!(pkg.release.is_empty());

        let pkg = Package::from_nevra("foo-1-2");
        assert_eq!(pkg.name, "foo");
        assert_eq!(pkg.version, "1");
    }

    #[test]
    fn test_parse_pattern_full() {
        let pkg = Package::parse_pattern("openssl-1.1.1-r0:alpine");
        assert_eq!(
            pkg,
            Package::new("openssl", "1.1.1")
                .with_release("r0")
                .with_repository("alpine")
        );
    }

    #[test]
    fn test_parse_pattern_name_only_is_all_wildcard() {
        let pkg = Package::parse_pattern("curl");
        assert_eq!(pkg.name, "curl");
        assert!(pkg.version.is_empty());
        assert!(pkg.release.is_empty());
        assert!(pkg.repository.is_empty());
    }

    #[test]
    fn test_parse_pattern_without_release() {
        let pkg = Package::parse_pattern("libxml2-2.9.14");
        assert_eq!(pkg.name, "libxml2");
        assert_eq!(pkg.version, "2.9.14");
        assert!(pkg.release.is_empty());
    }

    #[test]
    fn test_display() {
        let pkg = Package::new("bash", "5.2").with_release("1");
        assert_eq!(pkg.to_string(), "bash-5.2-1:");
    }
}
