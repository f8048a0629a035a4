use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::core::error::{RepoError, RepoResult};

/// Canonical identifier of one artifact.
///
/// Supported formats:
///   `group:name:version`
///   `group:name:version:classifier`
///   `group:name:version:classifier@extension`
///   `group:name:version@extension`
///
/// The extension defaults to `"jar"`. `Display` always writes the extension,
/// so the formatted string parses back to an equal coordinate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactCoordinate {
    pub group: String,
    pub name: String,
    /// Opaque token, never normalized.
    pub version: String,
    pub classifier: Option<String>,
    pub extension: String,
}

impl ArtifactCoordinate {
    /// Build a plain `jar` coordinate, validating every segment.
    pub fn new(group: &str, name: &str, version: &str) -> RepoResult<Self> {
        let raw = format!("{}:{}:{}", group, name, version);
        for segment in [group, name, version] {
            validate_segment(segment, &raw)?;
        }

        Ok(Self {
            group: group.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            classifier: None,
            extension: "jar".to_string(),
        })
    }

    /// Parse a coordinate string.
    ///
    /// # Examples
    /// ```
    /// use userdev::ArtifactCoordinate;
    /// let c = ArtifactCoordinate::parse("com.example:game:1.0:sources").unwrap();
    /// assert_eq!(c.classifier.as_deref(), Some("sources"));
    /// assert_eq!(c.extension, "jar");
    /// ```
    pub fn parse(coord: &str) -> RepoResult<Self> {
        let invalid = || RepoError::InvalidCoordinateFormat(coord.to_string());

        let (coord_part, extension) = match coord.split_once('@') {
            Some((head, ext)) => (head, ext),
            None => (coord, "jar"),
        };

        let parts: Vec<&str> = coord_part.split(':').collect();
        if !(3..=4).contains(&parts.len()) {
            return Err(invalid());
        }
        for segment in parts.iter().chain(std::iter::once(&extension)) {
            validate_segment(segment, coord)?;
        }

        Ok(Self {
            group: parts[0].to_string(),
            name: parts[1].to_string(),
            version: parts[2].to_string(),
            classifier: parts.get(3).map(|c| c.to_string()),
            extension: extension.to_string(),
        })
    }

    /// Construct the group path portion (`com/example`).
    pub fn group_path(&self) -> String {
        self.group.replace('.', "/")
    }

    /// `name-version[-classifier].extension`
    pub fn filename(&self) -> String {
        match &self.classifier {
            Some(c) => format!("{}-{}-{}.{}", self.name, self.version, c, self.extension),
            None => format!("{}-{}.{}", self.name, self.version, self.extension),
        }
    }

    /// Full URL of this artifact under a Maven-layout repository.
    pub fn url(&self, repo_base: &str) -> String {
        let base = repo_base.trim_end_matches('/');
        format!(
            "{}/{}/{}/{}/{}",
            base,
            self.group_path(),
            self.name,
            self.version,
            self.filename()
        )
    }

    /// Path relative to a store root, mirroring Maven's local repo layout:
    /// `<group_path>/<name>/<version>/<filename>`
    pub fn local_path(&self) -> PathBuf {
        let mut path = PathBuf::new();
        for part in self.group.split('.') {
            path.push(part);
        }
        path.join(&self.name)
            .join(&self.version)
            .join(self.filename())
    }

    pub fn with_classifier(&self, classifier: &str) -> Self {
        let mut clone = self.clone();
        clone.classifier = Some(classifier.to_string());
        clone
    }

    pub fn with_extension(&self, extension: &str) -> Self {
        let mut clone = self.clone();
        clone.extension = extension.to_string();
        clone
    }

    pub fn with_version(&self, version: &str) -> Self {
        let mut clone = self.clone();
        clone.version = version.to_string();
        clone
    }

    pub fn with_group(&self, group: &str) -> Self {
        let mut clone = self.clone();
        clone.group = group.to_string();
        clone
    }

    /// The base identity: same group/name/version, no classifier, `jar`.
    pub fn base(&self) -> Self {
        Self {
            group: self.group.clone(),
            name: self.name.clone(),
            version: self.version.clone(),
            classifier: None,
            extension: "jar".to_string(),
        }
    }

    /// True when both coordinates only differ by classifier and/or extension.
    pub fn same_base(&self, other: &Self) -> bool {
        self.group == other.group && self.name == other.name && self.version == other.version
    }
}

fn validate_segment(segment: &str, raw: &str) -> RepoResult<()> {
    let bad_char = |c: char| c.is_whitespace() || matches!(c, '/' | '\\' | ':' | '@');
    if segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.chars().any(bad_char)
        || segment.split('.').any(str::is_empty)
    {
        return Err(RepoError::InvalidCoordinateFormat(raw.to_string()));
    }
    Ok(())
}

impl fmt::Display for ArtifactCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.classifier {
            Some(c) => write!(
                f,
                "{}:{}:{}:{}@{}",
                self.group, self.name, self.version, c, self.extension
            ),
            None => write!(
                f,
                "{}:{}:{}@{}",
                self.group, self.name, self.version, self.extension
            ),
        }
    }
}

impl FromStr for ArtifactCoordinate {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
