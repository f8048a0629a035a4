use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::error::{RepoError, RepoResult};
use crate::core::maven::ArtifactCoordinate;

/// Role a declared dependency plays in the build.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationKind {
    /// The game artifact itself. Only one per build.
    Primary,
    /// A mod compiled against obfuscated names, to be remapped.
    Mod,
}

impl DeclarationKind {
    /// Kinds of which a build may declare at most one.
    pub fn is_singleton(self) -> bool {
        matches!(self, DeclarationKind::Primary)
    }
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclarationKind::Primary => write!(f, "primary"),
            DeclarationKind::Mod => write!(f, "mod"),
        }
    }
}

/// Caller intent to depend on `group:name:version` in a given role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DependencyDeclaration {
    pub group: String,
    pub name: String,
    pub version: String,
    pub kind: DeclarationKind,
}

impl DependencyDeclaration {
    pub fn new(group: &str, name: &str, version: &str, kind: DeclarationKind) -> RepoResult<Self> {
        ArtifactCoordinate::new(group, name, version)?;
        Ok(Self {
            group: group.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            kind,
        })
    }

    pub fn primary(notation: &str) -> RepoResult<Self> {
        Self::parse(notation, DeclarationKind::Primary)
    }

    pub fn mod_dependency(notation: &str) -> RepoResult<Self> {
        Self::parse(notation, DeclarationKind::Mod)
    }

    /// Parse `group:name:version`. Classifiers and extensions are not part of
    /// a declaration.
    pub fn parse(notation: &str, kind: DeclarationKind) -> RepoResult<Self> {
        let coordinate = ArtifactCoordinate::parse(notation)?;
        if coordinate.classifier.is_some() || notation.contains('@') {
            return Err(RepoError::InvalidCoordinateFormat(notation.to_string()));
        }
        Ok(Self {
            group: coordinate.group,
            name: coordinate.name,
            version: coordinate.version,
            kind,
        })
    }

    /// The declared artifact as a plain `jar` coordinate.
    pub fn coordinate(&self) -> ArtifactCoordinate {
        ArtifactCoordinate {
            group: self.group.clone(),
            name: self.name.clone(),
            version: self.version.clone(),
            classifier: None,
            extension: "jar".to_string(),
        }
    }

    pub fn notation(&self) -> String {
        format!("{}:{}:{}", self.group, self.name, self.version)
    }
}

impl fmt::Display for DependencyDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.notation())
    }
}
