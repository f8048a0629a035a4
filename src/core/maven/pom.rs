use quick_xml::de::from_str;
use serde::{Deserialize, Serialize};

use super::artifact::ArtifactCoordinate;
use crate::core::error::{RepoError, RepoResult};

const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Minimal POM model – only the fields a synthesized descriptor carries.
#[derive(Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename = "project", rename_all = "camelCase")]
pub struct PomDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packaging: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<PomDependencies>,
}

#[derive(Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct PomDependencies {
    #[serde(default, rename = "dependency")]
    pub items: Vec<PomDependency>,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PomDependency {
    pub group_id: String,
    pub artifact_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub dep_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl From<&ArtifactCoordinate> for PomDependency {
    fn from(c: &ArtifactCoordinate) -> Self {
        Self {
            group_id: c.group.clone(),
            artifact_id: c.name.clone(),
            version: Some(c.version.clone()),
            classifier: c.classifier.clone(),
            dep_type: (c.extension != "jar").then(|| c.extension.clone()),
            scope: Some("compile".to_string()),
        }
    }
}

impl PomDocument {
    /// Descriptor for a synthesized artifact and its direct dependencies.
    pub fn for_artifact(artifact: &ArtifactCoordinate, dependencies: &[ArtifactCoordinate]) -> Self {
        let dependencies = (!dependencies.is_empty()).then(|| PomDependencies {
            items: dependencies.iter().map(PomDependency::from).collect(),
        });

        Self {
            model_version: Some("4.0.0".to_string()),
            group_id: Some(artifact.group.clone()),
            artifact_id: Some(artifact.name.clone()),
            version: Some(artifact.version.clone()),
            packaging: None,
            dependencies,
        }
    }

    /// Parse a POM XML string into a `PomDocument`.
    pub fn parse(xml: &str) -> RepoResult<Self> {
        from_str(xml).map_err(|e| RepoError::Other(format!("POM parse error: {}", e)))
    }

    /// Render as a complete XML document.
    pub fn render(&self) -> Result<String, String> {
        let body = quick_xml::se::to_string_with_root("project", self).map_err(|e| e.to_string())?;
        Ok(format!("{}\n{}\n", XML_HEADER, body))
    }

    pub fn dependency_items(&self) -> &[PomDependency] {
        self.dependencies
            .as_ref()
            .map(|d| d.items.as_slice())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_pom() {
        let xml = r#"
        <project>
            <groupId>com.example</groupId>
            <artifactId>demo</artifactId>
            <version>1.0</version>
            <dependencies>
                <dependency>
                    <groupId>org.lwjgl</groupId>
                    <artifactId>lwjgl</artifactId>
                    <version>3.3.3</version>
                </dependency>
            </dependencies>
        </project>
        "#;
        let pom = PomDocument::parse(xml).unwrap();
        assert_eq!(pom.group_id.as_deref(), Some("com.example"));
        assert_eq!(pom.dependency_items().len(), 1);
        assert_eq!(pom.dependency_items()[0].artifact_id, "lwjgl");
    }

    #[test]
    fn rendered_descriptor_lists_dependencies() {
        let artifact = ArtifactCoordinate::parse("com.example:game:1.0").unwrap();
        let deps = vec![
            ArtifactCoordinate::parse("org.lwjgl:lwjgl:3.3.3").unwrap(),
            ArtifactCoordinate::parse("org.lwjgl:lwjgl:3.3.3:natives-linux").unwrap(),
        ];

        let xml = PomDocument::for_artifact(&artifact, &deps).render().unwrap();
        assert!(xml.starts_with(XML_HEADER));
        assert!(xml.contains("<artifactId>game</artifactId>"));
        assert!(xml.contains("<classifier>natives-linux</classifier>"));

        let parsed = PomDocument::parse(&xml).unwrap();
        assert_eq!(parsed.version.as_deref(), Some("1.0"));
        assert_eq!(parsed.dependency_items().len(), 2);
    }

    #[test]
    fn descriptor_without_dependencies_omits_section() {
        let artifact = ArtifactCoordinate::parse("deobf.com.example:mod:2.0").unwrap();
        let xml = PomDocument::for_artifact(&artifact, &[]).render().unwrap();
        assert!(!xml.contains("<dependencies"));
    }
}
