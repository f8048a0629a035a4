mod artifact;
mod pom;
mod resolver;

pub use artifact::ArtifactCoordinate;
pub use pom::{PomDependency, PomDocument};
pub use resolver::MavenDownloadService;

/// Well-known Maven repositories used by the Minecraft ecosystem.
pub const FORGE_MAVEN: &str = "https://maven.minecraftforge.net";
pub const MOJANG_LIBRARIES: &str = "https://libraries.minecraft.net";
pub const MAVEN_CENTRAL: &str = "https://repo1.maven.org/maven2";
