// ─── Access Transformers ───
// Line-based rules widening the access of game classes and members, e.g.
//   public net.minecraft.world.World func_72838_d(Lnet/minecraft/entity/Entity;)Z
//   protected-f net.minecraft.client.Minecraft field_71428_T
// Rules are applied to the remapped primary jar only.

mod classfile;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::downloader::sha1_hex;
use crate::core::error::{RepoError, RepoResult};

pub use classfile::transform_class;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_PROTECTED: u16 = 0x0004;
pub const ACC_FINAL: u16 = 0x0010;

/// Requested visibility, ordered from narrowest to widest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Visibility {
    Private,
    Default,
    Protected,
    Public,
}

impl Visibility {
    fn of(flags: u16) -> Self {
        if flags & ACC_PUBLIC != 0 {
            Visibility::Public
        } else if flags & ACC_PROTECTED != 0 {
            Visibility::Protected
        } else if flags & ACC_PRIVATE != 0 {
            Visibility::Private
        } else {
            Visibility::Default
        }
    }

    fn bits(self) -> u16 {
        match self {
            Visibility::Public => ACC_PUBLIC,
            Visibility::Protected => ACC_PROTECTED,
            Visibility::Private => ACC_PRIVATE,
            Visibility::Default => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finality {
    Keep,
    Remove,
    Add,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modifier {
    pub visibility: Visibility,
    pub finality: Finality,
}

impl Modifier {
    /// Flags after applying this modifier. Visibility only ever widens.
    pub fn apply(&self, flags: u16) -> u16 {
        let visibility = Visibility::of(flags).max(self.visibility);
        let mut out = (flags & !(ACC_PUBLIC | ACC_PRIVATE | ACC_PROTECTED)) | visibility.bits();
        match self.finality {
            Finality::Keep => {}
            Finality::Remove => out &= !ACC_FINAL,
            Finality::Add => out |= ACC_FINAL,
        }
        out
    }

    /// Top-level classes are either public or package-private.
    fn for_class(self) -> Self {
        let visibility = match self.visibility {
            Visibility::Protected | Visibility::Public => Visibility::Public,
            Visibility::Default | Visibility::Private => Visibility::Default,
        };
        Self { visibility, ..self }
    }

    fn merge(self, other: Self) -> Self {
        let finality = match (self.finality, other.finality) {
            (Finality::Remove, _) | (_, Finality::Remove) => Finality::Remove,
            (Finality::Add, _) | (_, Finality::Add) => Finality::Add,
            _ => Finality::Keep,
        };
        Self {
            visibility: self.visibility.max(other.visibility),
            finality,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Member {
    Class,
    Field(String),
    /// Name and descriptor, e.g. `("tick", "()V")`.
    Method(String, String),
    AllFields,
    AllMethods,
}

/// Rules for one class, keyed by member.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassRules {
    members: BTreeMap<Member, Modifier>,
}

impl ClassRules {
    fn add(&mut self, member: Member, modifier: Modifier) {
        let merged = match self.members.get(&member) {
            Some(existing) => existing.merge(modifier),
            None => modifier,
        };
        self.members.insert(member, merged);
    }

    pub fn for_class(&self) -> Option<Modifier> {
        self.members.get(&Member::Class).map(|m| m.for_class())
    }

    pub fn for_field(&self, name: &str) -> Option<Modifier> {
        let exact = self.members.get(&Member::Field(name.to_string()));
        combine(exact, self.members.get(&Member::AllFields))
    }

    pub fn for_method(&self, name: &str, descriptor: &str) -> Option<Modifier> {
        let exact = self
            .members
            .get(&Member::Method(name.to_string(), descriptor.to_string()));
        combine(exact, self.members.get(&Member::AllMethods))
    }
}

fn combine(a: Option<&Modifier>, b: Option<&Modifier>) -> Option<Modifier> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.merge(*b)),
        (a, b) => a.or(b).copied(),
    }
}

/// Every rule from the configured files, with a fingerprint of their content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccessTransformers {
    /// Keyed by internal class name (`net/minecraft/world/World`).
    classes: BTreeMap<String, ClassRules>,
    fingerprint: Option<String>,
}

impl AccessTransformers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and parse `paths` in order. No files means no transformation
    /// and no fingerprint.
    pub async fn load(paths: &[PathBuf]) -> RepoResult<Self> {
        let mut transformers = Self::new();
        if paths.is_empty() {
            return Ok(transformers);
        }

        let mut content = String::new();
        for path in paths {
            let text = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| RepoError::io(path, e))?;
            transformers.parse_into(path, &text)?;
            content.push_str(&text);
            content.push('\n');
        }
        transformers.fingerprint = Some(fingerprint(&content));
        debug!(
            "Loaded access transformers for {} classes from {} files",
            transformers.classes.len(),
            paths.len()
        );
        Ok(transformers)
    }

    pub fn parse(path: &Path, text: &str) -> RepoResult<Self> {
        let mut transformers = Self::new();
        transformers.parse_into(path, text)?;
        transformers.fingerprint = Some(fingerprint(&format!("{}\n", text)));
        Ok(transformers)
    }

    fn parse_into(&mut self, path: &Path, text: &str) -> RepoResult<()> {
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            let invalid = |reason: String| RepoError::InvalidAccessTransformer {
                path: path.to_path_buf(),
                line: idx + 1,
                reason,
            };

            let mut parts = line.split_whitespace();
            let modifier = parts
                .next()
                .ok_or_else(|| invalid("empty rule".to_string()))
                .and_then(|m| parse_modifier(m).map_err(invalid))?;
            let class = parts
                .next()
                .ok_or_else(|| invalid("missing class name".to_string()))?;
            if class.contains('/') {
                return Err(invalid(format!("class names use dots: {}", class)));
            }
            let member = match parts.next() {
                None => Member::Class,
                Some("*") => Member::AllFields,
                Some("*()") => Member::AllMethods,
                Some(target) => match target.find('(') {
                    Some(open) => Member::Method(target[..open].to_string(), target[open..].to_string()),
                    None => Member::Field(target.to_string()),
                },
            };
            if let Some(extra) = parts.next() {
                return Err(invalid(format!("unexpected {:?}", extra)));
            }

            self.classes
                .entry(class.replace('.', "/"))
                .or_default()
                .add(member, modifier);
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Short content hash, `None` when no files were configured.
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    pub fn rules_for(&self, internal_name: &str) -> Option<&ClassRules> {
        self.classes.get(internal_name)
    }
}

fn fingerprint(content: &str) -> String {
    sha1_hex(content.as_bytes())[..8].to_string()
}

fn parse_modifier(raw: &str) -> Result<Modifier, String> {
    let (name, finality) = if let Some(name) = raw.strip_suffix("-f") {
        (name, Finality::Remove)
    } else if let Some(name) = raw.strip_suffix("+f") {
        (name, Finality::Add)
    } else {
        (raw, Finality::Keep)
    };
    let visibility = match name {
        "public" => Visibility::Public,
        "protected" => Visibility::Protected,
        "default" => Visibility::Default,
        "private" => Visibility::Private,
        other => return Err(format!("unknown access modifier {:?}", other)),
    };
    Ok(Modifier {
        visibility,
        finality,
    })
}
