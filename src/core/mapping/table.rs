use std::collections::BTreeMap;

/// Class-level name remapping table (internal names, `/`-separated).
///
/// Produced by a [`MappingService`](super::MappingService); the pipeline only
/// asks it how to rename archive entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    classes: BTreeMap<String, String>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, A, B>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        let mut mapping = Self::new();
        for (from, to) in pairs {
            mapping.insert(from, to);
        }
        mapping
    }

    pub fn insert(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.classes.insert(from.into(), to.into());
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn map_class(&self, internal_name: &str) -> Option<&str> {
        self.classes.get(internal_name).map(String::as_str)
    }

    /// Parse SRG (`CL: a net/minecraft/Foo`) or TSRG (`a net/minecraft/Foo`)
    /// class lines. Field, method and package lines are ignored.
    pub fn parse_srg(text: &str) -> Result<Self, String> {
        let mut mapping = Self::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or_default().trim_end();
            if line.trim().is_empty() || raw.starts_with(['\t', ' ']) {
                // TSRG member lines are indented under their class.
                continue;
            }

            let body = match line.split_once(": ") {
                Some(("CL", rest)) => rest,
                Some((_, _)) => continue,
                None => line,
            };

            let mut parts = body.split_whitespace();
            match (parts.next(), parts.next(), parts.next()) {
                (Some(from), Some(to), None) => mapping.insert(from, to),
                _ if line.contains(": ") => continue,
                _ => return Err(format!("line {}: malformed class mapping {:?}", idx + 1, raw)),
            }
        }

        Ok(mapping)
    }

    /// New name for an archive entry, if its class is mapped.
    ///
    /// `a.class`, `a$1.class` and `a.java` all follow the mapping of `a`.
    pub fn remap_entry_name(&self, entry: &str) -> Option<String> {
        let (stem, ext) = [".class", ".java"]
            .iter()
            .find_map(|ext| entry.strip_suffix(ext).map(|stem| (stem, *ext)))?;

        let (outer, inner) = match stem.find('$') {
            Some(idx) => stem.split_at(idx),
            None => (stem, ""),
        };

        let mapped = self.map_class(outer)?;
        Some(format!("{}{}{}", mapped, inner, ext))
    }
}
