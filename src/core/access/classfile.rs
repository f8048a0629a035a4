use super::{ClassRules, Modifier};

const MAGIC: u32 = 0xCAFE_BABE;

/// Big-endian reader over a class file.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], String> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| format!("truncated class file at offset {}", self.pos))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16, String> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, String> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn skip_attributes(&mut self) -> Result<(), String> {
        for _ in 0..self.u16()? {
            self.u16()?;
            let len = self.u32()? as usize;
            self.take(len)?;
        }
        Ok(())
    }
}

/// UTF-8 constants by pool index; other constants are skipped.
fn read_constant_pool(reader: &mut Reader<'_>) -> Result<Vec<Option<String>>, String> {
    let count = reader.u16()? as usize;
    let mut utf8 = vec![None; count.max(1)];
    let mut idx = 1;
    while idx < count {
        let tag = reader.take(1)?[0];
        let width = match tag {
            1 => {
                let len = reader.u16()? as usize;
                let raw = reader.take(len)?;
                utf8[idx] = Some(String::from_utf8_lossy(raw).into_owned());
                0
            }
            7 | 8 | 16 | 19 | 20 => 2,
            15 => 3,
            3 | 4 | 9 | 10 | 11 | 12 | 17 | 18 => 4,
            5 | 6 => 8,
            other => return Err(format!("unknown constant pool tag {} at index {}", other, idx)),
        };
        reader.take(width)?;
        // Long and double constants occupy two slots.
        idx += if matches!(tag, 5 | 6) { 2 } else { 1 };
    }
    Ok(utf8)
}

fn name_at(pool: &[Option<String>], idx: u16) -> Result<&str, String> {
    pool.get(idx as usize)
        .and_then(Option::as_deref)
        .ok_or_else(|| format!("constant {} is not a UTF-8 entry", idx))
}

fn patch(out: &mut [u8], pos: usize, modifier: Modifier) {
    let flags = u16::from_be_bytes([out[pos], out[pos + 1]]);
    out[pos..pos + 2].copy_from_slice(&modifier.apply(flags).to_be_bytes());
}

/// Rewrite the access flags of the class and its members per `rules`.
/// Returns `None` when nothing changed.
// TODO: patch the matching InnerClasses attribute entry for nested classes.
pub fn transform_class(bytes: &[u8], rules: &ClassRules) -> Result<Option<Vec<u8>>, String> {
    let mut reader = Reader { bytes, pos: 0 };
    if reader.u32()? != MAGIC {
        return Err("not a class file".to_string());
    }
    reader.take(4)?;
    let pool = read_constant_pool(&mut reader)?;

    let mut edits: Vec<(usize, Modifier)> = Vec::new();
    let class_flags = reader.pos;
    reader.take(2)?;
    if let Some(modifier) = rules.for_class() {
        edits.push((class_flags, modifier));
    }
    reader.take(4)?;
    let interfaces = reader.u16()? as usize;
    reader.take(interfaces * 2)?;

    for is_method in [false, true] {
        for _ in 0..reader.u16()? {
            let flags = reader.pos;
            reader.take(2)?;
            let name = name_at(&pool, reader.u16()?)?;
            let descriptor = name_at(&pool, reader.u16()?)?;
            let modifier = if is_method {
                rules.for_method(name, descriptor)
            } else {
                rules.for_field(name)
            };
            if let Some(modifier) = modifier {
                edits.push((flags, modifier));
            }
            reader.skip_attributes()?;
        }
    }

    if edits.is_empty() {
        return Ok(None);
    }
    let mut out = bytes.to_vec();
    for (pos, modifier) in edits {
        patch(&mut out, pos, modifier);
    }
    Ok((out != bytes).then_some(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::access::{AccessTransformers, ACC_FINAL, ACC_PRIVATE, ACC_PROTECTED, ACC_PUBLIC};
    use crate::core::testing::class_file;
    use std::path::Path;

    fn flags_at(bytes: &[u8], pos: usize) -> u16 {
        u16::from_be_bytes([bytes[pos], bytes[pos + 1]])
    }

    #[test]
    fn flags_are_rewritten_in_place() {
        let original = class_file("a/B", 0, ("count", ACC_PRIVATE | ACC_FINAL), ("tick", "()V", ACC_PRIVATE));
        let at = AccessTransformers::parse(
            Path::new("at.cfg"),
            "public a.B\npublic-f a.B count\nprotected a.B tick()V\n",
        )
        .unwrap();

        let patched = transform_class(&original, at.rules_for("a/B").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(patched.len(), original.len());

        let mut reader = Reader { bytes: &patched, pos: 8 };
        read_constant_pool(&mut reader).unwrap();
        // flags, this, super, interface count, field count
        let class_flags = reader.pos;
        let field_flags = class_flags + 10;
        // flags, name, descriptor, attribute count, method count
        let method_flags = field_flags + 10;
        assert_eq!(flags_at(&patched, class_flags), ACC_PUBLIC);
        assert_eq!(flags_at(&patched, field_flags), ACC_PUBLIC);
        assert_eq!(flags_at(&patched, method_flags), ACC_PROTECTED);
    }

    #[test]
    fn unmatched_or_broken_classes() {
        let original = class_file("a/B", ACC_PUBLIC, ("count", ACC_PUBLIC), ("tick", "()V", ACC_PUBLIC));
        let at = AccessTransformers::parse(Path::new("at.cfg"), "public a.B other\n").unwrap();
        let rules = at.rules_for("a/B").unwrap();
        assert_eq!(transform_class(&original, rules).unwrap(), None);

        assert!(transform_class(b"\xCA\xFE\xBA\xBE\0\0", rules).is_err());
        assert!(transform_class(b"PK\x03\x04", rules).is_err());
    }
}
