//! Stable string hashing shared by descriptors, vectors, and the registry.
//!
//! Every component is followed by a `0xff` separator byte, which can never
//! appear inside valid UTF-8, so `["ab", "c"]` and `["a", "bc"]` hash apart.

use xxhash_rust::xxh3::Xxh3;

/// Byte written after every hashed component.
pub const SEPARATOR_BYTE: u8 = 0xff;

/// Incremental hasher over separated string components.
pub struct LabelHasher {
    inner: Xxh3,
}

impl LabelHasher {
    pub fn new() -> Self {
        Self { inner: Xxh3::new() }
    }

    /// Feed one component followed by the separator.
    pub fn write_str(&mut self, part: &str) {
        self.inner.update(part.as_bytes());
        self.inner.update(&[SEPARATOR_BYTE]);
    }

    pub fn finish(&self) -> u64 {
        self.inner.digest()
    }
}

impl Default for LabelHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash an ordered sequence of components.
pub fn hash_parts<'a, I>(parts: I) -> u64
where
    I: IntoIterator<Item = &'a str>,
{
    let mut hasher = LabelHasher::new();
    for part in parts {
        hasher.write_str(part);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separator_prevents_concatenation_collisions() {
        assert_ne!(hash_parts(["ab", "c"]), hash_parts(["a", "bc"]));
        assert_ne!(hash_parts(["", "a"]), hash_parts(["a", ""]));
    }

    #[test]
    fn hashing_is_deterministic() {
        assert_eq!(hash_parts(["GET", "200"]), hash_parts(["GET", "200"]));
        assert_eq!(hash_parts(std::iter::empty()), LabelHasher::new().finish());
    }
}
