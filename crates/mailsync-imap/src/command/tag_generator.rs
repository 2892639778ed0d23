//! Command tag generator.

/// Generates sequential tags `A0001`, `A0002`, ... for one connection.
#[derive(Debug, Clone)]
pub struct TagGenerator {
    prefix: char,
    counter: u32,
}

impl TagGenerator {
    /// Creates a generator with the given prefix.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self { prefix, counter: 0 }
    }

    /// Returns the next tag. The counter wraps rather than failing; a session
    /// never lives long enough for a wrapped tag to collide.
    pub fn next(&mut self) -> String {
        self.counter = self.counter.wrapping_add(1);
        format!("{}{:04}", self.prefix, self.counter)
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_tags() {
        let mut tags = TagGenerator::default();
        assert_eq!(tags.next(), "A0001");
        assert_eq!(tags.next(), "A0002");
    }

    #[test]
    fn test_custom_prefix() {
        let mut tags = TagGenerator::new('S');
        assert_eq!(tags.next(), "S0001");
    }

    #[test]
    fn test_wraps_instead_of_panicking() {
        let mut tags = TagGenerator {
            prefix: 'A',
            counter: u32::MAX,
        };
        assert_eq!(tags.next(), "A0000");
    }
}
