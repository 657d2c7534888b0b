use std::fmt;

/// Partition of the particles a compute domain interacts with.
///
/// `Local` particles are owned by this domain. `NonLocal` particles are boundary
/// particles shared with neighboring domains; their forces gate the inter-process
/// force exchange and are therefore usually waited for first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LocalityClass {
    Local,
    NonLocal,
}

impl LocalityClass {
    pub const ALL: [LocalityClass; 2] = [LocalityClass::Local, LocalityClass::NonLocal];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            LocalityClass::Local => 0,
            LocalityClass::NonLocal => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LocalityClass::Local => "local",
            LocalityClass::NonLocal => "non-local",
        }
    }
}

impl fmt::Display for LocalityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_distinct_and_dense() {
        assert_eq!(LocalityClass::Local.index(), 0);
        assert_eq!(LocalityClass::NonLocal.index(), 1);
    }

    #[test]
    fn display_uses_hyphenated_names() {
        assert_eq!(LocalityClass::NonLocal.to_string(), "non-local");
        assert_eq!(LocalityClass::Local.to_string(), "local");
    }
}
