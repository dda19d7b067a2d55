use std::{
    fmt,
    fmt::{Debug, Display},
};

/// A value that must never end up in logs or error messages. Handoff codes are wrapped in this.
#[derive(Clone, Default)]
pub struct Secret<T>
where T: Clone + Default
{
    value: T,
}

impl<T: Clone + Default> Secret<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn reveal(&self) -> &T {
        &self.value
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T: Clone + Default + AsRef<[u8]>> Secret<T> {
    /// Compares the secret against a candidate without short-circuiting on the first differing byte.
    pub fn matches(&self, candidate: &str) -> bool {
        let expected = self.value.as_ref();
        let given = candidate.as_bytes();
        let mut diff = expected.len() ^ given.len();
        for (i, b) in expected.iter().enumerate() {
            let other = given.get(i).copied().unwrap_or(0);
            diff |= usize::from(b ^ other);
        }
        diff == 0
    }
}

impl<T: Clone + Default> Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

impl<T: Clone + Default> Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

impl<T: Clone + Default + PartialEq> PartialEq for Secret<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: Clone + Default + Eq> Eq for Secret<T> {}

impl<T: Clone + Default> From<T> for Secret<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod test {
    use super::Secret;

    #[test]
    fn secrets_are_redacted() {
        let code = Secret::new("493021".to_string());
        assert_eq!(format!("{code:?}"), "****");
        assert_eq!(code.to_string(), "****");
        assert_eq!(code.reveal(), "493021");
    }

    #[test]
    fn matching() {
        let code = Secret::new("493021".to_string());
        assert!(code.matches("493021"));
        assert!(!code.matches("493022"));
        assert!(!code.matches("49302"));
        assert!(!code.matches("4930210"));
        assert!(!code.matches(""));
    }
}
