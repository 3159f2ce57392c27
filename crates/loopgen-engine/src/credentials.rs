use std::fmt;

use anyhow::{bail, Result};

/// Ordered API keys with a cursor.
///
/// The submitter owns the pool and is the only thing that moves the cursor,
/// always between attempts.
#[derive(Debug, Clone)]
pub struct CredentialPool {
    keys: Vec<String>,
    cursor: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rotation {
    pub from: usize,
    pub to: usize,
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} → #{}", self.from + 1, self.to + 1)
    }
}

impl CredentialPool {
    pub fn new<I, S>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys
            .into_iter()
            .map(Into::into)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .collect();
        if keys.is_empty() {
            bail!("at least one API key is required");
        }
        Ok(Self { keys, cursor: 0 })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn index(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> &str {
        &self.keys[self.cursor]
    }

    pub fn can_rotate(&self) -> bool {
        self.keys.len() > 1
    }

    /// Advances the cursor cyclically. A single-key pool never rotates.
    pub fn rotate(&mut self) -> Option<Rotation> {
        if !self.can_rotate() {
            return None;
        }
        let from = self.cursor;
        self.cursor = (self.cursor + 1) % self.keys.len();
        Some(Rotation {
            from,
            to: self.cursor,
        })
    }

    /// `#2 (…wxyz)`; never prints more than the last four characters of a key.
    pub fn describe_current(&self) -> String {
        let key = self.current();
        let tail: String = key
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<char>>()
            .into_iter()
            .rev()
            .collect();
        format!("#{} (…{tail})", self.cursor + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::{CredentialPool, Rotation};

    #[test]
    fn rotation_is_cyclic() -> anyhow::Result<()> {
        for size in 2..=5 {
            let keys: Vec<String> = (0..size).map(|idx| format!("key-{idx}")).collect();
            let mut pool = CredentialPool::new(keys)?;
            let start = pool.index();
            for _ in 0..size {
                assert!(pool.rotate().is_some());
            }
            assert_eq!(pool.index(), start);
        }
        Ok(())
    }

    #[test]
    fn rotation_reports_from_and_to() -> anyhow::Result<()> {
        let mut pool = CredentialPool::new(["a", "b", "c"])?;
        assert_eq!(pool.rotate(), Some(Rotation { from: 0, to: 1 }));
        assert_eq!(pool.current(), "b");
        assert_eq!(pool.rotate(), Some(Rotation { from: 1, to: 2 }));
        let wrap = pool.rotate().unwrap();
        assert_eq!(wrap, Rotation { from: 2, to: 0 });
        assert_eq!(wrap.to_string(), "#3 → #1");
        Ok(())
    }

    #[test]
    fn single_key_pool_never_rotates() -> anyhow::Result<()> {
        let mut pool = CredentialPool::new(vec!["only".to_string()])?;
        assert!(!pool.can_rotate());
        assert_eq!(pool.rotate(), None);
        assert_eq!(pool.index(), 0);
        assert_eq!(pool.current(), "only");
        Ok(())
    }

    #[test]
    fn blank_keys_are_dropped_and_empty_pool_rejected() {
        let pool = CredentialPool::new(["  ", "k1", ""]).unwrap();
        assert_eq!(pool.len(), 1);
        assert!(CredentialPool::new(Vec::<String>::new()).is_err());
        assert!(CredentialPool::new(["   "]).is_err());
    }

    #[test]
    fn describe_current_masks_key() -> anyhow::Result<()> {
        let pool = CredentialPool::new(["AIzaSyVerySecretKey1234"])?;
        assert_eq!(pool.describe_current(), "#1 (…1234)");
        Ok(())
    }
}
