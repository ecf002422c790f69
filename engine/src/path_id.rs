use std::{fmt, str::FromStr};

use thiserror::Error;

/// Upper bound on alternatives a plan can carry.
pub const MAX_ALTERNATIVES: usize = 10;

/// Index of an alternative path, always below [`MAX_ALTERNATIVES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AltIndex(u8);

impl AltIndex {
    pub fn new(index: usize) -> Option<Self> {
        (index < MAX_ALTERNATIVES).then_some(Self(index as u8))
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }
}

/// Identifier of a displayed route: the best path or one of its alternatives.
///
/// Ordering puts `Best` first, then alternatives by index, which is also the
/// order paths are listed and rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathId {
    Best,
    Alternative(AltIndex),
}

impl PathId {
    pub fn alternative(index: usize) -> Option<Self> {
        AltIndex::new(index).map(Self::Alternative)
    }

    /// Every id the registry can hold, in display order.
    pub fn all() -> impl Iterator<Item = PathId> {
        std::iter::once(PathId::Best).chain((0..MAX_ALTERNATIVES).filter_map(PathId::alternative))
    }

    /// Palette slot a path gets when it is (re-)registered.
    pub fn default_color_index(self) -> usize {
        match self {
            PathId::Best => 0,
            PathId::Alternative(idx) => idx.get() + 1,
        }
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathId::Best => f.write_str("best"),
            PathId::Alternative(idx) => write!(f, "alt_{}", idx.get()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{0}` is not a path id (expected `best` or `alt_0`..`alt_9`)")]
pub struct ParsePathIdError(String);

impl FromStr for PathId {
    type Err = ParsePathIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "best" {
            return Ok(PathId::Best);
        }
        s.strip_prefix("alt_")
            .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| digits.parse::<usize>().ok())
            .and_then(PathId::alternative)
            .ok_or_else(|| ParsePathIdError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_prints_every_id() {
        for id in PathId::all() {
            let text = id.to_string();
            assert_eq!(text.parse::<PathId>(), Ok(id));
        }
        assert_eq!(PathId::all().count(), 11);
    }

    #[test]
    fn rejects_out_of_range_and_garbage() {
        assert!("alt_10".parse::<PathId>().is_err());
        assert!("alt_".parse::<PathId>().is_err());
        assert!("alt_-1".parse::<PathId>().is_err());
        assert!("Best".parse::<PathId>().is_err());
        assert!(PathId::alternative(10).is_none());
    }

    #[test]
    fn colors_follow_position() {
        assert_eq!(PathId::Best.default_color_index(), 0);
        assert_eq!(PathId::alternative(0).unwrap().default_color_index(), 1);
        assert_eq!(PathId::alternative(9).unwrap().default_color_index(), 10);
    }

    #[test]
    fn best_sorts_first() {
        let mut ids = vec![
            PathId::alternative(3).unwrap(),
            PathId::Best,
            PathId::alternative(0).unwrap(),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                PathId::Best,
                PathId::alternative(0).unwrap(),
                PathId::alternative(3).unwrap()
            ]
        );
    }
}
