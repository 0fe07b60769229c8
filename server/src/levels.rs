use shared::LevelId;
use std::collections::BTreeSet;

/// Levels the pair has finished. Only ever grows.
#[derive(Debug, Clone, Default)]
pub struct CompletedLevels {
    levels: BTreeSet<LevelId>,
}

impl CompletedLevels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the level was not completed before
    pub fn complete(&mut self, level: LevelId) -> bool {
        self.levels.insert(level)
    }

    pub fn contains(&self, level: LevelId) -> bool {
        self.levels.contains(&level)
    }

    /// All completed levels in ascending order
    pub fn all(&self) -> Vec<LevelId> {
        self.levels.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_twice() {
        let mut completed = CompletedLevels::new();

        assert!(completed.complete(5));
        assert!(!completed.complete(5));

        assert_eq!(completed.all(), vec![5]);
        assert_eq!(completed.len(), 1);
    }

    #[test]
    fn test_all_is_sorted() {
        let mut completed = CompletedLevels::new();
        for level in [9, 2, 4, 2] {
            completed.complete(level);
        }

        assert_eq!(completed.all(), vec![2, 4, 9]);
        assert!(completed.contains(4));
        assert!(!completed.contains(3));
    }
}
