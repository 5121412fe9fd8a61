//! 스터디 세트 저장소 (문제 id 목록)

use crate::model::StudySet;
use anyhow::Context;
use dashmap::DashMap;
use std::path::Path;

#[derive(Debug, Default)]
pub struct StudySetStore {
    sets: DashMap<String, StudySet>,
}

impl StudySetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// JSON 배열 파일에서 스터디 세트를 읽어온다
    pub fn load_from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read study sets from {}", path.display()))?;
        let sets: Vec<StudySet> = serde_json::from_str(&raw)
            .with_context(|| format!("invalid study set file {}", path.display()))?;

        let store = Self::new();
        for set in sets {
            store.insert(set);
        }
        Ok(store)
    }

    pub fn insert(&self, set: StudySet) {
        self.sets.insert(set.id.clone(), set);
    }

    pub fn get(&self, id: &str) -> Option<StudySet> {
        self.sets.get(id).map(|set| set.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sets.contains_key(id)
    }

    pub fn count(&self) -> usize {
        self.sets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("study-sets-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"[
                {"id":"set-1","title":"Cells","question_ids":["q1","q2"]},
                {"id":"set-2","question_ids":[]}
            ]"#,
        )
        .unwrap();

        let store = StudySetStore::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(store.count(), 2);
        assert_eq!(store.get("set-1").unwrap().question_ids.len(), 2);
        assert!(store.contains("set-2"));
        assert!(!store.contains("set-3"));
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(StudySetStore::load_from_file("/nonexistent/study-sets.json").is_err());
    }
}
