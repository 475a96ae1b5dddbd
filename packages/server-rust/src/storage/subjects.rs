//! In-memory lookup gateway backed by [`DashMap`].

use async_trait::async_trait;
use dashmap::DashMap;
use relay_core::Subject;

use crate::traits::SubjectStore;

/// [`SubjectStore`] holding subjects in memory.
#[derive(Debug, Default)]
pub struct InMemorySubjectStore {
    subjects: DashMap<String, Subject>,
}

impl InMemorySubjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `subjects`.
    #[must_use]
    pub fn with_subjects(subjects: impl IntoIterator<Item = Subject>) -> Self {
        let store = Self::new();
        for subject in subjects {
            store.subjects.insert(subject.id.clone(), subject);
        }
        store
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

#[async_trait]
impl SubjectStore for InMemorySubjectStore {
    async fn get_subject(&self, id: &str) -> anyhow::Result<Option<Subject>> {
        Ok(self.subjects.get(id).map(|entry| entry.value().clone()))
    }

    async fn upsert_subject(&self, subject: &Subject) -> anyhow::Result<()> {
        self.subjects.insert(subject.id.clone(), subject.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookup_absent_subject() {
        let store = InMemorySubjectStore::new();
        assert!(store.get_subject("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_then_lookup() {
        let store = InMemorySubjectStore::new();
        store
            .upsert_subject(&Subject::new("alice", "Alice Liddell"))
            .await
            .unwrap();

        let subject = store.get_subject("alice").await.unwrap().unwrap();
        assert_eq!(subject.display_name, "Alice Liddell");
    }

    #[tokio::test]
    async fn upsert_replaces_existing() {
        let store = InMemorySubjectStore::with_subjects([Subject::new("alice", "Old")]);
        store.upsert_subject(&Subject::new("alice", "New")).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get_subject("alice").await.unwrap().unwrap().display_name,
            "New"
        );
    }
}
