use std::sync::Arc;

use tracing::debug;

use crate::model::attendance::PersonKind;
use crate::model::person::{LookupField, Person};
use crate::store::{PersonDirectory, StoreError};

const KIND_ORDER: [PersonKind; 2] = [PersonKind::Student, PersonKind::Teacher];

/// Maps a scanned identifier to a student or teacher.
#[derive(Clone)]
pub struct IdentifierResolver {
    directory: Arc<dyn PersonDirectory>,
}

/// Spellings of a scanned identifier worth trying, most literal first.
pub fn variants(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    let mut out: Vec<String> = Vec::with_capacity(4);
    for v in [
        raw.to_string(),
        trimmed.to_string(),
        trimmed.to_uppercase(),
        trimmed.to_lowercase(),
    ] {
        if !v.is_empty() && !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

impl IdentifierResolver {
    pub fn new(directory: Arc<dyn PersonDirectory>) -> Self {
        Self { directory }
    }

    /// Card number before business id, students before teachers.
    pub async fn resolve(&self, identifier: &str) -> Result<Option<Person>, StoreError> {
        let candidates = variants(identifier);
        if candidates.is_empty() {
            return Ok(None);
        }

        for kind in KIND_ORDER {
            for field in LookupField::ORDER {
                if let Some(person) = self.directory.find_person(kind, field, &candidates).await? {
                    debug!(person_id = %person.id, %kind, ?field, "Scanned identifier resolved");
                    return Ok(Some(person));
                }
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn person(id: &str, kind: PersonKind, card: Option<&str>, business: Option<&str>) -> Person {
        Person {
            id: id.into(),
            name: format!("name-{id}"),
            kind,
            center_code: "WX01".into(),
            status: "active".into(),
            card_number: card.map(Into::into),
            business_id: business.map(Into::into),
        }
    }

    #[test]
    fn variants_are_unique_and_ordered() {
        assert_eq!(variants(" ab12 "), vec![" ab12 ", "ab12", "AB12"]);
        assert_eq!(variants("X"), vec!["X", "x"]);
        assert!(variants("   ").iter().all(|v| v == "   "));
    }

    #[actix_web::test]
    async fn card_number_beats_business_id() {
        let store = Arc::new(MemoryStore::new());
        store
            .add_person(person("S1", PersonKind::Student, None, Some("777")))
            .await;
        store
            .add_person(person("S2", PersonKind::Student, Some("777"), None))
            .await;

        let resolver = IdentifierResolver::new(store.clone());
        let found = resolver.resolve("777").await.unwrap().unwrap();
        assert_eq!(found.id, "S2");
    }

    #[actix_web::test]
    async fn students_before_teachers() {
        let store = Arc::new(MemoryStore::new());
        store
            .add_person(person("T1", PersonKind::Teacher, Some("555"), None))
            .await;
        store
            .add_person(person("S1", PersonKind::Student, None, Some("555")))
            .await;

        let resolver = IdentifierResolver::new(store.clone());
        let found = resolver.resolve("555").await.unwrap().unwrap();
        assert_eq!(found.kind, PersonKind::Student);
    }

    #[actix_web::test]
    async fn case_variants_match() {
        let store = Arc::new(MemoryStore::new());
        store
            .add_person(person("T9", PersonKind::Teacher, None, Some("TCH-9")))
            .await;

        let resolver = IdentifierResolver::new(store.clone());
        let found = resolver.resolve(" tch-9").await.unwrap().unwrap();
        assert_eq!(found.id, "T9");
        assert!(resolver.resolve("nobody").await.unwrap().is_none());
    }
}
