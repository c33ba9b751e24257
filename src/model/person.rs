use serde::Serialize;
use utoipa::ToSchema;

use crate::model::attendance::PersonKind;

/// A student or teacher from the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub id: String,
    pub name: String,
    pub kind: PersonKind,
    pub center_code: String,
    pub status: String,
    pub card_number: Option<String>,
    pub business_id: Option<String>,
}

impl Person {
    pub fn field(&self, field: LookupField) -> Option<&str> {
        match field {
            LookupField::CardNumber => self.card_number.as_deref(),
            LookupField::BusinessId => self.business_id.as_deref(),
        }
    }
}

/// Directory columns a scanned identifier may match, in lookup order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupField {
    CardNumber,
    BusinessId,
}

impl LookupField {
    pub const ORDER: [LookupField; 2] = [LookupField::CardNumber, LookupField::BusinessId];
}

/// What a successful scan resolves to.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PersonMatch {
    #[schema(example = "S2001")]
    pub id: String,
    #[schema(example = "Bob")]
    pub name: String,
    pub kind: PersonKind,
    #[schema(example = "WX01")]
    pub center: String,
    #[schema(example = "active")]
    pub status: String,
}

impl From<&Person> for PersonMatch {
    fn from(person: &Person) -> Self {
        Self {
            id: person.id.clone(),
            name: person.name.clone(),
            kind: person.kind,
            center: person.center_code.clone(),
            status: person.status.clone(),
        }
    }
}
