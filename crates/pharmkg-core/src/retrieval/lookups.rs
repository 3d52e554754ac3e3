//! Drug-centric lookups built on [`PropertyProjector`]
//!
//! Every lookup is a fixed pattern query plus a fixed projection to
//! `{name, id}`. A failing lookup is logged and reported as `None`, so one
//! bad query never takes the others down with it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};
use crate::graph::GraphStore;
use crate::graph::pattern::{
    ACTIVE_INGREDIENTS, CONTRAINDICATIONS, EXCIPIENTS, GENERICS, INDICATIONS, ROUTES,
};

use super::projector::{ProjectedRow, Projection, ProjectionSpec, PropertyProjector};

/// A related entity as returned by the lookups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub name: String,
    pub id: String,
}

impl EntityRef {
    fn from_row(row: &ProjectedRow) -> Result<Self> {
        Ok(Self {
            name: field_text(row, "name")?,
            id: field_text(row, "id")?,
        })
    }
}

fn field_text(row: &ProjectedRow, field: &str) -> Result<String> {
    match row.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Null) | None => Ok(String::new()),
        Some(other) => Err(Error::MalformedPayload(format!(
            "field '{}' is not a scalar: {}",
            field, other
        ))),
    }
}

/// Every lookup for one drug; `None` marks a lookup that failed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrugProfile {
    pub generics: Option<Vec<EntityRef>>,
    pub active_ingredients: Option<Vec<EntityRef>>,
    pub excipients: Option<Vec<EntityRef>>,
    pub indications: Option<Vec<EntityRef>>,
    pub contraindications: Option<Vec<EntityRef>>,
    pub routes: Option<Vec<EntityRef>>,
}

/// Fixed lookups around a known drug id
#[derive(Clone)]
pub struct DrugLookups {
    projector: PropertyProjector,
    generics: Projection,
    active_ingredients: Projection,
    excipients: Projection,
    indications: Projection,
    contraindications: Projection,
    routes: Projection,
}

fn name_and_id() -> ProjectionSpec {
    ProjectionSpec::new()
        .field("name", ["properties", "name"])
        .field("id", ["properties", "id"])
}

impl DrugLookups {
    pub fn new(graph: Arc<dyn GraphStore>) -> Result<Self> {
        Ok(Self {
            projector: PropertyProjector::new(graph),
            generics: Projection::new(&GENERICS, name_and_id())?,
            active_ingredients: Projection::new(&ACTIVE_INGREDIENTS, name_and_id())?,
            excipients: Projection::new(&EXCIPIENTS, name_and_id())?,
            indications: Projection::new(&INDICATIONS, name_and_id())?,
            contraindications: Projection::new(
                &CONTRAINDICATIONS,
                ProjectionSpec::new()
                    .field("name", ["properties", "type"])
                    .field("id", ["properties", "id"]),
            )?,
            routes: Projection::new(&ROUTES, name_and_id())?,
        })
    }

    async fn run(&self, drug_id: &str, projection: &Projection) -> Option<Vec<EntityRef>> {
        let result = self
            .projector
            .project(drug_id, projection)
            .await
            .and_then(|rows| rows.iter().map(EntityRef::from_row).collect::<Result<Vec<_>>>());

        match result {
            Ok(entities) => Some(entities),
            Err(e) => {
                warn!(
                    query = projection.query().name,
                    drug_id,
                    code = e.code(),
                    error = %e,
                    "Lookup failed"
                );
                None
            }
        }
    }

    /// Other drugs in the same generic group
    pub async fn generics(&self, drug_id: &str) -> Option<Vec<EntityRef>> {
        self.run(drug_id, &self.generics).await
    }

    pub async fn active_ingredients(&self, drug_id: &str) -> Option<Vec<EntityRef>> {
        self.run(drug_id, &self.active_ingredients).await
    }

    pub async fn excipients(&self, drug_id: &str) -> Option<Vec<EntityRef>> {
        self.run(drug_id, &self.excipients).await
    }

    pub async fn indications(&self, drug_id: &str) -> Option<Vec<EntityRef>> {
        self.run(drug_id, &self.indications).await
    }

    /// Contraindications, named by their `type` property
    pub async fn contraindications(&self, drug_id: &str) -> Option<Vec<EntityRef>> {
        self.run(drug_id, &self.contraindications).await
    }

    /// Routes of administration
    pub async fn routes(&self, drug_id: &str) -> Option<Vec<EntityRef>> {
        self.run(drug_id, &self.routes).await
    }

    /// Run every lookup, one after another
    pub async fn profile(&self, drug_id: &str) -> DrugProfile {
        DrugProfile {
            generics: self.generics(drug_id).await,
            active_ingredients: self.active_ingredients(drug_id).await,
            excipients: self.excipients(drug_id).await,
            indications: self.indications(drug_id).await,
            contraindications: self.contraindications(drug_id).await,
            routes: self.routes(drug_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_from_row() {
        let mut row = ProjectedRow::new();
        row.insert("name".into(), json!("Aspirin"));
        row.insert("id".into(), json!(42));
        let entity = EntityRef::from_row(&row).unwrap();
        assert_eq!(entity.name, "Aspirin");
        assert_eq!(entity.id, "42");
    }

    #[test]
    fn test_entity_from_row_rejects_objects() {
        let mut row = ProjectedRow::new();
        row.insert("name".into(), json!({"name": "Aspirin"}));
        row.insert("id".into(), json!("D001"));
        assert!(matches!(
            EntityRef::from_row(&row),
            Err(Error::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_profile_serializes_failed_lookup_as_null() {
        let profile = DrugProfile {
            generics: Some(vec![EntityRef {
                name: "Generic Aspirin".into(),
                id: "D002".into(),
            }]),
            ..Default::default()
        };
        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["generics"][0]["id"], "D002");
        assert!(value["excipients"].is_null());
    }
}
