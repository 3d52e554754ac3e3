//! Pattern query projection
//!
//! A [`Projection`] pairs a compile-time [`PatternQuery`] with a
//! [`ProjectionSpec`]. Every key path is checked against the
//! shape of the node the query returns when the projection is built, so a
//! spec cannot reference a property the query never produces.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::graph::{GraphStore, KeyPath, NodeLabel, PatternQuery, parse_payload};

/// One projected row: output field to value
pub type ProjectedRow = BTreeMap<String, Value>;

/// Top-level keys of a serialized vertex
const VERTEX_KEYS: [&str; 3] = ["id", "label", "properties"];

/// Ordered mapping from output field to the key path that fills it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectionSpec {
    fields: Vec<(String, KeyPath)>,
}

impl ProjectionSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an output field; a later field with the same name replaces it
    pub fn field(mut self, name: impl Into<String>, path: impl Into<KeyPath>) -> Self {
        let name = name.into();
        let path = path.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = path,
            None => self.fields.push((name, path)),
        }
        self
    }

    pub fn fields(&self) -> &[(String, KeyPath)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check every path against the shape of a vertex of `label`
    pub fn validate_for(&self, label: NodeLabel) -> Result<()> {
        if self.fields.is_empty() {
            return Err(Error::InvalidProjection("projection has no fields".into()));
        }
        for (field, path) in &self.fields {
            validate_path(label, path).map_err(|reason| {
                Error::InvalidProjection(format!("field '{}' ({}): {}", field, path, reason))
            })?;
        }
        Ok(())
    }
}

fn validate_path(label: NodeLabel, path: &KeyPath) -> std::result::Result<(), String> {
    let keys = path.keys();
    let Some(first) = keys.first() else {
        return Ok(());
    };
    if !VERTEX_KEYS.contains(&first.as_str()) {
        return Err(format!("vertices have no '{}' key", first));
    }
    if first != "properties" {
        return match keys.len() {
            1 => Ok(()),
            _ => Err(format!("'{}' is a scalar", first)),
        };
    }
    match keys.get(1) {
        None => Ok(()),
        Some(key) if !label.properties().contains(&key.as_str()) => Err(format!(
            "{} nodes have no '{}' property",
            label.as_str(),
            key
        )),
        Some(_) if keys.len() > 2 => Err("properties are scalars".to_string()),
        Some(_) => Ok(()),
    }
}

/// A pattern query and the projection applied to each of its rows
#[derive(Debug, Clone)]
pub struct Projection {
    query: &'static PatternQuery,
    spec: ProjectionSpec,
}

impl Projection {
    /// Pair `query` with `spec`, validating the spec against the node the
    /// query returns
    pub fn new(query: &'static PatternQuery, spec: ProjectionSpec) -> Result<Self> {
        spec.validate_for(query.returns())?;
        Ok(Self { query, spec })
    }

    pub fn query(&self) -> &'static PatternQuery {
        self.query
    }

    pub fn spec(&self) -> &ProjectionSpec {
        &self.spec
    }
}

/// Apply `spec` to serialized rows, preserving row order
pub fn project_rows(rows: &[String], spec: &ProjectionSpec) -> Result<Vec<ProjectedRow>> {
    rows.iter()
        .map(|raw| -> Result<ProjectedRow> {
            let value = parse_payload(raw)?;
            spec.fields()
                .iter()
                .map(|(field, path)| -> Result<(String, Value)> {
                    Ok((field.clone(), path.navigate(&value)?.clone()))
                })
                .collect()
        })
        .collect()
}

/// Runs projections against a graph store
#[derive(Clone)]
pub struct PropertyProjector {
    graph: Arc<dyn GraphStore>,
}

impl PropertyProjector {
    pub fn new(graph: Arc<dyn GraphStore>) -> Self {
        Self { graph }
    }

    /// Run the projection's query with `entity_id` bound and project every row
    ///
    /// No match yields an empty vector. Store, payload and key-path failures
    /// are returned as errors; the store has already rolled back the query.
    pub async fn project(
        &self,
        entity_id: &str,
        projection: &Projection,
    ) -> Result<Vec<ProjectedRow>> {
        let rows = self.graph.run_pattern(projection.query(), entity_id).await?;
        let projected = project_rows(&rows, projection.spec())?;
        debug!(
            query = projection.query().name,
            entity_id,
            rows = projected.len(),
            "Projection complete"
        );
        Ok(projected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::pattern::{CONTRAINDICATIONS, GENERICS};

    fn name_and_id() -> ProjectionSpec {
        ProjectionSpec::new()
            .field("name", ["properties", "name"])
            .field("id", ["properties", "id"])
    }

    #[test]
    fn test_project_vertex_payload() {
        let rows =
            vec![r#"{"properties": {"name": "Ibuprofen", "id": "D001"}}::vertex"#.to_string()];
        let projected = project_rows(&rows, &name_and_id()).unwrap();
        assert_eq!(projected.len(), 1);
        assert_eq!(projected[0]["name"], "Ibuprofen");
        assert_eq!(projected[0]["id"], "D001");
    }

    #[test]
    fn test_project_keeps_row_order() {
        let rows = vec![
            r#"{"properties": {"name": "B", "id": "2"}}::vertex"#.to_string(),
            r#"{"properties": {"name": "A", "id": "1"}}::vertex"#.to_string(),
        ];
        let projected = project_rows(&rows, &name_and_id()).unwrap();
        assert_eq!(projected[0]["name"], "B");
        assert_eq!(projected[1]["name"], "A");
    }

    #[test]
    fn test_missing_key_is_typed_error() {
        let rows = vec![r#"{"properties": {"id": "D001"}}::vertex"#.to_string()];
        let err = project_rows(&rows, &name_and_id()).unwrap_err();
        assert!(matches!(err, Error::KeyPathNotFound { ref missing, .. } if missing == "name"));
    }

    #[test]
    fn test_malformed_payload_is_error() {
        let rows = vec!["{not json}::vertex".to_string()];
        assert!(matches!(
            project_rows(&rows, &name_and_id()),
            Err(Error::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_whole_properties_field() {
        let spec = ProjectionSpec::new().field("props", ["properties"]);
        let rows = vec![r#"{"properties": {"name": "X", "id": "1"}}::vertex"#.to_string()];
        let projected = project_rows(&rows, &spec).unwrap();
        assert_eq!(projected[0]["props"]["name"], "X");
    }

    #[test]
    fn test_projection_validated_against_returned_label() {
        assert!(Projection::new(&GENERICS, name_and_id()).is_ok());

        let spec = ProjectionSpec::new().field("name", ["properties", "type"]);
        assert!(matches!(
            Projection::new(&GENERICS, spec.clone()),
            Err(Error::InvalidProjection(_))
        ));
        assert!(Projection::new(&CONTRAINDICATIONS, spec).is_ok());

        let nested = ProjectionSpec::new().field("x", ["properties", "name", "first"]);
        assert!(Projection::new(&GENERICS, nested).is_err());

        let unknown = ProjectionSpec::new().field("x", ["edges"]);
        assert!(Projection::new(&GENERICS, unknown).is_err());

        assert!(Projection::new(&GENERICS, ProjectionSpec::new()).is_err());
    }

    #[test]
    fn test_field_replaces_same_name() {
        let spec = ProjectionSpec::new()
            .field("name", ["properties", "id"])
            .field("name", ["properties", "name"]);
        assert_eq!(spec.fields().len(), 1);
        assert_eq!(spec.fields()[0].1, KeyPath::from(["properties", "name"]));
    }
}
