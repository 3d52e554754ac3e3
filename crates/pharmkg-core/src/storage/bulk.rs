//! Bulk-load CSV files
//!
//! Node file `<Label>.csv`: a header row with a required `id` column. Every
//! column becomes a string property of the node.
//!
//! ```text
//! id,name
//! D001,Aspirin
//! ```
//!
//! Edge file `<Label>.csv`: the first four columns name both endpoints.
//! Any further columns become string properties of the edge.
//!
//! ```text
//! start_id,start_vertex_type,end_id,end_vertex_type
//! D001,Drug,G001,GenericGroup
//! ```

use std::io::Read;

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Column headers that start every edge file
pub const EDGE_HEADER: [&str; 4] = ["start_id", "start_vertex_type", "end_id", "end_vertex_type"];

/// One parsed node row
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRow {
    pub id: String,
    /// All columns, `id` included
    pub properties: Map<String, Value>,
}

/// One parsed edge row
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRow {
    pub start_id: String,
    pub start_label: String,
    pub end_id: String,
    pub end_label: String,
    /// Columns after the four endpoint columns
    pub properties: Map<String, Value>,
}

fn reader<R: Read>(source: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(source)
}

fn failed(file: &str, reason: impl Into<String>) -> Error {
    Error::BulkLoadFailed {
        file: file.to_string(),
        reason: reason.into(),
    }
}

/// Parse node rows; `file` is only used in error messages
pub fn parse_nodes<R: Read>(source: R, file: &str) -> Result<Vec<NodeRow>> {
    let mut csv_reader = reader(source);
    let headers = csv_reader.headers()?.clone();
    let id_column = headers
        .iter()
        .position(|h| h == "id")
        .ok_or_else(|| failed(file, "missing required 'id' column"))?;

    let mut rows = Vec::new();
    for (row_idx, result) in csv_reader.records().enumerate() {
        let record = result?;
        let id = record.get(id_column).unwrap_or_default();
        if id.is_empty() {
            return Err(failed(file, format!("row {}: empty id", row_idx + 1)));
        }

        let properties = headers
            .iter()
            .zip(record.iter())
            .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
            .collect();

        rows.push(NodeRow {
            id: id.to_string(),
            properties,
        });
    }
    Ok(rows)
}

/// Parse edge rows; `file` is only used in error messages
pub fn parse_edges<R: Read>(source: R, file: &str) -> Result<Vec<EdgeRow>> {
    let mut csv_reader = reader(source);
    let headers = csv_reader.headers()?.clone();
    let leading: Vec<&str> = headers.iter().take(EDGE_HEADER.len()).collect();
    if leading != EDGE_HEADER {
        return Err(failed(
            file,
            format!("edge header must start with {}", EDGE_HEADER.join(",")),
        ));
    }

    let mut rows = Vec::new();
    for (row_idx, result) in csv_reader.records().enumerate() {
        let record = result?;
        let column = |i: usize| record.get(i).unwrap_or_default().to_string();

        let row = EdgeRow {
            start_id: column(0),
            start_label: column(1),
            end_id: column(2),
            end_label: column(3),
            properties: headers
                .iter()
                .zip(record.iter())
                .skip(EDGE_HEADER.len())
                .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
                .collect(),
        };

        if row.start_id.is_empty() || row.end_id.is_empty() {
            return Err(failed(file, format!("row {}: empty endpoint id", row_idx + 1)));
        }
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nodes() {
        let data = "id,name\nD001,Aspirin\nD002, Generic Aspirin \n";
        let rows = parse_nodes(data.as_bytes(), "Drug.csv").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "D001");
        assert_eq!(rows[0].properties["name"], "Aspirin");
        assert_eq!(rows[0].properties["id"], "D001");
        assert_eq!(rows[1].properties["name"], "Generic Aspirin");
    }

    #[test]
    fn test_nodes_require_id_column() {
        let err = parse_nodes("name\nAspirin\n".as_bytes(), "Drug.csv").unwrap_err();
        assert!(matches!(err, Error::BulkLoadFailed { .. }));
    }

    #[test]
    fn test_nodes_reject_empty_id() {
        let err = parse_nodes("id,name\n,Aspirin\n".as_bytes(), "Drug.csv").unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn test_ragged_row_is_an_error() {
        let result = parse_nodes("id,name\nD001\n".as_bytes(), "Drug.csv");
        assert!(matches!(result, Err(Error::Csv(_))));
    }

    #[test]
    fn test_parse_edges_with_extra_columns() {
        let data = "start_id,start_vertex_type,end_id,end_vertex_type,since\n\
                    D001,Drug,G001,GenericGroup,2020\n";
        let rows = parse_edges(data.as_bytes(), "IsPartOfGenericGroup.csv").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].start_label, "Drug");
        assert_eq!(rows[0].end_id, "G001");
        assert_eq!(rows[0].properties["since"], "2020");
    }

    #[test]
    fn test_edges_require_endpoint_header() {
        let err = parse_edges("from,to\nD001,G001\n".as_bytes(), "X.csv").unwrap_err();
        assert!(matches!(err, Error::BulkLoadFailed { .. }));
    }
}
