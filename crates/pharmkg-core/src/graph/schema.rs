//! Fixed graph schema: node labels, edge labels and their declared shapes
//!
//! The schema is small and closed. Labels are the only identifiers that ever
//! reach statement text, so they are either compile-time constants or pass
//! [`validate_identifier`] first.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Node labels registered in every graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeLabel {
    Drug,
    ActiveIngredient,
    Excipient,
    GenericGroup,
    LegalSubstanceList,
    Indication,
    Contraindication,
    /// Route of administration
    #[serde(rename = "ROA")]
    Roa,
}

impl NodeLabel {
    /// Get the label as it is stored in the graph
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drug => "Drug",
            Self::ActiveIngredient => "ActiveIngredient",
            Self::Excipient => "Excipient",
            Self::GenericGroup => "GenericGroup",
            Self::LegalSubstanceList => "LegalSubstanceList",
            Self::Indication => "Indication",
            Self::Contraindication => "Contraindication",
            Self::Roa => "ROA",
        }
    }

    /// Property keys every node of this label is loaded with
    pub fn properties(&self) -> &'static [&'static str] {
        match self {
            Self::Contraindication => &["id", "name", "type"],
            _ => &["id", "name"],
        }
    }

    /// Get all node labels in registration order
    pub fn all() -> &'static [NodeLabel] {
        &[
            Self::Drug,
            Self::ActiveIngredient,
            Self::Excipient,
            Self::GenericGroup,
            Self::LegalSubstanceList,
            Self::Indication,
            Self::Contraindication,
            Self::Roa,
        ]
    }
}

impl std::fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Edge labels registered in every graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeLabel {
    IsAdministeredVia,
    ContainsActiveIngredient,
    ContainsExcipient,
    IsPartOfGenericGroup,
    IsReferenceDrugInGroup,
    IsGenericDrugInGroup,
    BelongsToLegalSubstanceList,
    HasIndication,
    HasContraindication,
}

impl EdgeLabel {
    /// Get the label as it is stored in the graph
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IsAdministeredVia => "IsAdministeredVia",
            Self::ContainsActiveIngredient => "ContainsActiveIngredient",
            Self::ContainsExcipient => "ContainsExcipient",
            Self::IsPartOfGenericGroup => "IsPartOfGenericGroup",
            Self::IsReferenceDrugInGroup => "IsReferenceDrugInGroup",
            Self::IsGenericDrugInGroup => "IsGenericDrugInGroup",
            Self::BelongsToLegalSubstanceList => "BelongsToLegalSubstanceList",
            Self::HasIndication => "HasIndication",
            Self::HasContraindication => "HasContraindication",
        }
    }

    /// Get all edge labels in registration order
    pub fn all() -> &'static [EdgeLabel] {
        &[
            Self::IsAdministeredVia,
            Self::ContainsActiveIngredient,
            Self::ContainsExcipient,
            Self::IsPartOfGenericGroup,
            Self::IsReferenceDrugInGroup,
            Self::IsGenericDrugInGroup,
            Self::BelongsToLegalSubstanceList,
            Self::HasIndication,
            Self::HasContraindication,
        ]
    }
}

impl std::fmt::Display for EdgeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Check that a graph, label or table name is a plain identifier
///
/// Accepts ASCII letters, digits and underscores, not starting with a digit,
/// at most 63 bytes (the PostgreSQL identifier limit).
pub fn validate_identifier(name: &str) -> Result<&str> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
                && name.len() <= 63
        }
        None => false,
    };

    if valid {
        Ok(name)
    } else {
        Err(Error::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_label_sets() {
        assert_eq!(NodeLabel::all().len(), 8);
        assert_eq!(EdgeLabel::all().len(), 9);
    }

    #[test]
    fn test_stored_label_names() {
        assert_eq!(NodeLabel::Roa.as_str(), "ROA");
        assert_eq!(NodeLabel::Drug.to_string(), "Drug");
        assert_eq!(EdgeLabel::HasContraindication.as_str(), "HasContraindication");
    }

    #[test]
    fn test_declared_properties() {
        assert!(NodeLabel::Contraindication.properties().contains(&"type"));
        assert!(!NodeLabel::Drug.properties().contains(&"type"));
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("fcsv").is_ok());
        assert!(validate_identifier("document_vectors").is_ok());
        assert!(validate_identifier("_private").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1abc").is_err());
        assert!(validate_identifier("Drug'); DROP TABLE x;--").is_err());
        assert!(validate_identifier(&"a".repeat(64)).is_err());
    }
}
