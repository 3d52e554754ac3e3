//! Compile-time graph pattern queries
//!
//! A [`PatternQuery`] is a linear path anchored on one node whose `id`
//! property is bound from the single external parameter `$entity_id`. The
//! query returns the node at the far end of the path, one per match. The
//! Cypher text is rendered from the pattern so that the declared output
//! shape and the executed query cannot drift apart.

use super::schema::{EdgeLabel, NodeLabel};

/// Name of the bound parameter inside the cypher parameter map
pub const ENTITY_ID_PARAM: &str = "entity_id";

/// Direction in which a hop traverses its edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `(prev)-[edge]->(next)`
    Outgoing,
    /// `(prev)<-[edge]-(next)`
    Incoming,
}

/// One step of a pattern: follow an edge to a node of a given label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hop {
    pub edge: EdgeLabel,
    pub direction: Direction,
    pub target: NodeLabel,
}

impl Hop {
    pub const fn outgoing(edge: EdgeLabel, target: NodeLabel) -> Self {
        Self {
            edge,
            direction: Direction::Outgoing,
            target,
        }
    }

    pub const fn incoming(edge: EdgeLabel, target: NodeLabel) -> Self {
        Self {
            edge,
            direction: Direction::Incoming,
            target,
        }
    }
}

/// A parameterised path query returning exactly one node per match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternQuery {
    /// Short name used in logs
    pub name: &'static str,
    /// Label of the node matched by `$entity_id`
    pub anchor: NodeLabel,
    /// Path walked from the anchor; the last hop's node is returned
    pub hops: &'static [Hop],
}

impl PatternQuery {
    /// Label of the returned node
    pub fn returns(&self) -> NodeLabel {
        self.hops.last().map(|hop| hop.target).unwrap_or(self.anchor)
    }

    /// Render the Cypher `MATCH ... WHERE ... RETURN` body
    pub fn cypher(&self) -> String {
        let mut pattern = format!("(n0:{})", self.anchor.as_str());
        for (i, hop) in self.hops.iter().enumerate() {
            let node = format!("(n{}:{})", i + 1, hop.target.as_str());
            let edge = match hop.direction {
                Direction::Outgoing => format!("-[:{}]->", hop.edge.as_str()),
                Direction::Incoming => format!("<-[:{}]-", hop.edge.as_str()),
            };
            pattern.push_str(&edge);
            pattern.push_str(&node);
        }
        format!(
            "MATCH {} WHERE n0.id = ${} RETURN n{}",
            pattern,
            ENTITY_ID_PARAM,
            self.hops.len()
        )
    }
}

/// Other drugs that share a generic group with the anchor drug
pub const GENERICS: PatternQuery = PatternQuery {
    name: "generics",
    anchor: NodeLabel::Drug,
    hops: &[
        Hop::outgoing(EdgeLabel::IsPartOfGenericGroup, NodeLabel::GenericGroup),
        Hop::incoming(EdgeLabel::IsPartOfGenericGroup, NodeLabel::Drug),
    ],
};

/// Excipients contained in the anchor drug
pub const EXCIPIENTS: PatternQuery = PatternQuery {
    name: "excipients",
    anchor: NodeLabel::Drug,
    hops: &[Hop::outgoing(EdgeLabel::ContainsExcipient, NodeLabel::Excipient)],
};

/// Active ingredients contained in the anchor drug
pub const ACTIVE_INGREDIENTS: PatternQuery = PatternQuery {
    name: "active_ingredients",
    anchor: NodeLabel::Drug,
    hops: &[Hop::outgoing(
        EdgeLabel::ContainsActiveIngredient,
        NodeLabel::ActiveIngredient,
    )],
};

/// Indications of the anchor drug
pub const INDICATIONS: PatternQuery = PatternQuery {
    name: "indications",
    anchor: NodeLabel::Drug,
    hops: &[Hop::outgoing(EdgeLabel::HasIndication, NodeLabel::Indication)],
};

/// Contraindications of the anchor drug
pub const CONTRAINDICATIONS: PatternQuery = PatternQuery {
    name: "contraindications",
    anchor: NodeLabel::Drug,
    hops: &[Hop::outgoing(
        EdgeLabel::HasContraindication,
        NodeLabel::Contraindication,
    )],
};

/// Routes through which the anchor drug is administered
pub const ROUTES: PatternQuery = PatternQuery {
    name: "routes",
    anchor: NodeLabel::Drug,
    hops: &[Hop::outgoing(EdgeLabel::IsAdministeredVia, NodeLabel::Roa)],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generics_cypher() {
        assert_eq!(
            GENERICS.cypher(),
            "MATCH (n0:Drug)-[:IsPartOfGenericGroup]->(n1:GenericGroup)\
             <-[:IsPartOfGenericGroup]-(n2:Drug) WHERE n0.id = $entity_id RETURN n2"
        );
        assert_eq!(GENERICS.returns(), NodeLabel::Drug);
    }

    #[test]
    fn test_single_hop_cypher() {
        assert_eq!(
            EXCIPIENTS.cypher(),
            "MATCH (n0:Drug)-[:ContainsExcipient]->(n1:Excipient) WHERE n0.id = $entity_id RETURN n1"
        );
        assert_eq!(CONTRAINDICATIONS.returns(), NodeLabel::Contraindication);
        assert_eq!(ROUTES.returns(), NodeLabel::Roa);
    }

    #[test]
    fn test_anchor_only_pattern_returns_anchor() {
        const SELF: PatternQuery = PatternQuery {
            name: "self",
            anchor: NodeLabel::Drug,
            hops: &[],
        };
        assert_eq!(SELF.returns(), NodeLabel::Drug);
        assert!(SELF.cypher().ends_with("RETURN n0"));
    }
}
