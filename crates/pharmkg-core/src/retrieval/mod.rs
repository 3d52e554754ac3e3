//! Retrieval engine
//!
//! - [`EntityResolver`]: free text to the nearest indexed node
//! - [`PropertyProjector`]: pattern query rows to projected fields
//! - [`DrugLookups`]: generics, ingredients, excipients, indications,
//!   contraindications and routes around a known drug

pub mod lookups;
pub mod projector;
pub mod resolver;

pub use lookups::{DrugLookups, DrugProfile, EntityRef};
pub use projector::{ProjectedRow, Projection, ProjectionSpec, PropertyProjector, project_rows};
pub use resolver::{EntityResolver, ResolvedEntity};
