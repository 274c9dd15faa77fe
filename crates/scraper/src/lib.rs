//! The scrape pipeline: session bootstrap, section enumeration,
//! per-component extraction and persistence.

pub mod bootstrap;
pub mod extract;
pub mod frameworks;
pub mod pipeline;
pub mod sections;
pub mod store;

#[cfg(test)]
mod testing;

pub use bootstrap::{bootstrap, Login};
pub use extract::{SectionExtractor, SectionFailure, SectionOutcome, SkipReason};
pub use pipeline::{harvest, HarvestSummary, Harvester};
pub use store::ArtifactStore;
