//! Campaign subsystem.
//!
//! # Data Flow
//! ```text
//! [campaigns.<id>] tables (config)
//!     → registry.rs (expand ${VAR}, parse templates, normalize ids)
//!     → CampaignRegistry (immutable, shared via Arc)
//!
//! Per request:
//!     /cid/<id> → CampaignRegistry::select → Arc<CampaignDescriptor>
//! ```

pub mod descriptor;
pub mod registry;
pub mod template;

pub use descriptor::{CampaignDescriptor, QueryTemplate};
pub use registry::{CampaignError, CampaignRegistry};
pub use template::TemplateValue;
