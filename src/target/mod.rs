//! Target URL construction subsystem.
//!
//! # Data Flow
//! ```text
//! CampaignDescriptor + inbound headers/query
//!     → builder.rs (merge query, secondary target, path embed, placeholders)
//!         ↳ suffix.rs (public suffix of X-Target-URL host)
//!         ↳ rules.rs (region table, partner overrides, tags, remaps)
//!     → ResolvedTarget (absolute URL, ordered query)
//! ```
//!
//! # Design Decisions
//! - Resolution is synchronous and pure apart from logging
//! - Business rules are configuration data, not branches
//! - A malformed X-Target-URL degrades to "absent", never fails the request

pub mod builder;
pub mod rules;
pub mod suffix;

pub use builder::{ResolveError, ResolvedTarget, TargetBuilder};
pub use rules::TargetRules;
pub use suffix::{PublicSuffixList, SuffixLookup};
