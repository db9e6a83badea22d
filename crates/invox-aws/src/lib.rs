//! AWS collaborators for the invox extraction engine.
//!
//! Two concerns live here: [`sync::BucketSync`] mirrors a local invoice
//! directory into S3, and [`analysis::DocumentAnalyzer`] runs Textract
//! analysis jobs and converts their block payloads into the engine's
//! [`invox_core::Document`]. Everything network-facing stays in this
//! crate; `invox-core` never sees an SDK type.

pub mod analysis;
pub mod error;
pub mod sync;

pub use analysis::{AnalysisQuery, BlockSource, DocumentAnalyzer, convert_blocks};
pub use error::{AnalysisError, SyncError};
pub use sync::{BucketSync, SyncReport};

use aws_config::meta::region::RegionProviderChain;
use aws_config::{BehaviorVersion, Region, SdkConfig};

/// Load shared AWS configuration, preferring an explicit region over the
/// environment's default provider chain.
pub async fn load_config(region: Option<String>) -> SdkConfig {
    let region_provider =
        RegionProviderChain::first_try(region.map(Region::new)).or_default_provider();
    aws_config::defaults(BehaviorVersion::latest())
        .region(region_provider)
        .load()
        .await
}
