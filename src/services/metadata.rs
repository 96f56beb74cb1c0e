//! Trait for the per-variable metadata source.

use anyhow::Result;
use std::collections::HashMap;

/// Provides the transformation code for each variable identifier.
///
/// Codes are the raw metadata strings ("1".."6"); interpreting them is the
/// job of [`crate::transform::Transformation::from_code`].
#[async_trait::async_trait]
pub trait MetadataSource: Send + Sync {
    /// Returns a map from variable identifier to transformation code.
    async fn transform_codes(&self) -> Result<HashMap<String, String>>;
}
