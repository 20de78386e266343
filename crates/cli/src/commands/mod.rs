// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod call;
pub mod schema;

use anyhow::{Context, Result};
use ctlwire_core::SchemaRegistry;
use std::path::Path;

/// Registry loaded from `path`, or an empty one
pub fn load_registry(path: Option<&Path>) -> Result<SchemaRegistry> {
    let registry = SchemaRegistry::new();
    if let Some(path) = path {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read schema file {}", path.display()))?;
        registry
            .load_toml(&text)
            .with_context(|| format!("failed to load schema file {}", path.display()))?;
    }
    Ok(registry)
}
