// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ctlwire schema`: print record layouts

use anyhow::Result;
use clap::Args;
use ctlwire_core::{RecordSchema, SchemaRegistry};
use serde::Serialize;
use std::path::PathBuf;

use crate::output::{print_json, OutputFormat};

#[derive(Args)]
pub struct SchemaArgs {
    /// Schema file (TOML)
    pub file: PathBuf,

    /// Only show this schema
    pub name: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct FieldLayout {
    pub name: String,
    pub kind: String,
    pub offset: usize,
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub len: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct SchemaLayout {
    pub name: String,
    pub size: usize,
    pub fields: Vec<FieldLayout>,
}

impl SchemaLayout {
    pub fn of(schema: &RecordSchema) -> Self {
        Self {
            name: schema.name().to_string(),
            size: schema.size(),
            fields: schema
                .fields()
                .map(|field| FieldLayout {
                    name: field.name().to_string(),
                    kind: field.kind().to_string(),
                    offset: field.offset(),
                    size: field.size(),
                    len: field.is_array().then_some(field.arity()),
                    schema: field.nested().map(|s| s.name().to_string()),
                })
                .collect(),
        }
    }

    pub fn to_text(&self) -> String {
        let mut out = format!("{} ({} bytes)\n", self.name, self.size);
        for field in &self.fields {
            let mut kind = match &field.schema {
                Some(schema) => format!("{}<{}>", field.kind, schema),
                None => field.kind.clone(),
            };
            if let Some(len) = field.len {
                kind.push_str(&format!("[{}]", len));
            }
            out.push_str(&format!(
                "  {:>5}  {:<12} {} ({} bytes)\n",
                field.offset, field.name, kind, field.size
            ));
        }
        out
    }
}

/// Layouts for `name`, or for every registered schema sorted by name
pub fn layouts(registry: &SchemaRegistry, name: Option<&str>) -> Result<Vec<SchemaLayout>> {
    let names = match name {
        Some(name) => vec![name.to_string()],
        None => {
            let mut names = registry.names();
            names.sort();
            names
        }
    };
    names
        .iter()
        .map(|name| -> Result<SchemaLayout> { Ok(SchemaLayout::of(&*registry.resolve(name)?)) })
        .collect()
}

pub fn handle(args: SchemaArgs, format: OutputFormat) -> Result<()> {
    let registry = super::load_registry(Some(&args.file))?;
    let layouts = layouts(&registry, args.name.as_deref())?;

    match format {
        OutputFormat::Text => {
            for (i, layout) in layouts.iter().enumerate() {
                if i > 0 {
                    println!();
                }
                print!("{}", layout.to_text());
            }
        }
        OutputFormat::Json => print_json(&layouts)?,
    }
    Ok(())
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
