//! Dump the bootstrapped meta model
//!
//! Starts an in-memory core, installs the meta model and writes it out as a
//! Mermaid diagram and as JSON type views.

use anyhow::Context;
use deepamehta_core::{CoreConfig, CoreService, InMemoryGraphStorage, TypeKind, TypeView};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("meta-model"));

    println!("Bootstrapping meta model...");
    let service = CoreService::new(Arc::new(InMemoryGraphStorage::new()), CoreConfig::default())
        .context("starting the core")?;
    let mut tx = service.begin_tx()?;
    let mut types = tx.get_all_types()?;
    tx.commit()?;
    types.sort_by(|a, b| a.uri().cmp(b.uri()));

    fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    let mermaid_path = output_dir.join("meta-model.mmd");
    fs::write(&mermaid_path, to_mermaid(&types))?;
    println!("Generated Mermaid diagram: {}", mermaid_path.display());

    let views: Vec<&TypeView> = types.iter().map(Arc::as_ref).collect();
    let json_path = output_dir.join("meta-model.json");
    fs::write(&json_path, serde_json::to_string_pretty(&views)?)?;
    println!("Generated type views: {}", json_path.display());

    println!("\n{} types installed", types.len());
    Ok(())
}

fn node_id(uri: &str) -> String {
    uri.replace('.', "_")
}

fn to_mermaid(types: &[Arc<TypeView>]) -> String {
    let mut out = String::from("graph LR\n");
    for view in types {
        let shape = match view.kind() {
            TypeKind::Topic => format!("[\"{}\"]", view.name()),
            TypeKind::Association => format!("([\"{}\"])", view.name()),
        };
        out.push_str(&format!("    {}{shape}\n", node_id(view.uri())));
    }
    for view in types {
        for def in view.assoc_defs() {
            out.push_str(&format!(
                "    {} -->|{} {}| {}\n",
                node_id(view.uri()),
                def.assoc.type_uri,
                def.child_cardinality.uri(),
                node_id(&def.child_type_uri)
            ));
        }
    }
    out
}
