//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `mainctx_core` wiring.
//! - Keep output deterministic for quick local sanity checks.

use mainctx_core::{AttributeValue, MainContext, ManagedRecord, StoreConfig};

const SMOKE_SCHEMA: &str = r#"{
    "version": 1,
    "entities": [
        {"name": "note", "attributes": {"title": "text", "pinned": "boolean"}}
    ]
}"#;

fn main() {
    println!("mainctx_core version={}", mainctx_core::core_version());

    let context = match MainContext::open(StoreConfig::in_memory(SMOKE_SCHEMA)) {
        Ok(context) => context,
        Err(err) => {
            eprintln!("context open failed: {err}");
            std::process::exit(1);
        }
    };

    let mut note = ManagedRecord::new("note");
    note.set("title", AttributeValue::Text("smoke".to_string()));

    let outcome = context
        .insert(note)
        .and_then(|_| context.save())
        .and_then(|_| context.persisted_count("note"));

    match outcome {
        Ok(count) => println!("mainctx_core smoke notes_persisted={count}"),
        Err(err) => {
            eprintln!("smoke flow failed: {err}");
            std::process::exit(1);
        }
    }
}
