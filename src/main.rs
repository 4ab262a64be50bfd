//! osm-graph-check: validiert einen JSON-Entity-Bestand.
//!
//! Aufruf: `osm-graph-check <entities.json> [options.toml]`
//! Gibt alle Issues als JSON aus. Exit-Code 1, wenn mindestens ein Fehler
//! gefunden wurde.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use osm_graph_editor::{parse_entities, write_issues, EditSession, EngineOptions, Severity};

fn main() -> Result<()> {
    // Logger initialisieren
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("osm-graph-check v{} startet...", env!("CARGO_PKG_VERSION"));

    let mut args = std::env::args().skip(1);
    let Some(input) = args.next().map(PathBuf::from) else {
        bail!("Aufruf: osm-graph-check <entities.json> [options.toml]");
    };
    let options_path = args.next().map(PathBuf::from).unwrap_or_else(EngineOptions::config_path);
    let options = EngineOptions::load_from_file(&options_path);

    let content = std::fs::read_to_string(&input)
        .with_context(|| format!("Datei {} nicht lesbar", input.display()))?;
    let entities = parse_entities(&content)
        .with_context(|| format!("Bestand {} ungültig", input.display()))?;

    let mut session = EditSession::from_entities(entities, options);
    session.validate_pending();
    let issues = session.issues();

    println!("{}", write_issues(&issues)?);

    let errors = issues.iter().filter(|i| i.severity == Severity::Error).count();
    log::info!("{} Issues, davon {} Fehler", issues.len(), errors);
    if errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}
