use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::Deserialize;

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    behaviors: HashMap<String, BehaviorEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BehaviorEntry {
    Path(String),
    Detailed {
        path: String,
        #[serde(default)]
        root: Option<String>,
    },
}

impl BehaviorEntry {
    fn as_path(&self) -> &str {
        match self {
            BehaviorEntry::Path(path) => path,
            BehaviorEntry::Detailed { path, .. } => path,
        }
    }

    fn root(&self) -> Option<&str> {
        match self {
            BehaviorEntry::Path(_) => None,
            BehaviorEntry::Detailed { root, .. } => root.as_deref(),
        }
    }
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_to_string(rel: &str) -> Result<String> {
    let path = resolve_path(rel);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn lookup<'a, T>(map: &'a HashMap<String, T>, kind: &str, name: &str) -> Result<&'a T> {
    map.get(name)
        .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

pub mod behaviors {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.behaviors.keys().cloned().collect()
    }

    /// Tagfile XML of a behavior fixture.
    pub fn xml(name: &str) -> Result<String> {
        let entry = lookup(&MANIFEST.behaviors, "behavior", name)?;
        read_to_string(entry.as_path())
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        let entry = lookup(&MANIFEST.behaviors, "behavior", name)?;
        Ok(resolve_path(entry.as_path()))
    }

    /// Id of the object the fixture's reference graph starts at, if declared.
    pub fn root(name: &str) -> Result<Option<String>> {
        let entry = lookup(&MANIFEST.behaviors, "behavior", name)?;
        Ok(entry.root().map(str::to_string))
    }
}
