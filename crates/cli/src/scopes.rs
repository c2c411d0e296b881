use aries_scope::{ScopeId, ScopeRecord, ScopeStore};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct ScopeNode<'a> {
    #[serde(flatten)]
    record: &'a ScopeRecord,
    children: Vec<ScopeNode<'a>>,
}

fn node<'a>(record: &'a ScopeRecord, all: &'a [ScopeRecord]) -> ScopeNode<'a> {
    ScopeNode {
        record,
        children: all
            .iter()
            .filter(|r| r.parent == Some(record.id) && r.id != record.id)
            .map(|r| node(r, all))
            .collect(),
    }
}

pub fn run(data_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let records = ScopeStore::new(data_dir).load_all()?;
    if records.is_empty() {
        eprintln!("No persisted scopes in {}", data_dir.display());
        return Ok(());
    }
    // Records whose parent is gone are shown as extra roots.
    let roots: Vec<_> = records
        .iter()
        .filter(|r| {
            r.id == ScopeId::ROOT || r.parent.is_none_or(|p| !records.iter().any(|o| o.id == p))
        })
        .map(|r| node(r, &records))
        .collect();
    println!("{}", serde_json::to_string_pretty(&roots)?);
    Ok(())
}
