//! Reconciliation of desired and existing registry state
//!
//! Every desired entry is written on every run, even when the registry
//! already holds identical bytes, so a run that failed half way converges the
//! next time. Deletes are computed once from the snapshot taken at the start
//! of the run.

use tracing::info;

use crate::error::Result;
use crate::snapshot::ExistingSet;
use crate::source::DesiredSet;
use crate::store::RegistryStore;

/// The mutations that make the registry mirror the desired set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    /// Every desired entry with its canonical payload, in name order
    pub puts: Vec<(String, Vec<u8>)>,
    /// Existing names absent from the desired set, in name order
    pub deletes: Vec<String>,
}

impl Plan {
    pub fn put_names(&self) -> impl Iterator<Item = &str> {
        self.puts.iter().map(|(name, _)| name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.puts.is_empty() && self.deletes.is_empty()
    }
}

/// What an applied plan changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub put: Vec<String>,
    pub deleted: Vec<String>,
}

/// Compute the mutations needed to turn `existing` into `desired`
pub fn reconcile(desired: &DesiredSet, existing: &ExistingSet) -> Plan {
    let puts = desired
        .iter()
        .map(|doc| (doc.name.clone(), doc.payload()))
        .collect();

    let deletes = existing
        .names()
        .filter(|name| !desired.contains(name))
        .map(str::to_string)
        .collect();

    Plan { puts, deletes }
}

/// Apply all puts, then all deletes.
///
/// The first failure aborts: puts already written stay written and no delete
/// is attempted after a failed put.
pub async fn apply<S>(store: &S, plan: Plan) -> Result<SyncReport>
where
    S: RegistryStore + ?Sized,
{
    let mut report = SyncReport::default();

    for (name, payload) in plan.puts {
        info!("Putting schema {}", name);
        store.put(&name, payload).await?;
        report.put.push(name);
    }

    for name in plan.deletes {
        info!("Deleting schema {}", name);
        store.delete(&name).await?;
        report.deleted.push(name);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SchemaDocument;
    use crate::store::{MemoryStore, Mutation};
    use serde_json::json;
    use std::path::PathBuf;

    fn desired(names: &[&str]) -> DesiredSet {
        names
            .iter()
            .map(|name| SchemaDocument {
                name: name.to_string(),
                content: json!({ "type": "object", "title": name }),
                source_path: PathBuf::from(format!("{}.json", name)),
            })
            .collect()
    }

    fn existing(names: &[&str]) -> ExistingSet {
        names
            .iter()
            .map(|name| (name.to_string(), b"{}".to_vec()))
            .collect()
    }

    #[test]
    fn test_deletes_are_existing_minus_desired() {
        let plan = reconcile(&desired(&["y", "z"]), &existing(&["x", "y"]));

        assert_eq!(plan.put_names().collect::<Vec<_>>(), vec!["y", "z"]);
        assert_eq!(plan.deletes, vec!["x"]);
    }

    #[test]
    fn test_unchanged_entries_are_still_put() {
        let wanted = desired(&["a"]);
        let payload = wanted.get("a").unwrap().payload();
        let current: ExistingSet = [("a".to_string(), payload.clone())].into_iter().collect();

        let plan = reconcile(&wanted, &current);
        assert_eq!(plan.puts, vec![("a".to_string(), payload)]);
        assert!(plan.deletes.is_empty());
    }

    #[test]
    fn test_empty_snapshot_puts_everything() {
        let plan = reconcile(&desired(&["a", "b"]), &ExistingSet::new());
        assert_eq!(plan.puts.len(), 2);
        assert!(plan.deletes.is_empty());
    }

    #[test]
    fn test_empty_desired_deletes_everything() {
        let plan = reconcile(&DesiredSet::new(), &existing(&["a", "b"]));
        assert!(plan.puts.is_empty());
        assert_eq!(plan.deletes, vec!["a", "b"]);
        assert!(!plan.is_empty());
    }

    #[tokio::test]
    async fn test_apply_puts_before_deletes() {
        let store = MemoryStore::with_entries("S", [("x", "{}"), ("y", "{}")]);
        let plan = reconcile(&desired(&["y", "z"]), &existing(&["x", "y"]));

        let report = apply(&store, plan).await.unwrap();
        assert_eq!(report.put, vec!["y", "z"]);
        assert_eq!(report.deleted, vec!["x"]);
        assert_eq!(
            store.mutations(),
            vec![
                Mutation::Put("y".into()),
                Mutation::Put("z".into()),
                Mutation::Delete("x".into()),
            ]
        );
        assert_eq!(store.entries().keys().collect::<Vec<_>>(), vec!["y", "z"]);
    }

    #[tokio::test]
    async fn test_failed_put_skips_deletes() {
        let store = MemoryStore::with_entries("S", [("x", "{}")]);
        store.fail_put("b");
        let plan = reconcile(&desired(&["a", "b", "c"]), &existing(&["x"]));

        assert!(apply(&store, plan).await.is_err());
        assert_eq!(store.mutations(), vec![Mutation::Put("a".into())]);
        assert!(store.entries().contains_key("x"));
    }
}
