//! Dependency ordering of discovered scripts

use super::loader::ScriptRecord;
use crate::{Error, Result};

use std::collections::HashSet;

/// Order `records` so every script comes after the scripts it depends on.
///
/// Scripts with no ordering constraint between them keep their discovery
/// order. Dependencies on types that were not discovered are logged and
/// ignored. A cycle, including a script depending on itself, is an error
/// naming every script that could not be placed.
pub fn sort_by_dependencies(records: Vec<ScriptRecord>) -> Result<Vec<ScriptRecord>> {
    let known: HashSet<&str> = records.iter().map(|r| r.type_name.as_str()).collect();

    let mut pending: Vec<Vec<String>> = Vec::with_capacity(records.len());
    for record in &records {
        let mut deps = Vec::new();
        for dep in &record.dependencies {
            if known.contains(dep.as_str()) {
                if !deps.contains(dep) {
                    deps.push(dep.clone());
                }
            } else {
                tracing::warn!(
                    script = %record.type_name,
                    dependency = %dep,
                    "dependency not found; ignoring"
                );
            }
        }
        pending.push(deps);
    }

    let mut placed: HashSet<String> = HashSet::new();
    let mut slots: Vec<Option<ScriptRecord>> = records.into_iter().map(Some).collect();
    let mut sorted = Vec::with_capacity(slots.len());

    loop {
        let mut progressed = false;
        for (i, slot) in slots.iter_mut().enumerate() {
            let ready = match slot {
                Some(_) => pending[i].iter().all(|dep| placed.contains(dep)),
                None => false,
            };
            if ready {
                if let Some(record) = slot.take() {
                    placed.insert(record.type_name.clone());
                    sorted.push(record);
                    progressed = true;
                    // Restart so earlier scripts unblocked by this one go first
                    break;
                }
            }
        }
        if !progressed {
            break;
        }
    }

    let remaining: Vec<String> = slots
        .into_iter()
        .flatten()
        .map(|record| record.type_name)
        .collect();
    if !remaining.is_empty() {
        return Err(Error::CircularDependency(remaining));
    }

    let order: Vec<&str> = sorted.iter().map(|r| r.type_name.as_str()).collect();
    tracing::debug!(order = ?order, "scripts ordered by dependency");

    Ok(sorted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{Script, ScriptContext, ScriptResult};
    use std::sync::Arc;

    struct Nop;

    impl Script for Nop {
        fn on_tick(&mut self, _: &mut ScriptContext) -> ScriptResult {
            Ok(())
        }
    }

    fn record(name: &str, deps: &[&str]) -> ScriptRecord {
        ScriptRecord {
            path: None,
            type_name: name.to_string(),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            factory: Arc::new(|| Ok(Box::new(Nop) as Box<dyn Script>)),
        }
    }

    fn names(records: &[ScriptRecord]) -> Vec<&str> {
        records.iter().map(|r| r.type_name.as_str()).collect()
    }

    #[test]
    fn test_chain_is_reversed() {
        let sorted = sort_by_dependencies(vec![
            record("A", &["B"]),
            record("B", &["C"]),
            record("C", &[]),
        ])
        .unwrap();
        assert_eq!(names(&sorted), vec!["C", "B", "A"]);
    }

    #[test]
    fn test_independent_scripts_keep_order() {
        let sorted = sort_by_dependencies(vec![
            record("X", &[]),
            record("A", &["C"]),
            record("Y", &[]),
            record("C", &[]),
        ])
        .unwrap();
        assert_eq!(names(&sorted), vec!["X", "Y", "C", "A"]);
    }

    #[test]
    fn test_unknown_dependency_ignored() {
        let sorted =
            sort_by_dependencies(vec![record("A", &["Missing"]), record("B", &["A", "A"])])
                .unwrap();
        assert_eq!(names(&sorted), vec!["A", "B"]);
    }

    #[test]
    fn test_cycle_is_error() {
        let err = sort_by_dependencies(vec![
            record("Free", &[]),
            record("A", &["B"]),
            record("B", &["A"]),
        ])
        .unwrap_err();
        match err {
            Error::CircularDependency(names) => assert_eq!(names, vec!["A", "B"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_dependency_is_cycle() {
        assert!(matches!(
            sort_by_dependencies(vec![record("Me", &["Me"])]),
            Err(Error::CircularDependency(_))
        ));
    }
}
