//! Reverse dependency index over relation fields
//!
//! Answers "which entries reference these ones". References are read from
//! the consolidated fields and from every layer block. Propagation is one
//! hop only: dependents of dependents are not followed.

use crate::config::RuleTables;
use concord_domain::Entry;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// `from` references `to` through `via`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct DependencyEdge {
    /// Referencing entry id
    pub from: String,

    /// Referenced entry id (lower-cased)
    pub to: String,

    /// Relation field holding the reference
    pub via: String,
}

/// Reverse adjacency built from a set of entries
#[derive(Debug, Clone, Default)]
pub struct DependencyIndex {
    reverse: BTreeMap<String, BTreeSet<DependencyEdge>>,
}

impl DependencyIndex {
    /// Build the index from entries using the configured relation fields
    pub fn build<'a>(entries: impl IntoIterator<Item = &'a Entry>, rules: &RuleTables) -> Self {
        let mut reverse: BTreeMap<String, BTreeSet<DependencyEdge>> = BTreeMap::new();
        for entry in entries {
            for relation in &rules.relation_fields {
                let layered = entry
                    .layers()
                    .into_iter()
                    .filter_map(|(_, block)| block.get(&relation.field).cloned());
                let references = entry
                    .consolidated(&relation.field)
                    .into_iter()
                    .chain(layered)
                    .flat_map(|value| value.items());
                for reference in references {
                    if reference.trim().is_empty() {
                        continue;
                    }
                    let to = relation.target_id(&reference);
                    if to == entry.id().to_lowercase() {
                        continue;
                    }
                    reverse.entry(to.clone()).or_default().insert(DependencyEdge {
                        from: entry.id().to_string(),
                        to,
                        via: relation.field.clone(),
                    });
                }
            }
        }
        Self { reverse }
    }

    /// Edges pointing at one entry id
    pub fn dependents_of(&self, id: &str) -> Vec<DependencyEdge> {
        self.reverse
            .get(&id.to_lowercase())
            .map(|edges| edges.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// All edges
    pub fn edges(&self) -> Vec<DependencyEdge> {
        self.reverse.values().flatten().cloned().collect()
    }

    /// Entries referencing any of `changed`, excluding `changed` itself
    pub fn affected<S: AsRef<str>>(&self, changed: &[S]) -> BTreeSet<String> {
        let changed_lower: BTreeSet<String> =
            changed.iter().map(|s| s.as_ref().to_lowercase()).collect();
        changed_lower
            .iter()
            .flat_map(|id| self.dependents_of(id))
            .map(|edge| edge.from)
            .filter(|from| !changed_lower.contains(&from.to_lowercase()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_domain::FieldValue;

    fn entry(id: &str, related: &[&str]) -> Entry {
        let mut e = Entry::new(id);
        if !related.is_empty() {
            e.set_consolidated(
                "related_instructions",
                FieldValue::List(related.iter().map(|r| FieldValue::from(*r)).collect()),
            );
        }
        e
    }

    #[test]
    fn test_template_maps_mnemonics() {
        let entries = vec![
            entry("mov-instruction", &["ADD"]),
            entry("add-instruction", &["SUB"]),
            entry("sub-instruction", &[]),
        ];
        let index = DependencyIndex::build(&entries, &RuleTables::default());

        let affected = index.affected(&["SUB-Instruction"]);
        assert_eq!(affected, BTreeSet::from(["add-instruction".to_string()]));
    }

    #[test]
    fn test_one_hop_only() {
        let entries = vec![
            entry("mov-instruction", &["ADD"]),
            entry("add-instruction", &["SUB"]),
        ];
        let index = DependencyIndex::build(&entries, &RuleTables::default());
        let affected = index.affected(&["sub-instruction"]);
        assert!(affected.contains("add-instruction"));
        assert!(!affected.contains("mov-instruction"));
    }

    #[test]
    fn test_text_references_and_see_also() {
        let mut a = Entry::new("jmp-instruction");
        a.set_consolidated("related_instructions", "CALL, RET".into());
        let mut b = Entry::new("cog-overview");
        b.set_consolidated("see_also", FieldValue::List(vec!["Smart-Pins".into()]));
        let entries = vec![a, b];
        let index = DependencyIndex::build(&entries, &RuleTables::default());

        assert_eq!(index.dependents_of("ret-instruction").len(), 1);
        assert_eq!(index.dependents_of("smart-pins")[0].via, "see_also");
        assert_eq!(index.edges().len(), 3);
    }

    #[test]
    fn test_layer_only_references() {
        use concord_domain::AuthorityLayer;

        let mut cog = Entry::new("coginit-instruction");
        cog.layer_or_default(AuthorityLayer::Baseline)
            .set("related_instructions", "COGSTOP".into());
        cog.layer_or_default(AuthorityLayer::Verified)
            .set("related_instructions", FieldValue::List(vec!["COGSTOP".into(), "COGID".into()]));
        let entries = vec![cog];
        let index = DependencyIndex::build(&entries, &RuleTables::default());

        assert_eq!(index.dependents_of("cogstop-instruction").len(), 1);
        assert_eq!(
            index.affected(&["cogid-instruction"]),
            BTreeSet::from(["coginit-instruction".to_string()])
        );
    }

    #[test]
    fn test_changed_entries_are_not_their_own_dependents() {
        let entries = vec![entry("a-instruction", &["B"]), entry("b-instruction", &["A"])];
        let index = DependencyIndex::build(&entries, &RuleTables::default());
        assert!(index.affected(&["a-instruction", "b-instruction"]).is_empty());
    }
}
