//! Integration tests for concord-engine
//!
//! End-to-end runs over temporary knowledge-base repositories.

use chrono::{TimeZone, Utc};
use concord_domain::{ConflictKind, FieldValue, RollbackStatus, Strategy};
use concord_engine::{
    propagate, resolve_conflicts, scan_workspace, ChangeDetector, EngineConfig, ExtractedEntry,
    ExtractionBatch, ItemStatus, RollbackManager, RunContext, Workspace,
};
use concord_store::FileEntryStore;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

fn ctx() -> RunContext {
    RunContext::at(
        EngineConfig::default(),
        Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap(),
    )
}

fn load(ws: &Workspace, rel: &str) -> concord_domain::Entry {
    let text = fs::read_to_string(ws.root().join(rel)).unwrap();
    FileEntryStore::parse_entry(rel, &text).unwrap()
}

const X: &str = r#"metadata:
  id: x-instruction
layer1:
  source: P2-Instruction-Set.csv
  timing: '2'
layer3:
  source: Silicon-Doc
  timing: 13-20
"#;

const Y: &str = r#"metadata:
  id: y-instruction
layer1:
  source: P2-Instruction-Set.csv
  interrupt_shield: false
layer4:
  source: forum-clarification
  interrupt_shield: true
"#;

const Z: &str = r#"metadata:
  id: z-instruction
layer2:
  source: P2-Datasheet
  description: Stops a cog.
layer3:
  source: Silicon-Doc
  description: Stops a cog; it becomes available for reuse.
"#;

fn scenario_repo() -> (TempDir, Workspace) {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "instructions/x.yaml", X);
    write(dir.path(), "instructions/y.yaml", Y);
    write(dir.path(), "instructions/z.yaml", Z);
    let ws = Workspace::open(dir.path(), EngineConfig::default()).unwrap();
    (dir, ws)
}

#[test]
fn test_layered_scenarios_resolve_as_expected() {
    let (_dir, ws) = scenario_repo();
    let mut ctx = ctx();

    let (scan, log) = scan_workspace(&ws, &mut ctx).unwrap();
    assert!(log.is_some());
    let kinds: BTreeMap<&str, ConflictKind> = scan
        .conflicts
        .iter()
        .map(|c| (c.entry_id.as_str(), c.kind))
        .collect();
    assert_eq!(kinds["x-instruction"], ConflictKind::PrecisionVariant);
    assert_eq!(kinds["y-instruction"], ConflictKind::DirectContradiction);
    assert_eq!(kinds["z-instruction"], ConflictKind::CompletenessGap);

    let report = resolve_conflicts(&ws, &mut ctx, &scan.conflicts, None).unwrap();
    assert_eq!(report.count(ItemStatus::Resolved), 3);
    let by_entry: BTreeMap<&str, _> = report
        .log
        .outcomes
        .iter()
        .map(|o| (o.entry_id.as_str(), o))
        .collect();

    let x = by_entry["x-instruction"];
    assert_eq!(x.strategy, Strategy::PrecisionContainment);
    assert_eq!(x.resolved_value, Some(FieldValue::from("13-20")));
    assert!(x.confidence >= 0.9);

    let y = by_entry["y-instruction"];
    assert_eq!(y.strategy, Strategy::AuthorityOverride);
    assert_eq!(y.resolved_value, Some(FieldValue::Bool(true)));

    let z = by_entry["z-instruction"];
    assert_eq!(z.strategy, Strategy::AdditiveMerge);
    let merged = load(&ws, "instructions/z.yaml")
        .consolidated("description")
        .unwrap()
        .to_string();
    assert!(merged.contains("Stops a cog. [confirmed]"));
    assert!(merged.contains("available for reuse. [verified]"));

    // Every write was preceded by a snapshot
    for conflict in &scan.conflicts {
        assert!(ws.snapshots().exists(&conflict.id));
    }
}

#[test]
fn test_rescan_after_resolution_is_settled() {
    let (_dir, ws) = scenario_repo();
    let mut ctx = ctx();
    let (scan, _) = scan_workspace(&ws, &mut ctx).unwrap();
    resolve_conflicts(&ws, &mut ctx, &scan.conflicts, None).unwrap();

    let (rescan, _) = scan_workspace(&ws, &mut ctx).unwrap();
    assert!(rescan.conflicts.is_empty());
}

#[test]
fn test_snapshot_restore_is_bit_exact() {
    let (dir, ws) = scenario_repo();
    let mut ctx = ctx();
    let (scan, _) = scan_workspace(&ws, &mut ctx).unwrap();
    resolve_conflicts(&ws, &mut ctx, &scan.conflicts, None).unwrap();

    let y = scan
        .conflicts
        .iter()
        .find(|c| c.entry_id == "y-instruction")
        .unwrap();
    let report = RollbackManager::new(&ws)
        .restore_from_snapshot(&mut ctx, &y.id)
        .unwrap();
    assert_eq!(report.count(RollbackStatus::Restored), 1);
    assert_eq!(
        fs::read_to_string(dir.path().join("instructions/y.yaml")).unwrap(),
        Y
    );
}

#[test]
fn test_restore_point_repairs_exactly_the_corrupted_entries() {
    let dir = TempDir::new().unwrap();
    for i in 0..500 {
        write(
            dir.path(),
            &format!("instructions/op{:03}.yaml", i),
            &format!("metadata:\n  id: op{:03}-instruction\ncompleteness_score: 3\n", i),
        );
    }
    let ws = Workspace::open(dir.path(), EngineConfig::default()).unwrap();
    let manager = RollbackManager::new(&ws).with_reason("migration test");
    let mut ctx = ctx();

    let point = manager
        .create_restore_point(&mut ctx, "pre-migration", "before migration")
        .unwrap()
        .unwrap();
    assert_eq!(point.file_count, 500);

    for i in [7, 250, 499] {
        write(dir.path(), &format!("instructions/op{:03}.yaml", i), "corrupted: [");
    }

    let report = manager.restore_from_point(&mut ctx, "pre-migration").unwrap();
    assert_eq!(report.count(RollbackStatus::Restored), 3);
    assert_eq!(report.count(RollbackStatus::Failed), 0);
    assert_eq!(report.count(RollbackStatus::Unchanged), 497);
    assert_eq!(
        fs::read_to_string(dir.path().join("instructions/op250.yaml")).unwrap(),
        "metadata:\n  id: op250-instruction\ncompleteness_score: 3\n"
    );
    assert_eq!(ws.rollback_log().load().unwrap().len(), 500);
}

#[test]
fn test_change_detection_is_idempotent() {
    let (dir, ws) = scenario_repo();
    write(dir.path(), "sources/P2-Instruction-Set.csv", "MOV,2\n");
    let detector = ChangeDetector::new(&ws);

    let first = detector.run(Utc::now()).unwrap();
    assert_eq!(first.sources.len(), 1);
    assert_eq!(first.entries.len(), 3);

    assert!(detector.run(Utc::now()).unwrap().is_empty());
    assert!(detector.run(Utc::now()).unwrap().is_empty());
}

#[test]
fn test_propagation_updates_entries_and_reports_dependents() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "instructions/pasm2/mov.yaml",
        "metadata:\n  id: mov-instruction\n  mnemonic: MOV\ntiming: '2'\n",
    );
    write(
        dir.path(),
        "instructions/pasm2/add.yaml",
        "metadata:\n  id: add-instruction\n  mnemonic: ADD\nrelated_instructions:\n- MOV\n",
    );
    write(dir.path(), "sources/P2-Instruction-Set.csv", "MOV,2\n");
    let ws = Workspace::open(dir.path(), EngineConfig::default()).unwrap();

    let changes = ChangeDetector::new(&ws).run(Utc::now()).unwrap();
    assert_eq!(changes.triggers.len(), 1);

    let batch = ExtractionBatch {
        source: "P2-Instruction-Set.csv".into(),
        layer: None,
        extracted_at: Utc::now(),
        entries: vec![
            ExtractedEntry {
                entry_id: "mov-instruction".into(),
                fields: BTreeMap::from([
                    ("timing".to_string(), FieldValue::from("2")),
                    ("mnemonic".to_string(), FieldValue::from("MOVE")),
                ]),
            },
            ExtractedEntry {
                entry_id: "nop-instruction".into(),
                fields: BTreeMap::new(),
            },
        ],
    };
    let mut ctx = ctx();
    let report = propagate(&ws, &mut ctx, &batch).unwrap();

    assert_eq!(report.updated, vec!["instructions/pasm2/mov.yaml".to_string()]);
    assert_eq!(report.failures.len(), 1);
    assert!(report.dependents.contains("add-instruction"));
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.triggers_archived, 1);
    assert!(report.batch.is_some());

    let mov = load(&ws, "instructions/pasm2/mov.yaml");
    assert_eq!(mov.metadata.mnemonic.as_deref(), Some("MOV"));
    assert!(mov.layer(concord_domain::AuthorityLayer::Baseline).is_some());
    assert_eq!(ws.backups().list("instructions/pasm2/mov.yaml").unwrap().len(), 1);
}

#[test]
fn test_batch_rollback_undoes_propagation() {
    let dir = TempDir::new().unwrap();
    let original = "metadata:\n  id: mov-instruction\ntiming: '2'\n";
    write(dir.path(), "instructions/mov.yaml", original);
    let ws = Workspace::open(dir.path(), EngineConfig::default()).unwrap();

    let batch = ExtractionBatch {
        source: "Silicon-Doc-v35".into(),
        layer: None,
        extracted_at: Utc::now(),
        entries: vec![ExtractedEntry {
            entry_id: "mov-instruction".into(),
            fields: BTreeMap::from([("timing".to_string(), FieldValue::from("4"))]),
        }],
    };
    let mut ctx = ctx();
    let report = propagate(&ws, &mut ctx, &batch).unwrap();
    let id = report.batch.unwrap().id;
    assert_ne!(fs::read_to_string(dir.path().join("instructions/mov.yaml")).unwrap(), original);

    let mut later = RunContext::at(
        EngineConfig::default(),
        Utc.with_ymd_and_hms(2026, 7, 1, 13, 0, 0).unwrap(),
    );
    let rollback = RollbackManager::new(&ws).rollback_batch(&mut later, &id).unwrap();
    assert_eq!(rollback.count(RollbackStatus::Restored), 1);
    assert_eq!(fs::read_to_string(dir.path().join("instructions/mov.yaml")).unwrap(), original);
}
