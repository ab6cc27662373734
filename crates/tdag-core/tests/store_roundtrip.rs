use std::time::{Duration, Instant};

use proptest::prelude::*;
use tdag_core::clock::{FixedClock, SequentialIdGenerator};
use tdag_core::store::{self, exchange, MemoryStore, SqliteStore, Store, YamlStore};
use tdag_core::{GraphError, OpsContext, StoreError, TaskDraft, TaskGraph};

use generators::*;

fn backends(dir: &tempfile::TempDir) -> Vec<Box<dyn Store>> {
    vec![
        Box::new(MemoryStore::new()),
        Box::new(YamlStore::new(dir.path().join("tasks.yaml"))),
        Box::new(SqliteStore::new(dir.path().join("tasks.db"))),
    ]
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(32))]

    #[test]
    fn every_backend_round_trips(g in arb_dag(16)) {
        let dir = tempfile::tempdir().unwrap();
        for backend in backends(&dir) {
            backend.save(&g).unwrap();
            let back = backend.load().unwrap();
            prop_assert_eq!(&back, &g, "backend {}", backend.location());
        }
    }
}

#[test]
fn empty_graph_round_trips_everywhere() {
    let dir = tempfile::tempdir().unwrap();
    for backend in backends(&dir) {
        assert!(backend.load().unwrap().is_empty(), "{}", backend.location());
        backend.save(&TaskGraph::new()).unwrap();
        assert!(backend.load().unwrap().is_empty(), "{}", backend.location());
    }
}

#[test]
fn use_case_methods_behave_the_same_on_every_backend() {
    let dir = tempfile::tempdir().unwrap();
    for backend in backends(&dir) {
        let clock = FixedClock::new(ts(0));
        let ids = SequentialIdGenerator::new("s");
        let ctx = OpsContext::new(&clock, &ids);

        let a = backend.add_task(&ctx, TaskDraft::new("a")).unwrap();
        let b = backend.add_task(&ctx, TaskDraft::new("b")).unwrap();
        backend.link(&ctx, a.as_str(), b.as_str()).unwrap();
        let c = backend
            .insert_between(&ctx, a.as_str(), b.as_str(), TaskDraft::new("c"))
            .unwrap();

        let component = backend.component(a.as_str()).unwrap();
        assert_eq!(component.len(), 3, "{}", backend.location());

        let info = backend.dependency_info(c.as_str()).unwrap();
        assert_eq!(info.parents[0].id, a);
        assert_eq!(info.children[0].id, b);

        let err = backend.link(&ctx, b.as_str(), a.as_str()).unwrap_err();
        assert!(matches!(err.as_graph_error(), Some(GraphError::CycleDetected { .. })));

        backend.unlink(&ctx, a.as_str(), c.as_str()).unwrap();
        assert_eq!(backend.component(a.as_str()).unwrap().len(), 1);

        backend.remove_task(&ctx, b.as_str()).unwrap();
        assert!(backend.get_task(b.as_str()).unwrap().status.is_removed());
        assert_eq!(backend.get_all_tasks().unwrap().len(), 3);
    }
}

#[test]
fn held_lock_makes_writers_fail_fast() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.yaml");
    let holder = YamlStore::new(&path);
    let waiter = YamlStore::with_lock_timeout(&path, Duration::from_millis(50));
    let clock = FixedClock::new(ts(0));
    let ids = SequentialIdGenerator::new("w");
    let ctx = OpsContext::new(&clock, &ids);

    let guard = holder.lock().unwrap();
    let started = Instant::now();
    let err = waiter.add_task(&ctx, TaskDraft::new("blocked")).unwrap_err();
    assert!(matches!(err, StoreError::Lock(_)));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(holder.load().unwrap().is_empty());

    drop(guard);
    waiter.add_task(&ctx, TaskDraft::new("now it works")).unwrap();
    assert_eq!(holder.load().unwrap().len(), 1);
}

#[test]
fn sqlite_lock_also_excludes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.sqlite3");
    let holder = SqliteStore::new(&path);
    let waiter = SqliteStore::with_lock_timeout(&path, Duration::from_millis(50));

    let _guard = holder.lock().unwrap();
    assert!(matches!(waiter.lock(), Err(StoreError::Lock(_))));
}

#[test]
fn yaml_snapshot_migrates_to_sqlite_through_export() {
    let dir = tempfile::tempdir().unwrap();
    let yaml = YamlStore::new(dir.path().join("tasks.yaml"));
    let sqlite = store::open_by_extension(&dir.path().join("tasks.db"), Duration::from_secs(1)).unwrap();
    let g = build_dag(
        &[(1, 10, None, tdag_core::Status::Pending), (0, 20, Some(5), tdag_core::Status::Done)],
        &[(0, 1)],
    );
    yaml.save(&g).unwrap();

    let export = dir.path().join("export.json");
    exchange::export_file(&yaml.load().unwrap(), &export).unwrap();
    let imported = exchange::import_file(&export).unwrap();
    sqlite.save(&imported).unwrap();

    assert_eq!(sqlite.load().unwrap(), g);
}
