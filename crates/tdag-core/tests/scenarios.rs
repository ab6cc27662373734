//! End-to-end flows through the public operations API.

use tdag_core::clock::{FixedClock, SequentialIdGenerator};
use tdag_core::graph::components;
use tdag_core::ops::{self, ListFilter, ListOrder, RequestDetails, TaskPatch};
use tdag_core::{GraphError, OpsContext, Status, TaskDraft, TaskGraph, Timestamp};

struct World {
    clock: FixedClock,
    ids: SequentialIdGenerator,
    graph: TaskGraph,
}

impl World {
    fn new() -> Self {
        Self {
            clock: FixedClock::ticking(Timestamp::parse("2024-01-01T08:00:00Z").unwrap(), 60),
            ids: SequentialIdGenerator::new("task"),
            graph: TaskGraph::new(),
        }
    }

    fn add(&mut self, title: &str) -> String {
        let ctx = OpsContext::new(&self.clock, &self.ids);
        ops::add_task(&mut self.graph, &ctx, TaskDraft::new(title))
            .unwrap()
            .to_string()
    }

    fn link(&mut self, parent: &str, child: &str) -> Result<(), GraphError> {
        let ctx = OpsContext::new(&self.clock, &self.ids);
        ops::link(&mut self.graph, &ctx, parent, child).map(|_| ())
    }
}

#[test]
fn insert_between_then_unlink_splits_component() {
    let mut w = World::new();
    let a = w.add("A");
    let b = w.add("B");
    w.link(&a, &b).unwrap();

    let ctx = OpsContext::new(&w.clock, &w.ids);
    let c = ops::insert_between(&mut w.graph, &ctx, &a, &b, TaskDraft::new("C"))
        .unwrap()
        .to_string();
    assert!(w.graph.has_edge(&a, &c));
    assert!(w.graph.has_edge(&c, &b));
    assert!(!w.graph.has_any_edge_side(&a, &b));

    ops::unlink(&mut w.graph, &ctx, &a, &c).unwrap();
    assert!(w.graph.has_edge(&c, &b));
    assert!(!components::same_component(&w.graph, &a, &c).unwrap());
    assert!(components::same_component(&w.graph, &c, &b).unwrap());
    assert!(ops::check(&w.graph).is_clean());
}

#[test]
fn priority_breaks_undated_tie_in_listing() {
    let mut w = World::new();
    let ctx = OpsContext::new(&w.clock, &w.ids);
    let created_a = Timestamp::parse("2024-01-01").unwrap();
    w.clock.set(created_a);
    let a = ops::add_task(&mut w.graph, &ctx, TaskDraft::new("A").with_priority(1)).unwrap();
    w.clock.set(Timestamp::parse("2024-01-02").unwrap());
    let b = ops::add_task(&mut w.graph, &ctx, TaskDraft::new("B").with_priority(3)).unwrap();

    let listing = ops::list_tasks(&w.graph, ListFilter::default(), Timestamp::parse("2024-06-01").unwrap())
        .unwrap();
    let order: Vec<_> = listing.iter().map(|t| t.id.clone()).collect();
    assert_eq!(order, vec![b, a]);
}

#[test]
fn three_step_loop_is_rejected_with_path() {
    let mut w = World::new();
    let a = w.add("A");
    let b = w.add("B");
    let c = w.add("C");
    w.link(&a, &b).unwrap();
    w.link(&b, &c).unwrap();
    let before = w.graph.clone();

    match w.link(&c, &a) {
        Err(GraphError::CycleDetected { attempted_edge, path }) => {
            assert_eq!(attempted_edge.to_string(), format!("{c} -> {a}"));
            let rendered: Vec<_> = path.iter().map(ToString::to_string).collect();
            assert_eq!(rendered, vec![c.clone(), a.clone(), b.clone(), c.clone()]);
        }
        other => panic!("expected cycle, got {other:?}"),
    }
    assert_eq!(w.graph, before);
}

#[test]
fn archive_round_trip_leaves_status_alone() {
    let mut w = World::new();
    let a = w.add("A");
    let b = w.add("B");
    let loner = w.add("loner");
    w.link(&a, &b).unwrap();
    let ctx = OpsContext::new(&w.clock, &w.ids);
    ops::set_status(&mut w.graph, &ctx, &b, Status::Done).unwrap();

    let changed = ops::archive_tree(&mut w.graph, &ctx, &b, true).unwrap();
    assert_eq!(changed.len(), 2);
    let active = ops::list_tasks(&w.graph, ListFilter::default(), ctx.now()).unwrap();
    assert_eq!(active.iter().map(|t| t.id.to_string()).collect::<Vec<_>>(), vec![loner]);
    assert_eq!(w.graph.get(&b).unwrap().status, Status::Done);

    ops::archive_tree(&mut w.graph, &ctx, &a, false).unwrap();
    assert!(w.graph.iter().all(|t| !t.is_archived));
    assert_eq!(w.graph.get(&b).unwrap().status, Status::Done);
}

#[test]
fn blocked_by_explains_without_enforcing() {
    let mut w = World::new();
    let design = w.add("design");
    let build = w.add("build");
    let ship = w.add("ship");
    w.link(&design, &build).unwrap();
    w.link(&build, &ship).unwrap();
    let ctx = OpsContext::new(&w.clock, &w.ids);
    ops::set_status(&mut w.graph, &ctx, &design, Status::Done).unwrap();

    // Finishing a blocked task is allowed.
    ops::set_status(&mut w.graph, &ctx, &ship, Status::Done).unwrap();

    let blockers = ops::blocked_by(&w.graph, &ship).unwrap();
    let summary: Vec<_> = blockers
        .iter()
        .map(|b| (b.id.to_string(), b.done, b.depth))
        .collect();
    assert_eq!(
        summary,
        vec![(build.clone(), false, 1), (design.clone(), true, 2)]
    );

    let ready = ListFilter {
        ready_only: true,
        order: ListOrder::Topological,
        ..ListFilter::default()
    };
    let listing = ops::list_tasks(&w.graph, ready, ctx.now()).unwrap();
    let ids: Vec<_> = listing.iter().map(|t| t.id.to_string()).collect();
    assert_eq!(ids, vec![design, build]);
}

#[test]
fn request_then_update_then_delete() {
    let mut w = World::new();
    let parent = w.add("parent");
    let task = w.add("review");
    w.link(&parent, &task).unwrap();
    let ctx = OpsContext::new(&w.clock, &w.ids);

    ops::request(
        &mut w.graph,
        &ctx,
        &task,
        RequestDetails {
            to: Some("sam".to_string()),
            by: "kim".to_string(),
            note: Some("by friday".to_string()),
            due: None,
        },
    )
    .unwrap();
    let requested = ListFilter {
        requested_only: true,
        ..ListFilter::default()
    };
    assert_eq!(ops::list_tasks(&w.graph, requested, ctx.now()).unwrap().len(), 1);

    let patch = TaskPatch {
        description: Some(Some("look at the diff".to_string())),
        remove_parents: vec![w.graph.resolve_id(&parent).unwrap()],
        ..TaskPatch::default()
    };
    ops::update_task(&mut w.graph, &ctx, &task, patch).unwrap();
    assert!(w.graph.get(&task).unwrap().depends_on.is_empty());

    let removed = ops::delete_task(&mut w.graph, &ctx, &task).unwrap();
    assert_eq!(removed.title, "review");
    assert_eq!(w.graph.len(), 1);
    assert!(ops::check(&w.graph).is_clean());
}

#[test]
fn partial_ids_resolve_or_report_ambiguity() {
    let mut w = World::new();
    for title in ["a", "b", "c"] {
        w.add(title);
    }
    assert_eq!(ops::resolve_id(&w.graph, "task-2").unwrap().as_str(), "task-2");
    assert!(matches!(
        ops::resolve_id(&w.graph, "task"),
        Err(GraphError::AmbiguousId { ref matches, .. }) if matches.len() == 3
    ));
}
