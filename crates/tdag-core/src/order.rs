//! Task ordering: the default comparator and topological order.
//!
//! The default order is ascending by:
//!
//! 1. `start_date`, with a missing start date standing in for "now";
//! 2. `priority`, highest first;
//! 3. `created_at`, oldest first;
//! 4. `id`, lexicographically, so the order is total.
//!
//! "Now" is passed in by the caller and sampled once per sort, so one sort is
//! always a consistent total order. It is never stored on a task, so the same
//! list sorted later may place undated tasks differently.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::model::{Task, TaskId, Timestamp};

/// Sort key implementing the default comparator through derived `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SortKey<'a> {
    start: Timestamp,
    priority: Reverse<i64>,
    created_at: Timestamp,
    id: &'a TaskId,
}

#[must_use]
pub fn sort_key(task: &Task, now: Timestamp) -> SortKey<'_> {
    SortKey {
        start: task.start_date.unwrap_or(now),
        priority: Reverse(task.priority),
        created_at: task.created_at,
        id: &task.id,
    }
}

/// Compare two tasks under the default order.
#[must_use]
pub fn default_cmp(a: &Task, b: &Task, now: Timestamp) -> Ordering {
    sort_key(a, now).cmp(&sort_key(b, now))
}

/// Sort in place under the default order.
pub fn sort_default(tasks: &mut [&Task], now: Timestamp) {
    tasks.sort_by(|a, b| default_cmp(a, b, now));
}

/// Kahn's algorithm over the subgraph induced by `tasks`.
///
/// Only edges whose endpoints are both in `tasks` count. Among tasks that are
/// ready at the same time the default order decides. Tasks left over because
/// of a cycle are appended in default order instead of failing.
#[must_use]
pub fn topological_order<'g>(tasks: &[&'g Task], now: Timestamp) -> Vec<&'g Task> {
    let by_id: HashMap<&'g TaskId, &'g Task> = tasks.iter().map(|&t| (&t.id, t)).collect();

    let mut in_degree: HashMap<&TaskId, usize> = HashMap::with_capacity(by_id.len());
    let mut successors: HashMap<&TaskId, Vec<&'g Task>> = HashMap::new();
    for &task in by_id.values() {
        let mut parents: HashSet<&TaskId> = HashSet::new();
        for parent in &task.depends_on {
            if parent != &task.id && by_id.contains_key(parent) && parents.insert(parent) {
                successors.entry(parent).or_default().push(task);
            }
        }
        in_degree.insert(&task.id, parents.len());
    }

    let mut ready: BinaryHeap<Reverse<SortKey<'g>>> = by_id
        .values()
        .filter(|t| in_degree.get(&t.id) == Some(&0))
        .map(|&t| Reverse(sort_key(t, now)))
        .collect();

    let mut out: Vec<&'g Task> = Vec::with_capacity(by_id.len());
    let mut emitted: HashSet<&TaskId> = HashSet::with_capacity(by_id.len());

    while let Some(Reverse(key)) = ready.pop() {
        let Some(task) = by_id.get(key.id).copied() else {
            continue;
        };
        out.push(task);
        emitted.insert(&task.id);

        for &child in successors.get(&task.id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(&child.id) {
                *degree = degree.saturating_sub(1);
                if *degree == 0 {
                    ready.push(Reverse(sort_key(child, now)));
                }
            }
        }
    }

    if out.len() < by_id.len() {
        let mut leftover: Vec<&'g Task> = by_id
            .values()
            .filter(|t| !emitted.contains(&t.id))
            .copied()
            .collect();
        tracing::debug!(
            leftover = leftover.len(),
            "topological order appended tasks caught in a cycle"
        );
        sort_default(&mut leftover, now);
        out.extend(leftover);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::{graph, id};
    use crate::graph::TaskGraph;

    fn ts(raw: &str) -> Timestamp {
        Timestamp::parse(raw).unwrap()
    }

    fn ids(tasks: &[&Task]) -> Vec<String> {
        tasks.iter().map(|t| t.id.to_string()).collect()
    }

    fn task(raw: &str, priority: i64, created: &str, start: Option<&str>) -> Task {
        let mut t = Task::new(id(raw), raw, ts(created));
        t.priority = priority;
        t.start_date = start.map(ts);
        t
    }

    #[test]
    fn priority_breaks_undated_tie() {
        let a = task("A", 1, "2024-01-01", None);
        let b = task("B", 3, "2024-01-02", None);
        let mut list = vec![&a, &b];
        sort_default(&mut list, ts("2024-06-01"));
        assert_eq!(ids(&list), vec!["B", "A"]);
    }

    #[test]
    fn start_date_dominates() {
        let early = task("early", 0, "2024-01-05", Some("2024-02-01"));
        let late = task("late", 9, "2024-01-01", Some("2024-03-01"));
        assert_eq!(
            default_cmp(&early, &late, ts("2024-01-10")),
            Ordering::Less
        );
    }

    #[test]
    fn undated_tasks_sort_as_now() {
        let dated = task("dated", 0, "2024-01-01", Some("2024-05-01"));
        let undated = task("undated", 0, "2024-01-01", None);

        let mut before = vec![&dated, &undated];
        sort_default(&mut before, ts("2024-04-01"));
        assert_eq!(ids(&before), vec!["undated", "dated"]);

        let mut after = vec![&dated, &undated];
        sort_default(&mut after, ts("2024-06-01"));
        assert_eq!(ids(&after), vec!["dated", "undated"]);
    }

    #[test]
    fn created_at_then_id_break_remaining_ties() {
        let older = task("z", 0, "2024-01-01", None);
        let newer = task("a", 0, "2024-01-02", None);
        let twin = task("b", 0, "2024-01-02", None);
        let mut list = vec![&twin, &newer, &older];
        sort_default(&mut list, ts("2024-06-01"));
        assert_eq!(ids(&list), vec!["z", "a", "b"]);
    }

    #[test]
    fn sorting_twice_is_stable() {
        let tasks: Vec<Task> = (0..20)
            .map(|i| task(&format!("t{i:02}"), i % 3, "2024-01-01", None))
            .collect();
        let now = ts("2024-06-01");
        let mut first: Vec<&Task> = tasks.iter().collect();
        sort_default(&mut first, now);
        let mut second = first.clone();
        second.reverse();
        sort_default(&mut second, now);
        assert_eq!(ids(&first), ids(&second));
    }

    fn all(g: &TaskGraph) -> Vec<&Task> {
        g.iter().collect()
    }

    #[test]
    fn topological_order_respects_edges() {
        let mut g = graph(&["a", "b", "c", "d"], &[("c", "b"), ("b", "a"), ("d", "a")]);
        g.get_mut("d").unwrap().priority = 5;
        let order = topological_order(&all(&g), ts("2024-06-01"));
        assert_eq!(ids(&order), vec!["d", "c", "b", "a"]);
    }

    #[test]
    fn topological_order_uses_induced_subgraph() {
        let g = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c")]);
        let subset = vec![g.get("c").unwrap(), g.get("a").unwrap()];
        let order = topological_order(&subset, ts("2024-06-01"));
        assert_eq!(ids(&order), vec!["a", "c"]);
    }

    #[test]
    fn topological_order_appends_cycle_members() {
        let g = graph(&["a", "b", "x"], &[("a", "b"), ("b", "a")]);
        let order = topological_order(&all(&g), ts("2024-06-01"));
        assert_eq!(ids(&order), vec!["x", "a", "b"]);
    }

    #[test]
    fn topological_order_ignores_missing_parents() {
        let mut g = graph(&["a", "b"], &[("a", "b")]);
        g.get_mut("a").unwrap().depends_on.push(id("ghost"));
        let order = topological_order(&all(&g), ts("2024-06-01"));
        assert_eq!(ids(&order), vec!["a", "b"]);
    }
}
