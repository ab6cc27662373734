//! Consistency validation for the redundant edge storage.
//!
//! Every edge `a -> b` is recorded twice: `b` in `a.children` and `a` in
//! `b.depends_on`. [`check_consistency`] reports every place where the two
//! sides disagree, every reference to a task that does not exist, and every
//! task whose own lists break the per-task rules. [`validate`] adds the full
//! cycle scan on top.
//!
//! Both functions are pure and never fail: a damaged snapshot produces
//! findings, not errors.

use std::fmt;

use serde::Serialize;

use super::{cycles, TaskGraph};
use crate::model::{Edge, Task, TaskId};

/// Which list on a task a finding refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefList {
    DependsOn,
    Children,
}

impl RefList {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DependsOn => "depends_on",
            Self::Children => "children",
        }
    }
}

/// One problem found in a graph snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// `edge.to` lists `edge.from` as a parent, but the parent's `children`
    /// lacks `edge.to`.
    MissingChild { edge: Edge },
    /// `edge.from` lists `edge.to` as a child, but the child's `depends_on`
    /// lacks `edge.from`.
    MissingParent { edge: Edge },
    /// `task` references an id that is not in the graph.
    DanglingReference {
        task: TaskId,
        missing: TaskId,
        list: RefList,
    },
    /// `task` lists itself, or lists the same id twice.
    MalformedTask { task: TaskId, reason: String },
    /// A directed loop among live tasks; first and last ids match.
    Cycle { path: Vec<TaskId> },
}

impl Violation {
    /// Short machine-friendly name of the finding kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MissingChild { .. } => "missing_child",
            Self::MissingParent { .. } => "missing_parent",
            Self::DanglingReference { .. } => "dangling_reference",
            Self::MalformedTask { .. } => "malformed_task",
            Self::Cycle { .. } => "cycle",
        }
    }

    /// The task the finding should be reported against.
    #[must_use]
    pub fn task(&self) -> Option<&TaskId> {
        match self {
            Self::MissingChild { edge } => Some(&edge.to),
            Self::MissingParent { edge } => Some(&edge.from),
            Self::DanglingReference { task, .. } | Self::MalformedTask { task, .. } => Some(task),
            Self::Cycle { path } => path.first(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingChild { edge } => write!(
                f,
                "missing_child: {} depends on {}, but {} does not list it as a child",
                edge.to, edge.from, edge.from
            ),
            Self::MissingParent { edge } => write!(
                f,
                "missing_parent: {} lists {} as a child, but {} does not depend on it",
                edge.from, edge.to, edge.to
            ),
            Self::DanglingReference {
                task,
                missing,
                list,
            } => write!(
                f,
                "dangling_reference: {task}.{} references unknown task {missing}",
                list.as_str()
            ),
            Self::MalformedTask { task, reason } => write!(f, "malformed_task: {task}: {reason}"),
            Self::Cycle { path } => {
                let rendered: Vec<&str> = path.iter().map(TaskId::as_str).collect();
                write!(f, "cycle: {}", rendered.join(" -> "))
            }
        }
    }
}

/// Report every edge whose two sides disagree, plus dangling references and
/// malformed per-task lists.
///
/// Findings come out in task-id order, parents before children for each
/// task. An empty result means the graph is consistent.
#[must_use]
pub fn check_consistency(graph: &TaskGraph) -> Vec<Violation> {
    let mut findings = Vec::new();

    for task in graph.iter() {
        if let Err(err) = task.validate() {
            findings.push(Violation::MalformedTask {
                task: task.id.clone(),
                reason: err.to_string(),
            });
        }

        for parent_id in &task.depends_on {
            match graph.get(parent_id.as_str()) {
                None => findings.push(dangling(task, parent_id, RefList::DependsOn)),
                Some(parent) if !parent.children.contains(&task.id) => {
                    findings.push(Violation::MissingChild {
                        edge: Edge::new(parent_id.clone(), task.id.clone()),
                    });
                }
                Some(_) => {}
            }
        }

        for child_id in &task.children {
            match graph.get(child_id.as_str()) {
                None => findings.push(dangling(task, child_id, RefList::Children)),
                Some(child) if !child.depends_on.contains(&task.id) => {
                    findings.push(Violation::MissingParent {
                        edge: Edge::new(task.id.clone(), child_id.clone()),
                    });
                }
                Some(_) => {}
            }
        }
    }

    findings
}

fn dangling(task: &Task, missing: &TaskId, list: RefList) -> Violation {
    Violation::DanglingReference {
        task: task.id.clone(),
        missing: missing.clone(),
        list,
    }
}

/// Full validation result: consistency findings plus directed cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub violations: Vec<Violation>,
    /// Closed cycle paths among live tasks.
    pub cycles: Vec<Vec<TaskId>>,
}

impl CheckReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty() && self.cycles.is_empty()
    }

    #[must_use]
    pub fn finding_count(&self) -> usize {
        self.violations.len() + self.cycles.len()
    }

    /// Every finding as a flat list, cycles last.
    #[must_use]
    pub fn into_violations(self) -> Vec<Violation> {
        let mut all = self.violations;
        all.extend(self.cycles.into_iter().map(|path| Violation::Cycle { path }));
        all
    }
}

/// Run every structural check against a snapshot.
#[must_use]
pub fn validate(graph: &TaskGraph) -> CheckReport {
    let report = CheckReport {
        violations: check_consistency(graph),
        cycles: cycles::find_cycles(graph),
    };
    if !report.is_clean() {
        tracing::debug!(
            violations = report.violations.len(),
            cycles = report.cycles.len(),
            "graph validation found problems"
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::{graph, id};

    #[test]
    fn consistent_graph_has_no_findings() {
        let g = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("a", "c")]);
        assert!(check_consistency(&g).is_empty());
        assert!(validate(&g).is_clean());
    }

    #[test]
    fn empty_graph_is_clean() {
        assert!(validate(&TaskGraph::new()).is_clean());
    }

    #[test]
    fn reports_missing_child() {
        let mut g = graph(&["a", "b"], &[("a", "b")]);
        g.get_mut("a").unwrap().children.clear();

        assert_eq!(
            check_consistency(&g),
            vec![Violation::MissingChild {
                edge: Edge::new(id("a"), id("b"))
            }]
        );
    }

    #[test]
    fn reports_missing_parent() {
        let mut g = graph(&["a", "b"], &[("a", "b")]);
        g.get_mut("b").unwrap().depends_on.clear();

        let findings = check_consistency(&g);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind(), "missing_parent");
        assert_eq!(findings[0].task(), Some(&id("a")));
    }

    #[test]
    fn dangling_references_are_reported_not_fatal() {
        let mut g = graph(&["a", "b"], &[("a", "b")]);
        g.get_mut("a").unwrap().depends_on.push(id("ghost"));
        g.get_mut("b").unwrap().children.push(id("phantom"));

        let findings = check_consistency(&g);
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().all(|f| f.kind() == "dangling_reference"));
        assert!(findings[0].to_string().contains("ghost"));
    }

    #[test]
    fn malformed_lists_are_reported() {
        let mut g = graph(&["a", "b"], &[("a", "b")]);
        g.get_mut("b").unwrap().depends_on.push(id("a"));

        let findings = check_consistency(&g);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind(), "malformed_task");
    }

    #[test]
    fn validate_includes_cycles() {
        let g = graph(&["a", "b"], &[("a", "b"), ("b", "a")]);
        let report = validate(&g);
        assert!(report.violations.is_empty());
        assert_eq!(report.cycles.len(), 1);
        assert_eq!(report.finding_count(), 1);

        let flat = report.into_violations();
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].kind(), "cycle");
        assert_eq!(flat[0].to_string(), "cycle: a -> b -> a");
    }

    #[test]
    fn violations_serialize_with_kind_tag() {
        let v = Violation::MissingChild {
            edge: Edge::new(id("a"), id("b")),
        };
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["kind"], "missing_child");
        assert_eq!(json["edge"]["from"], "a");
    }
}
