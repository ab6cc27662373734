//! `td check`: full consistency and cycle scan. Exits non-zero on findings.

use serde::Serialize;
use std::io::Write;
use tdag_core::graph::consistency::CheckReport;
use tdag_core::{ops, ErrorCode};

use super::Session;
use crate::output::{pretty_section, render_mode, CliError};

#[derive(Debug, Serialize)]
struct CheckOutput {
    clean: bool,
    tasks: usize,
    #[serde(flatten)]
    report: CheckReport,
}

fn findings(report: &CheckReport) -> Vec<String> {
    report
        .clone()
        .into_violations()
        .iter()
        .map(ToString::to_string)
        .collect()
}

pub fn run_check(session: &Session) -> anyhow::Result<()> {
    let graph = session.store.load()?;
    let report = ops::check(&graph);
    let output = CheckOutput {
        clean: report.is_clean(),
        tasks: graph.len(),
        report,
    };

    render_mode(
        session.output,
        &output,
        |o, w| {
            for line in findings(&o.report) {
                writeln!(w, "{line}")?;
            }
            Ok(())
        },
        |o, w| {
            if o.clean {
                return writeln!(w, "✓ {} task(s): no cycles, no inconsistencies", o.tasks);
            }
            pretty_section(w, &format!("{} finding(s)", o.report.finding_count()))?;
            for line in findings(&o.report) {
                writeln!(w, "  - {line}")?;
            }
            Ok(())
        },
    )?;

    if output.clean {
        Ok(())
    } else {
        Err(CliError::coded(
            format!("graph check found {} finding(s)", output.report.finding_count()),
            ErrorCode::InconsistentGraph,
        )
        .into())
    }
}
