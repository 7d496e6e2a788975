//! Plain-text rendering of workflow events and session views.

use std::{collections::HashMap, fmt::Write as _};

use console_core::{
    projector::{ResultProjector, StudentDetail},
    session::GraphSummary,
    travel_time_label, SessionState, WorkflowEvent,
};
use shared::{
    domain::{CentreId, StudentId},
    protocol::{ParallelDijkstraResponse, Timing},
};

pub fn event(event: &WorkflowEvent, session: &SessionState) -> String {
    let projector = ResultProjector::new(session);
    match event {
        WorkflowEvent::SelectionEnabled { capacity } => format!(
            "Centre selection enabled with capacity {capacity}. Add centres with 'centre <lat> <lon>'."
        ),
        WorkflowEvent::CentreAdded(centre) => format!(
            "Added {} at [{:.5}, {:.5}] ({})",
            centre.centre_id,
            centre.lat,
            centre.lon,
            projector.color_for(&centre.centre_id).unwrap_or("-"),
        ),
        WorkflowEvent::SessionCleared => "Cleared all centres and students.".to_string(),
        WorkflowEvent::GraphBuilt(summary) => {
            let mut out = String::from("Graph built successfully!\n");
            out.push_str(&graph_summary(summary));
            out
        }
        WorkflowEvent::StudentsSimulated(report) => {
            let stats = projector.stats();
            let mut out = format!(
                "Simulated {} students within {:.0} m of [{:.5}, {:.5}]",
                report.generated,
                report.area.radius_m,
                report.area.centroid.lat,
                report.area.centroid.lon,
            );
            if report.generated < report.requested {
                let _ = write!(out, " (requested {}, draw budget exhausted)", report.requested);
            }
            let _ = write!(
                out,
                "\n  pwd: {}  female: {}  general: {}",
                stats.pwd, stats.female, stats.general
            );
            out
        }
        WorkflowEvent::AllotmentCompleted(report) => {
            let mut out = format!(
                "Allotment complete! {} of {} students assigned to centres.",
                report.assigned_count, report.student_count
            );
            if report.dropped_count > 0 {
                let _ = write!(
                    out,
                    "\n  ignored {} assignment(s) for unknown students or centres",
                    report.dropped_count
                );
            }
            if let Some(timing) = &report.timing {
                let _ = write!(out, "\n  timing: {}", timing_line(timing));
            }
            out.push('\n');
            out.push_str(&legend(session));
            out
        }
        WorkflowEvent::PathFound(path) => {
            let mut out = format!(
                "Path found from {} to {} with {} points!",
                path.student_id,
                path.centre_id,
                path.polyline.len()
            );
            if path.travel_time_seconds.is_some() {
                let _ = write!(
                    out,
                    "\n  Estimated travel time: {}",
                    travel_time_label(path.travel_time_seconds)
                );
            }
            if let Some(timing) = &path.timing {
                let _ = write!(out, "\n  timing: {}", timing_line(timing));
            }
            out
        }
        WorkflowEvent::NoRoute {
            student_id,
            centre_id,
        } => format!("Could not find a path between {student_id} and {centre_id}."),
        WorkflowEvent::DiagnosticsReady(report) => {
            let sections = report
                .as_object()
                .map(|o| o.keys().cloned().collect::<Vec<_>>().join(", "))
                .unwrap_or_default();
            format!("Diagnostic report received ({sections})")
        }
        WorkflowEvent::BenchmarkCompleted(response) => benchmark(response),
        WorkflowEvent::Failed { command, error } => {
            format!("{command} failed: {}", error.user_message())
        }
    }
}

pub fn status(session: &SessionState) -> String {
    let stats = ResultProjector::new(session).stats();
    let mut out = format!("phase: {:?}\n", session.phase());
    match session.capacity() {
        Some(capacity) => {
            let _ = writeln!(out, "centre capacity: {capacity}");
        }
        None => out.push_str("centre capacity: not set\n"),
    }
    let _ = writeln!(
        out,
        "centres: {}  students: {}  assigned: {}",
        stats.centres, stats.students, stats.assigned
    );
    let _ = writeln!(
        out,
        "pwd: {}  female: {}  general: {}",
        stats.pwd, stats.female, stats.general
    );
    match session.graph() {
        Some(summary) => out.push_str(&graph_summary(summary)),
        None => out.push_str("graph: not built\n"),
    }
    if let Some(path) = session.active_path() {
        let _ = writeln!(
            out,
            "path: {} -> {} ({} points, {})",
            path.student_id,
            path.centre_id,
            path.polyline.len(),
            travel_time_label(path.travel_time_seconds)
        );
    }
    if let Some(bench) = session.last_benchmark() {
        let _ = writeln!(
            out,
            "last benchmark: {}/{} centres, {:.2}x speedup",
            bench.successful, bench.centres_processed, bench.timing.speedup
        );
    }
    out.push_str(&legend(session));
    out
}

pub fn student(detail: &StudentDetail) -> String {
    let mut out = format!("{} ({})\n", detail.student_id, detail.category);
    match &detail.assigned_centre {
        Some(centre_id) => {
            let _ = writeln!(out, "assigned centre: {centre_id} ({})", detail.marker_color);
        }
        None => out.push_str("assigned centre: none\n"),
    }
    out.push_str("travel times:");
    for row in &detail.travel_times {
        let marker = if row.unreachable { " !" } else { "" };
        let _ = write!(out, "\n  {} ({}): {}{marker}", row.centre_id, row.color, row.label);
    }
    out
}

pub fn unknown_student(student_id: &StudentId) -> String {
    format!("Student {student_id} not found.")
}

fn graph_summary(summary: &GraphSummary) -> String {
    let mut out = format!(
        "  nodes: {}\n  edges: {}\n",
        summary.nodes_count, summary.edges_count
    );
    if let Some(timing) = &summary.timing {
        let _ = writeln!(out, "  timing: {}", timing_line(timing));
    }
    out
}

fn legend(session: &SessionState) -> String {
    let projector = ResultProjector::new(session);
    let mut per_centre: HashMap<&CentreId, usize> = HashMap::new();
    for centre_id in session.assignments().values() {
        *per_centre.entry(centre_id).or_default() += 1;
    }

    let mut out = String::from("legend:");
    for entry in projector.legend() {
        let assigned = per_centre.get(&entry.centre_id).copied().unwrap_or(0);
        let _ = write!(out, "\n  {} {}  {assigned} assigned", entry.color, entry.centre_id);
    }
    out
}

/// Stage timings as `key=value`, sorted by key.
fn timing_line(timing: &Timing) -> String {
    let mut entries: Vec<_> = timing.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn benchmark(response: &ParallelDijkstraResponse) -> String {
    let timing = &response.timing;
    let mut out = format!(
        "Parallel Dijkstra benchmark\n  centres processed: {}\n  successful: {}/{}\n  parallel time: {}ms\n  sequential est.: {}ms\n  speedup: {:.2}x",
        response.centres_processed,
        response.successful,
        response.centres_processed,
        timing.parallel_execution_ms,
        timing.estimated_sequential_ms,
        timing.speedup,
    );
    for result in &response.results {
        if result.success {
            let _ = write!(
                out,
                "\n  {}: {}ms, {} nodes reachable",
                result.centre_id, result.computation_time_ms, result.reachable_nodes
            );
        } else {
            let _ = write!(
                out,
                "\n  {}: failed ({})",
                result.centre_id,
                result.error_message.as_deref().unwrap_or("unknown error")
            );
        }
    }
    out
}
