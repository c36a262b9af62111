//! Report Generation Tasks
//!
//! `report:generate` runs as a tracked tokio task that emits progress to the
//! requesting connection only. Tasks are keyed by (connection, report id) so
//! they can be cancelled explicitly via `report:cancel` and are always
//! aborted when the connection goes away.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::config::ReportSettings;
use crate::gateway::connection::ConnId;
use crate::gateway::events::{ReportRequest, ServerEvent};
use crate::gateway::hub::Gateway;

/// In-flight report tasks by (connection, report id).
#[derive(Default)]
pub struct ReportTracker {
    tasks: DashMap<(ConnId, String), JoinHandle<()>>,
}

impl ReportTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a spawned task. A duplicate report id from the same connection
    /// replaces (and aborts) the previous run.
    pub fn insert(&self, conn_id: ConnId, report_id: String, handle: JoinHandle<()>) {
        if let Some(previous) = self.tasks.insert((conn_id, report_id), handle) {
            previous.abort();
        }
    }

    /// Abort one report task. Returns true if a task was running.
    pub fn cancel(&self, conn_id: ConnId, report_id: &str) -> bool {
        match self.tasks.remove(&(conn_id, report_id.to_string())) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Abort every task belonging to a connection (disconnect path).
    pub fn cancel_all(&self, conn_id: ConnId) {
        self.tasks.retain(|(owner, _), handle| {
            if *owner == conn_id {
                handle.abort();
                false
            } else {
                true
            }
        });
    }

    /// Drop a completed task's entry without aborting.
    pub fn finish(&self, conn_id: ConnId, report_id: &str) {
        self.tasks.remove(&(conn_id, report_id.to_string()));
    }

    pub fn running(&self) -> usize {
        self.tasks.len()
    }
}

/// Start a report generation run for one connection.
///
/// Emits `report:generation_started` immediately, then a monotonically
/// non-decreasing progress sequence ending at exactly 100, then exactly one
/// `report:generation_complete`.
pub fn spawn_report(
    gateway: Arc<Gateway>,
    conn_id: ConnId,
    request: ReportRequest,
    settings: ReportSettings,
) {
    let report_id = request.report_id;
    tracing::debug!(
        conn_id = %conn_id,
        report_id = %report_id,
        report_type = ?request.report_type,
        "Report generation started"
    );

    gateway.emit_to_conn(
        conn_id,
        ServerEvent::ReportGenerationStarted {
            report_id: report_id.clone(),
        },
    );

    let step = settings.progress_step.max(1);
    let tick = Duration::from_millis(settings.tick_ms.max(1));
    let task_gateway = Arc::clone(&gateway);
    let task_id = report_id.clone();

    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        interval.tick().await; // consume the immediate first tick

        let mut progress: u8 = 0;
        while progress < 100 {
            interval.tick().await;
            progress = progress.saturating_add(step).min(100);
            let delivered = task_gateway.emit_to_conn(
                conn_id,
                ServerEvent::ReportGenerationProgress {
                    report_id: task_id.clone(),
                    progress,
                },
            );
            if !delivered {
                // Requester is gone; nothing left to report to
                task_gateway.reports.finish(conn_id, &task_id);
                return;
            }
        }

        task_gateway.emit_to_conn(
            conn_id,
            ServerEvent::ReportGenerationComplete {
                report_id: task_id.clone(),
                completed_at: Utc::now(),
            },
        );
        task_gateway.reports.finish(conn_id, &task_id);
    });

    gateway.reports.insert(conn_id, report_id, handle);
}
