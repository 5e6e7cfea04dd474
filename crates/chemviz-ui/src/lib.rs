#![warn(missing_docs)]
//! # chemviz-ui
//!
//! ## Purpose
//! Defines the presentation-facing state model for the `chemviz` dashboard.
//!
//! ## Responsibilities
//! - Project a [`StatisticsSnapshot`] into hero figures, metric cards and
//!   chart-ready distribution rows.
//! - Represent session and upload status lines.
//! - Expose the gate deciding whether an upload may be started.
//!
//! ## Data flow
//! App orchestration reads controller state -> [`UiState`] ->
//! terminal renderer.
//!
//! ## Ownership and lifetimes
//! `UiState` owns all strings so renderers never borrow from controllers.
//!
//! ## Error model
//! Projection is total; absent data renders as placeholders.
//!
//! ## Security and privacy notes
//! UI state intentionally excludes secrets (credentials, tokens, file bytes).

use chemviz_core::{StatisticsSnapshot, ThemePreference};

/// Placeholder shown for hero figures before any upload.
pub const PLACEHOLDER: &str = "—";

/// UI-auth state projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAuthState {
    /// Login prompt is shown.
    Anonymous,
    /// Login probe outstanding.
    Authenticating,
    /// Dashboard is unlocked.
    Authenticated,
}

/// Generic stage status used for the upload flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    /// Stage has not started.
    Idle,
    /// Stage is currently running.
    Running,
    /// Stage completed successfully.
    Healthy,
    /// Stage encountered non-fatal error.
    Degraded,
}

/// One summary card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricCard {
    /// Card heading.
    pub title: &'static str,
    /// Formatted value.
    pub value: String,
    /// Unit caption.
    pub caption: &'static str,
}

/// One equipment type in the distribution charts.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionRow {
    /// Equipment-type label.
    pub label: String,
    /// Rows of this type.
    pub count: u64,
    /// Share of all distributed rows, in percent.
    pub share_percent: f64,
}

/// Dashboard projection of the latest snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    /// Hero equipment count.
    pub hero_count: String,
    /// Hero distinct-type count.
    pub hero_types: String,
    /// Metric cards; empty before the first upload.
    pub cards: Vec<MetricCard>,
    /// Distribution rows sorted by count, largest first.
    pub distribution: Vec<DistributionRow>,
    /// Batch backing the report export.
    pub batch_id: Option<String>,
}

impl DashboardView {
    /// Returns `true` when a snapshot is shown.
    pub fn has_data(&self) -> bool {
        self.batch_id.is_some()
    }
}

/// Projects an optional snapshot into dashboard content.
pub fn project_dashboard(snapshot: Option<&StatisticsSnapshot>) -> DashboardView {
    let Some(snapshot) = snapshot else {
        return DashboardView {
            hero_count: PLACEHOLDER.to_string(),
            hero_types: PLACEHOLDER.to_string(),
            cards: Vec::new(),
            distribution: Vec::new(),
            batch_id: None,
        };
    };

    let cards = vec![
        MetricCard {
            title: "Total Equipment",
            value: snapshot.total_count().to_string(),
            caption: "Units registered in system",
        },
        MetricCard {
            title: "Avg Flowrate",
            value: format_metric(snapshot.average_flowrate()),
            caption: "m³/hr average flow",
        },
        MetricCard {
            title: "Avg Pressure",
            value: format_metric(snapshot.average_pressure()),
            caption: "Pa average pressure",
        },
        MetricCard {
            title: "Avg Temperature",
            value: format_metric(snapshot.average_temperature()),
            caption: "°C average temp",
        },
    ];

    DashboardView {
        hero_count: snapshot.total_count().to_string(),
        hero_types: snapshot.distinct_types().to_string(),
        cards,
        distribution: distribution_rows(snapshot),
        batch_id: Some(snapshot.batch_id().to_string()),
    }
}

fn distribution_rows(snapshot: &StatisticsSnapshot) -> Vec<DistributionRow> {
    let total = snapshot
        .type_distribution()
        .values()
        .fold(0_u64, |sum, count| sum.saturating_add(*count));
    let mut rows: Vec<DistributionRow> = snapshot
        .type_distribution()
        .iter()
        .map(|(label, count)| DistributionRow {
            label: label.clone(),
            count: *count,
            share_percent: if total == 0 {
                0.0
            } else {
                *count as f64 * 100.0 / total as f64
            },
        })
        .collect();

    // Map iteration is label-ordered, so the stable sort keeps ties by label.
    rows.sort_by(|a, b| b.count.cmp(&a.count));
    rows
}

fn format_metric(value: f64) -> String {
    format!("{value:.2}")
}

/// Aggregate UI runtime state.
#[derive(Debug, Clone, PartialEq)]
pub struct UiState {
    /// App version string sourced from root `VERSION`.
    pub version: String,
    /// Current auth status.
    pub auth: UiAuthState,
    /// Current theme.
    pub theme: ThemePreference,
    /// Upload stage status.
    pub upload: StageStatus,
    /// Upload status text shown under the file picker.
    pub upload_message: Option<String>,
    /// Session message (for example "session expired").
    pub session_notice: Option<String>,
    /// Dashboard content.
    pub dashboard: DashboardView,
}

impl UiState {
    /// Creates default UI state.
    pub fn new(version: impl Into<String>, theme: ThemePreference) -> Self {
        Self {
            version: version.into(),
            auth: UiAuthState::Anonymous,
            theme,
            upload: StageStatus::Idle,
            upload_message: None,
            session_notice: None,
            dashboard: project_dashboard(None),
        }
    }

    /// Returns `true` when the user may start an upload.
    pub fn can_upload(&self) -> bool {
        self.auth == UiAuthState::Authenticated && self.upload != StageStatus::Running
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for dashboard projection and the upload gate.

    use std::collections::BTreeMap;

    use chemviz_core::BatchId;

    use super::*;

    fn snapshot() -> StatisticsSnapshot {
        let mut distribution = BTreeMap::new();
        distribution.insert("Pump".to_string(), 5);
        distribution.insert("Valve".to_string(), 7);
        distribution.insert("Compressor".to_string(), 5);
        StatisticsSnapshot::new(17, 3.4, 101.3, 25.0, distribution, BatchId::new("b-1"))
    }

    #[test]
    fn empty_dashboard_uses_placeholders() {
        let view = project_dashboard(None);
        assert_eq!(view.hero_count, PLACEHOLDER);
        assert_eq!(view.hero_types, PLACEHOLDER);
        assert!(view.cards.is_empty());
        assert!(!view.has_data());
    }

    #[test]
    fn projects_cards_and_sorted_distribution() {
        let view = project_dashboard(Some(&snapshot()));
        assert_eq!(view.hero_count, "17");
        assert_eq!(view.hero_types, "3");
        assert_eq!(view.cards[1].value, "3.40");
        assert_eq!(view.cards[3].value, "25.00");

        let labels: Vec<&str> = view.distribution.iter().map(|row| row.label.as_str()).collect();
        assert_eq!(labels, vec!["Valve", "Compressor", "Pump"]);

        let share_total: f64 = view.distribution.iter().map(|row| row.share_percent).sum();
        assert!((share_total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn huge_counts_do_not_overflow_shares() {
        let mut distribution = BTreeMap::new();
        distribution.insert("Pump".to_string(), u64::MAX);
        distribution.insert("Valve".to_string(), u64::MAX);
        let snapshot =
            StatisticsSnapshot::new(u64::MAX, 1.0, 1.0, 1.0, distribution, BatchId::new("b-2"));

        let view = project_dashboard(Some(&snapshot));

        assert_eq!(view.distribution.len(), 2);
        assert!(view.distribution.iter().all(|row| row.share_percent.is_finite()));
        assert!(view.distribution.iter().all(|row| row.share_percent <= 100.0));
    }

    #[test]
    fn upload_gate_requires_auth_and_idle_upload() {
        let mut state = UiState::new("v0.1.0", ThemePreference::Light);
        assert!(!state.can_upload());

        state.auth = UiAuthState::Authenticated;
        assert!(state.can_upload());

        state.upload = StageStatus::Running;
        assert!(!state.can_upload());
    }
}
