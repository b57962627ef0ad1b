// crates/merge-pilot-core/src/runtime/report.rs
// ============================================================================
// Module: Merge Pilot Report Aggregator
// Description: Folds execution state and eligibility into the run report.
// Purpose: Emit the stable JSON and Markdown report artifacts.
// Dependencies: crate::{core, runtime::{eligibility, state}}, serde
// ============================================================================

//! ## Overview
//! The report is the run's summary artifact: plan identity (including the
//! canonical plan hash), per-item execution results, the merge-eligibility
//! partition, and the `allGreen` verdict. Serialization goes through the
//! canonical codec so two identical runs produce byte-identical reports.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::DEFAULT_HASH_ALGORITHM;
use crate::core::EncodingError;
use crate::core::GateName;
use crate::core::GateStatus;
use crate::core::HashDigest;
use crate::core::ItemName;
use crate::core::NodeStatus;
use crate::core::Plan;
use crate::core::canonical;
use crate::core::hashing;
use crate::runtime::eligibility::EligibilityReport;
use crate::runtime::state::StateSnapshot;

// ============================================================================
// SECTION: Report Tree
// ============================================================================

/// Root report artifact for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Plan identity.
    pub plan: ReportPlan,
    /// Execution results.
    pub execution: ReportExecution,
    /// Merge-eligibility partition.
    pub merge_eligibility: ReportEligibility,
    /// True when every required gate on every item passed.
    pub all_green: bool,
}

/// Plan identity section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPlan {
    /// Schema version of the consumed plan.
    pub schema_version: String,
    /// Target branch.
    pub target: String,
    /// Number of items in the plan.
    pub item_count: u64,
    /// Canonical hash of the consumed plan.
    pub plan_hash: HashDigest,
}

/// Execution section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportExecution {
    /// Per-item results in plan order.
    pub results: Vec<ReportItem>,
}

/// One item's execution summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportItem {
    /// Item name.
    pub name: ItemName,
    /// Aggregate item status.
    pub status: NodeStatus,
    /// Gate summaries in execution order.
    pub gates: Vec<ReportGate>,
}

/// One gate's execution summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportGate {
    /// Gate name.
    pub name: GateName,
    /// Final gate status.
    pub status: GateStatus,
    /// Duration of the last attempt, in milliseconds.
    pub duration_ms: u64,
}

/// Merge-eligibility section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEligibility {
    /// Items cleared for merge.
    pub eligible: Vec<ItemName>,
    /// Items that failed gates.
    pub failed: Vec<ItemName>,
    /// Items blocked by upstream failures.
    pub blocked: Vec<ItemName>,
    /// Items never executed to completion.
    pub skipped: Vec<ItemName>,
}

// ============================================================================
// SECTION: Aggregation
// ============================================================================

/// Builds the report from the snapshot and evaluation output.
///
/// # Errors
///
/// Returns [`EncodingError`] when the plan cannot be canonically hashed.
pub fn build_report(
    plan: &Plan,
    snapshot: &StateSnapshot,
    eligibility: &EligibilityReport,
) -> Result<Report, EncodingError> {
    let plan_hash = hashing::hash_canonical_json(DEFAULT_HASH_ALGORITHM, plan)?;

    let results = snapshot
        .results
        .iter()
        .map(|node| ReportItem {
            name: node.name.clone(),
            status: node.status,
            gates: node
                .gates
                .iter()
                .map(|gate| ReportGate {
                    name: gate.gate.clone(),
                    status: gate.status,
                    duration_ms: gate.duration_ms,
                })
                .collect(),
        })
        .collect();

    Ok(Report {
        plan: ReportPlan {
            schema_version: plan.schema_version.clone(),
            target: plan.target.clone(),
            item_count: plan.items.len() as u64,
            plan_hash,
        },
        execution: ReportExecution {
            results,
        },
        merge_eligibility: ReportEligibility {
            eligible: eligibility.summary.eligible.clone(),
            failed: eligibility.summary.failed.clone(),
            blocked: eligibility.summary.blocked.clone(),
            skipped: eligibility.summary.skipped.clone(),
        },
        all_green: all_green(plan, snapshot),
    })
}

/// True when every required gate declared by every item passed.
fn all_green(plan: &Plan, snapshot: &StateSnapshot) -> bool {
    plan.items.iter().all(|item| {
        item.gates
            .iter()
            .filter(|gate| plan.policy.required_gates.contains(&gate.name))
            .all(|gate| {
                snapshot
                    .result(&item.name)
                    .and_then(|node| node.gate(&gate.name))
                    .is_some_and(|result| result.status == GateStatus::Pass)
            })
    })
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

impl Report {
    /// Serializes the report as canonical JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError`] when encoding fails.
    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>, EncodingError> {
        canonical::encode(self)
    }

    /// Renders the stable Markdown form of the report.
    #[must_use]
    pub fn render_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# Merge Pilot Report\n\n");
        out.push_str(&format!(
            "- Target: `{}`\n- Items: {}\n- Plan hash: `{}`\n- All green: {}\n\n",
            self.plan.target, self.plan.item_count, self.plan.plan_hash.value, self.all_green
        ));

        out.push_str("## Execution\n\n");
        out.push_str("| Item | Status | Gates |\n|---|---|---|\n");
        for item in &self.execution.results {
            let gates: Vec<String> = item
                .gates
                .iter()
                .map(|gate| {
                    format!("{} {} ({} ms)", gate.name, status_label(gate.status), gate.duration_ms)
                })
                .collect();
            out.push_str(&format!(
                "| {} | {} | {} |\n",
                item.name,
                node_label(item.status),
                if gates.is_empty() { "-".to_string() } else { gates.join("; ") }
            ));
        }

        out.push_str("\n## Merge eligibility\n\n");
        render_name_list(&mut out, "Eligible", &self.merge_eligibility.eligible);
        render_name_list(&mut out, "Failed", &self.merge_eligibility.failed);
        render_name_list(&mut out, "Blocked", &self.merge_eligibility.blocked);
        render_name_list(&mut out, "Skipped", &self.merge_eligibility.skipped);
        out
    }
}

/// Renders one eligibility bucket line.
fn render_name_list(out: &mut String, label: &str, names: &[ItemName]) {
    let rendered: Vec<&str> = names.iter().map(ItemName::as_str).collect();
    out.push_str(&format!(
        "- {label}: {}\n",
        if rendered.is_empty() { "-".to_string() } else { rendered.join(", ") }
    ));
}

/// Stable gate status label.
const fn status_label(status: GateStatus) -> &'static str {
    match status {
        GateStatus::Pass => "pass",
        GateStatus::Fail => "fail",
        GateStatus::Blocked => "blocked",
        GateStatus::Skipped => "skipped",
        GateStatus::Retrying => "retrying",
    }
}

/// Stable node status label.
const fn node_label(status: NodeStatus) -> &'static str {
    match status {
        NodeStatus::Pass => "pass",
        NodeStatus::Fail => "fail",
        NodeStatus::Blocked => "blocked",
        NodeStatus::Skipped => "skipped",
        NodeStatus::Retrying => "retrying",
    }
}
