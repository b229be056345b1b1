// Copyright 2024-2026 gitifold Contributors
// SPDX-License-Identifier: Apache-2.0

//! Output helpers for the render command.

use crate::descriptor::ResourceDescriptor;
use crate::reconcile::{Outcome, ReconcileReport};

/// Manifests as a multi-document YAML stream.
pub fn manifests_yaml(objects: &[ResourceDescriptor]) -> Result<String, serde_yaml::Error> {
    let mut out = String::new();
    for object in objects {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(&object.to_manifest())?);
    }
    Ok(out)
}

/// Manifests as a pretty JSON array.
pub fn manifests_json(objects: &[ResourceDescriptor]) -> Result<String, serde_json::Error> {
    let manifests: Vec<serde_json::Value> = objects.iter().map(ResourceDescriptor::to_manifest).collect();
    let mut out = serde_json::to_string_pretty(&manifests)?;
    out.push('\n');
    Ok(out)
}

/// Human-readable pass summary on stderr.
pub fn print_summary(report: &ReconcileReport) {
    eprintln!("====================================================");
    eprintln!("  gitifold pass: {}", report.instance);
    eprintln!(
        "  Created: {:<4} Present: {:<4} Took: {}ms",
        report.created(),
        report.already_present(),
        (report.finished_at - report.started_at).num_milliseconds()
    );
    eprintln!("====================================================");
    eprintln!("  Kind                  | Name                                | Outcome");
    eprintln!("  ----------------------+-------------------------------------+---------");
    for entry in &report.entries {
        let outcome = match entry.outcome {
            Outcome::Created => "created",
            Outcome::AlreadyPresent => "present",
        };
        eprintln!("  {:21} | {:35} | {}", entry.kind.as_str(), truncate(&entry.name, 35), outcome);
    }
    for skipped in &report.skipped {
        eprintln!("  skipped: {}", skipped);
    }
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
