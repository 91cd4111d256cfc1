//! Builds the on-disk report JSON envelope (spec §6 "report file format"):
//! package/analysis/api metadata wrapping the derived `analysis_results`,
//! grounded on `save_professional_report`.

use chrono::Utc;
use sbx_core::types::Task;
use sbx_sandbox::InvocationOutcome;

const API_VERSION: &str = "1.0";

pub fn build_report_payload(task: &Task, outcome: &InvocationOutcome) -> serde_json::Value {
    let now = Utc::now();
    serde_json::json!({
        "metadata": {
            "created_at": now.to_rfc3339(),
            "package": {
                "name": task.package_name,
                "version": task.package_version,
                "ecosystem": task.ecosystem.as_str(),
                "purl": task.purl,
            },
            "analysis": {
                "status": "completed",
                "started_at": task.started_at.map(|d| d.to_rfc3339()),
                "completed_at": now.to_rfc3339(),
                "duration_seconds": outcome.duration_seconds,
            },
            "api": {
                "version": API_VERSION,
                "endpoint": "analyze_api",
                "generated_by": "sbx-worker",
            }
        },
        "analysis_results": outcome.analysis,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbx_core::purl::Ecosystem;
    use uuid::Uuid;

    #[test]
    fn wraps_analysis_in_metadata_envelope() {
        let task = Task::new(
            Uuid::new_v4(),
            "pkg:pypi/django@1.11.1".into(),
            "django".into(),
            "1.11.1".into(),
            Ecosystem::Pypi,
            0,
            30,
            None,
        );
        let outcome = InvocationOutcome {
            analysis: serde_json::json!({"install": {}, "execute": {}}),
            duration_seconds: 3.5,
        };
        let payload = build_report_payload(&task, &outcome);
        assert_eq!(payload["metadata"]["package"]["name"], "django");
        assert_eq!(payload["metadata"]["analysis"]["duration_seconds"], 3.5);
        assert_eq!(payload["analysis_results"]["install"], serde_json::json!({}));
    }
}
