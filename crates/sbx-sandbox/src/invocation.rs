use sbx_core::error::SandboxError;
use sbx_core::purl::Ecosystem;
use serde_json::Value;
use tokio::process::Command;

use crate::report_builder::build_analysis_result;

/// Configuration for where the sandbox binary and its result files live —
/// distinct from `sbx_core::config::SandboxConfig` by design: this struct is
/// what `invoke` actually needs to build a command line, the config struct
/// is what an operator edits.
#[derive(Debug, Clone)]
pub struct InvocationSpec {
    pub script_path: String,
    pub image_name: String,
    pub results_dir: std::path::PathBuf,
}

/// Everything `invoke` learned about one completed run, ready to feed into
/// the report writer.
pub struct InvocationOutcome {
    pub analysis: serde_json::Value,
    pub duration_seconds: f64,
}

/// Run one sandbox analysis to completion (spec §4.7, step 4). The caller
/// is expected to have already marked the task `running`; this function
/// owns only the subprocess lifecycle and result parsing, not task state.
pub async fn invoke(
    spec: &InvocationSpec,
    package_name: &str,
    package_version: &str,
    ecosystem: Ecosystem,
) -> Result<InvocationOutcome, SandboxError> {
    let image_exists = image_exists_locally(&spec.image_name).await;

    let mut args = vec![
        "-ecosystem".to_string(),
        ecosystem.as_str().to_string(),
        "-package".to_string(),
        package_name.to_string(),
        "-version".to_string(),
        package_version.to_string(),
        "-mode".to_string(),
        "dynamic".to_string(),
    ];
    if image_exists {
        args.push("-nopull".into());
    }
    args.push("-nointeractive".into());

    let command_line = format!("{} {}", spec.script_path, args.join(" "));
    tracing::info!(command = %command_line, "invoking sandbox analysis");

    let started = std::time::Instant::now();
    let output = Command::new(&spec.script_path)
        .args(&args)
        .output()
        .await
        .map_err(|e| {
            SandboxError::unknown(
                package_name,
                package_version,
                ecosystem.as_str(),
                format!("failed to spawn sandbox process: {e}"),
            )
        })?;
    let duration_seconds = started.elapsed().as_secs_f64();

    if !output.status.success() {
        let exit_code = output.status.code().unwrap_or(-1);
        return Err(SandboxError::from_exit(
            exit_code,
            &String::from_utf8_lossy(&output.stderr),
            &String::from_utf8_lossy(&output.stdout),
            package_name,
            package_version,
            ecosystem.as_str(),
            &command_line,
        ));
    }

    let result_path = spec
        .results_dir
        .join(format!("{}.json", package_name.to_lowercase()));

    let raw = tokio::fs::read(&result_path).await.map_err(|_| {
        SandboxError::result_file_missing(package_name, package_version, ecosystem.as_str())
    })?;

    let json_data: Value = serde_json::from_slice(&raw).map_err(|e| {
        SandboxError::result_parse_failed(package_name, package_version, ecosystem.as_str(), &e.to_string())
    })?;

    let analysis_result = build_analysis_result(&json_data);
    let analysis = serde_json::to_value(analysis_result).map_err(|e| {
        SandboxError::unknown(
            package_name,
            package_version,
            ecosystem.as_str(),
            format!("failed to serialize derived report: {e}"),
        )
    })?;

    Ok(InvocationOutcome {
        analysis,
        duration_seconds,
    })
}

async fn image_exists_locally(image_name: &str) -> bool {
    Command::new("docker")
        .args(["image", "inspect", image_name])
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false)
}
