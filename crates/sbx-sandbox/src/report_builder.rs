use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One phase of sandbox observation: `install` or `execute` (the latter
/// falls back to an `import` key for ecosystems that use that verb).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PhaseReport {
    pub num_files: usize,
    pub num_commands: usize,
    pub num_network_connections: usize,
    pub num_system_calls: usize,
    pub files: FileActivity,
    pub dns: Vec<String>,
    pub sockets: Vec<SocketEntry>,
    pub commands: Vec<String>,
    pub syscalls: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileActivity {
    pub read: Vec<String>,
    pub write: Vec<String>,
    pub delete: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketEntry {
    pub address: Option<String>,
    pub port: Option<i64>,
    /// Space-joined, not an array — matches the upstream analyzer's own
    /// report shape so downstream consumers don't need two code paths.
    pub hostnames: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub install: PhaseReport,
    pub execute: PhaseReport,
}

/// Derive the `install`/`execute` phase summaries from the raw sandbox
/// result JSON (spec §4.7.5). `execute` falls back to an `import` key when
/// the sandbox ran an import-only analysis instead of an execute phase.
pub fn build_analysis_result(raw: &Value) -> AnalysisResult {
    let analysis = raw.get("Analysis").cloned().unwrap_or(Value::Null);

    let install_phase = analysis.get("install").cloned().unwrap_or(Value::Null);
    let execute_phase = analysis
        .get("execute")
        .filter(|v| !v.is_null())
        .or_else(|| analysis.get("import"))
        .cloned()
        .unwrap_or(Value::Null);

    AnalysisResult {
        install: build_phase(&install_phase),
        execute: build_phase(&execute_phase),
    }
}

fn build_phase(phase: &Value) -> PhaseReport {
    let enter_pattern = Regex::new(r"^Enter:\s*(.*)").expect("valid regex");

    let files = phase.get("Files").and_then(Value::as_array);
    let sockets = phase.get("Sockets").and_then(Value::as_array);
    let dns_entries = phase.get("DNS").and_then(Value::as_array);
    let commands = phase.get("Commands").and_then(Value::as_array);
    let syscalls = phase.get("Syscalls").and_then(Value::as_array);

    let mut activity = FileActivity::default();
    for file in files.into_iter().flatten() {
        let path = file.get("Path").and_then(Value::as_str).map(String::from);
        if file.get("Read").and_then(Value::as_bool).unwrap_or(false) {
            if let Some(p) = path.clone() {
                activity.read.push(p);
            }
        }
        if file.get("Write").and_then(Value::as_bool).unwrap_or(false) {
            if let Some(p) = path.clone() {
                activity.write.push(p);
            }
        }
        if file.get("Delete").and_then(Value::as_bool).unwrap_or(false) {
            if let Some(p) = path {
                activity.delete.push(p);
            }
        }
    }

    let mut dns = Vec::new();
    for entry in dns_entries.into_iter().flatten() {
        if entry.is_null() {
            continue;
        }
        for query in entry.get("Queries").and_then(Value::as_array).into_iter().flatten() {
            if let Some(hostname) = query.get("Hostname").and_then(Value::as_str) {
                dns.push(hostname.to_string());
            }
        }
    }

    let mut socket_entries = Vec::new();
    for socket in sockets.into_iter().flatten() {
        if socket.is_null() {
            continue;
        }
        let hostnames: Vec<String> = socket
            .get("Hostnames")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|h| h.as_str().map(String::from))
            .collect();
        socket_entries.push(SocketEntry {
            address: socket.get("Address").and_then(Value::as_str).map(String::from),
            port: socket.get("Port").and_then(Value::as_i64),
            hostnames: hostnames.join(" "),
        });
    }

    let mut command_strings = Vec::new();
    for command in commands.into_iter().flatten() {
        if command.is_null() {
            continue;
        }
        if let Some(cmd) = command.get("Command").and_then(Value::as_str) {
            command_strings.push(cmd.to_string());
        }
    }

    let mut syscall_names = Vec::new();
    let raw_syscall_count = syscalls.map(|s| s.len()).unwrap_or(0);
    for syscall in syscalls.into_iter().flatten() {
        if let Some(line) = syscall.as_str() {
            if let Some(caps) = enter_pattern.captures(line) {
                syscall_names.push(caps[1].to_string());
            }
        }
    }

    PhaseReport {
        num_files: files.map(|f| f.len()).unwrap_or(0),
        num_commands: commands.map(|c| c.len()).unwrap_or(0),
        num_network_connections: sockets.map(|s| s.len()).unwrap_or(0),
        num_system_calls: raw_syscall_count / 2,
        files: activity,
        dns,
        sockets: socket_entries,
        commands: command_strings,
        syscalls: syscall_names,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn derives_phase_counts_and_syscall_names() {
        let raw = json!({
            "Analysis": {
                "install": {
                    "Files": [{"Path": "a.txt", "Read": true}, {"Path": "b.txt", "Write": true}],
                    "Commands": [{"Command": "ls"}],
                    "Sockets": [{"Address": "1.2.3.4", "Port": 80, "Hostnames": ["example.com", "cdn.example.com"]}],
                    "DNS": [{"Queries": [{"Hostname": "example.com"}]}],
                    "Syscalls": ["Enter: open", "Exit: open", "Enter: close", "Exit: close"]
                },
                "execute": {}
            }
        });

        let result = build_analysis_result(&raw);
        assert_eq!(result.install.num_files, 2);
        assert_eq!(result.install.num_commands, 1);
        assert_eq!(result.install.num_network_connections, 1);
        assert_eq!(result.install.num_system_calls, 2);
        assert_eq!(result.install.files.read, vec!["a.txt"]);
        assert_eq!(result.install.files.write, vec!["b.txt"]);
        assert_eq!(result.install.syscalls, vec!["open", "close"]);
        assert_eq!(result.install.sockets[0].hostnames, "example.com cdn.example.com");
        assert_eq!(result.install.dns, vec!["example.com"]);
    }

    #[test]
    fn execute_falls_back_to_import_key() {
        let raw = json!({
            "Analysis": {
                "install": {},
                "import": {
                    "Files": [{"Path": "c.txt", "Delete": true}]
                }
            }
        });

        let result = build_analysis_result(&raw);
        assert_eq!(result.execute.files.delete, vec!["c.txt"]);
    }

    #[test]
    fn missing_phase_yields_zeroed_report() {
        let raw = json!({"Analysis": {}});
        let result = build_analysis_result(&raw);
        assert_eq!(result.install.num_files, 0);
        assert!(result.install.syscalls.is_empty());
    }
}
