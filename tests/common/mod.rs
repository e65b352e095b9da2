use serde_json::{json, Value};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Run the binary against `data_dir`, feeding `stdin` verbatim.
pub fn run_cli(data_dir: &Path, stdin: &str) -> (i32, String, String) {
    run_cli_in(data_dir, data_dir, stdin)
}

/// Like [`run_cli`], but with a working directory separate from the data dir.
pub fn run_cli_in(cwd: &Path, data_dir: &Path, stdin: &str) -> (i32, String, String) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_planilla"))
        .arg("--data-dir")
        .arg(data_dir)
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn binary");

    // The process may exit before reading everything; a broken pipe is fine.
    let _ = child.stdin.as_mut().unwrap().write_all(stdin.as_bytes());

    let output = child.wait_with_output().unwrap();
    (
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

/// Parse every stdout line as one output batch.
pub fn outputs(stdout: &str) -> Vec<Value> {
    stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

/// Run a batch of events that must all succeed, returning one output per event.
pub fn run_events(data_dir: &Path, events: &[Value]) -> Vec<Value> {
    let stdin: String = events.iter().map(|e| format!("{e}\n")).collect();
    let (code, stdout, stderr) = run_cli(data_dir, &stdin);
    assert_eq!(code, 0, "stderr: {stderr}");
    let outputs = outputs(&stdout);
    assert_eq!(outputs.len(), events.len(), "stdout: {stdout}");
    outputs
}

/// Fresh conversation id so tests never share state by accident.
pub fn conversation_id() -> String {
    format!("chat-{}", uuid::Uuid::new_v4().simple())
}

pub fn command(id: &str, name: &str) -> Value {
    json!({ "conversation_id": id, "type": "command", "command": name })
}

pub fn text(id: &str, text: &str) -> Value {
    json!({ "conversation_id": id, "type": "text", "text": text })
}

pub fn button(id: &str, payload: &str) -> Value {
    json!({ "conversation_id": id, "type": "button", "payload": payload })
}

/// All message texts in one output, joined by newlines.
pub fn texts(output: &Value) -> String {
    output["replies"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r["text"].as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Payloads of the keyboard attached to the last reply of an output.
pub fn payloads(output: &Value) -> Vec<String> {
    let replies = output["replies"].as_array().unwrap();
    replies
        .last()
        .and_then(|r| r["keyboard"].as_array())
        .map(|rows| {
            rows.iter()
                .flat_map(|row| row.as_array().unwrap().iter())
                .map(|b| b["payload"].as_str().unwrap().to_string())
                .collect()
        })
        .unwrap_or_default()
}

pub fn read_log(data_dir: &Path, name: &str) -> Value {
    let raw = std::fs::read_to_string(data_dir.join(name)).unwrap();
    serde_json::from_str(&raw).unwrap()
}
