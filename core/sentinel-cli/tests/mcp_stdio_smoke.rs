use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

fn command(tmp: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_hotreload-sentinel"));
    command
        .env("HOTRELOAD_SENTINEL_TMPDIR", tmp)
        .env("HOTRELOAD_SENTINEL_CONFIG", tmp.join("missing-config.toml"))
        .env_remove("Microsoft_CodeAnalysis_EditAndContinue_LogDir")
        .env_remove("HOTRELOAD_SENTINEL_LOG")
        .env_remove("HOTRELOAD_SENTINEL_DEBUG");
    command
}

/// Runs the stdio server over `input` and returns everything it wrote.
fn run_server(tmp: &Path, input: &[u8]) -> Vec<u8> {
    let mut child = command(tmp)
        .arg("mcp")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn hotreload-sentinel");

    {
        let mut stdin = child.stdin.take().expect("stdin");
        stdin.write_all(input).expect("Failed to write requests");
    }

    let mut output = Vec::new();
    child
        .stdout
        .take()
        .expect("stdout")
        .read_to_end(&mut output)
        .expect("Failed to read responses");
    let status = child.wait().expect("wait");
    assert!(status.success(), "server exited with {status}");
    output
}

fn run_cli(tmp: &Path, args: &[&str]) -> Output {
    command(tmp).args(args).output().expect("Failed to run hotreload-sentinel")
}

fn jsonl(messages: &[Value]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for message in messages {
        serde_json::to_writer(&mut bytes, message).unwrap();
        bytes.push(b'\n');
    }
    bytes
}

fn response_with_id(responses: &[Value], id: i64) -> &Value {
    responses
        .iter()
        .find(|response| response["id"] == id)
        .unwrap_or_else(|| panic!("no response with id {id}: {responses:?}"))
}

#[test]
fn newline_json_session() {
    let tmp = TempDir::new().unwrap();
    let input = jsonl(&[
        json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": { "protocolVersion": "2025-03-26" } }),
        json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
        json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }),
        json!({ "jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": { "name": "hr_status", "arguments": {} } }),
        json!({ "jsonrpc": "2.0", "id": 4, "method": "tools/call", "params": { "name": "hr_pending_atoms" } }),
        json!({ "jsonrpc": "2.0", "id": 5, "method": "tools/call", "params": { "name": "hr_record_verdict", "arguments": { "apply_index": 3, "verdicts": { "0": "yes" } } } }),
        json!({ "jsonrpc": "2.0", "id": 6, "method": "bogus/method" }),
    ]);

    let output = run_server(tmp.path(), &input);
    let responses: Vec<Value> = BufReader::new(output.as_slice())
        .lines()
        .map(|line| serde_json::from_str(&line.unwrap()).expect("response is one JSON line"))
        .collect();

    assert_eq!(responses.len(), 6, "notification must not be answered");

    let init = response_with_id(&responses, 1);
    assert_eq!(init["result"]["protocolVersion"], "2025-03-26");
    assert_eq!(init["result"]["serverInfo"]["name"], "hotreload-sentinel");

    let tools = response_with_id(&responses, 2)["result"]["tools"]
        .as_array()
        .unwrap()
        .len();
    assert_eq!(tools, 9);

    let status = response_with_id(&responses, 3)["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(status.starts_with("hr_status: IDLE"), "{status}");

    let pending = response_with_id(&responses, 4)["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .to_string();
    let pending: Value = serde_json::from_str(&pending).unwrap();
    assert_eq!(pending["message"], "No unconfirmed atoms.");

    let missing = response_with_id(&responses, 5);
    assert_eq!(missing["error"]["code"], -32000);
    assert_eq!(
        missing["error"]["message"],
        "No verdict entry found for apply_index=3"
    );

    assert_eq!(response_with_id(&responses, 6)["error"]["code"], -32601);
}

#[test]
fn content_length_session() {
    let tmp = TempDir::new().unwrap();
    let body = r#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#;
    let input = format!("Content-Length: {}\r\n\r\n{}", body.len(), body);

    let output = String::from_utf8(run_server(tmp.path(), input.as_bytes())).unwrap();

    let (header, reply) = output.split_once("\r\n\r\n").expect("framed reply");
    let reply: Value = serde_json::from_str(reply).unwrap();
    assert_eq!(header, format!("Content-Length: {}", serde_json::to_vec(&reply).unwrap().len()));
    assert_eq!(reply["id"], 7);
    assert_eq!(reply["result"], json!({}));
}

#[test]
fn cli_status_and_verdict_errors() {
    let tmp = TempDir::new().unwrap();

    let status = run_cli(tmp.path(), &["status"]);
    assert!(status.status.success());
    let stdout = String::from_utf8_lossy(&status.stdout);
    assert!(stdout.starts_with("hr_status: IDLE\nwatcher_alive=false"), "{stdout}");

    let record = run_cli(
        tmp.path(),
        &["record-verdict", "--apply-index", "3", "--verdicts-json", r#"{"0":"yes"}"#],
    );
    assert_eq!(record.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&record.stderr)
        .contains("error: no verdict entry found for apply_index=3"));

    let bad = run_cli(
        tmp.path(),
        &["record-verdict", "--apply-index", "3", "--verdicts-json", "{"],
    );
    assert_eq!(bad.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&bad.stderr).contains("error: invalid JSON for verdicts"));

    let stop = run_cli(tmp.path(), &["watch-stop"]);
    assert_eq!(String::from_utf8_lossy(&stop.stdout).trim(), "hr_watch_stop: not_running");
}

#[test]
fn cli_draft_issue_writes_summary() {
    let tmp = TempDir::new().unwrap();

    let draft = run_cli(tmp.path(), &["draft-issue"]);
    assert!(draft.status.success());
    let line = String::from_utf8_lossy(&draft.stdout).trim().to_string();
    let path = line
        .strip_prefix("draft_issue: written to ")
        .expect("draft path line");

    let body = std::fs::read_to_string(path).unwrap();
    assert!(body.starts_with("# [Hot Reload] Session Summary"));
}
