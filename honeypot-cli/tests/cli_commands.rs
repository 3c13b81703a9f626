use std::path::Path;
use std::process::{Command, Output};

const CREDENTIAL_VARS: &[&str] = &[
    "OPENAI_API_KEY",
    "GROQ_API_KEY",
    "OPENROUTER_API_KEY",
    "BOTPRESS_TOKEN",
    "BOTPRESS_BOT_ID",
    "HONEYPOT_API_KEY",
    "MAX_TURNS",
    "LLM_TIMEOUT",
    "PORT",
    "LOG_LEVEL",
    "DELAY_MIN",
    "DELAY_MAX",
    "RUST_LOG",
];

fn honeypot(dir: &Path, args: &[&str], envs: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_honeypot"));
    cmd.current_dir(dir)
        .arg("--config-dir")
        .arg(dir.join("config"))
        .args(args);
    for var in CREDENTIAL_VARS {
        cmd.env_remove(var);
    }
    for (key, value) in envs {
        cmd.env(key, value);
    }
    cmd.output().expect("Failed to run honeypot binary")
}

#[test]
fn test_send_without_providers_prints_payload() {
    let dir = tempfile::tempdir().unwrap();
    let output = honeypot(
        dir.path(),
        &["send", "--message", "your KYC is pending", "--session", "cli-1"],
        &[],
    );
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout
        .lines()
        .find(|l| l.trim_start().starts_with('{'))
        .expect("no JSON payload in output");
    let payload: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(payload["session_id"], "cli-1");
    assert_eq!(payload["ended"], false);
    assert!(!payload["reply"].as_str().unwrap().is_empty());
}

#[test]
fn test_status_masks_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let output = honeypot(
        dir.path(),
        &["status"],
        &[("OPENAI_API_KEY", "sk-abcdefgh12345678")],
    );
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("openai"));
    assert!(stdout.contains("sk-a...5678"));
    assert!(!stdout.contains("sk-abcdefgh12345678"));
    assert!(stdout.contains("groq: not configured"));
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let output = honeypot(dir.path(), &["status"], &[("MAX_TURNS", "0")]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("max_turns"));
}
