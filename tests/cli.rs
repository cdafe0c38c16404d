//! Exit codes and output of the binary.

use std::process::Command;
use std::time::{Duration, Instant};

mod common;

fn harness() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_composition-harness"));
    command.env_remove("COMPOSITION_NEGOTIATION_BOOT").env_remove("RUST_LOG");
    command
}

#[test]
fn test_plan_prints_options_with_override_from_environment() {
    let fixture = common::fixture();
    let output = harness()
        .env("COMPOSITION_NEGOTIATION_BOOT", &fixture.archive)
        .arg("plan")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    let options: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let options = options.as_array().unwrap();
    assert!(options
        .iter()
        .any(|o| o["kind"] == "boot_classpath_injection"
            && o["path"] == fixture.archive.display().to_string()));
    assert_eq!(options.last().unwrap()["key"], "engine.log.level");
}

#[test]
fn test_missing_override_exits_with_configuration_error() {
    let output = harness().arg("run").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("COMPOSITION_NEGOTIATION_BOOT"));
}

#[test]
fn test_invalid_config_file_exits_with_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("harness.toml");
    std::fs::write(&path, "[probe]\npath = \"greeting\"\n").unwrap();

    let output = harness()
        .arg("--config")
        .arg(&path)
        .arg("check-modules")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("probe.path"));
}

#[test]
fn test_failing_check_exits_with_one() {
    let fixture = common::fixture();
    let path = fixture.dir.path().join("harness.toml");
    std::fs::write(
        &path,
        format!(
            r#"
[site]
http_port = 0

[protocol]
port = 0
override_path = "{archive}"

[tls]
cert_path = "{cert}"
key_path = "{key}"

[probe]
expected_body = "Goodbye"
"#,
            archive = fixture.archive.display(),
            cert = fixture.cert.display(),
            key = fixture.key.display(),
        ),
    )
    .unwrap();

    let output = harness()
        .arg("--config")
        .arg(&path)
        .arg("check-negotiation")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("FAIL live negotiation: [content]"));
    assert!(stdout.contains("PASS boot isolation"));
}

#[cfg(unix)]
#[test]
fn test_stalled_boot_exits_with_error_code() {
    let fixture = common::fixture();
    let pipe = common::stalled_archive(fixture.dir.path());
    let path = fixture.dir.path().join("harness.toml");
    std::fs::write(
        &path,
        format!(
            r#"
[site]
http_port = 0

[protocol]
port = 0
override_path = "{pipe}"

[timeouts]
boot_secs = 1
"#,
            pipe = pipe.display(),
        ),
    )
    .unwrap();

    let mut child = harness()
        .arg("--config")
        .arg(&path)
        .arg("check-modules")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if Instant::now() > deadline {
            child.kill().unwrap();
            panic!("harness still running after its boot deadline");
        }
        std::thread::sleep(Duration::from_millis(50));
    };
    assert_eq!(status.code(), Some(2));

    let mut stderr = String::new();
    std::io::Read::read_to_string(&mut child.stderr.take().unwrap(), &mut stderr).unwrap();
    assert!(stderr.contains("did not boot within 1s"), "{stderr}");
}
