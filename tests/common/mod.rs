//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use composition_harness::config::schema::DEFAULT_NEGOTIATION_CAPABILITY;
use composition_harness::HarnessConfig;
use tempfile::TempDir;

/// Certificate, key and negotiation override archive in a scratch dir.
pub struct Fixture {
    pub dir: TempDir,
    pub cert: PathBuf,
    pub key: PathBuf,
    pub archive: PathBuf,
}

/// Generate a self-signed `localhost` certificate and a boot archive.
pub fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert = dir.path().join("server.crt");
    let key = dir.path().join("server.key");
    std::fs::write(&cert, certified.cert.pem()).unwrap();
    std::fs::write(&key, certified.key_pair.serialize_pem()).unwrap();
    let archive = write_archive(dir.path(), "negotiation-boot.toml", DEFAULT_NEGOTIATION_CAPABILITY);

    Fixture { dir, cert, key, archive }
}

/// Write a boot archive manifest providing `capability`.
pub fn write_archive(dir: &Path, file: &str, capability: &str) -> PathBuf {
    let path = dir.join(file);
    std::fs::write(
        &path,
        format!(
            "name = \"negotiation-boot\"\nversion = \"8.1.0\"\nprovides = [\"{}\"]\n",
            capability
        ),
    )
    .unwrap();
    path
}

/// Default configuration wired to the fixture, plain connector on an
/// ephemeral port, TLS connector on `protocol_port`.
pub fn config(fixture: &Fixture, protocol_port: u16) -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.site.http_port = 0;
    config.protocol.port = protocol_port;
    config.protocol.override_path = Some(fixture.archive.clone());
    config.tls.cert_path = fixture.cert.clone();
    config.tls.key_path = fixture.key.clone();
    config.timeouts.boot_secs = 10;
    config.timeouts.connect_secs = 2;
    config.timeouts.read_secs = 2;
    config
}

/// A named pipe with no writer: reading it blocks until one shows up.
#[cfg(unix)]
pub fn stalled_archive(dir: &Path) -> PathBuf {
    let path = dir.join("stalled-boot.toml");
    let status = std::process::Command::new("mkfifo").arg(&path).status().unwrap();
    assert!(status.success(), "mkfifo failed");
    path
}

/// Open and close the write end so a blocked reader sees end of file.
#[cfg(unix)]
pub fn release(pipe: &Path) {
    drop(std::fs::OpenOptions::new().write(true).open(pipe).unwrap());
}

/// A port nothing is listening on.
pub fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
