//! Protocol negotiation probe.
//!
//! # Stages
//! ```text
//! 1. Boot isolation   capability resolves from the primordial loader
//! 2. Live negotiation TCP → TLS (ALPN [expected, http/1.1]) → GET → body
//! ```
//!
//! Each live failure carries one category: connectivity, timeout,
//! negotiation or content. No retries.

use std::net::Ipv6Addr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use hyper::{header, Method, Request, StatusCode, Version};
use hyper_util::rt::{TokioExecutor, TokioIo};
use rustls::pki_types::ServerName;
use rustls::ClientConfig;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use crate::config::HarnessConfig;
use crate::container::CapabilityResolver;
use crate::net::tls::{self, TlsError};
use crate::verify::result::{ProbeFailure, ProbeResult};

/// Largest response body the probe reads.
const MAX_BODY_BYTES: usize = 64 * 1024;

pub const ISOLATION_CHECK: &str = "boot isolation";
pub const LIVE_CHECK: &str = "live negotiation";

/// Where the live request goes and what it must return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationTarget {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub expected_body: String,
}

/// Deadlines for the live request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTimeouts {
    /// TCP connect and TLS handshake, each.
    pub connect: Duration,
    /// Request and full body read, each.
    pub read: Duration,
}

impl Default for ProbeTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            read: Duration::from_secs(10),
        }
    }
}

fn timed_out(phase: &str, limit: Duration) -> ProbeFailure {
    ProbeFailure::Timeout {
        phase: phase.to_string(),
        millis: limit.as_millis() as u64,
    }
}

/// `host:port` as a URI authority; IPv6 literals are bracketed.
fn authority(host: &str, port: u16) -> String {
    if host.parse::<Ipv6Addr>().is_ok() {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Two-stage check of the negotiated TLS connector.
#[derive(Clone)]
pub struct ProtocolNegotiationProbe {
    capability: String,
    expected_protocol: String,
    client: Arc<ClientConfig>,
    timeouts: ProbeTimeouts,
}

impl ProtocolNegotiationProbe {
    /// `client` must already carry the ALPN offer.
    pub fn new(
        capability: impl Into<String>,
        expected_protocol: impl Into<String>,
        client: Arc<ClientConfig>,
        timeouts: ProbeTimeouts,
    ) -> Self {
        Self {
            capability: capability.into(),
            expected_protocol: expected_protocol.into(),
            client,
            timeouts,
        }
    }

    /// Load trust anchors and build the ALPN offer `[expected, http/1.1]`.
    pub fn from_config(config: &HarnessConfig) -> Result<Self, TlsError> {
        let expected = config.protocol.expected_protocol.clone();
        let mut offer = vec![expected.as_str()];
        if expected != tls::HTTP_1_1 {
            offer.push(tls::HTTP_1_1);
        }
        let client = tls::client_config(config.tls.trust_anchor_path(), &offer)?;

        Ok(Self::new(
            config.protocol.capability.clone(),
            expected,
            client,
            ProbeTimeouts {
                connect: Duration::from_secs(config.timeouts.connect_secs),
                read: Duration::from_secs(config.timeouts.read_secs),
            },
        ))
    }

    pub fn capability(&self) -> &str {
        &self.capability
    }

    pub fn expected_protocol(&self) -> &str {
        &self.expected_protocol
    }

    /// Pass iff `identifier` resolves and its defining scope has no parent.
    pub fn check_boot_isolation(&self, resolver: &dyn CapabilityResolver, identifier: &str) -> ProbeResult {
        match resolver.resolve(identifier) {
            None => ProbeResult::fail(
                ISOLATION_CHECK,
                ProbeFailure::IsolationNotFound {
                    identifier: identifier.to_string(),
                },
            ),
            Some(found) if found.scope.is_primordial() => ProbeResult::pass(
                ISOLATION_CHECK,
                format!("{} defined by {} ({})", identifier, found.scope, found.origin),
            ),
            Some(found) => ProbeResult::fail(
                ISOLATION_CHECK,
                ProbeFailure::IsolationViolation {
                    identifier: identifier.to_string(),
                    loader: found.scope.to_string(),
                },
            ),
        }
    }

    /// One GET over the negotiated protocol, verified end to end.
    pub async fn check_live_negotiation(
        &self,
        host: &str,
        port: u16,
        path: &str,
        expected_body: &str,
    ) -> ProbeResult {
        match self.exchange(host, port, path).await {
            Err(failure) => {
                tracing::warn!(host, port, category = %failure.category(), error = %failure, "Live negotiation failed");
                ProbeResult::fail(LIVE_CHECK, failure)
            }
            Ok((status, _)) if !status.is_success() => {
                ProbeResult::fail(LIVE_CHECK, ProbeFailure::Status { status: status.as_u16() })
            }
            Ok((_, body)) if body != expected_body.as_bytes() => ProbeResult::fail(
                LIVE_CHECK,
                ProbeFailure::ContentMismatch {
                    expected: expected_body.to_string(),
                    actual: String::from_utf8_lossy(&body).into_owned(),
                },
            ),
            Ok((status, _)) => ProbeResult::pass(
                LIVE_CHECK,
                format!(
                    "{} negotiated with {}:{}, GET {} answered {}",
                    self.expected_protocol, host, port, path, status
                ),
            ),
        }
    }

    /// Isolation first, then the live request.
    pub async fn run(&self, resolver: &dyn CapabilityResolver, target: &NegotiationTarget) -> Vec<ProbeResult> {
        let isolation = self.check_boot_isolation(resolver, &self.capability);
        let live = self
            .check_live_negotiation(&target.host, target.port, &target.path, &target.expected_body)
            .await;
        vec![isolation, live]
    }

    async fn connect(&self, host: &str, port: u16) -> Result<TlsStream<TcpStream>, ProbeFailure> {
        let target = authority(host, port);
        let server_name = ServerName::try_from(host.to_string()).map_err(|e| ProbeFailure::Connectivity {
            target: target.clone(),
            reason: format!("invalid host: {}", e),
        })?;

        let tcp = timeout(self.timeouts.connect, TcpStream::connect((host, port)))
            .await
            .map_err(|_| timed_out("TCP connect", self.timeouts.connect))?
            .map_err(|e| ProbeFailure::Connectivity {
                target: target.clone(),
                reason: e.to_string(),
            })?;

        let connector = TlsConnector::from(Arc::clone(&self.client));
        timeout(self.timeouts.connect, connector.connect(server_name, tcp))
            .await
            .map_err(|_| timed_out("TLS handshake", self.timeouts.connect))?
            .map_err(|e| ProbeFailure::Negotiation { reason: e.to_string() })
    }

    async fn exchange(&self, host: &str, port: u16, path: &str) -> Result<(StatusCode, Bytes), ProbeFailure> {
        let stream = self.connect(host, port).await?;

        let negotiated = stream
            .get_ref()
            .1
            .alpn_protocol()
            .map(|p| String::from_utf8_lossy(p).into_owned());
        tracing::debug!(host, port, negotiated = ?negotiated, "TLS handshake complete");
        if negotiated.as_deref() != Some(self.expected_protocol.as_str()) {
            return Err(ProbeFailure::ProtocolMismatch {
                expected: self.expected_protocol.clone(),
                negotiated: negotiated.unwrap_or_else(|| "no ALPN protocol".to_string()),
            });
        }

        let authority = authority(host, port);
        let request_failed = |e: hyper::Error| ProbeFailure::Connectivity {
            target: authority.clone(),
            reason: format!("request failed: {}", e),
        };
        let io = TokioIo::new(stream);
        let is_h2 = self.expected_protocol == tls::H2;

        let (response, expected_version) = if is_h2 {
            let request = Request::builder()
                .method(Method::GET)
                .uri(format!("https://{}{}", authority, path))
                .body(Body::empty())
                .map_err(|e| ProbeFailure::Connectivity {
                    target: authority.clone(),
                    reason: format!("invalid request target: {}", e),
                })?;
            let (mut sender, connection) = hyper::client::conn::http2::handshake(TokioExecutor::new(), io)
                .await
                .map_err(request_failed)?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::debug!(error = %e, "Probe connection closed");
                }
            });
            let response = timeout(self.timeouts.read, sender.send_request(request))
                .await
                .map_err(|_| timed_out("request", self.timeouts.read))?
                .map_err(request_failed)?;
            (response, Version::HTTP_2)
        } else {
            let request = Request::builder()
                .method(Method::GET)
                .uri(path)
                .header(header::HOST, &authority)
                .body(Body::empty())
                .map_err(|e| ProbeFailure::Connectivity {
                    target: authority.clone(),
                    reason: format!("invalid request target: {}", e),
                })?;
            let (mut sender, connection) = hyper::client::conn::http1::handshake(io)
                .await
                .map_err(request_failed)?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::debug!(error = %e, "Probe connection closed");
                }
            });
            let response = timeout(self.timeouts.read, sender.send_request(request))
                .await
                .map_err(|_| timed_out("request", self.timeouts.read))?
                .map_err(request_failed)?;
            (response, Version::HTTP_11)
        };

        if response.version() != expected_version {
            return Err(ProbeFailure::ProtocolMismatch {
                expected: format!("{:?}", expected_version),
                negotiated: format!("{:?}", response.version()),
            });
        }

        let status = response.status();
        let body = timeout(
            self.timeouts.read,
            axum::body::to_bytes(Body::new(response.into_body()), MAX_BODY_BYTES),
        )
        .await
        .map_err(|_| timed_out("body read", self.timeouts.read))?
        .map_err(|e| ProbeFailure::Connectivity {
            target: authority.clone(),
            reason: format!("body read failed: {}", e),
        })?;

        Ok((status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{LoaderScope, ResolvedCapability};
    use crate::verify::result::FailureCategory;

    struct Fixed(Option<LoaderScope>);

    impl CapabilityResolver for Fixed {
        fn resolve(&self, identifier: &str) -> Option<ResolvedCapability> {
            self.0.clone().map(|scope| ResolvedCapability {
                identifier: identifier.to_string(),
                origin: scope.to_string(),
                scope,
            })
        }
    }

    fn probe() -> ProtocolNegotiationProbe {
        let dir = tempfile::tempdir().unwrap();
        let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let ca = dir.path().join("ca.crt");
        std::fs::write(&ca, certified.cert.pem()).unwrap();
        let client = tls::client_config(&ca, &[tls::H2, tls::HTTP_1_1]).unwrap();
        ProtocolNegotiationProbe::new(
            "x.Negotiator",
            tls::H2,
            client,
            ProbeTimeouts {
                connect: Duration::from_millis(500),
                read: Duration::from_millis(500),
            },
        )
    }

    #[test]
    fn isolation_distinguishes_absent_from_shadowed() {
        let probe = probe();

        let result = probe.check_boot_isolation(&Fixed(Some(LoaderScope::Primordial)), "x.Negotiator");
        assert!(result.passed());

        let result = probe.check_boot_isolation(&Fixed(None), "x.Negotiator");
        assert!(matches!(result.failure, Some(ProbeFailure::IsolationNotFound { .. })));

        let shadowed = LoaderScope::Module { id: "shim".into() };
        let result = probe.check_boot_isolation(&Fixed(Some(shadowed)), "x.Negotiator");
        assert!(result.detail.contains("module loader shim"));
        assert_eq!(result.category(), Some(FailureCategory::Isolation));
    }

    #[tokio::test]
    async fn refused_connection_is_connectivity() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let result = probe().check_live_negotiation("127.0.0.1", port, "/greeting", "Hello").await;
        assert_eq!(result.category(), Some(FailureCategory::Connectivity));
    }

    #[test]
    fn authority_brackets_ipv6_literals() {
        assert_eq!(authority("localhost", 9877), "localhost:9877");
        assert_eq!(authority("127.0.0.1", 9877), "127.0.0.1:9877");
        assert_eq!(authority("::1", 9877), "[::1]:9877");
        assert!(format!("https://{}/greeting", authority("::1", 9877))
            .parse::<hyper::Uri>()
            .is_ok());
    }

    #[tokio::test]
    async fn unanswered_request_is_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let (cert, key, ca) = (dir.path().join("s.crt"), dir.path().join("s.key"), dir.path().join("ca.crt"));
        std::fs::write(&cert, certified.cert.pem()).unwrap();
        std::fs::write(&key, certified.key_pair.serialize_pem()).unwrap();
        std::fs::write(&ca, certified.cert.pem()).unwrap();

        let server = tls::server_config(&cert, &key, &[tls::HTTP_1_1]).unwrap();
        let acceptor = tokio_rustls::TlsAcceptor::from(server.get_inner());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _held = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let _stream = acceptor.accept(socket).await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let client = tls::client_config(&ca, &[tls::HTTP_1_1]).unwrap();
        let probe = ProtocolNegotiationProbe::new(
            "x.Negotiator",
            tls::HTTP_1_1,
            client,
            ProbeTimeouts {
                connect: Duration::from_secs(2),
                read: Duration::from_millis(300),
            },
        );
        let result = probe.check_live_negotiation("localhost", port, "/greeting", "Hello").await;
        assert_eq!(result.category(), Some(FailureCategory::Timeout));
        assert!(
            matches!(&result.failure, Some(ProbeFailure::Timeout { phase, millis: 300 }) if phase == "request"),
            "{result}"
        );
    }

    #[tokio::test]
    async fn silent_server_is_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _held = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let result = probe().check_live_negotiation("localhost", port, "/greeting", "Hello").await;
        assert_eq!(result.category(), Some(FailureCategory::Timeout));
        assert!(result.detail.contains("TLS handshake"));
    }
}
