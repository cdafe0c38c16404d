//! Named presets: module coordinates and property keys of the composed server.
//!
//! The built-in container catalog is keyed on the same coordinates, so the
//! two stay in lockstep.

use crate::deployment::option::{Activation, DeployOption, ModuleCoordinate};

/// Property keys understood by the container.
pub mod keys {
    pub const HOST: &str = "server.host";
    pub const HTTP_PORT: &str = "server.http.port";
    pub const CONNECTORS: &str = "server.connectors";
    pub const TLS_CERT: &str = "server.tls.cert";
    pub const TLS_KEY: &str = "server.tls.key";
    pub const PROTOCOL_PORT: &str = "server.protocol.port";
    pub const GREETING_PATH: &str = "service.greeting.path";
    pub const GREETING_BODY: &str = "service.greeting.body";
    pub const CONTAINER_LOG_LEVEL: &str = "container.log.level";
    pub const ENGINE_LOG_LEVEL: &str = "engine.log.level";
}

/// Connector names understood by the boot module.
pub mod connectors {
    pub const HTTP: &str = "http";
    pub const NEGOTIATED_TLS: &str = "negotiated-tls";
}

/// Symbolic names of the modules the presets install.
pub mod ids {
    pub const ENGINE_UTIL: &str = "net.composer.engine.util";
    pub const ENGINE_IO: &str = "net.composer.engine.io";
    pub const ENGINE_HTTP: &str = "net.composer.engine.http";
    pub const ENGINE_SERVER: &str = "net.composer.engine.server";
    pub const BOOT: &str = "net.composer.boot";
    pub const HTTP_SERVICE: &str = "net.composer.service.http";
    pub const NEGOTIATION_BOOT: &str = "net.composer.negotiation.boot";
    pub const NEGOTIATION_SERVER: &str = "net.composer.negotiation.server";
    pub const NEGOTIATION_SHIM: &str = "net.composer.negotiation.shim";
    pub const H2_CORE: &str = "net.composer.h2.core";
    pub const H2_CLIENT: &str = "net.composer.h2.client";
    pub const H2_SERVER: &str = "net.composer.h2.server";
    pub const H2_HTTP_COMMON: &str = "net.composer.h2.http.common";
    pub const H2_HTTP_SERVER: &str = "net.composer.h2.http.server";
    pub const TEST_SUPPORT: &str = "net.composer.test.support";
}

pub const ENGINE_GROUP: &str = "net.composer.engine";
pub const BOOT_GROUP: &str = "net.composer.boot";
pub const SERVICE_GROUP: &str = "net.composer.service";
pub const NEGOTIATION_GROUP: &str = "net.composer.negotiation";
pub const H2_GROUP: &str = "net.composer.h2";
pub const TEST_GROUP: &str = "net.composer.test";

fn module(group: &str, artifact: &str, activation: Activation) -> DeployOption {
    DeployOption::module(ModuleCoordinate::new(group, artifact), activation)
}

/// Core engine libraries, the engine itself and the boot module.
pub fn core_dependencies() -> Vec<DeployOption> {
    vec![
        module(ENGINE_GROUP, "engine-util", Activation::NoStart),
        module(ENGINE_GROUP, "engine-io", Activation::NoStart),
        module(ENGINE_GROUP, "engine-http", Activation::NoStart),
        module(ENGINE_GROUP, "engine-server", Activation::Start),
        module(BOOT_GROUP, "module-boot", Activation::Start),
    ]
}

/// HTTP service module publishing the greeting resource.
pub fn http_service() -> Vec<DeployOption> {
    vec![module(SERVICE_GROUP, "http-service", Activation::Start)]
}

/// Negotiation runtime plus the HTTP/2 codec libraries.
pub fn protocol_modules() -> Vec<DeployOption> {
    vec![
        module(NEGOTIATION_GROUP, "negotiation-boot", Activation::Start),
        module(NEGOTIATION_GROUP, "negotiation-server", Activation::Start),
        module(H2_GROUP, "h2-client", Activation::NoStart),
        module(H2_GROUP, "h2-core", Activation::NoStart),
        module(H2_GROUP, "h2-server", Activation::NoStart),
        module(H2_GROUP, "h2-http-common", Activation::NoStart),
        module(H2_GROUP, "h2-http-server", Activation::NoStart),
    ]
}

/// Library exposing probe support types inside the container.
pub fn test_support() -> Vec<DeployOption> {
    vec![module(TEST_GROUP, "probe-support", Activation::NoStart)]
}

/// Module-scope provider of the negotiation capability. Not part of any
/// preset; used to demonstrate shadowing of the boot scope.
pub fn negotiation_shim() -> DeployOption {
    module(NEGOTIATION_GROUP, "negotiation-shim", Activation::Start)
}
