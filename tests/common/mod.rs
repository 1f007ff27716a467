#![allow(dead_code)]

pub use stackguard_test_utils::builders;
pub use stackguard_test_utils::http;
pub use stackguard_test_utils::{
    CaseBuilder, FakeStack, ServiceBuilder, StackConfigBuilder, free_port, init_tracing,
    port_accepts, spawn_router, wait_port_closed, with_timeout,
};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Path of the bundled stub service binary.
pub fn stub_bin() -> &'static str {
    env!("CARGO_BIN_EXE_stackguard-stub")
}

/// Shell command starting the stub service on `$PORT` with extra flags.
pub fn stub_cmd(extra_args: &str) -> String {
    format!("exec '{}' --port $PORT {}", stub_bin(), extra_args)
}

/// A stub-backed service on `port`, probed quickly.
pub fn stub_service(port: u16, extra_args: &str, health_path: &str) -> ServiceBuilder {
    ServiceBuilder::new(&stub_cmd(extra_args))
        .port(port)
        .health_path(health_path)
        .health_interval("100ms")
        .health_timeout("10s")
}

/// Config for a stub backend + stub frontend on fresh ports, logging into
/// `dir`.
pub fn stub_stack(dir: &std::path::Path, backend_args: &str) -> StackConfigBuilder {
    StackConfigBuilder::new()
        .in_dir(dir)
        .with_teardown_grace("2s")
        .with_backend(stub_service(free_port(), backend_args, "/docs"))
        .with_frontend(stub_service(free_port(), "", "/"))
}
