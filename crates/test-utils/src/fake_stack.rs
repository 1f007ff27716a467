use std::future::Future;
use std::pin::Pin;

use stackguard::engine::StackControl;
use stackguard::types::ServiceName;
use stackguard::validate::ServiceHealth;

/// A stack that records teardown requests instead of killing processes.
#[derive(Debug, Clone)]
pub struct FakeStack {
    health: Vec<ServiceHealth>,
    pub teardowns: Vec<String>,
}

impl FakeStack {
    /// Both services healthy, pointing at `backend` / `frontend` base URLs.
    pub fn healthy(backend: &str, frontend: &str) -> Self {
        Self {
            health: vec![
                ServiceHealth {
                    name: ServiceName::Backend,
                    healthy: true,
                    url: backend.to_string(),
                },
                ServiceHealth {
                    name: ServiceName::Frontend,
                    healthy: true,
                    url: frontend.to_string(),
                },
            ],
            teardowns: Vec::new(),
        }
    }

    pub fn with_unhealthy(mut self, service: ServiceName) -> Self {
        for h in self.health.iter_mut().filter(|h| h.name == service) {
            h.healthy = false;
        }
        self
    }

    pub fn torn_down(&self) -> bool {
        !self.teardowns.is_empty()
    }
}

impl StackControl for FakeStack {
    fn service_health(&self) -> Vec<ServiceHealth> {
        self.health.clone()
    }

    fn teardown(&mut self, reason: String) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            tracing::info!(%reason, "fake teardown");
            self.teardowns.push(reason);
        })
    }
}
