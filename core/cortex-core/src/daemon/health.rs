//! Daemon health probing over local HTTP.

use std::time::Duration;

use tracing::debug;

/// Upper bound for a single probe, connect plus response.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

pub trait HealthProbe: Send + Sync {
    /// True only when the daemon answered healthy. Connection failures are `false`.
    fn check(&self) -> bool;
}

/// `GET {base_url}/health`, healthy on HTTP 200.
#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    agent: ureq::Agent,
    url: String,
}

impl HttpHealthProbe {
    pub fn new(base_url: &str) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(PROBE_TIMEOUT).build();
        HttpHealthProbe {
            agent,
            url: format!("{}/health", base_url.trim_end_matches('/')),
        }
    }

    pub fn for_port(port: u16) -> Self {
        Self::new(&format!("http://localhost:{port}"))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl HealthProbe for HttpHealthProbe {
    fn check(&self) -> bool {
        match self.agent.get(&self.url).call() {
            Ok(resp) => resp.status() == 200,
            Err(ureq::Error::Status(code, _)) => {
                debug!(url = %self.url, status = code, "Health probe returned error status");
                false
            }
            Err(err) => {
                debug!(url = %self.url, error = %err, "Health probe failed");
                false
            }
        }
    }
}
