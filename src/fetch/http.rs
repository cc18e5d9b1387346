use super::{MeshTransport, TransportError, TransportFuture, TransportResult};
use bytes::Bytes;
use futures_util::FutureExt;
use std::io::Read;
use url::Url;

/// Blocking `ureq` agent driven from tokio's blocking pool.
#[derive(Clone)]
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshTransport for HttpTransport {
    fn label(&self) -> &'static str {
        "HTTP Transport"
    }

    fn get(&self, url: &Url) -> TransportFuture {
        let agent = self.agent.clone();
        let url = url.to_string();
        async move {
            tokio::task::spawn_blocking(move || fetch_blocking(&agent, &url))
                .await
                .map_err(|err| TransportError::Task(err.to_string()))?
        }
        .boxed()
    }
}

fn fetch_blocking(agent: &ureq::Agent, url: &str) -> TransportResult<Bytes> {
    let response = agent.get(url).call().map_err(|err| match err {
        ureq::Error::Status(code, _) => TransportError::Status(code),
        ureq::Error::Transport(transport) => TransportError::Other(transport.to_string()),
    })?;
    let mut body = Vec::new();
    response.into_reader().read_to_end(&mut body)?;
    Ok(Bytes::from(body))
}
