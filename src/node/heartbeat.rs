//! Heartbeats from a storage node to the coordinator

use crate::common::Result;
use crate::Error;
use std::time::Duration;

#[derive(Clone)]
pub struct Heartbeat {
    client: reqwest::Client,
    register_url: String,
    port: u16,
}

impl Heartbeat {
    /// `port` is the port the coordinator should reach this node on
    pub fn new(coordinator_url: &str, port: u16, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            register_url: format!("{}/register", coordinator_url.trim_end_matches('/')),
            port,
        })
    }

    /// Register (or refresh) this node once
    pub async fn send(&self) -> Result<()> {
        let response = self
            .client
            .get(&self.register_url)
            .query(&[("port", self.port)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Http(format!(
                "coordinator answered {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Send a heartbeat every `interval`, forever. Failures are logged only.
    pub async fn run(self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut registered = false;

        loop {
            ticker.tick().await;
            match self.send().await {
                Ok(()) => {
                    if !registered {
                        tracing::info!(url = %self.register_url, port = self.port, "Registered with coordinator");
                        registered = true;
                    }
                }
                Err(e) => {
                    tracing::warn!(url = %self.register_url, error = %e, "Heartbeat failed");
                    registered = false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_url() {
        let hb = Heartbeat::new("http://127.0.0.1:5000/", 6000, Duration::from_secs(1)).unwrap();
        assert_eq!(hb.register_url, "http://127.0.0.1:5000/register");
    }

    #[tokio::test]
    async fn test_send_to_closed_port_fails() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let hb = Heartbeat::new(&format!("http://{}", addr), 6000, Duration::from_secs(1)).unwrap();
        assert!(hb.send().await.is_err());
    }
}
