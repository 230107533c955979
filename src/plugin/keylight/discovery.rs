//! Finding a Key Light: configured hosts when given, mDNS otherwise.
//!
//! Lights announce themselves as `_elg._tcp`. Only the first light that
//! resolves is used.

use super::client::KeyLight;
use crate::error::{DeckError, Result};
use futures::future::join_all;
use futures::stream::{self, BoxStream, StreamExt};
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

pub const SERVICE_TYPE: &str = "_elg._tcp.local.";

/// Where a light was announced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightAddress {
    /// Host part of the URL; IPv6 addresses are bracketed.
    pub host: String,
    pub port: u16,
}

/// Source of light announcements on the local network.
pub trait LightBrowser: Send + Sync {
    /// Start browsing. The stream yields lights as they resolve.
    ///
    /// # Errors
    /// Fails if browsing cannot be started.
    fn browse(&self) -> Result<BoxStream<'static, LightAddress>>;

    /// End the browse started by [`LightBrowser::browse`].
    fn stop(&self) {}
}

/// Browses with a multicast DNS daemon running on its own thread.
pub struct MdnsBrowser {
    daemon: ServiceDaemon,
}

impl MdnsBrowser {
    /// # Errors
    /// Returns `DeckError::Discovery` if the mDNS socket cannot be opened.
    pub fn new() -> Result<Self> {
        let daemon = ServiceDaemon::new().map_err(|e| DeckError::Discovery(e.to_string()))?;
        Ok(Self { daemon })
    }
}

impl LightBrowser for MdnsBrowser {
    fn browse(&self) -> Result<BoxStream<'static, LightAddress>> {
        let events = self
            .daemon
            .browse(SERVICE_TYPE)
            .map_err(|e| DeckError::Discovery(e.to_string()))?;

        let resolved = stream::unfold(events, |events| async move {
            let event = events.recv_async().await.ok()?;
            Some((event, events))
        })
        .filter_map(|event| async move {
            match event {
                ServiceEvent::ServiceResolved(info) => resolved_address(&info),
                _ => None,
            }
        });

        Ok(resolved.boxed())
    }

    fn stop(&self) {
        if let Err(e) = self.daemon.stop_browse(SERVICE_TYPE) {
            debug!("stopping mDNS browse failed: {e}");
        }
    }
}

impl Drop for MdnsBrowser {
    fn drop(&mut self) {
        let _ = self.daemon.shutdown();
    }
}

fn resolved_address(info: &ServiceInfo) -> Option<LightAddress> {
    let addresses = info.get_addresses();
    let ip = addresses
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addresses.iter().next())?;
    debug!("{} resolved to {ip}", info.get_fullname());
    Some(LightAddress {
        host: url_host(*ip),
        port: info.get_port(),
    })
}

fn url_host(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{v6}]"),
    }
}

/// How the plugin looks for its light.
pub enum Discovery {
    /// Ask these hosts directly, all on the same port.
    Hosts { hosts: Vec<String>, port: u16 },
    /// Wait for an announcement.
    Browse(Box<dyn LightBrowser>),
}

impl Discovery {
    /// One discovery round bounded by `timeout`. The light returned has
    /// answered a state request.
    pub async fn find(&self, http: &reqwest::Client, timeout: Duration) -> Option<KeyLight> {
        match self {
            Self::Hosts { hosts, port } => query_hosts(http, hosts, *port, timeout).await,
            Self::Browse(browser) => browse_first(http, browser.as_ref(), timeout).await,
        }
    }
}

/// Query every host at once and keep the first one, in configured order,
/// that answers within `timeout`.
pub async fn query_hosts(
    http: &reqwest::Client,
    hosts: &[String],
    port: u16,
    timeout: Duration,
) -> Option<KeyLight> {
    let queries = hosts.iter().map(|host| async move {
        let light = KeyLight::new(http.clone(), host, port);
        match tokio::time::timeout(timeout, light.fetch_group()).await {
            Ok(Ok(group)) => {
                debug!(url = light.url(), "found {} lights", group.number_of_lights);
                Some(light)
            }
            Ok(Err(e)) => {
                debug!(url = light.url(), "no Key Light: {e}");
                None
            }
            Err(_) => {
                debug!(url = light.url(), "no Key Light: timed out");
                None
            }
        }
    });

    join_all(queries).await.into_iter().flatten().next()
}

/// Take the first light announced within `timeout` and check that it
/// answers. Later announcements are ignored.
pub async fn browse_first(
    http: &reqwest::Client,
    browser: &dyn LightBrowser,
    timeout: Duration,
) -> Option<KeyLight> {
    let mut announced = match browser.browse() {
        Ok(announced) => announced,
        Err(e) => {
            debug!("cannot browse for Key Lights: {e}");
            return None;
        }
    };
    let first = tokio::time::timeout(timeout, announced.next())
        .await
        .ok()
        .flatten();
    drop(announced);
    browser.stop();

    let Some(address) = first else {
        debug!("no Key Light announced within {timeout:?}");
        return None;
    };

    let light = KeyLight::new(http.clone(), &address.host, address.port);
    match light.fetch_group().await {
        Ok(_) => Some(light),
        Err(e) => {
            debug!(url = light.url(), "announced Key Light does not answer: {e}");
            None
        }
    }
}
