// ABOUTME: Control endpoint selection from service discovery events
// ABOUTME: Tracks advertised coordinators and keeps one selected until it disappears

use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};

/// Service type coordinators advertise.
pub const SERVICE_TYPE: &str = "_peersync._tcp.";

/// Default WebSocket path on a coordinator.
pub const DEFAULT_WS_PATH: &str = "/peersync";

/// An advertised coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    /// Advertised instance name
    pub name: String,
    /// Resolved address
    pub address: IpAddr,
    /// Resolved port
    pub port: u16,
}

impl ServiceEndpoint {
    /// Socket address of the service
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    /// WebSocket URL for `path` on this endpoint
    pub fn ws_url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("ws://{}/{}", self.socket_addr(), path)
    }
}

/// Known coordinators and the one currently selected.
///
/// The first service found is selected and kept while it is advertised.
/// When it is lost the next known service, by name, takes over.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: BTreeMap<String, ServiceEndpoint>,
    selected: Option<String>,
}

impl ServiceRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a resolved service. Returns the endpoint if it became selected.
    pub fn service_found(
        &mut self,
        name: impl Into<String>,
        address: IpAddr,
        port: u16,
    ) -> Option<&ServiceEndpoint> {
        let name = name.into();
        log::debug!("Service found: {} at {}:{}", name, address, port);
        self.services.insert(
            name.clone(),
            ServiceEndpoint {
                name: name.clone(),
                address,
                port,
            },
        );

        if self.selected.is_none() {
            log::info!("Selected control endpoint {}", name);
            self.selected = Some(name.clone());
            return self.services.get(&name);
        }
        None
    }

    /// Forget a service. Returns true if the selection changed.
    pub fn service_lost(&mut self, name: &str) -> bool {
        if self.services.remove(name).is_none() {
            return false;
        }
        log::debug!("Service lost: {}", name);
        if self.selected.as_deref() != Some(name) {
            return false;
        }

        self.selected = self.services.keys().next().cloned();
        match &self.selected {
            Some(next) => log::info!("Control endpoint {} lost, switching to {}", name, next),
            None => log::warn!("Control endpoint {} lost, none left", name),
        }
        true
    }

    /// Currently selected endpoint
    pub fn current(&self) -> Option<&ServiceEndpoint> {
        self.selected
            .as_ref()
            .and_then(|name| self.services.get(name))
    }

    /// Number of known services
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether no service is known
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
