// ABOUTME: Builder exposed for public usage of the library
// ABOUTME: Collects device identity and roles into the join handshake

use crate::error::Error;
use crate::protocol::client::ProtocolClient;
use crate::protocol::messages::{ClientJoin, DeviceInfo};
use typed_builder::TypedBuilder;

/// Protocol version sent on join.
pub const PROTOCOL_VERSION: u32 = 1;

#[derive(TypedBuilder, Clone)]
#[builder(build_method(into = ProtocolClientBuilder))]
/// Builder Class for ProtocolClient
pub struct ProtocolClientBuilderFields {
    device_id: String,
    name: String,
    #[builder(default = None, setter(strip_option))]
    product_name: Option<String>,
    #[builder(default = None, setter(strip_option))]
    manufacturer: Option<String>,
    #[builder(default = None, setter(strip_option))]
    software_version: Option<String>,
    /// Peer can capture and broadcast the live feed
    #[builder(default = false)]
    live_source: bool,
}

impl From<ProtocolClientBuilderFields> for ProtocolClientBuilder {
    fn from(fields: ProtocolClientBuilderFields) -> Self {
        // Every peer plays; capturing peers also announce the source role
        let mut supported_roles = vec!["player@v1".to_string()];
        if fields.live_source {
            supported_roles.push("source@v1".to_string());
        }

        ProtocolClientBuilder {
            device_id: fields.device_id,
            name: fields.name,
            product_name: fields.product_name,
            manufacturer: fields.manufacturer,
            software_version: fields.software_version,
            supported_roles,
        }
    }
}

/// Builder Class for ProtocolClient
#[derive(Clone)]
pub struct ProtocolClientBuilder {
    device_id: String,
    name: String,
    product_name: Option<String>,
    manufacturer: Option<String>,
    software_version: Option<String>,
    supported_roles: Vec<String>,
}

impl ProtocolClientBuilder {
    /// Create a new builder
    pub fn builder() -> ProtocolClientBuilderFieldsBuilder {
        ProtocolClientBuilderFields::builder()
    }

    /// Get the supported roles that will be sent in the join message
    pub fn supported_roles(&self) -> &[String] {
        &self.supported_roles
    }

    /// Join message this builder will send
    pub fn join_message(&self) -> ClientJoin {
        ClientJoin {
            device_id: self.device_id.clone(),
            name: self.name.clone(),
            version: PROTOCOL_VERSION,
            supported_roles: self.supported_roles.clone(),
            device_info: Some(DeviceInfo {
                product_name: self.product_name.clone(),
                manufacturer: Some(
                    self.manufacturer
                        .clone()
                        .unwrap_or_else(|| "peersync".to_string()),
                ),
                software_version: self.software_version.clone(),
            }),
        }
    }

    /// Connect to the coordinator
    pub async fn connect(self, url: &str) -> Result<ProtocolClient, Error> {
        ProtocolClient::connect(url, self.join_message()).await
    }
}
