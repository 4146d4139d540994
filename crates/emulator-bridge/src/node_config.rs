//! Selenium Grid node configuration
//!
//! The JSON descriptor Appium hands to the hub when it registers as a
//! grid node. It is regenerated on every launch.

use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tracing::{info, warn};

/// Proxy class the hub uses for the node
pub const DEFAULT_REMOTE_PROXY: &str = "org.openqa.grid.selenium.proxy.DefaultRemoteProxy";

/// Base path the Appium server is mounted on
pub const WD_HUB_PATH: &str = "/wd/hub";

/// Node config errors
#[derive(Debug, thiserror::Error)]
pub enum NodeConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Inputs for one node registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRegistration {
    pub android_version: String,
    pub avd_name: String,
    pub browser_name: String,
    pub appium_host: String,
    pub appium_port: u16,
    pub selenium_host: String,
    pub selenium_port: u16,
    /// Session timeout in seconds
    pub selenium_timeout: u32,
}

/// One advertised capability set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    pub platform: String,
    pub platform_name: String,
    pub version: String,
    pub browser_name: String,
    pub device_name: String,
    pub max_instances: u32,
}

/// Proxy registration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfiguration {
    pub clean_up_cycle: u32,
    pub timeout: u32,
    pub proxy: String,
    pub url: String,
    pub host: String,
    pub port: u16,
    pub max_session: u32,
    pub register: bool,
    pub register_cycle: u32,
    pub hub_host: String,
    pub hub_port: u16,
    pub unregister_if_still_down_after: u32,
}

/// Complete node config document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub capabilities: Vec<Capability>,
    pub configuration: NodeConfiguration,
}

impl NodeConfig {
    pub fn new(registration: &NodeRegistration) -> Self {
        let capability = Capability {
            platform: "Android".to_string(),
            platform_name: "Android".to_string(),
            version: registration.android_version.clone(),
            browser_name: registration.browser_name.clone(),
            device_name: registration.avd_name.clone(),
            max_instances: 1,
        };

        let configuration = NodeConfiguration {
            clean_up_cycle: 2000,
            timeout: registration.selenium_timeout,
            proxy: DEFAULT_REMOTE_PROXY.to_string(),
            url: format!(
                "http://{}:{}{}",
                registration.appium_host, registration.appium_port, WD_HUB_PATH
            ),
            host: registration.appium_host.clone(),
            port: registration.appium_port,
            max_session: 6,
            register: true,
            register_cycle: 5000,
            hub_host: registration.selenium_host.clone(),
            hub_port: registration.selenium_port,
            unregister_if_still_down_after: 120_000,
        };

        Self {
            capabilities: vec![capability],
            configuration,
        }
    }

    /// Write to `path`, replacing any previous file
    pub async fn write(&self, path: &Path) -> Result<(), NodeConfigError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

/// Build the node config for `registration` and write it to `path`
pub async fn create_node_config(
    path: &Path,
    registration: &NodeRegistration,
) -> Result<NodeConfig, NodeConfigError> {
    let config = NodeConfig::new(registration);
    info!("Appium node config: {}", serde_json::to_string(&config)?);
    config.write(path).await?;
    Ok(config)
}

/// Local address the hub can reach this node on.
///
/// Connecting a UDP socket only selects a route; nothing is sent.
pub async fn local_address_towards(host: &str, port: u16) -> Option<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await.ok()?;
    socket.connect((host, port)).await.ok()?;
    socket
        .local_addr()
        .ok()
        .map(|addr| addr.ip())
        .filter(|ip| !ip.is_unspecified())
}

/// Host to advertise to the hub, falling back to loopback
pub async fn advertised_host(hub_host: &str, hub_port: u16) -> String {
    match local_address_towards(hub_host, hub_port).await {
        Some(ip) => ip.to_string(),
        None => {
            warn!(
                "Could not determine local address towards {}:{}, using 127.0.0.1",
                hub_host, hub_port
            );
            Ipv4Addr::LOCALHOST.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registration() -> NodeRegistration {
        NodeRegistration {
            android_version: "11.0".into(),
            avd_name: "nexus_5_11.0".into(),
            browser_name: "android".into(),
            appium_host: "10.0.0.7".into(),
            appium_port: 4723,
            selenium_host: "172.17.0.1".into(),
            selenium_port: 4444,
            selenium_timeout: 30,
        }
    }

    #[test]
    fn test_document_shape() {
        let value = serde_json::to_value(NodeConfig::new(&registration())).unwrap();

        let capability = &value["capabilities"][0];
        assert_eq!(capability["platform"], "Android");
        assert_eq!(capability["platformName"], "Android");
        assert_eq!(capability["version"], "11.0");
        assert_eq!(capability["browserName"], "android");
        assert_eq!(capability["deviceName"], "nexus_5_11.0");
        assert_eq!(capability["maxInstances"], 1);

        let configuration = &value["configuration"];
        assert_eq!(configuration["cleanUpCycle"], 2000);
        assert_eq!(configuration["timeout"], 30);
        assert_eq!(configuration["proxy"], DEFAULT_REMOTE_PROXY);
        assert_eq!(configuration["url"], "http://10.0.0.7:4723/wd/hub");
        assert_eq!(configuration["host"], "10.0.0.7");
        assert_eq!(configuration["port"], 4723);
        assert_eq!(configuration["maxSession"], 6);
        assert_eq!(configuration["register"], true);
        assert_eq!(configuration["registerCycle"], 5000);
        assert_eq!(configuration["hubHost"], "172.17.0.1");
        assert_eq!(configuration["hubPort"], 4444);
        assert_eq!(configuration["unregisterIfStillDownAfter"], 120000);
    }

    #[tokio::test]
    async fn test_create_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("src").join("nodeconfig.json");

        create_node_config(&path, &registration()).await.unwrap();

        let mut second = registration();
        second.avd_name = "pixel_4_12.0".into();
        create_node_config(&path, &second).await.unwrap();

        let written: NodeConfig =
            serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
        assert_eq!(written.capabilities.len(), 1);
        assert_eq!(written.capabilities[0].device_name, "pixel_4_12.0");
        assert_eq!(written, NodeConfig::new(&second));
    }

    #[tokio::test]
    async fn test_advertised_host_is_an_address() {
        let host = advertised_host("127.0.0.1", 4444).await;
        assert!(host.parse::<IpAddr>().is_ok());
    }

    #[tokio::test]
    async fn test_unresolvable_hub_falls_back_to_loopback() {
        assert_eq!(local_address_towards("hub.invalid", 4444).await, None);
        assert_eq!(advertised_host("hub.invalid", 4444).await, "127.0.0.1");
    }
}
