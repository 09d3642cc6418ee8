use std::net::IpAddr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Default Cast control port.
pub const DEFAULT_CAST_PORT: u16 = 8009;

/// Service identifier attached to every Cast description.
pub const CAST_SERVICE_ID: &str = "Chromecast";

/// Stable identity of a Cast receiver (the `id` TXT record).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Platform handle on a Cast receiver, as reported by route discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastDeviceInfo {
    pub device_id: DeviceId,
    pub friendly_name: String,
    pub model_name: Option<String>,
    pub ip_address: Option<IpAddr>,
    pub port: u16,
    pub device_version: Option<String>,
}

impl CastDeviceInfo {
    pub fn new(device_id: &str, friendly_name: &str) -> Self {
        Self {
            device_id: DeviceId(device_id.to_string()),
            friendly_name: friendly_name.to_string(),
            model_name: None,
            ip_address: None,
            port: DEFAULT_CAST_PORT,
            device_version: None,
        }
    }

    pub fn with_address(mut self, ip: IpAddr, port: u16) -> Self {
        self.ip_address = Some(ip);
        self.port = port;
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model_name = Some(model.to_string());
        self
    }
}

/// Description of a discovered Cast service.
///
/// Descriptions are values: an update replaces the stored description,
/// sessions keep their own copy.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDescription {
    uuid: String,
    service_id: String,
    friendly_name: String,
    model_name: Option<String>,
    manufacturer: Option<String>,
    ip_address: Option<IpAddr>,
    port: u16,
    device: Option<CastDeviceInfo>,
    last_detection: SystemTime,
}

impl ServiceDescription {
    pub fn from_device(device: CastDeviceInfo) -> Self {
        Self {
            uuid: device.device_id.0.clone(),
            service_id: CAST_SERVICE_ID.to_string(),
            friendly_name: device.friendly_name.clone(),
            model_name: device.model_name.clone(),
            manufacturer: Some("Google Inc.".to_string()),
            ip_address: device.ip_address,
            port: device.port,
            device: Some(device),
            last_detection: SystemTime::now(),
        }
    }

    /// A description with no Cast device attached. Sessions built on it
    /// fail to connect.
    pub fn without_device(uuid: &str, friendly_name: &str) -> Self {
        Self {
            uuid: uuid.to_string(),
            service_id: CAST_SERVICE_ID.to_string(),
            friendly_name: friendly_name.to_string(),
            model_name: None,
            manufacturer: None,
            ip_address: None,
            port: DEFAULT_CAST_PORT,
            device: None,
            last_detection: SystemTime::now(),
        }
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model_name.as_deref()
    }

    pub fn manufacturer(&self) -> Option<&str> {
        self.manufacturer.as_deref()
    }

    pub fn ip_address(&self) -> Option<IpAddr> {
        self.ip_address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn device(&self) -> Option<&CastDeviceInfo> {
        self.device.as_ref()
    }

    pub fn last_detection(&self) -> SystemTime {
        self.last_detection
    }

    /// True when both descriptions advertise the same receiver data,
    /// ignoring the detection time.
    pub fn same_advertisement(&self, other: &ServiceDescription) -> bool {
        self.uuid == other.uuid
            && self.friendly_name == other.friendly_name
            && self.model_name == other.model_name
            && self.ip_address == other.ip_address
            && self.port == other.port
            && self.device == other.device
    }
}

/// Caller-owned configuration persisted per service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub service_uuid: String,
    pub connected: bool,
    pub last_detected: Option<SystemTime>,
    pub pairing_key: Option<String>,
}

impl ServiceConfig {
    pub fn for_service(description: &ServiceDescription) -> Self {
        Self {
            service_uuid: description.uuid().to_string(),
            connected: false,
            last_detected: Some(description.last_detection()),
            pairing_key: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LaunchSessionType {
    App,
    Media,
    WebApp,
}

/// Identifies an application running on a receiver, as returned by a
/// launch or join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSession {
    pub app_id: String,
    pub app_name: Option<String>,
    pub session_id: String,
    pub session_type: LaunchSessionType,
    pub service_uuid: String,
}

impl LaunchSession {
    pub fn for_app(app_id: &str, session_type: LaunchSessionType, service_uuid: &str) -> Self {
        Self {
            app_id: app_id.to_string(),
            app_name: None,
            session_id: String::new(),
            session_type,
            service_uuid: service_uuid.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn living_room() -> CastDeviceInfo {
        CastDeviceInfo::new("abc123", "Living Room")
            .with_address(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)), 8009)
            .with_model("Chromecast Audio")
    }

    #[test]
    fn test_description_copies_device_identity() {
        let desc = ServiceDescription::from_device(living_room());
        assert_eq!(desc.uuid(), "abc123");
        assert_eq!(desc.service_id(), CAST_SERVICE_ID);
        assert_eq!(desc.friendly_name(), "Living Room");
        assert_eq!(desc.model_name(), Some("Chromecast Audio"));
        assert_eq!(desc.port(), 8009);
        assert_eq!(desc.device().map(|d| d.device_id.as_str()), Some("abc123"));
    }

    #[test]
    fn test_same_advertisement_ignores_detection_time() {
        let a = ServiceDescription::from_device(living_room());
        let b = ServiceDescription::from_device(living_room());
        assert!(a.same_advertisement(&b));

        let mut renamed = living_room();
        renamed.friendly_name = "Kitchen".to_string();
        assert!(!a.same_advertisement(&ServiceDescription::from_device(renamed)));
    }

    #[test]
    fn test_service_config_persists_pairing_key() {
        let mut config = ServiceConfig::for_service(&ServiceDescription::from_device(living_room()));
        config.pairing_key = Some("k".to_string());
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: ServiceConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.service_uuid, "abc123");
        assert_eq!(parsed.pairing_key.as_deref(), Some("k"));
    }
}
