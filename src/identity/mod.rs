//! # Device Identity
//!
//! Every frame sent to the crop service carries a device id: a device UUID
//! derived from the user agent concatenated with a browser fingerprint, with
//! hyphens removed. Both halves are computed once per coordinator.

pub mod session;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::Size;
use crate::error::LensResult;

pub use session::{HttpSessionValidator, SessionValidator};

/// Host traits that identify a device.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceTraits {
    pub user_agent: String,
    pub platform: String,
    pub language: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub timezone_offset_min: i32,
    pub hardware_concurrency: u32,
}

impl DeviceTraits {
    pub fn screen(&self) -> Size {
        Size {
            w: self.screen_width,
            h: self.screen_height,
        }
    }

    /// Desktop screens are wider than tall.
    pub fn is_desktop(&self) -> bool {
        self.screen_width > self.screen_height
    }
}

/// Produces a stable visitor id for a device.
#[async_trait]
pub trait Fingerprinter: Send + Sync {
    async fn fingerprint(&self, traits: &DeviceTraits) -> LensResult<String>;
}

/// Name-based hash of every device trait.
#[derive(Debug, Default, Clone, Copy)]
pub struct TraitsFingerprinter;

#[async_trait]
impl Fingerprinter for TraitsFingerprinter {
    async fn fingerprint(&self, traits: &DeviceTraits) -> LensResult<String> {
        let canonical = serde_json::to_string(traits)?;
        Ok(Uuid::new_v5(&Uuid::NAMESPACE_OID, canonical.as_bytes())
            .simple()
            .to_string())
    }
}

/// The pair of identifiers attached to a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub device_uuid: String,
    pub fingerprint: String,
    pub user_agent: String,
}

impl DeviceIdentity {
    pub async fn resolve(traits: &DeviceTraits, fingerprinter: &dyn Fingerprinter) -> LensResult<Self> {
        Ok(Self {
            device_uuid: device_uuid(traits),
            fingerprint: fingerprinter.fingerprint(traits).await?,
            user_agent: traits.user_agent.clone(),
        })
    }

    /// Identity header value for the crop socket.
    pub fn device_id(&self) -> String {
        device_id(&self.device_uuid, &self.fingerprint)
    }

    pub fn data(&self) -> DeviceData {
        DeviceData {
            device_uuid: self.device_uuid.clone(),
            fingerprint: self.fingerprint.clone(),
            device_id: self.device_id(),
            user_agent: self.user_agent.clone(),
        }
    }
}

/// Device UUID from the user agent and screen.
pub fn device_uuid(traits: &DeviceTraits) -> String {
    let name = format!(
        "{}|{}x{}|{}",
        traits.user_agent, traits.screen_width, traits.screen_height, traits.platform
    );
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
}

/// Concatenate UUID and fingerprint and strip hyphens.
pub fn device_id(device_uuid: &str, fingerprint: &str) -> String {
    format!("{}{}", device_uuid, fingerprint).replace('-', "")
}

/// Fingerprint bundle reported to the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeviceData {
    pub device_uuid: String,
    pub fingerprint: String,
    pub device_id: String,
    pub user_agent: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phone() -> DeviceTraits {
        DeviceTraits {
            user_agent: "Mozilla/5.0 (iPhone) AppleWebKit/605.1.15".into(),
            screen_width: 390,
            screen_height: 844,
            ..Default::default()
        }
    }

    #[test]
    fn device_id_strips_hyphens() {
        assert_eq!(device_id("ab-cd-ef", "12-34"), "abcdef1234");
    }

    #[test]
    fn device_uuid_is_stable() {
        assert_eq!(device_uuid(&phone()), device_uuid(&phone()));
        let mut other = phone();
        other.screen_width = 391;
        assert_ne!(device_uuid(&phone()), device_uuid(&other));
    }

    #[test]
    fn desktop_detection() {
        assert!(!phone().is_desktop());
        let desk = DeviceTraits {
            screen_width: 1920,
            screen_height: 1080,
            ..Default::default()
        };
        assert!(desk.is_desktop());
    }

    #[tokio::test]
    async fn identity_has_no_hyphens_in_device_id() {
        let id = DeviceIdentity::resolve(&phone(), &TraitsFingerprinter).await.unwrap();
        assert!(!id.device_id().contains('-'));
        assert_eq!(id.device_id().len(), 64);
        assert_eq!(id.data().user_agent, phone().user_agent);
    }
}
