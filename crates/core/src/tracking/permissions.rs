//! Permission gate
//!
//! Pure adapter collapsing the two platform permission APIs into one
//! uniform tri-state snapshot. No state machine of its own: every call
//! re-queries the gateways.

use std::sync::Arc;

use stridearc_domain::{PermissionSet, PermissionStatus};
use tracing::warn;

use crate::tracking::ports::{HealthDataGateway, MotionSensorGateway};

/// Wraps platform permission queries for both data sources.
pub struct PermissionGate {
    health: Option<Arc<dyn HealthDataGateway>>,
    motion: Option<Arc<dyn MotionSensorGateway>>,
}

impl PermissionGate {
    pub fn new(
        health: Option<Arc<dyn HealthDataGateway>>,
        motion: Option<Arc<dyn MotionSensorGateway>>,
    ) -> Self {
        Self { health, motion }
    }

    /// Snapshot both permissions without prompting.
    ///
    /// A missing gateway reads as denied (the capability does not exist on
    /// this device); a query failure reads as undetermined so a transient
    /// platform error never hard-disables tracking.
    pub async fn query(&self) -> PermissionSet {
        let health = match &self.health {
            Some(gateway) => match gateway.authorization_status().await {
                Ok(status) => status,
                Err(err) => {
                    warn!(error = %err, "Health permission query failed");
                    PermissionStatus::Undetermined
                }
            },
            None => PermissionStatus::Denied,
        };

        let motion = match &self.motion {
            Some(gateway) if gateway.is_available() => {
                match gateway.authorization_status().await {
                    Ok(status) => status,
                    Err(err) => {
                        warn!(error = %err, "Motion permission query failed");
                        PermissionStatus::Undetermined
                    }
                }
            }
            _ => PermissionStatus::Denied,
        };

        PermissionSet::new(health, motion)
    }

    /// Prompt the user for whichever permissions are still undetermined and
    /// return the resulting snapshot. User-interaction-bound: may suspend
    /// indefinitely until the dialog is answered.
    pub async fn request(&self) -> PermissionSet {
        let current = self.query().await;

        let health = match (&self.health, current.health) {
            (Some(gateway), PermissionStatus::Undetermined) => {
                match gateway.request_authorization().await {
                    Ok(status) => status,
                    Err(err) => {
                        warn!(error = %err, "Health permission request failed");
                        PermissionStatus::Undetermined
                    }
                }
            }
            _ => current.health,
        };

        let motion = match (&self.motion, current.motion) {
            (Some(gateway), PermissionStatus::Undetermined) => {
                match gateway.request_authorization().await {
                    Ok(status) => status,
                    Err(err) => {
                        warn!(error = %err, "Motion permission request failed");
                        PermissionStatus::Undetermined
                    }
                }
            }
            _ => current.motion,
        };

        PermissionSet::new(health, motion)
    }
}
