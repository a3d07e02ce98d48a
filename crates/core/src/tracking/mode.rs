//! Acquisition mode selection
//!
//! `select_mode` is pure and deterministic for given inputs; the runtime
//! degrade ladder is one-directional and never promotes without a fresh
//! `initialize()` and permission re-check. This avoids flapping between
//! sources under transient failure.

use stridearc_domain::{AcquisitionMode, PermissionSet, PermissionStatus, TrackingConfig};

/// Pick the single active acquisition mode from current permissions and
/// configuration. Priority order, first match wins:
///
/// 1. Health source enabled and authorized → Primary
/// 2. Motion source enabled and authorized → Secondary
/// 3. Either permission undetermined → Manual (the user has not been asked
///    yet, so don't hard-disable)
/// 4. Either permission authorized (source disabled or driver failed) →
///    Manual (degrade gracefully)
/// 5. Otherwise → Disabled
pub fn select_mode(permissions: &PermissionSet, config: &TrackingConfig) -> AcquisitionMode {
    if config.health_source_enabled && permissions.health == PermissionStatus::Authorized {
        return AcquisitionMode::Primary;
    }
    if config.motion_source_enabled && permissions.motion == PermissionStatus::Authorized {
        return AcquisitionMode::Secondary;
    }
    if permissions.any_undetermined() {
        return AcquisitionMode::Manual;
    }
    if permissions.any_authorized() {
        return AcquisitionMode::Manual;
    }
    AcquisitionMode::Disabled
}

/// One rung down the degrade ladder. `Disabled` is terminal.
pub fn demote(mode: AcquisitionMode) -> AcquisitionMode {
    match mode {
        AcquisitionMode::Primary => AcquisitionMode::Secondary,
        AcquisitionMode::Secondary => AcquisitionMode::Manual,
        AcquisitionMode::Manual | AcquisitionMode::Disabled => AcquisitionMode::Disabled,
    }
}
