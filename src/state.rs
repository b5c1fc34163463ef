// SPDX-License-Identifier: MIT
use std::sync::Arc;

use portal_artifacts::ArtifactStore;
use portal_bridge::BridgeManager;
use portal_notify::NotificationQueue;
use portal_registry::Registry;
use portal_scheduler::Scheduler;
use portal_spawner::Spawner;
use portal_vault::CredentialVault;

/// Everything the CLI and the reference websocket listener share. Built
/// once at startup in [`crate::assemble`].
pub struct AppState {
    pub vault: Arc<CredentialVault>,
    pub bridges: Arc<BridgeManager>,
    pub registry: Arc<Registry>,
    pub artifacts: Arc<ArtifactStore>,
    pub notifications: Arc<NotificationQueue>,
    pub spawner: Arc<Spawner>,
    pub scheduler: Arc<Scheduler>,
}
