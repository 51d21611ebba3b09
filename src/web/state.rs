//! # Web API Application State
//!
//! Shared state handed to every request handler: the three workflow
//! components, the record stores and the service identity.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::events::ActivityLog;
use crate::execution::BackgroundDispatcher;
use crate::namespace::NamespaceTranslator;
use crate::orchestration::{MembershipSync, MetadataSync, RemoteServices, SpaceProvisioner};
use crate::store::RecordStores;

#[derive(Clone, Debug)]
pub struct AppState {
    pub provisioner: SpaceProvisioner,
    pub membership: MembershipSync,
    pub metadata: MetadataSync,
    pub stores: RecordStores,
    pub version: String,
    /// Pending spaces younger than this are left alone by reconciliation
    pub reconcile_grace: Duration,
}

impl AppState {
    /// Wire the workflows over the given collaborators
    pub fn new(
        settings: &Settings,
        services: RemoteServices,
        stores: RecordStores,
        dispatcher: BackgroundDispatcher,
        activity: ActivityLog,
    ) -> Self {
        let namespace = NamespaceTranslator::from_settings(settings);

        let provisioner = SpaceProvisioner::new(
            services.clone(),
            Arc::clone(&stores.spaces),
            namespace.clone(),
            dispatcher.clone(),
            activity.clone(),
        );
        let membership = MembershipSync::new(
            services.clone(),
            Arc::clone(&stores.spaces),
            namespace.clone(),
            dispatcher,
        );
        let metadata = MetadataSync::new(services, Arc::clone(&stores.metadata), namespace, activity);

        Self {
            provisioner,
            membership,
            metadata,
            stores,
            version: settings.version.clone(),
            reconcile_grace: Duration::from_secs(settings.reconciliation.pending_grace_seconds),
        }
    }
}
