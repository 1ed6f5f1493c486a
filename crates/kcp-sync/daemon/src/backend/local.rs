//! Local cluster store backed by ConfigMaps

use super::store_error;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use k8s_openapi::api::core::v1::{ConfigMap, ObjectReference};
use kcp_sync_controller::{EventType, LocalStore, ObjectEvent, StoreResult, WatchEvent};
use kcp_sync_types::{LocalObject, ObjectKey};
use kube::runtime::events::{Event, EventType as KubeEventType, Recorder, Reporter};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client};
use tracing::debug;

/// Action attached to every published event
const EVENT_ACTION: &str = "Reconciling";

/// ConfigMaps across all namespaces of the local cluster
pub struct KubeLocalStore {
    client: Client,
    recorder: Recorder,
}

impl KubeLocalStore {
    /// Create a store reporting events as `controller`
    pub fn new(client: Client, controller: &str) -> Self {
        let reporter = Reporter {
            controller: controller.to_string(),
            instance: Some(uuid::Uuid::new_v4().to_string()),
        };
        let recorder = Recorder::new(client.clone(), reporter);
        Self { client, recorder }
    }
}

#[async_trait]
impl LocalStore for KubeLocalStore {
    fn watch(&self) -> BoxStream<'static, StoreResult<WatchEvent>> {
        let api: Api<ConfigMap> = Api::all(self.client.clone());

        watcher(api, watcher::Config::default())
            .default_backoff()
            .filter_map(|event| async move {
                match event {
                    Ok(watcher::Event::Apply(cm)) | Ok(watcher::Event::InitApply(cm)) => {
                        Some(Ok(WatchEvent::Applied(local_object(&cm))))
                    }
                    Ok(watcher::Event::Delete(cm)) => Some(Ok(WatchEvent::Deleted(local_object(&cm)))),
                    Ok(watcher::Event::Init) | Ok(watcher::Event::InitDone) => None,
                    Err(e) => Some(Err(kcp_sync_controller::StoreError::Connection(e.to_string()))),
                }
            })
            .boxed()
    }

    async fn get(&self, key: &ObjectKey) -> StoreResult<LocalObject> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &key.namespace);
        let cm = api.get(&key.name).await.map_err(store_error)?;
        Ok(local_object(&cm))
    }

    async fn record_event(&self, object: &LocalObject, event: ObjectEvent) -> StoreResult<()> {
        debug!(object = %object.key(), reason = %event.reason, "Publishing event");

        let event = Event {
            type_: match event.type_ {
                EventType::Normal => KubeEventType::Normal,
                EventType::Warning => KubeEventType::Warning,
            },
            reason: event.reason,
            note: Some(event.note),
            action: EVENT_ACTION.to_string(),
            secondary: None,
        };

        self.recorder
            .publish(&event, &object_reference(object))
            .await
            .map_err(store_error)
    }
}

/// Snapshot the fields the controller looks at
pub fn local_object(cm: &ConfigMap) -> LocalObject {
    let meta = &cm.metadata;
    LocalObject {
        namespace: meta.namespace.clone().unwrap_or_default(),
        name: meta.name.clone().unwrap_or_default(),
        uid: meta.uid.clone(),
        resource_version: meta.resource_version.clone(),
        annotations: meta.annotations.clone().unwrap_or_default(),
        deletion_timestamp: meta.deletion_timestamp.as_ref().map(|t| t.0),
        data: cm.data.clone().unwrap_or_default(),
    }
}

/// Reference to the ConfigMap an object snapshot was taken from
pub fn object_reference(object: &LocalObject) -> ObjectReference {
    ObjectReference {
        api_version: Some("v1".to_string()),
        kind: Some("ConfigMap".to_string()),
        namespace: (!object.namespace.is_empty()).then(|| object.namespace.clone()),
        name: Some(object.name.clone()),
        uid: object.uid.clone(),
        resource_version: object.resource_version.clone(),
        ..Default::default()
    }
}
