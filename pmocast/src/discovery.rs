//! Cast receiver discovery.
//!
//! `CastDiscoveryProvider` registers a route callback with the platform
//! [`RouteRegistrar`] and turns route events into [`ServiceDescription`]s.
//! The found-services map is keyed by Cast device id and only changes from
//! the route callback or from [`CastDiscoveryProvider::reset`]. Listener
//! notifications are posted on the dispatcher and reach the listeners
//! registered when the notification runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dispatcher::Dispatcher;
use crate::errors::CastError;
use crate::model::ServiceDescription;
use crate::platform::{
    CallbackFlags, RouteCallback, RouteInfo, RouteRegistrar, RouteSelector, same_object,
};
use crate::settings::CastSettings;

/// Whether `reset` tells listeners about the services it forgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    #[default]
    Silent,
    NotifyRemoved,
}

pub trait DiscoveryProviderListener: Send + Sync {
    fn on_service_added(&self, service: &ServiceDescription);
    fn on_service_removed(&self, service: &ServiceDescription);

    fn on_service_updated(&self, service: &ServiceDescription) {
        debug!(uuid = service.uuid(), "Unhandled service update");
    }

    fn on_discovery_failed(&self, error: &CastError) {
        warn!("Unhandled discovery failure: {}", error);
    }
}

#[derive(Default)]
struct ProviderState {
    found_services: HashMap<String, ServiceDescription>,
    listeners: Vec<Arc<dyn DiscoveryProviderListener>>,
    running: bool,
}

struct ProviderInner {
    registrar: Arc<dyn RouteRegistrar>,
    selector: RouteSelector,
    flags: CallbackFlags,
    reset_policy: ResetPolicy,
    dispatcher: Dispatcher,
    callback: Arc<dyn RouteCallback>,
    state: Mutex<ProviderState>,
}

enum Notification {
    Added(ServiceDescription),
    Updated(ServiceDescription),
    Removed(ServiceDescription),
    Failed(CastError),
}

#[derive(Clone)]
pub struct CastDiscoveryProvider {
    inner: Arc<ProviderInner>,
}

impl CastDiscoveryProvider {
    pub fn new(
        settings: &CastSettings,
        dispatcher: Dispatcher,
        registrar: Arc<dyn RouteRegistrar>,
    ) -> Self {
        let selector = RouteSelector::for_application(&settings.route_category, &settings.media_app_id);
        let flags = CallbackFlags {
            request_discovery: true,
            perform_active_scan: settings.active_scan,
        };

        let inner = Arc::new_cyclic(|weak: &Weak<ProviderInner>| ProviderInner {
            registrar,
            selector,
            flags,
            reset_policy: settings.reset_policy,
            dispatcher,
            callback: Arc::new(RouteEvents {
                provider: weak.clone(),
            }),
            state: Mutex::new(ProviderState::default()),
        });

        Self { inner }
    }

    /// Builds a provider from a registrar factory. A factory failure means
    /// the platform has no route service and is reported as
    /// [`CastError::Construction`].
    pub fn with_registrar_factory<F>(
        settings: &CastSettings,
        dispatcher: Dispatcher,
        factory: F,
    ) -> Result<Self, CastError>
    where
        F: FnOnce() -> Result<Arc<dyn RouteRegistrar>, CastError>,
    {
        let registrar = factory().map_err(|err| match err {
            CastError::Construction(_) => err,
            other => CastError::construction(other.to_string()),
        })?;
        Ok(Self::new(settings, dispatcher, registrar))
    }

    pub fn start(&self) {
        let inner = &self.inner;
        inner.registrar.remove_callback(&inner.callback);
        match inner
            .registrar
            .add_callback(&inner.selector, inner.callback.clone(), inner.flags)
        {
            Ok(()) => {
                inner.state.lock().unwrap().running = true;
                info!(categories = ?inner.selector.control_categories, "Cast discovery started");
            }
            Err(err) => {
                inner.state.lock().unwrap().running = false;
                warn!("Cast discovery could not start: {}", err);
                self.notify(Notification::Failed(err));
            }
        }
    }

    pub fn stop(&self) {
        self.inner.registrar.remove_callback(&self.inner.callback);
        self.inner.state.lock().unwrap().running = false;
        debug!("Cast discovery stopped");
    }

    /// Stops discovery and forgets every found service.
    pub fn reset(&self) {
        self.stop();
        let forgotten: Vec<ServiceDescription> = {
            let mut state = self.inner.state.lock().unwrap();
            state.found_services.drain().map(|(_, desc)| desc).collect()
        };
        debug!(count = forgotten.len(), "Cast discovery reset");

        if self.inner.reset_policy == ResetPolicy::NotifyRemoved {
            for desc in forgotten {
                self.notify(Notification::Removed(desc));
            }
        }
    }

    pub fn restart(&self) {
        self.stop();
        self.reset();
        self.start();
    }

    /// Re-issues the route query without forgetting found services.
    pub fn rescan(&self) {
        self.stop();
        self.start();
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().unwrap().running
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().unwrap().found_services.is_empty()
    }

    pub fn found_services(&self) -> Vec<ServiceDescription> {
        self.inner
            .state
            .lock()
            .unwrap()
            .found_services
            .values()
            .cloned()
            .collect()
    }

    pub fn service(&self, uuid: &str) -> Option<ServiceDescription> {
        self.inner.state.lock().unwrap().found_services.get(uuid).cloned()
    }

    pub fn add_listener(&self, listener: Arc<dyn DiscoveryProviderListener>) {
        let mut state = self.inner.state.lock().unwrap();
        if !state.listeners.iter().any(|l| same_object(l, &listener)) {
            state.listeners.push(listener);
        }
    }

    pub fn remove_listener(&self, listener: &Arc<dyn DiscoveryProviderListener>) {
        self.inner
            .state
            .lock()
            .unwrap()
            .listeners
            .retain(|l| !same_object(l, listener));
    }

    pub fn listener_count(&self) -> usize {
        self.inner.state.lock().unwrap().listeners.len()
    }

    fn notify(&self, notification: Notification) {
        notify(&self.inner, notification);
    }
}

fn notify(inner: &Arc<ProviderInner>, notification: Notification) {
    let target = Arc::downgrade(inner);
    inner.dispatcher.post(move || {
        let Some(inner) = target.upgrade() else {
            return;
        };
        let listeners = inner.state.lock().unwrap().listeners.clone();
        for listener in listeners {
            match &notification {
                Notification::Added(desc) => listener.on_service_added(desc),
                Notification::Updated(desc) => listener.on_service_updated(desc),
                Notification::Removed(desc) => listener.on_service_removed(desc),
                Notification::Failed(err) => listener.on_discovery_failed(err),
            }
        }
    });
}

/// Route callback registered with the platform. Holds the provider weakly
/// so a registrar that outlives the provider does not keep it alive.
struct RouteEvents {
    provider: Weak<ProviderInner>,
}

impl RouteEvents {
    fn upsert(&self, route: RouteInfo, changed: bool) {
        let Some(inner) = self.provider.upgrade() else {
            return;
        };
        let Some(device) = route.device else {
            debug!(route = %route.id, "Ignoring route without a Cast device");
            return;
        };
        let desc = ServiceDescription::from_device(device);

        let notification = {
            let mut state = inner.state.lock().unwrap();
            let previous = state.found_services.insert(desc.uuid().to_string(), desc.clone());
            match previous {
                None => Some(Notification::Added(desc)),
                Some(old) if changed || !old.same_advertisement(&desc) => {
                    Some(Notification::Updated(desc))
                }
                Some(_) => None,
            }
        };

        match notification {
            Some(notification) => notify(&inner, notification),
            None => debug!(route = %route.id, "Route already known"),
        }
    }
}

impl RouteCallback for RouteEvents {
    fn on_route_added(&self, route: RouteInfo) {
        debug!(route = %route.id, name = %route.name, "Route added");
        self.upsert(route, false);
    }

    fn on_route_changed(&self, route: RouteInfo) {
        debug!(route = %route.id, name = %route.name, "Route changed");
        self.upsert(route, true);
    }

    fn on_route_removed(&self, route: RouteInfo) {
        let Some(inner) = self.provider.upgrade() else {
            return;
        };
        let uuid = route
            .device
            .as_ref()
            .map(|d| d.device_id.0.clone())
            .unwrap_or(route.id);

        let removed = inner.state.lock().unwrap().found_services.remove(&uuid);
        if let Some(desc) = removed {
            debug!(uuid = %uuid, "Route removed");
            notify(&inner, Notification::Removed(desc));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRouteRegistrar;
    use crate::model::CastDeviceInfo;

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<String>>,
    }

    impl RecordingListener {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl DiscoveryProviderListener for RecordingListener {
        fn on_service_added(&self, service: &ServiceDescription) {
            self.events.lock().unwrap().push(format!("added:{}", service.uuid()));
        }

        fn on_service_removed(&self, service: &ServiceDescription) {
            self.events.lock().unwrap().push(format!("removed:{}", service.uuid()));
        }

        fn on_service_updated(&self, service: &ServiceDescription) {
            self.events.lock().unwrap().push(format!("updated:{}", service.friendly_name()));
        }

        fn on_discovery_failed(&self, error: &CastError) {
            self.events.lock().unwrap().push(format!("failed:{}", error));
        }
    }

    fn route(id: &str, name: &str) -> RouteInfo {
        RouteInfo::for_device(CastDeviceInfo::new(id, name))
    }

    fn provider_with(settings: &CastSettings) -> (CastDiscoveryProvider, Arc<MockRouteRegistrar>, Dispatcher) {
        let registrar = MockRouteRegistrar::new();
        let dispatcher = Dispatcher::new("discovery-test");
        let provider = CastDiscoveryProvider::new(settings, dispatcher.clone(), registrar.clone());
        (provider, registrar, dispatcher)
    }

    fn provider() -> (CastDiscoveryProvider, Arc<MockRouteRegistrar>, Dispatcher) {
        provider_with(&CastSettings::default())
    }

    #[test]
    fn test_start_replaces_callback_and_requests_discovery() {
        let (provider, registrar, _) = provider();
        provider.start();

        assert_eq!(registrar.remove_calls(), 1);
        let adds = registrar.add_calls();
        assert_eq!(adds.len(), 1);
        assert!(adds[0].1.request_discovery);
        assert!(adds[0].1.perform_active_scan);
        assert_eq!(
            adds[0].0.control_categories,
            vec!["com.google.android.gms.cast.CATEGORY_CAST/CC1AD845".to_string()]
        );
        assert!(provider.is_running());
    }

    #[test]
    fn test_stop_unregisters_callback() {
        let (provider, registrar, _) = provider();
        provider.start();
        provider.stop();

        assert_eq!(registrar.remove_calls(), 2);
        assert_eq!(registrar.registered(), 0);
        assert!(!provider.is_running());
    }

    #[test]
    fn test_reset_clears_found_services() {
        let (provider, registrar, _) = provider();
        provider.start();
        registrar.announce(route("a", "Kitchen"));
        assert!(!provider.is_empty());

        provider.reset();
        assert!(provider.is_empty());
        assert_eq!(registrar.registered(), 0);
    }

    #[test]
    fn test_reset_is_silent_by_default() {
        let (provider, registrar, dispatcher) = provider();
        let listener = Arc::new(RecordingListener::default());
        provider.add_listener(listener.clone());
        provider.start();
        registrar.announce(route("a", "Kitchen"));
        dispatcher.run_pending();

        provider.reset();
        dispatcher.run_pending();
        assert_eq!(listener.events(), vec!["added:a".to_string()]);
    }

    #[test]
    fn test_reset_can_notify_removals() {
        let settings = CastSettings {
            reset_policy: ResetPolicy::NotifyRemoved,
            ..CastSettings::default()
        };
        let (provider, registrar, dispatcher) = provider_with(&settings);
        let listener = Arc::new(RecordingListener::default());
        provider.add_listener(listener.clone());
        provider.start();
        registrar.announce(route("a", "Kitchen"));
        provider.reset();
        dispatcher.run_pending();

        assert_eq!(
            listener.events(),
            vec!["added:a".to_string(), "removed:a".to_string()]
        );
    }

    #[test]
    fn test_listener_set_starts_empty() {
        let (provider, _, _) = provider();
        assert_eq!(provider.listener_count(), 0);
    }

    #[test]
    fn test_add_listener_is_idempotent() {
        let (provider, _, _) = provider();
        let listener: Arc<dyn DiscoveryProviderListener> = Arc::new(RecordingListener::default());
        provider.add_listener(listener.clone());
        provider.add_listener(listener);
        assert_eq!(provider.listener_count(), 1);
    }

    #[test]
    fn test_add_then_remove_listener_leaves_set_empty() {
        let (provider, _, _) = provider();
        let listener: Arc<dyn DiscoveryProviderListener> = Arc::new(RecordingListener::default());
        provider.add_listener(listener.clone());
        provider.remove_listener(&listener);
        assert_eq!(provider.listener_count(), 0);

        // Removing again is a no-op
        provider.remove_listener(&listener);
        assert_eq!(provider.listener_count(), 0);
    }

    #[test]
    fn test_route_events_update_found_services() {
        let (provider, registrar, dispatcher) = provider();
        let listener = Arc::new(RecordingListener::default());
        provider.add_listener(listener.clone());
        provider.start();

        registrar.announce(route("a", "Kitchen"));
        registrar.announce(route("a", "Kitchen"));
        registrar.change(route("a", "Kitchen speaker"));
        registrar.announce(route("b", "Office"));
        registrar.withdraw(route("a", "Kitchen speaker"));

        assert!(listener.events().is_empty());
        dispatcher.run_pending();

        assert_eq!(
            listener.events(),
            vec![
                "added:a".to_string(),
                "updated:Kitchen speaker".to_string(),
                "added:b".to_string(),
                "removed:a".to_string(),
            ]
        );
        let found = provider.found_services();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].uuid(), "b");
    }

    #[test]
    fn test_repeated_start_does_not_duplicate_services() {
        let (provider, registrar, _) = provider();
        provider.start();
        registrar.announce(route("a", "Kitchen"));
        provider.start();
        registrar.announce(route("a", "Kitchen"));

        assert_eq!(provider.found_services().len(), 1);
        assert_eq!(registrar.registered(), 1);
    }

    #[test]
    fn test_routes_without_device_are_ignored() {
        let (provider, registrar, _) = provider();
        provider.start();
        registrar.announce(RouteInfo {
            id: "bt".to_string(),
            name: "Headphones".to_string(),
            description: None,
            device: None,
        });
        assert!(provider.is_empty());
    }

    #[test]
    fn test_listener_removed_before_delivery_is_not_called() {
        let (provider, registrar, dispatcher) = provider();
        let recorder = Arc::new(RecordingListener::default());
        let listener: Arc<dyn DiscoveryProviderListener> = recorder.clone();
        provider.add_listener(listener.clone());
        provider.start();

        registrar.announce(route("a", "Kitchen"));
        provider.remove_listener(&listener);
        dispatcher.run_pending();

        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_registrar_failure_is_reported_to_listeners() {
        let (provider, registrar, dispatcher) = provider();
        let listener = Arc::new(RecordingListener::default());
        provider.add_listener(listener.clone());
        registrar.fail_next_add(CastError::transport("route service gone"));

        provider.start();
        dispatcher.run_pending();

        assert!(!provider.is_running());
        assert_eq!(
            listener.events(),
            vec!["failed:Cast transport error: route service gone".to_string()]
        );
    }

    #[test]
    fn test_missing_registrar_fails_construction() {
        let result = CastDiscoveryProvider::with_registrar_factory(
            &CastSettings::default(),
            Dispatcher::new("test"),
            || Err(CastError::transport("no media router")),
        );
        assert!(matches!(result, Err(CastError::Construction(_))));
    }

    #[test]
    fn test_restart_keeps_single_registration() {
        let (provider, registrar, _) = provider();
        provider.start();
        registrar.announce(route("a", "Kitchen"));
        provider.restart();

        assert!(provider.is_empty());
        assert!(provider.is_running());
        assert_eq!(registrar.registered(), 1);
    }
}
