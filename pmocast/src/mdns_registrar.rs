//! Cast route discovery over multicast DNS.
//!
//! Cast receivers advertise the `_googlecast._tcp.local` service. A single
//! background thread queries the network while at least one callback is
//! registered, turns each response into a [`RouteInfo`] and reports routes
//! that stop answering as removed.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use futures_util::{StreamExt, pin_mut};
use tracing::{debug, info, warn};

use crate::errors::CastError;
use crate::model::{CastDeviceInfo, DEFAULT_CAST_PORT};
use crate::platform::{
    CAST_ROUTE_CATEGORY, CallbackFlags, RouteCallback, RouteInfo, RouteRegistrar, RouteSelector,
    same_object,
};

pub const CAST_SERVICE_NAME: &str = "_googlecast._tcp.local";

const ACTIVE_QUERY_INTERVAL: Duration = Duration::from_secs(5);
const PASSIVE_QUERY_INTERVAL: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Routes seen on the network, with the time of their last answer.
#[derive(Default)]
struct RouteTable {
    routes: HashMap<String, (RouteInfo, Instant)>,
}

enum RouteChange {
    Added(RouteInfo),
    Changed(RouteInfo),
}

impl RouteTable {
    fn observe(&mut self, route: RouteInfo, now: Instant) -> Option<RouteChange> {
        match self.routes.insert(route.id.clone(), (route.clone(), now)) {
            None => Some(RouteChange::Added(route)),
            Some((previous, _)) if previous != route => Some(RouteChange::Changed(route)),
            Some(_) => None,
        }
    }

    fn expire(&mut self, now: Instant, max_age: Duration) -> Vec<RouteInfo> {
        let stale: Vec<String> = self
            .routes
            .iter()
            .filter(|(_, (_, seen))| now.duration_since(*seen) > max_age)
            .map(|(id, _)| id.clone())
            .collect();
        stale
            .into_iter()
            .filter_map(|id| self.routes.remove(&id).map(|(route, _)| route))
            .collect()
    }
}

struct Worker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Shared {
    callbacks: Mutex<Vec<Arc<dyn RouteCallback>>>,
    table: Mutex<RouteTable>,
}

impl Shared {
    fn snapshot(&self) -> Vec<Arc<dyn RouteCallback>> {
        self.callbacks.lock().unwrap().clone()
    }

    fn publish(&self, route: RouteInfo) {
        let change = self.table.lock().unwrap().observe(route, Instant::now());
        match change {
            Some(RouteChange::Added(route)) => {
                info!(route = %route.id, name = %route.name, "Cast receiver found");
                for callback in self.snapshot() {
                    callback.on_route_added(route.clone());
                }
            }
            Some(RouteChange::Changed(route)) => {
                debug!(route = %route.id, "Cast receiver changed");
                for callback in self.snapshot() {
                    callback.on_route_changed(route.clone());
                }
            }
            None => {}
        }
    }

    fn expire(&self, max_age: Duration) {
        let removed = self.table.lock().unwrap().expire(Instant::now(), max_age);
        for route in removed {
            info!(route = %route.id, "Cast receiver gone");
            for callback in self.snapshot() {
                callback.on_route_removed(route.clone());
            }
        }
    }
}

/// [`RouteRegistrar`] backed by the `mdns` crate.
pub struct MdnsRouteRegistrar {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl Default for MdnsRouteRegistrar {
    fn default() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            worker: Mutex::new(None),
        }
    }
}

impl MdnsRouteRegistrar {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn start_worker(&self, flags: CallbackFlags) -> Result<(), CastError> {
        let mut worker = self.worker.lock().unwrap();
        if worker.is_some() {
            return Ok(());
        }

        let interval = if flags.perform_active_scan {
            ACTIVE_QUERY_INTERVAL
        } else {
            PASSIVE_QUERY_INTERVAL
        };
        let stop = Arc::new(AtomicBool::new(false));
        let shared = self.shared.clone();
        let thread_stop = stop.clone();

        let handle = thread::Builder::new()
            .name("pmocast-mdns".to_string())
            .spawn(move || {
                async_std::task::block_on(browse(shared, interval, thread_stop));
            })
            .map_err(|e| CastError::transport(format!("Cannot start mDNS browser: {}", e)))?;

        *worker = Some(Worker { stop, handle });
        Ok(())
    }

    fn stop_worker(&self) {
        let Some(worker) = self.worker.lock().unwrap().take() else {
            return;
        };
        worker.stop.store(true, Ordering::Release);
        if worker.handle.join().is_err() {
            warn!("mDNS browser thread panicked");
        }
        self.shared.table.lock().unwrap().routes.clear();
    }
}

impl Drop for MdnsRouteRegistrar {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

impl RouteRegistrar for MdnsRouteRegistrar {
    fn add_callback(
        &self,
        selector: &RouteSelector,
        callback: Arc<dyn RouteCallback>,
        flags: CallbackFlags,
    ) -> Result<(), CastError> {
        if !selector
            .control_categories
            .iter()
            .any(|c| c.starts_with(CAST_ROUTE_CATEGORY))
        {
            return Err(CastError::not_supported("Route selector without Cast category"));
        }

        {
            let mut callbacks = self.shared.callbacks.lock().unwrap();
            if !callbacks.iter().any(|c| same_object(c, &callback)) {
                callbacks.push(callback.clone());
            }
        }

        // Late subscribers learn about routes already known.
        let known: Vec<RouteInfo> = self
            .shared
            .table
            .lock()
            .unwrap()
            .routes
            .values()
            .map(|(route, _)| route.clone())
            .collect();
        for route in known {
            callback.on_route_added(route);
        }

        if flags.request_discovery || flags.perform_active_scan {
            self.start_worker(flags)?;
        }
        Ok(())
    }

    fn remove_callback(&self, callback: &Arc<dyn RouteCallback>) {
        let empty = {
            let mut callbacks = self.shared.callbacks.lock().unwrap();
            callbacks.retain(|c| !same_object(c, callback));
            callbacks.is_empty()
        };
        if empty {
            self.stop_worker();
        }
    }
}

async fn browse(shared: Arc<Shared>, interval: Duration, stop: Arc<AtomicBool>) {
    debug!(service = CAST_SERVICE_NAME, ?interval, "mDNS browser started");
    let discovery = match mdns::discover::all(CAST_SERVICE_NAME, interval) {
        Ok(discovery) => discovery,
        Err(e) => {
            warn!("Cannot start mDNS discovery: {}", e);
            return;
        }
    };
    let stream = discovery.listen();
    pin_mut!(stream);

    // A receiver missing three query rounds is considered gone.
    let max_age = interval * 3;
    while !stop.load(Ordering::Acquire) {
        match async_std::future::timeout(POLL_INTERVAL, stream.next()).await {
            Ok(Some(Ok(response))) => {
                if let Some(route) = route_from_response(&response) {
                    shared.publish(route);
                }
            }
            Ok(Some(Err(e))) => warn!("mDNS error: {}", e),
            Ok(None) => break,
            Err(_) => {}
        }
        shared.expire(max_age);
    }
    debug!("mDNS browser stopped");
}

/// Builds the route advertised by one mDNS response, if it is a Cast
/// receiver with a usable address.
pub fn route_from_response(response: &mdns::Response) -> Option<RouteInfo> {
    let service_name = response.records().find_map(|r| match r.kind {
        mdns::RecordKind::PTR(ref name) => Some(name.clone()),
        _ => None,
    });

    let addresses: Vec<IpAddr> = response
        .records()
        .filter_map(|r| match r.kind {
            mdns::RecordKind::A(addr) => Some(IpAddr::V4(addr)),
            mdns::RecordKind::AAAA(addr) => Some(IpAddr::V6(addr)),
            _ => None,
        })
        .collect();

    let port = response.records().find_map(|r| match r.kind {
        mdns::RecordKind::SRV { port, .. } => Some(port),
        _ => None,
    });

    let txt: Vec<String> = response
        .records()
        .filter_map(|r| match r.kind {
            mdns::RecordKind::TXT(ref data) => Some(data.clone()),
            _ => None,
        })
        .flatten()
        .collect();

    device_from_advertisement(service_name.as_deref(), &addresses, port, &txt).map(RouteInfo::for_device)
}

fn device_from_advertisement(
    service_name: Option<&str>,
    addresses: &[IpAddr],
    port: Option<u16>,
    txt: &[String],
) -> Option<CastDeviceInfo> {
    let Some(service_name) = service_name else {
        warn!("No PTR record in mDNS response");
        return None;
    };

    // IPv4 first
    let Some(ip) = addresses
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addresses.first())
        .copied()
    else {
        warn!("No address for Cast receiver {}", service_name);
        return None;
    };
    let port = port.unwrap_or(DEFAULT_CAST_PORT);

    let records: HashMap<&str, &str> = txt.iter().filter_map(|entry| entry.split_once('=')).collect();

    let id = records
        .get("id")
        .map(|id| id.to_string())
        .unwrap_or_else(|| format!("cast-{}-{}", ip, port));
    let friendly_name = records
        .get("fn")
        .map(|name| name.to_string())
        .unwrap_or_else(|| instance_name(service_name));

    let mut device = CastDeviceInfo::new(&id, &friendly_name).with_address(ip, port);
    if let Some(model) = records.get("md") {
        device = device.with_model(model);
    }
    device.device_version = records.get("ve").map(|v| v.to_string());
    debug!(id = %id, name = %friendly_name, %ip, port, "Cast advertisement parsed");
    Some(device)
}

/// Instance label of a service name, without the trailing 32-hex-digit id.
fn instance_name(service_name: &str) -> String {
    let instance = service_name
        .split("._googlecast._tcp.local")
        .next()
        .unwrap_or(service_name);
    let name = instance
        .split('-')
        .take_while(|part| part.len() != 32)
        .collect::<Vec<_>>()
        .join("-");
    match name.trim() {
        "" => "Unknown Cast receiver".to_string(),
        trimmed => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn txt(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn test_advertisement_with_txt_records() {
        let addresses = [
            "fe80::1".parse().unwrap(),
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)),
        ];
        let device = device_from_advertisement(
            Some("Salon-0123._googlecast._tcp.local"),
            &addresses,
            Some(8009),
            &txt(&["id=0123abcd", "fn=Salon", "md=Chromecast Audio", "ve=05"]),
        )
        .unwrap();

        assert_eq!(device.device_id.as_str(), "0123abcd");
        assert_eq!(device.friendly_name, "Salon");
        assert_eq!(device.model_name.as_deref(), Some("Chromecast Audio"));
        assert_eq!(device.ip_address, Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20))));
        assert_eq!(device.device_version.as_deref(), Some("05"));
    }

    #[test]
    fn test_advertisement_fallbacks() {
        let addresses = [IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))];
        let device = device_from_advertisement(
            Some("Living-Room-0123456789abcdef0123456789abcdef._googlecast._tcp.local"),
            &addresses,
            None,
            &[],
        )
        .unwrap();

        assert_eq!(device.friendly_name, "Living-Room");
        assert_eq!(device.port, DEFAULT_CAST_PORT);
        assert_eq!(device.device_id.as_str(), "cast-10.0.0.5-8009");
    }

    #[test]
    fn test_advertisement_without_address_is_ignored() {
        assert!(device_from_advertisement(Some("x._googlecast._tcp.local"), &[], None, &[]).is_none());
        assert!(device_from_advertisement(None, &[IpAddr::V4(Ipv4Addr::LOCALHOST)], None, &[]).is_none());
    }

    #[test]
    fn test_route_table_reports_changes_and_expiry() {
        let mut table = RouteTable::default();
        let start = Instant::now();
        let route = RouteInfo::for_device(CastDeviceInfo::new("a", "Kitchen"));

        assert!(matches!(table.observe(route.clone(), start), Some(RouteChange::Added(_))));
        assert!(table.observe(route.clone(), start).is_none());

        let renamed = RouteInfo::for_device(CastDeviceInfo::new("a", "Kitchen speaker"));
        assert!(matches!(table.observe(renamed, start), Some(RouteChange::Changed(_))));

        assert!(table.expire(start + Duration::from_secs(5), Duration::from_secs(10)).is_empty());
        let gone = table.expire(start + Duration::from_secs(11), Duration::from_secs(10));
        assert_eq!(gone.len(), 1);
        assert_eq!(gone[0].id, "a");
    }

    #[test]
    fn test_selector_must_target_cast() {
        struct Nop;
        impl RouteCallback for Nop {
            fn on_route_added(&self, _: RouteInfo) {}
            fn on_route_changed(&self, _: RouteInfo) {}
            fn on_route_removed(&self, _: RouteInfo) {}
        }

        let registrar = MdnsRouteRegistrar::new();
        let selector = RouteSelector {
            control_categories: vec!["android.media.intent.category.LIVE_AUDIO".to_string()],
        };
        let result = registrar.add_callback(&selector, Arc::new(Nop), CallbackFlags::default());
        assert!(matches!(result, Err(e) if e.is_not_supported()));
    }
}
