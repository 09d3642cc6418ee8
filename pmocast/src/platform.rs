//! Platform collaborators.
//!
//! Route discovery and the Cast wire protocol are provided by the host
//! platform. The discovery provider and the session only talk to these
//! traits; real implementations live behind the `mdns` and `rust-cast`
//! features and [`crate::mock`] provides in-memory ones.
//!
//! Callbacks handed to a platform object may be invoked from any thread,
//! at most once each.

use std::sync::Arc;

use crate::errors::CastError;
use crate::media::{CastMediaInfo, MediaStatus, ResumeState};
use crate::model::CastDeviceInfo;

pub type ResultCallback<T> = Box<dyn FnOnce(Result<T, CastError>) + Send + 'static>;

/// Route control category matching any Cast receiver.
pub const CAST_ROUTE_CATEGORY: &str = "com.google.android.gms.cast.CATEGORY_CAST";

/// Namespace of the receiver's media channel.
pub const MEDIA_NAMESPACE: &str = "urn:x-cast:com.google.cast.media";

/// Filters the routes a registrar reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSelector {
    pub control_categories: Vec<String>,
}

impl RouteSelector {
    /// Matches receivers able to run `app_id`.
    pub fn for_application(category: &str, app_id: &str) -> Self {
        Self {
            control_categories: vec![format!("{}/{}", category, app_id)],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallbackFlags {
    pub request_discovery: bool,
    pub perform_active_scan: bool,
}

/// A route as reported by the registrar. Routes without a Cast device are
/// not Cast receivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub device: Option<CastDeviceInfo>,
}

impl RouteInfo {
    pub fn for_device(device: CastDeviceInfo) -> Self {
        Self {
            id: device.device_id.0.clone(),
            name: device.friendly_name.clone(),
            description: device.model_name.clone(),
            device: Some(device),
        }
    }
}

pub trait RouteCallback: Send + Sync {
    fn on_route_added(&self, route: RouteInfo);
    fn on_route_changed(&self, route: RouteInfo);
    fn on_route_removed(&self, route: RouteInfo);
}

/// Platform route discovery service.
pub trait RouteRegistrar: Send + Sync {
    fn add_callback(
        &self,
        selector: &RouteSelector,
        callback: Arc<dyn RouteCallback>,
        flags: CallbackFlags,
    ) -> Result<(), CastError>;

    /// Unregisters `callback`. Unknown callbacks are ignored.
    fn remove_callback(&self, callback: &Arc<dyn RouteCallback>);
}

/// Why a connection was suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendCause {
    NetworkLost,
    ServiceDisconnected,
}

/// Connection events raised by a [`CastClient`].
pub trait ConnectionEvents: Send + Sync {
    fn on_connected(&self);
    fn on_connection_suspended(&self, cause: SuspendCause);
    fn on_connection_failed(&self, error: CastError);
    fn on_application_disconnected(&self, error: Option<CastError>);
    fn on_volume_changed(&self, level: f32, muted: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LaunchOptions {
    pub relaunch_if_running: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationMetadata {
    pub application_id: String,
    pub name: String,
    pub namespaces: Vec<String>,
}

/// Outcome of a successful launch or join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationConnection {
    pub metadata: ApplicationMetadata,
    pub session_id: String,
    pub status_text: Option<String>,
    pub was_launched: bool,
}

pub trait MessageReceivedCallback: Send + Sync {
    fn on_message_received(
        &self,
        sender: Option<&CastDeviceInfo>,
        namespace: Option<&str>,
        message: Option<&str>,
    );
}

/// Connection to a single receiver.
///
/// Methods returning `Result` may fail synchronously; in that case the
/// callback they were given is never invoked.
pub trait CastClient: Send + Sync {
    fn connect(&self);
    fn disconnect(&self);
    fn is_connecting(&self) -> bool;
    fn is_connected(&self) -> bool;

    /// Status text of the running receiver application, if any.
    fn application_status(&self) -> Result<Option<String>, CastError>;

    fn launch_application(
        &self,
        app_id: &str,
        options: LaunchOptions,
        callback: ResultCallback<ApplicationConnection>,
    ) -> Result<(), CastError>;

    fn join_application(
        &self,
        app_id: &str,
        session_id: Option<&str>,
        callback: ResultCallback<ApplicationConnection>,
    ) -> Result<(), CastError>;

    fn stop_application(&self, session_id: &str, callback: ResultCallback<()>)
    -> Result<(), CastError>;

    /// Media player bound to the application launched on this connection.
    fn media_player(&self) -> Result<Arc<dyn RemoteMediaPlayer>, CastError>;

    fn set_message_received_callbacks(
        &self,
        namespace: &str,
        callback: Arc<dyn MessageReceivedCallback>,
    ) -> Result<(), CastError>;

    fn remove_message_received_callbacks(&self, namespace: &str) -> Result<(), CastError>;

    fn send_message(
        &self,
        namespace: &str,
        message: &str,
        callback: ResultCallback<()>,
    ) -> Result<(), CastError>;

    fn volume(&self) -> Result<f32, CastError>;
    fn set_volume(&self, level: f32) -> Result<(), CastError>;
    fn is_mute(&self) -> Result<bool, CastError>;
    fn set_mute(&self, mute: bool) -> Result<(), CastError>;
}

/// Builds the client used by a session. The session hands over its
/// connection event sink.
pub trait CastClientFactory: Send + Sync {
    fn create(
        &self,
        device: &CastDeviceInfo,
        events: Arc<dyn ConnectionEvents>,
    ) -> Arc<dyn CastClient>;
}

pub trait MediaStatusListener: Send + Sync {
    fn on_status_updated(&self);
    fn on_metadata_updated(&self);
}

/// Receiver-side media player. Commands go through `client`, which must be
/// the connection the player was obtained from.
pub trait RemoteMediaPlayer: Send + Sync {
    fn load(
        &self,
        client: &Arc<dyn CastClient>,
        media: &CastMediaInfo,
        autoplay: bool,
        callback: ResultCallback<MediaStatus>,
    );
    fn play(&self, client: &Arc<dyn CastClient>, callback: ResultCallback<()>);
    fn pause(&self, client: &Arc<dyn CastClient>, callback: ResultCallback<()>);
    fn stop(&self, client: &Arc<dyn CastClient>, callback: ResultCallback<()>);
    fn seek(
        &self,
        client: &Arc<dyn CastClient>,
        position: std::time::Duration,
        resume: ResumeState,
        callback: ResultCallback<()>,
    );

    /// Last status pushed by the receiver, `None` when no media is loaded.
    fn media_status(&self) -> Option<MediaStatus>;
    fn stream_duration(&self) -> std::time::Duration;
    fn approximate_stream_position(&self) -> std::time::Duration;
    fn set_status_listener(&self, listener: Option<Arc<dyn MediaStatusListener>>);

    fn namespace(&self) -> &str {
        MEDIA_NAMESPACE
    }
}

/// Identity of the object behind a trait object, ignoring vtables.
pub(crate) fn same_object<T: ?Sized, U: ?Sized>(a: &Arc<T>, b: &Arc<U>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}
