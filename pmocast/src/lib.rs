//! Google Cast integration for PMOMusic.
//!
//! Discovers Cast receivers, opens sessions on them, plays media through the
//! default media receiver and exchanges messages with custom web
//! applications. The platform side (route discovery, the Cast transport) is
//! reached only through the traits of [`platform`]. The `mock` feature
//! provides an in-memory platform, and the `rust-cast` / `mdns` features
//! provide real ones.

pub mod capabilities;
pub mod channel;
pub mod control;
pub mod discovery;
pub mod dispatcher;
pub mod errors;
pub mod listener;
pub mod media;
pub mod media_control;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod model;
pub mod platform;
pub mod session;
pub mod settings;
pub mod webapp;

#[cfg(feature = "mdns")]
pub mod mdns_registrar;
#[cfg(feature = "rust-cast")]
pub mod rust_cast_client;

pub use capabilities::{Capability, CapabilityMethods, SessionKind};
pub use channel::{CastServiceChannel, WebAppMessage};
pub use control::{MediaLaunch, MediaPlayer, VolumeControl, WebAppLauncher};
pub use discovery::{CastDiscoveryProvider, DiscoveryProviderListener, ResetPolicy};
pub use dispatcher::{Dispatcher, DispatcherThread};
pub use errors::CastError;
pub use listener::{ResponseListener, Subscription};
pub use media::{MediaInfo, PlayState, SubtitleInfo};
pub use media_control::MediaControl;
pub use model::{CastDeviceInfo, DeviceId, LaunchSession, ServiceConfig, ServiceDescription};
pub use session::{CastSession, ConnectionListener, SessionPhase};
pub use settings::CastSettings;
pub use webapp::{CastWebAppSession, WebAppSessionListener};

#[cfg(feature = "mdns")]
pub use mdns_registrar::MdnsRouteRegistrar;
#[cfg(feature = "rust-cast")]
pub use rust_cast_client::RustCastClientFactory;
