//! Cast session walkthrough against the in-memory platform
//!
//! Announces a simulated receiver, connects to it, plays a track, drives
//! the transport and volume, then talks to a custom web application.
//!
//! Usage:
//!   cargo run --bin pmocast-sim -- [config.yaml]
//!
//! Logging follows `RUST_LOG` (default `pmocast=debug`).

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use pmocast::mock::{MockCastClient, MockCastClientFactory, MockRouteRegistrar};
use pmocast::platform::RouteInfo;
use pmocast::{
    CastDeviceInfo, CastDiscoveryProvider, CastError, CastSession, CastSettings,
    CastWebAppSession, CapabilityMethods, ConnectionListener, Dispatcher,
    DiscoveryProviderListener, MediaControl, MediaInfo, MediaPlayer, ResponseListener,
    ServiceConfig, ServiceDescription, VolumeControl, WebAppLauncher, WebAppMessage,
    WebAppSessionListener,
};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEMO_WEB_APP_ID: &str = "4F8B3483";

#[derive(Default)]
struct FoundServices(Mutex<Vec<ServiceDescription>>);

impl DiscoveryProviderListener for FoundServices {
    fn on_service_added(&self, service: &ServiceDescription) {
        info!("📡 Found {} ({})", service.friendly_name(), service.uuid());
        self.0.lock().unwrap().push(service.clone());
    }

    fn on_service_removed(&self, service: &ServiceDescription) {
        info!("👋 Lost {}", service.friendly_name());
        self.0.lock().unwrap().retain(|s| s.uuid() != service.uuid());
    }
}

struct LogConnection;

impl ConnectionListener for LogConnection {
    fn on_connection_success(&self, session: &CastSession) {
        info!("✅ Connected to {}", session.description().friendly_name());
    }

    fn on_connection_failure(&self, session: &CastSession, error: &CastError) {
        warn!("❌ Connection to {} failed: {}", session.description().friendly_name(), error);
    }

    fn on_disconnect(&self, session: &CastSession, error: Option<&CastError>) {
        match error {
            Some(e) => warn!("Disconnected from {}: {}", session.description().friendly_name(), e),
            None => info!("Disconnected from {}", session.description().friendly_name()),
        }
    }
}

struct LogMessages;

impl WebAppSessionListener for LogMessages {
    fn on_receive_message(&self, session: &CastWebAppSession, message: Option<WebAppMessage>) {
        match message {
            Some(message) => info!("💬 {} says {}", session.launch_session().app_id, message),
            None => info!("💬 {} sent an empty message", session.launch_session().app_id),
        }
    }

    fn on_web_app_session_disconnect(&self, session: &CastWebAppSession) {
        info!("Web app {} disconnected", session.launch_session().app_id);
    }
}

/// Slot filled by a response listener, read back after the dispatcher ran.
fn slot<T: Send + 'static>() -> (Arc<Mutex<Option<Result<T, CastError>>>>, ResponseListener<T>) {
    let cell = Arc::new(Mutex::new(None));
    let sink = cell.clone();
    (cell, ResponseListener::new(move |r| *sink.lock().unwrap() = Some(r)))
}

fn take<T>(cell: &Mutex<Option<Result<T, CastError>>>, what: &str) -> Result<T> {
    cell.lock()
        .unwrap()
        .take()
        .ok_or_else(|| anyhow!("{} did not complete", what))?
        .with_context(|| format!("{} failed", what))
}

fn log_result(what: &'static str) -> ResponseListener<()> {
    ResponseListener::from_fns(
        move |()| info!("{} done", what),
        move |e| warn!("{} failed: {}", what, e),
    )
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pmocast=debug")),
        )
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let settings = CastSettings::load(config_path.as_deref())?;
    let dispatcher = Dispatcher::new("pmocast-sim");

    // Discovery
    let registrar = MockRouteRegistrar::new();
    let provider = CastDiscoveryProvider::new(&settings, dispatcher.clone(), registrar.clone());
    let found = Arc::new(FoundServices::default());
    provider.add_listener(found.clone());
    provider.start();

    let device = CastDeviceInfo::new("sim-living-room", "Living Room")
        .with_address(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 42)), 8009)
        .with_model("Chromecast Audio");
    registrar.announce(RouteInfo::for_device(device));
    dispatcher.run_pending();

    let description = found
        .0
        .lock()
        .unwrap()
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("no receiver discovered"))?;

    // Session
    let client = MockCastClient::responsive();
    let session = CastSession::new(
        description.clone(),
        ServiceConfig::for_service(&description),
        settings.clone(),
        MockCastClientFactory::new(client.clone()),
        dispatcher.clone(),
    );
    session.set_listener(Some(Arc::new(LogConnection) as Arc<dyn ConnectionListener>));
    info!("Session capabilities: {}", session.capabilities().len());

    let _play_state = session.subscribe_play_state(|state| info!("▶️ Play state: {:?}", state));
    let _volume = session.subscribe_volume(|level| info!("🔊 Volume: {:.2}", level));

    session.connect();
    dispatcher.run_pending();

    // Media
    let media = MediaInfo::builder("http://192.168.1.10:8080/audio/track.flac", "audio/flac")
        .title("Sim Track")
        .description("pmocast simulator")
        .icon("http://192.168.1.10:8080/covers/track.jpg")
        .duration(Duration::from_secs(215))
        .build();
    let (launched, listener) = slot();
    session.play_media(media, false, listener);
    dispatcher.run_pending();
    let launch = take(&launched, "play_media")?;
    info!(
        "🎵 Media app {} running (session {}, controllable: {})",
        launch.launch_session.app_id, launch.launch_session.session_id, launch.media_control
    );

    session.play(log_result("play"));
    session.seek(Duration::from_secs(60), log_result("seek"));
    session.pause(log_result("pause"));
    session.get_position(ResponseListener::from_fns(
        |p| info!("Position: {:?}", p),
        |e| warn!("Position unavailable: {}", e),
    ));
    session.rewind(ResponseListener::from_fns(|()| {}, |e| info!("Rewind: {}", e)));

    session.set_volume(0.3, log_result("set_volume"));
    session.volume_up(log_result("volume_up"));
    session.set_mute(true, log_result("mute"));
    dispatcher.run_pending();

    // Web app
    let (web_app, listener) = slot();
    session.launch_web_app(DEMO_WEB_APP_ID, false, listener);
    dispatcher.run_pending();
    let web_app = take(&web_app, "launch_web_app")?;
    web_app.set_listener(Some(Arc::new(LogMessages) as Arc<dyn WebAppSessionListener>));

    let (connected, listener) = slot();
    web_app.connect(listener);
    dispatcher.run_pending();
    take(&connected, "web app connect")?;

    web_app.send_json(&json!({ "type": "hello", "from": "pmocast-sim" }), log_result("send"));
    client.deliver_message(web_app.namespace(), Some(r#"{"type":"ack"}"#));
    client.deliver_message(web_app.namespace(), Some("plain text reply"));
    dispatcher.run_pending();

    session.close_web_app(&web_app.launch_session(), log_result("close_web_app"));
    dispatcher.run_pending();

    session.disconnect();
    provider.stop();
    dispatcher.run_pending();

    info!("Simulation finished, {} request(s) sent to the receiver", client.app_requests().len());
    Ok(())
}
