//! Cast transport built on the `rust_cast` crate.
//!
//! `rust_cast` devices borrow their TLS stream and cannot be shared between
//! threads, so every operation opens a fresh connection and the client only
//! keeps the identifiers needed to reach the running application. Commands
//! that report through a callback run on one worker thread per client; the
//! synchronous volume calls run on the caller's thread.
//!
//! `rust_cast` has no raw channel access, so custom namespaces (web-app
//! messaging) report `NotSupported`.

use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once, Weak};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};
use rust_cast::CastDevice;
use rust_cast::channels::media::{
    self as cast_media, GenericMediaMetadata, Image, Media, Metadata, StatusEntry,
};
use rust_cast::channels::receiver::CastDeviceApp;
use tracing::{debug, info, warn};

use crate::errors::CastError;
use crate::media::{
    CastMediaInfo, CastMetadata, IdleReason, MediaStatus, MetadataKind, PlayerState, RepeatMode,
    ResumeState, StreamType,
};
use crate::model::CastDeviceInfo;
use crate::platform::{
    ApplicationConnection, ApplicationMetadata, CastClient, CastClientFactory, ConnectionEvents,
    LaunchOptions, MediaStatusListener, MessageReceivedCallback, RemoteMediaPlayer, ResultCallback,
};
use crate::settings::DEFAULT_MEDIA_APP_ID;

const RECEIVER_DESTINATION: &str = "receiver-0";

/// Installs the rustls crypto provider once per process.
fn ensure_crypto_provider() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = rustls::crypto::CryptoProvider::install_default(
            rustls::crypto::aws_lc_rs::default_provider(),
        );
        debug!("Rustls CryptoProvider initialized");
    });
}

fn wire(e: impl Display) -> CastError {
    CastError::transport(e.to_string())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct RunningApp {
    app_id: String,
    session_id: String,
    transport_id: String,
}

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Link {
    host: String,
    port: u16,
    events: Arc<dyn ConnectionEvents>,
    connecting: AtomicBool,
    connected: AtomicBool,
    app: Mutex<Option<RunningApp>>,
}

impl Link {
    /// Opens a connection to the receiver channel.
    fn open(&self) -> Result<CastDevice<'static>, CastError> {
        ensure_crypto_provider();
        debug!("Connecting to Cast device at {}:{}", self.host, self.port);
        let device = CastDevice::connect_without_host_verification(self.host.clone(), self.port)
            .map_err(wire)?;
        device
            .connection
            .connect(RECEIVER_DESTINATION.to_string())
            .map_err(wire)?;
        device.heartbeat.ping().map_err(wire)?;
        Ok(device)
    }

    /// Opens a connection to the running application's transport.
    fn open_app(&self) -> Result<(CastDevice<'static>, RunningApp), CastError> {
        let app = self
            .app
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| CastError::precondition("No receiver application running"))?;
        let device = self.open()?;
        device
            .connection
            .connect(app.transport_id.clone())
            .map_err(wire)?;
        Ok((device, app))
    }

    fn require_connected(&self) -> Result<(), CastError> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(CastError::not_connected())
        }
    }

    fn forget_app(&self) {
        self.app.lock().unwrap().take();
    }
}

/// [`CastClientFactory`] producing [`RustCastClient`]s.
#[derive(Debug, Default)]
pub struct RustCastClientFactory;

impl RustCastClientFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

impl CastClientFactory for RustCastClientFactory {
    fn create(
        &self,
        device: &CastDeviceInfo,
        events: Arc<dyn ConnectionEvents>,
    ) -> Arc<dyn CastClient> {
        RustCastClient::new(device, events)
    }
}

pub struct RustCastClient {
    link: Arc<Link>,
    jobs: Sender<Job>,
    player: Mutex<Option<Arc<RustCastMediaPlayer>>>,
}

impl RustCastClient {
    pub fn new(device: &CastDeviceInfo, events: Arc<dyn ConnectionEvents>) -> Arc<Self> {
        let host = device
            .ip_address
            .map(|ip| ip.to_string())
            .unwrap_or_default();
        let link = Arc::new(Link {
            host,
            port: device.port,
            events,
            connecting: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            app: Mutex::new(None),
        });

        let (jobs, queue) = unbounded::<Job>();
        let name = format!("pmocast-cast-{}", device.device_id);
        if let Err(e) = thread::Builder::new()
            .name(name)
            .spawn(move || run_jobs(queue))
        {
            warn!("Cannot start Cast worker thread: {}", e);
        }

        Arc::new(Self {
            link,
            jobs,
            player: Mutex::new(None),
        })
    }

    fn submit(&self, job: Job) -> Result<(), CastError> {
        self.jobs
            .send(job)
            .map_err(|_| CastError::transport("Cast worker thread is gone"))
    }

    /// Runs `op` on the worker thread and hands its result to `callback`.
    fn submit_with<T, F>(&self, op: F, callback: ResultCallback<T>) -> Result<(), CastError>
    where
        T: Send + 'static,
        F: FnOnce(&Link) -> Result<T, CastError> + Send + 'static,
    {
        let link = self.link.clone();
        self.submit(Box::new(move || callback(op(&link))))
    }
}

fn run_jobs(queue: Receiver<Job>) {
    debug!("Cast worker started");
    while let Ok(job) = queue.recv() {
        job();
    }
    debug!("Cast worker stopped");
}

fn application_connection(
    app: &RunningApp,
    name: &str,
    status_text: &str,
    was_launched: bool,
) -> ApplicationConnection {
    ApplicationConnection {
        metadata: ApplicationMetadata {
            application_id: app.app_id.clone(),
            name: name.to_string(),
            namespaces: Vec::new(),
        },
        session_id: app.session_id.clone(),
        status_text: (!status_text.is_empty()).then(|| status_text.to_string()),
        was_launched,
    }
}

fn device_app(app_id: &str) -> CastDeviceApp {
    if app_id == DEFAULT_MEDIA_APP_ID {
        CastDeviceApp::DefaultMediaReceiver
    } else {
        CastDeviceApp::Custom(app_id.to_string())
    }
}

/// Finds `app_id` among the running applications and connects to it.
fn join_running(
    link: &Link,
    app_id: &str,
    session_id: Option<&str>,
) -> Result<Option<ApplicationConnection>, CastError> {
    let device = link.open()?;
    let status = device.receiver.get_status().map_err(wire)?;
    let Some(found) = status
        .applications
        .iter()
        .find(|a| a.app_id == app_id && session_id.is_none_or(|id| a.session_id == id))
    else {
        return Ok(None);
    };

    device
        .connection
        .connect(found.transport_id.clone())
        .map_err(wire)?;
    let running = RunningApp {
        app_id: found.app_id.clone(),
        session_id: found.session_id.clone(),
        transport_id: found.transport_id.clone(),
    };
    debug!(app_id, session_id = %running.session_id, "Joined running application");
    *link.app.lock().unwrap() = Some(running.clone());
    Ok(Some(application_connection(
        &running,
        &found.display_name,
        &found.status_text,
        false,
    )))
}

fn launch(
    link: &Link,
    app_id: &str,
    options: LaunchOptions,
) -> Result<ApplicationConnection, CastError> {
    link.require_connected()?;
    if !options.relaunch_if_running {
        if let Some(joined) = join_running(link, app_id, None)? {
            return Ok(joined);
        }
    }

    let device = link.open()?;
    let app = device
        .receiver
        .launch_app(&device_app(app_id))
        .map_err(wire)?;
    device
        .connection
        .connect(app.transport_id.clone())
        .map_err(wire)?;
    let running = RunningApp {
        app_id: app.app_id.clone(),
        session_id: app.session_id.clone(),
        transport_id: app.transport_id.clone(),
    };
    info!(
        "Launched {} with session_id: {}, transport_id: {}",
        running.app_id, running.session_id, running.transport_id
    );
    *link.app.lock().unwrap() = Some(running.clone());
    Ok(application_connection(
        &running,
        &app.display_name,
        &app.status_text,
        true,
    ))
}

impl CastClient for RustCastClient {
    fn connect(&self) {
        if self.link.connecting.swap(true, Ordering::AcqRel) {
            return;
        }
        let link = self.link.clone();
        let submitted = self.submit(Box::new(move || {
            let reachable = link.open().map(|_| ());
            link.connecting.store(false, Ordering::Release);
            match reachable {
                Ok(()) => {
                    link.connected.store(true, Ordering::Release);
                    info!("Cast device {}:{} reachable", link.host, link.port);
                    link.events.on_connected();
                }
                Err(err) => {
                    link.connected.store(false, Ordering::Release);
                    warn!("Cannot reach Cast device {}:{}: {}", link.host, link.port, err);
                    link.events.on_connection_failed(err);
                }
            }
        }));
        if let Err(err) = submitted {
            self.link.connecting.store(false, Ordering::Release);
            self.link.events.on_connection_failed(err);
        }
    }

    fn disconnect(&self) {
        self.link.connecting.store(false, Ordering::Release);
        self.link.connected.store(false, Ordering::Release);
        self.link.forget_app();
        self.player.lock().unwrap().take();
    }

    fn is_connecting(&self) -> bool {
        self.link.connecting.load(Ordering::Acquire)
    }

    fn is_connected(&self) -> bool {
        self.link.connected.load(Ordering::Acquire)
    }

    fn application_status(&self) -> Result<Option<String>, CastError> {
        self.link.require_connected()?;
        let device = self.link.open()?;
        let status = device.receiver.get_status().map_err(wire)?;
        Ok(status
            .applications
            .first()
            .map(|a| a.status_text.clone())
            .filter(|text| !text.is_empty()))
    }

    fn launch_application(
        &self,
        app_id: &str,
        options: LaunchOptions,
        callback: ResultCallback<ApplicationConnection>,
    ) -> Result<(), CastError> {
        self.link.require_connected()?;
        let app_id = app_id.to_string();
        self.submit_with(move |link| launch(link, &app_id, options), callback)
    }

    fn join_application(
        &self,
        app_id: &str,
        session_id: Option<&str>,
        callback: ResultCallback<ApplicationConnection>,
    ) -> Result<(), CastError> {
        self.link.require_connected()?;
        let app_id = app_id.to_string();
        let session_id = session_id.map(str::to_string);
        self.submit_with(
            move |link| {
                join_running(link, &app_id, session_id.as_deref())?.ok_or_else(|| {
                    CastError::precondition(&format!("Application {} is not running", app_id))
                })
            },
            callback,
        )
    }

    fn stop_application(
        &self,
        session_id: &str,
        callback: ResultCallback<()>,
    ) -> Result<(), CastError> {
        self.link.require_connected()?;
        let session_id = session_id.to_string();
        self.submit_with(
            move |link| {
                let device = link.open()?;
                device
                    .receiver
                    .stop_app(session_id.clone())
                    .map_err(wire)?;
                let mut app = link.app.lock().unwrap();
                if app.as_ref().is_some_and(|a| a.session_id == session_id) {
                    app.take();
                }
                debug!(session_id, "Application stopped");
                Ok(())
            },
            callback,
        )
    }

    fn media_player(&self) -> Result<Arc<dyn RemoteMediaPlayer>, CastError> {
        if self.link.app.lock().unwrap().is_none() {
            return Err(CastError::precondition("No receiver application running"));
        }
        let mut slot = self.player.lock().unwrap();
        let player = slot
            .get_or_insert_with(|| {
                Arc::new(RustCastMediaPlayer {
                    core: Arc::new(PlayerCore {
                        link: Arc::downgrade(&self.link),
                        jobs: self.jobs.clone(),
                        cache: Mutex::new(PlayerCache::default()),
                    }),
                })
            })
            .clone();
        Ok(player)
    }

    fn set_message_received_callbacks(
        &self,
        namespace: &str,
        _callback: Arc<dyn MessageReceivedCallback>,
    ) -> Result<(), CastError> {
        debug!(namespace, "Custom namespace requested");
        Err(CastError::not_supported("Custom namespace messaging"))
    }

    fn remove_message_received_callbacks(&self, _namespace: &str) -> Result<(), CastError> {
        Ok(())
    }

    fn send_message(
        &self,
        _namespace: &str,
        _message: &str,
        _callback: ResultCallback<()>,
    ) -> Result<(), CastError> {
        Err(CastError::not_supported("Custom namespace messaging"))
    }

    fn volume(&self) -> Result<f32, CastError> {
        self.link.require_connected()?;
        let device = self.link.open()?;
        let status = device.receiver.get_status().map_err(wire)?;
        Ok(status.volume.level.unwrap_or(0.0))
    }

    fn set_volume(&self, level: f32) -> Result<(), CastError> {
        self.link.require_connected()?;
        let device = self.link.open()?;
        device.receiver.set_volume(level).map_err(wire)?;
        let muted = device
            .receiver
            .get_status()
            .ok()
            .and_then(|s| s.volume.muted)
            .unwrap_or(false);
        self.link.events.on_volume_changed(level, muted);
        Ok(())
    }

    fn is_mute(&self) -> Result<bool, CastError> {
        self.link.require_connected()?;
        let device = self.link.open()?;
        let status = device.receiver.get_status().map_err(wire)?;
        Ok(status.volume.muted.unwrap_or(false))
    }

    fn set_mute(&self, mute: bool) -> Result<(), CastError> {
        self.link.require_connected()?;
        let device = self.link.open()?;
        // Volume implements From<bool>
        device.receiver.set_volume(mute).map_err(wire)?;
        let level = device
            .receiver
            .get_status()
            .ok()
            .and_then(|s| s.volume.level)
            .unwrap_or(0.0);
        self.link.events.on_volume_changed(level, mute);
        Ok(())
    }
}

#[derive(Default)]
struct PlayerCache {
    status: Option<MediaStatus>,
    listener: Option<Arc<dyn MediaStatusListener>>,
}

struct PlayerCore {
    link: Weak<Link>,
    jobs: Sender<Job>,
    cache: Mutex<PlayerCache>,
}

impl PlayerCore {
    fn media_session_id(&self) -> Result<i32, CastError> {
        self.cache
            .lock()
            .unwrap()
            .status
            .as_ref()
            .map(|s| s.media_session_id)
            .ok_or_else(CastError::no_media)
    }

    /// Stores the receiver's status and notifies the status listener.
    fn update(&self, entry: &StatusEntry) -> MediaStatus {
        let status = media_status_from(entry);
        let listener = {
            let mut cache = self.cache.lock().unwrap();
            cache.status = Some(status.clone());
            cache.listener.clone()
        };
        if let Some(listener) = listener {
            listener.on_status_updated();
            listener.on_metadata_updated();
        }
        status
    }

    /// Runs `op` against the application transport on the client worker,
    /// then refreshes the media status of the session id it returns.
    fn command<F>(
        self: &Arc<Self>,
        client: &Arc<dyn CastClient>,
        op: F,
        callback: ResultCallback<MediaStatus>,
    ) where
        F: FnOnce(&CastDevice<'static>, &RunningApp) -> Result<i32, CastError> + Send + 'static,
    {
        if !client.is_connected() {
            return callback(Err(CastError::not_connected()));
        }
        let Some(link) = self.link.upgrade() else {
            return callback(Err(CastError::transport("Cast client released")));
        };

        let core = self.clone();
        let job: Job = Box::new(move || {
            let result = link.open_app().and_then(|(device, app)| {
                let media_session_id = op(&device, &app)?;
                let status = device
                    .media
                    .get_status(app.transport_id.clone(), Some(media_session_id))
                    .map_err(wire)?;
                status
                    .entries
                    .first()
                    .map(|entry| core.update(entry))
                    .ok_or_else(CastError::no_media)
            });
            callback(result);
        });

        if let Err(e) = self.jobs.send(job) {
            warn!("Cast worker thread is gone, running media command inline");
            (e.into_inner())();
        }
    }

    /// Issues a command on the current media session.
    fn session_command<F>(
        self: &Arc<Self>,
        client: &Arc<dyn CastClient>,
        op: F,
        callback: ResultCallback<()>,
    ) where
        F: FnOnce(&CastDevice<'static>, String, i32) -> Result<(), CastError> + Send + 'static,
    {
        let media_session_id = match self.media_session_id() {
            Ok(id) => id,
            Err(err) => return callback(Err(err)),
        };
        self.command(
            client,
            move |device, app| {
                op(device, app.transport_id.clone(), media_session_id)?;
                Ok(media_session_id)
            },
            Box::new(move |result| callback(result.map(|_| ()))),
        );
    }
}

/// Default media receiver channel of the running application.
pub struct RustCastMediaPlayer {
    core: Arc<PlayerCore>,
}

impl RemoteMediaPlayer for RustCastMediaPlayer {
    fn load(
        &self,
        client: &Arc<dyn CastClient>,
        media: &CastMediaInfo,
        autoplay: bool,
        callback: ResultCallback<MediaStatus>,
    ) {
        let request = load_request(media);
        self.core.command(
            client,
            move |device, app| {
                let status = device
                    .media
                    .load(app.transport_id.clone(), app.session_id.clone(), &request)
                    .map_err(wire)?;
                let entry = status.entries.first().ok_or_else(CastError::no_media)?;
                debug!("Media loaded with session ID: {}", entry.media_session_id);
                if !autoplay {
                    device
                        .media
                        .pause(app.transport_id.clone(), entry.media_session_id)
                        .map_err(wire)?;
                }
                Ok(entry.media_session_id)
            },
            callback,
        );
    }

    fn play(&self, client: &Arc<dyn CastClient>, callback: ResultCallback<()>) {
        self.core.session_command(
            client,
            |device, dest, id| device.media.play(dest, id).map(|_| ()).map_err(wire),
            callback,
        );
    }

    fn pause(&self, client: &Arc<dyn CastClient>, callback: ResultCallback<()>) {
        self.core.session_command(
            client,
            |device, dest, id| device.media.pause(dest, id).map(|_| ()).map_err(wire),
            callback,
        );
    }

    fn stop(&self, client: &Arc<dyn CastClient>, callback: ResultCallback<()>) {
        self.core.session_command(
            client,
            |device, dest, id| device.media.stop(dest, id).map(|_| ()).map_err(wire),
            callback,
        );
    }

    fn seek(
        &self,
        client: &Arc<dyn CastClient>,
        position: Duration,
        resume: ResumeState,
        callback: ResultCallback<()>,
    ) {
        let resume = resume_state(resume);
        self.core.session_command(
            client,
            move |device, dest, id| {
                device
                    .media
                    .seek(dest, id, Some(position.as_secs_f32()), resume)
                    .map(|_| ())
                    .map_err(wire)
            },
            callback,
        );
    }

    fn media_status(&self) -> Option<MediaStatus> {
        self.core.cache.lock().unwrap().status.clone()
    }

    fn stream_duration(&self) -> Duration {
        self.media_status()
            .and_then(|s| s.media)
            .and_then(|m| m.duration)
            .unwrap_or_default()
    }

    fn approximate_stream_position(&self) -> Duration {
        self.media_status().map(|s| s.position).unwrap_or_default()
    }

    fn set_status_listener(&self, listener: Option<Arc<dyn MediaStatusListener>>) {
        self.core.cache.lock().unwrap().listener = listener;
    }
}

fn resume_state(resume: ResumeState) -> Option<cast_media::ResumeState> {
    match resume {
        ResumeState::Unchanged => None,
        ResumeState::Play => Some(cast_media::ResumeState::PlaybackStart),
        ResumeState::Pause => Some(cast_media::ResumeState::PlaybackPause),
    }
}

fn player_state(state: &cast_media::PlayerState) -> PlayerState {
    match state {
        cast_media::PlayerState::Idle => PlayerState::Idle,
        cast_media::PlayerState::Playing => PlayerState::Playing,
        cast_media::PlayerState::Paused => PlayerState::Paused,
        cast_media::PlayerState::Buffering => PlayerState::Buffering,
    }
}

fn idle_reason(reason: &cast_media::IdleReason) -> IdleReason {
    match reason {
        cast_media::IdleReason::Cancelled => IdleReason::Cancelled,
        cast_media::IdleReason::Interrupted => IdleReason::Interrupted,
        cast_media::IdleReason::Finished => IdleReason::Finished,
        cast_media::IdleReason::Error => IdleReason::Error,
    }
}

fn seconds(value: f32) -> Duration {
    Duration::from_secs_f32(value.max(0.0))
}

fn media_status_from(entry: &StatusEntry) -> MediaStatus {
    let mut status = MediaStatus::new(entry.media_session_id, player_state(&entry.player_state));
    status.idle_reason = entry.idle_reason.as_ref().map(idle_reason);
    status.position = entry.current_time.map(seconds).unwrap_or_default();
    status.media = entry.media.as_ref().map(cast_media_from);
    status
}

fn cast_media_from(media: &Media) -> CastMediaInfo {
    let metadata = match &media.metadata {
        Some(Metadata::Generic(generic)) => Some(CastMetadata {
            kind: MetadataKind::Generic,
            title: generic.title.clone(),
            subtitle: generic.subtitle.clone(),
            images: generic.images.iter().map(|i| i.url.clone()).collect(),
        }),
        _ => None,
    };
    CastMediaInfo {
        content_id: media.content_id.clone(),
        content_type: media.content_type.clone(),
        stream_type: match media.stream_type {
            cast_media::StreamType::None => StreamType::None,
            cast_media::StreamType::Buffered => StreamType::Buffered,
            cast_media::StreamType::Live => StreamType::Live,
        },
        metadata,
        tracks: Vec::new(),
        repeat_mode: RepeatMode::Off,
        duration: media.duration.map(seconds),
    }
}

/// Converts a load request to the `rust_cast` media description. Text
/// tracks and the repeat mode have no `rust_cast` counterpart.
fn load_request(media: &CastMediaInfo) -> Media {
    if !media.tracks.is_empty() || media.repeat_mode != RepeatMode::Off {
        debug!("Text tracks and repeat mode are not forwarded to the receiver");
    }
    Media {
        content_id: media.content_id.clone(),
        content_type: media.content_type.clone(),
        stream_type: match media.stream_type {
            StreamType::None => cast_media::StreamType::None,
            StreamType::Buffered => cast_media::StreamType::Buffered,
            StreamType::Live => cast_media::StreamType::Live,
        },
        duration: media.duration.map(|d| d.as_secs_f32()),
        metadata: media.metadata.as_ref().map(|m| {
            Metadata::Generic(GenericMediaMetadata {
                title: m.title.clone(),
                subtitle: m.subtitle.clone(),
                images: m
                    .images
                    .iter()
                    .map(|url| Image {
                        url: url.clone(),
                        dimensions: None,
                    })
                    .collect(),
                ..Default::default()
            })
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MediaInfo, build_cast_media};

    #[test]
    fn test_default_media_receiver_is_builtin_app() {
        assert!(matches!(
            device_app(DEFAULT_MEDIA_APP_ID),
            CastDeviceApp::DefaultMediaReceiver
        ));
        assert!(matches!(device_app("ABCD1234"), CastDeviceApp::Custom(id) if id == "ABCD1234"));
    }

    #[test]
    fn test_resume_state_mapping() {
        assert!(resume_state(ResumeState::Unchanged).is_none());
        assert!(matches!(
            resume_state(ResumeState::Play),
            Some(cast_media::ResumeState::PlaybackStart)
        ));
        assert!(matches!(
            resume_state(ResumeState::Pause),
            Some(cast_media::ResumeState::PlaybackPause)
        ));
    }

    #[test]
    fn test_load_request_carries_generic_metadata() {
        let info = MediaInfo::builder("http://host/a.flac", "audio/flac")
            .title("Title")
            .description("Album")
            .icon("http://host/cover.jpg")
            .duration(Duration::from_secs(90))
            .build();
        let request = load_request(&build_cast_media(&info, MetadataKind::Generic, false));

        assert_eq!(request.content_id, "http://host/a.flac");
        assert_eq!(request.content_type, "audio/flac");
        assert!(matches!(request.stream_type, cast_media::StreamType::Buffered));
        assert_eq!(request.duration, Some(90.0));
        match request.metadata {
            Some(Metadata::Generic(generic)) => {
                assert_eq!(generic.title.as_deref(), Some("Title"));
                assert_eq!(generic.subtitle.as_deref(), Some("Album"));
                assert_eq!(generic.images.len(), 1);
                assert_eq!(generic.images[0].url, "http://host/cover.jpg");
            }
            _ => panic!("expected generic metadata"),
        }
    }

    #[test]
    fn test_received_media_maps_back() {
        let info = MediaInfo::builder("http://host/p.jpg", "image/jpeg")
            .title("Photo")
            .build();
        let request = load_request(&build_cast_media(&info, MetadataKind::Photo, false));
        let media = cast_media_from(&request);

        assert_eq!(media.content_id, "http://host/p.jpg");
        assert_eq!(media.stream_type, StreamType::None);
        assert_eq!(media.metadata.and_then(|m| m.title).as_deref(), Some("Photo"));
        assert!(media.duration.is_none());
    }

    #[test]
    fn test_negative_time_clamps_to_zero() {
        assert_eq!(seconds(-1.5), Duration::ZERO);
        assert_eq!(seconds(2.5), Duration::from_millis(2500));
    }

    #[test]
    fn test_empty_status_text_is_absent() {
        let app = RunningApp {
            app_id: "CC1AD845".to_string(),
            session_id: "s-1".to_string(),
            transport_id: "t-1".to_string(),
        };
        let connection = application_connection(&app, "Default Media Receiver", "", true);
        assert_eq!(connection.metadata.application_id, "CC1AD845");
        assert_eq!(connection.session_id, "s-1");
        assert!(connection.status_text.is_none());
        assert!(connection.was_launched);
    }
}
