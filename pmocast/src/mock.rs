//! In-memory platform.
//!
//! Recording implementations of the platform traits. They never block and
//! never spawn threads: a test (or the simulator) drives the platform side
//! by hand, e.g. [`MockRouteRegistrar::announce`] or
//! [`MockCastClient::complete_connect`], then drains the dispatcher.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use crate::errors::CastError;
use crate::media::{CastMediaInfo, MediaStatus, PlayerState, ResumeState};
use crate::model::CastDeviceInfo;
use crate::platform::{
    ApplicationConnection, ApplicationMetadata, CallbackFlags, CastClient, CastClientFactory,
    ConnectionEvents, LaunchOptions, MediaStatusListener, MessageReceivedCallback,
    RemoteMediaPlayer, ResultCallback, RouteCallback, RouteInfo, RouteRegistrar, RouteSelector,
    same_object,
};

/// Address of the object behind an `Arc`, used to check which client a
/// player command was routed through.
pub fn object_addr<T: ?Sized>(value: &Arc<T>) -> usize {
    Arc::as_ptr(value) as *const () as usize
}

// ---------------------------------------------------------------------------
// Route registrar
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RegistrarState {
    callbacks: Vec<Arc<dyn RouteCallback>>,
    add_calls: Vec<(RouteSelector, CallbackFlags)>,
    remove_calls: usize,
    fail_next_add: Option<CastError>,
}

#[derive(Default)]
pub struct MockRouteRegistrar {
    state: Mutex<RegistrarState>,
}

impl MockRouteRegistrar {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_calls(&self) -> Vec<(RouteSelector, CallbackFlags)> {
        self.state.lock().unwrap().add_calls.clone()
    }

    pub fn remove_calls(&self) -> usize {
        self.state.lock().unwrap().remove_calls
    }

    /// Number of callbacks currently registered.
    pub fn registered(&self) -> usize {
        self.state.lock().unwrap().callbacks.len()
    }

    pub fn fail_next_add(&self, error: CastError) {
        self.state.lock().unwrap().fail_next_add = Some(error);
    }

    pub fn announce(&self, route: RouteInfo) {
        for callback in self.snapshot() {
            callback.on_route_added(route.clone());
        }
    }

    pub fn change(&self, route: RouteInfo) {
        for callback in self.snapshot() {
            callback.on_route_changed(route.clone());
        }
    }

    pub fn withdraw(&self, route: RouteInfo) {
        for callback in self.snapshot() {
            callback.on_route_removed(route.clone());
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn RouteCallback>> {
        self.state.lock().unwrap().callbacks.clone()
    }
}

impl RouteRegistrar for MockRouteRegistrar {
    fn add_callback(
        &self,
        selector: &RouteSelector,
        callback: Arc<dyn RouteCallback>,
        flags: CallbackFlags,
    ) -> Result<(), CastError> {
        let mut state = self.state.lock().unwrap();
        state.add_calls.push((selector.clone(), flags));
        if let Some(err) = state.fail_next_add.take() {
            return Err(err);
        }
        if !state.callbacks.iter().any(|c| same_object(c, &callback)) {
            state.callbacks.push(callback);
        }
        Ok(())
    }

    fn remove_callback(&self, callback: &Arc<dyn RouteCallback>) {
        let mut state = self.state.lock().unwrap();
        state.remove_calls += 1;
        state.callbacks.retain(|c| !same_object(c, callback));
    }
}

// ---------------------------------------------------------------------------
// Media player
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCall {
    Load { media: CastMediaInfo, autoplay: bool },
    Play,
    Pause,
    Stop,
    Seek { position: Duration, resume: ResumeState },
}

#[derive(Default)]
struct PlayerRecord {
    calls: Vec<(PlayerCall, usize)>,
    status: Option<MediaStatus>,
    duration: Duration,
    position: Duration,
    listener: Option<Arc<dyn MediaStatusListener>>,
    command_error: Option<CastError>,
}

#[derive(Default)]
pub struct MockMediaPlayer {
    state: Mutex<PlayerRecord>,
    next_media_session: AtomicI32,
}

impl MockMediaPlayer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<PlayerCall> {
        self.state.lock().unwrap().calls.iter().map(|(c, _)| c.clone()).collect()
    }

    /// Client address each call was routed through, see [`object_addr`].
    pub fn call_clients(&self) -> Vec<usize> {
        self.state.lock().unwrap().calls.iter().map(|(_, a)| *a).collect()
    }

    pub fn loaded_media(&self) -> Option<CastMediaInfo> {
        self.calls().into_iter().rev().find_map(|c| match c {
            PlayerCall::Load { media, .. } => Some(media),
            _ => None,
        })
    }

    pub fn set_status(&self, status: Option<MediaStatus>) {
        self.state.lock().unwrap().status = status;
    }

    /// Stores `status` and notifies the status listener, as a receiver push
    /// would.
    pub fn push_status(&self, status: MediaStatus) {
        let listener = {
            let mut state = self.state.lock().unwrap();
            state.position = status.position;
            state.status = Some(status);
            state.listener.clone()
        };
        if let Some(listener) = listener {
            listener.on_status_updated();
            listener.on_metadata_updated();
        }
    }

    pub fn set_duration(&self, duration: Duration) {
        self.state.lock().unwrap().duration = duration;
    }

    pub fn set_position(&self, position: Duration) {
        self.state.lock().unwrap().position = position;
    }

    /// Every following command fails with `error` until reset with `None`.
    pub fn fail_commands_with(&self, error: Option<CastError>) {
        self.state.lock().unwrap().command_error = error;
    }

    pub fn has_status_listener(&self) -> bool {
        self.state.lock().unwrap().listener.is_some()
    }

    fn record(&self, call: PlayerCall, client: &Arc<dyn CastClient>) -> Result<(), CastError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push((call, object_addr(client)));
        match &state.command_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn transition(&self, player_state: PlayerState) {
        if let Some(status) = self.state.lock().unwrap().status.as_mut() {
            status.player_state = player_state;
        }
    }
}

impl RemoteMediaPlayer for MockMediaPlayer {
    fn load(
        &self,
        client: &Arc<dyn CastClient>,
        media: &CastMediaInfo,
        autoplay: bool,
        callback: ResultCallback<MediaStatus>,
    ) {
        let call = PlayerCall::Load {
            media: media.clone(),
            autoplay,
        };
        if let Err(err) = self.record(call, client) {
            callback(Err(err));
            return;
        }

        let id = self.next_media_session.fetch_add(1, Ordering::Relaxed) + 1;
        let mut status = MediaStatus::new(
            id,
            if autoplay { PlayerState::Playing } else { PlayerState::Paused },
        );
        status.media = Some(media.clone());
        {
            let mut state = self.state.lock().unwrap();
            state.duration = media.duration.unwrap_or_default();
            state.position = Duration::ZERO;
        }
        self.push_status(status.clone());
        callback(Ok(status));
    }

    fn play(&self, client: &Arc<dyn CastClient>, callback: ResultCallback<()>) {
        let result = self.record(PlayerCall::Play, client);
        if result.is_ok() {
            self.transition(PlayerState::Playing);
        }
        callback(result);
    }

    fn pause(&self, client: &Arc<dyn CastClient>, callback: ResultCallback<()>) {
        let result = self.record(PlayerCall::Pause, client);
        if result.is_ok() {
            self.transition(PlayerState::Paused);
        }
        callback(result);
    }

    fn stop(&self, client: &Arc<dyn CastClient>, callback: ResultCallback<()>) {
        let result = self.record(PlayerCall::Stop, client);
        if result.is_ok() {
            self.transition(PlayerState::Idle);
        }
        callback(result);
    }

    fn seek(
        &self,
        client: &Arc<dyn CastClient>,
        position: Duration,
        resume: ResumeState,
        callback: ResultCallback<()>,
    ) {
        let result = self.record(PlayerCall::Seek { position, resume }, client);
        if result.is_ok() {
            self.state.lock().unwrap().position = position;
        }
        callback(result);
    }

    fn media_status(&self) -> Option<MediaStatus> {
        self.state.lock().unwrap().status.clone()
    }

    fn stream_duration(&self) -> Duration {
        self.state.lock().unwrap().duration
    }

    fn approximate_stream_position(&self) -> Duration {
        self.state.lock().unwrap().position
    }

    fn set_status_listener(&self, listener: Option<Arc<dyn MediaStatusListener>>) {
        self.state.lock().unwrap().listener = listener;
    }
}

// ---------------------------------------------------------------------------
// Cast client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppRequest {
    Launch { app_id: String, options: LaunchOptions },
    Join { app_id: String, session_id: Option<String> },
    Stop { session_id: String },
}

struct ClientState {
    events: Option<Arc<dyn ConnectionEvents>>,
    application_status: Result<Option<String>, CastError>,
    launch_error: Option<CastError>,
    app_requests: Vec<AppRequest>,
    pending_apps: VecDeque<(String, ResultCallback<ApplicationConnection>)>,
    pending_stops: VecDeque<ResultCallback<()>>,
    message_callbacks: HashMap<String, Arc<dyn MessageReceivedCallback>>,
    sent_messages: Vec<(String, String)>,
    volume: f32,
    muted: bool,
}

pub struct MockCastClient {
    connecting: AtomicBool,
    connected: AtomicBool,
    auto_connect: AtomicBool,
    auto_launch: AtomicBool,
    hold_stops: AtomicBool,
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
    player: Arc<MockMediaPlayer>,
    state: Mutex<ClientState>,
}

impl MockCastClient {
    /// A client whose connection and launches complete only when the test
    /// says so.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connecting: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            auto_connect: AtomicBool::new(false),
            auto_launch: AtomicBool::new(false),
            hold_stops: AtomicBool::new(false),
            connect_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
            player: MockMediaPlayer::new(),
            state: Mutex::new(ClientState {
                events: None,
                application_status: Ok(None),
                launch_error: None,
                app_requests: Vec::new(),
                pending_apps: VecDeque::new(),
                pending_stops: VecDeque::new(),
                message_callbacks: HashMap::new(),
                sent_messages: Vec::new(),
                volume: 0.5,
                muted: false,
            }),
        })
    }

    /// A client that connects and launches applications immediately.
    pub fn responsive() -> Arc<Self> {
        let client = Self::new();
        client.auto_connect.store(true, Ordering::Release);
        client.auto_launch.store(true, Ordering::Release);
        client
    }

    pub fn addr(self: &Arc<Self>) -> usize {
        object_addr(self)
    }

    pub fn player(&self) -> Arc<MockMediaPlayer> {
        self.player.clone()
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::Acquire)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::Acquire)
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    pub fn set_connecting(&self, connecting: bool) {
        self.connecting.store(connecting, Ordering::Release);
    }

    pub fn set_application_status(&self, status: Result<Option<String>, CastError>) {
        self.state.lock().unwrap().application_status = status;
    }

    /// The next launch fails synchronously with `error`.
    pub fn fail_next_launch(&self, error: CastError) {
        self.state.lock().unwrap().launch_error = Some(error);
    }

    pub fn app_requests(&self) -> Vec<AppRequest> {
        self.state.lock().unwrap().app_requests.clone()
    }

    pub fn pending_app_callbacks(&self) -> usize {
        self.state.lock().unwrap().pending_apps.len()
    }

    pub fn sent_messages(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().sent_messages.clone()
    }

    pub fn has_message_callback(&self, namespace: &str) -> bool {
        self.state.lock().unwrap().message_callbacks.contains_key(namespace)
    }

    pub fn events(&self) -> Option<Arc<dyn ConnectionEvents>> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn complete_connect(&self) {
        self.connecting.store(false, Ordering::Release);
        self.connected.store(true, Ordering::Release);
        if let Some(events) = self.events() {
            events.on_connected();
        }
    }

    pub fn fail_connect(&self, error: CastError) {
        self.connecting.store(false, Ordering::Release);
        self.connected.store(false, Ordering::Release);
        if let Some(events) = self.events() {
            events.on_connection_failed(error);
        }
    }

    /// Completes the oldest pending launch or join. Returns false when none
    /// is pending.
    pub fn complete_app_request(&self, result: Result<(), CastError>) -> bool {
        let pending = self.state.lock().unwrap().pending_apps.pop_front();
        match pending {
            Some((app_id, callback)) => {
                callback(result.map(|_| Self::application(&app_id)));
                true
            }
            None => false,
        }
    }

    /// Keeps stop callbacks pending until [`MockCastClient::complete_stop`].
    pub fn hold_stops(&self, hold: bool) {
        self.hold_stops.store(hold, Ordering::Release);
    }

    /// Completes the oldest held stop. Returns false when none is pending.
    pub fn complete_stop(&self, result: Result<(), CastError>) -> bool {
        let pending = self.state.lock().unwrap().pending_stops.pop_front();
        match pending {
            Some(callback) => {
                callback(result);
                true
            }
            None => false,
        }
    }

    /// Delivers a message on `namespace` as the receiver would.
    pub fn deliver_message(&self, namespace: &str, message: Option<&str>) -> bool {
        let callback = self.state.lock().unwrap().message_callbacks.get(namespace).cloned();
        match callback {
            Some(callback) => {
                callback.on_message_received(None, Some(namespace), message);
                true
            }
            None => false,
        }
    }

    pub fn application(app_id: &str) -> ApplicationConnection {
        ApplicationConnection {
            metadata: ApplicationMetadata {
                application_id: app_id.to_string(),
                name: app_id.to_string(),
                namespaces: Vec::new(),
            },
            session_id: Uuid::new_v4().to_string(),
            status_text: Some("Ready To Cast".to_string()),
            was_launched: true,
        }
    }

    fn attach(&self, events: Arc<dyn ConnectionEvents>) {
        self.state.lock().unwrap().events = Some(events);
    }

    fn queue_app(&self, app_id: &str, callback: ResultCallback<ApplicationConnection>) {
        if self.auto_launch.load(Ordering::Acquire) {
            callback(Ok(Self::application(app_id)));
        } else {
            self.state
                .lock()
                .unwrap()
                .pending_apps
                .push_back((app_id.to_string(), callback));
        }
    }
}

impl CastClient for MockCastClient {
    fn connect(&self) {
        self.connect_calls.fetch_add(1, Ordering::AcqRel);
        self.connecting.store(true, Ordering::Release);
        debug!("mock client: connect");
        if self.auto_connect.load(Ordering::Acquire) {
            self.complete_connect();
        }
    }

    fn disconnect(&self) {
        self.disconnect_calls.fetch_add(1, Ordering::AcqRel);
        self.connecting.store(false, Ordering::Release);
        self.connected.store(false, Ordering::Release);
    }

    fn is_connecting(&self) -> bool {
        self.connecting.load(Ordering::Acquire)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn application_status(&self) -> Result<Option<String>, CastError> {
        self.state.lock().unwrap().application_status.clone()
    }

    fn launch_application(
        &self,
        app_id: &str,
        options: LaunchOptions,
        callback: ResultCallback<ApplicationConnection>,
    ) -> Result<(), CastError> {
        {
            let mut state = self.state.lock().unwrap();
            state.app_requests.push(AppRequest::Launch {
                app_id: app_id.to_string(),
                options,
            });
            if let Some(err) = state.launch_error.take() {
                return Err(err);
            }
        }
        self.queue_app(app_id, callback);
        Ok(())
    }

    fn join_application(
        &self,
        app_id: &str,
        session_id: Option<&str>,
        callback: ResultCallback<ApplicationConnection>,
    ) -> Result<(), CastError> {
        self.state.lock().unwrap().app_requests.push(AppRequest::Join {
            app_id: app_id.to_string(),
            session_id: session_id.map(str::to_string),
        });
        self.queue_app(app_id, callback);
        Ok(())
    }

    fn stop_application(
        &self,
        session_id: &str,
        callback: ResultCallback<()>,
    ) -> Result<(), CastError> {
        {
            let mut state = self.state.lock().unwrap();
            state.app_requests.push(AppRequest::Stop {
                session_id: session_id.to_string(),
            });
            if self.hold_stops.load(Ordering::Acquire) {
                state.pending_stops.push_back(callback);
                return Ok(());
            }
        }
        callback(Ok(()));
        Ok(())
    }

    fn media_player(&self) -> Result<Arc<dyn RemoteMediaPlayer>, CastError> {
        Ok(self.player.clone())
    }

    fn set_message_received_callbacks(
        &self,
        namespace: &str,
        callback: Arc<dyn MessageReceivedCallback>,
    ) -> Result<(), CastError> {
        self.state
            .lock()
            .unwrap()
            .message_callbacks
            .insert(namespace.to_string(), callback);
        Ok(())
    }

    fn remove_message_received_callbacks(&self, namespace: &str) -> Result<(), CastError> {
        self.state.lock().unwrap().message_callbacks.remove(namespace);
        Ok(())
    }

    fn send_message(
        &self,
        namespace: &str,
        message: &str,
        callback: ResultCallback<()>,
    ) -> Result<(), CastError> {
        if !self.is_connected() {
            return Err(CastError::transport("client is not connected"));
        }
        self.state
            .lock()
            .unwrap()
            .sent_messages
            .push((namespace.to_string(), message.to_string()));
        callback(Ok(()));
        Ok(())
    }

    fn volume(&self) -> Result<f32, CastError> {
        Ok(self.state.lock().unwrap().volume)
    }

    fn set_volume(&self, level: f32) -> Result<(), CastError> {
        let (events, muted) = {
            let mut state = self.state.lock().unwrap();
            state.volume = level;
            (state.events.clone(), state.muted)
        };
        if let Some(events) = events {
            events.on_volume_changed(level, muted);
        }
        Ok(())
    }

    fn is_mute(&self) -> Result<bool, CastError> {
        Ok(self.state.lock().unwrap().muted)
    }

    fn set_mute(&self, mute: bool) -> Result<(), CastError> {
        let (events, level) = {
            let mut state = self.state.lock().unwrap();
            state.muted = mute;
            (state.events.clone(), state.volume)
        };
        if let Some(events) = events {
            events.on_volume_changed(level, mute);
        }
        Ok(())
    }
}

/// Hands out one shared [`MockCastClient`] and records every creation.
pub struct MockCastClientFactory {
    client: Arc<MockCastClient>,
    devices: Mutex<Vec<CastDeviceInfo>>,
}

impl MockCastClientFactory {
    pub fn new(client: Arc<MockCastClient>) -> Arc<Self> {
        Arc::new(Self {
            client,
            devices: Mutex::new(Vec::new()),
        })
    }

    pub fn client(&self) -> Arc<MockCastClient> {
        self.client.clone()
    }

    pub fn created(&self) -> usize {
        self.devices.lock().unwrap().len()
    }

    pub fn devices(&self) -> Vec<CastDeviceInfo> {
        self.devices.lock().unwrap().clone()
    }
}

impl CastClientFactory for MockCastClientFactory {
    fn create(
        &self,
        device: &CastDeviceInfo,
        events: Arc<dyn ConnectionEvents>,
    ) -> Arc<dyn CastClient> {
        self.devices.lock().unwrap().push(device.clone());
        self.client.attach(events);
        self.client.clone()
    }
}
