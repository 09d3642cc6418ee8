//! Connection to one Cast receiver.
//!
//! A `CastSession` owns at most one platform [`CastClient`], created through
//! the injected [`CastClientFactory`] on first connect and released on
//! disconnect. Its phase moves `Idle -> Connecting -> Connected`, then
//! `AppLaunching -> AppReady` when a receiver application is started, and
//! back to `Idle` on disconnect or connection failure.
//!
//! Application-level commands (launch, join, close, volume, web-app channel)
//! wait for the connection and trigger it if needed. Transport commands
//! (play, pause, stop, seek) fail immediately when their preconditions are
//! not met.

use std::collections::HashMap;
use std::mem;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::capabilities::{CapabilityMethods, SessionKind};
use crate::control::{MediaLaunch, MediaPlayer, VolumeControl, WebAppLauncher};
use crate::dispatcher::Dispatcher;
use crate::errors::CastError;
use crate::listener::{ResponseListener, SharedListener, SubscriberSet, Subscription};
use crate::media::{CastMediaInfo, MediaInfo, MetadataKind, PlayState, build_cast_media};
use crate::media_control::{MediaControl, PlayerHandle, unsupported};
use crate::model::{CastDeviceInfo, LaunchSession, LaunchSessionType, ServiceConfig, ServiceDescription};
use crate::platform::{
    ApplicationConnection, CastClient, CastClientFactory, ConnectionEvents, LaunchOptions,
    MediaStatusListener, RemoteMediaPlayer, SuspendCause, same_object,
};
use crate::settings::CastSettings;
use crate::webapp::CastWebAppSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Connecting,
    Connected,
    AppLaunching,
    AppReady,
}

/// Connection lifecycle notifications, delivered on the dispatcher.
pub trait ConnectionListener: Send + Sync {
    fn on_connection_success(&self, session: &CastSession);
    fn on_connection_failure(&self, session: &CastSession, error: &CastError);
    fn on_disconnect(&self, session: &CastSession, error: Option<&CastError>);

    fn on_connection_suspended(&self, session: &CastSession) {
        debug!(service = session.description().uuid(), "Unhandled connection suspension");
    }
}

type PendingCommand = Box<dyn FnOnce(Result<Arc<dyn CastClient>, CastError>) + Send + 'static>;

struct SessionState {
    phase: SessionPhase,
    connected: bool,
    // Bumped whenever the current client is dropped, so late events from a
    // previous client are ignored.
    generation: u64,
    api_client: Option<Arc<dyn CastClient>>,
    cast_device: Option<CastDeviceInfo>,
    media_player: Option<Arc<dyn RemoteMediaPlayer>>,
    current_app: Option<LaunchSession>,
    pending: Vec<PendingCommand>,
    web_apps: HashMap<String, CastWebAppSession>,
}

impl SessionState {
    fn settled_phase(&self) -> SessionPhase {
        if self.connected {
            SessionPhase::Connected
        } else {
            SessionPhase::Idle
        }
    }

    /// Forgets the client and everything bound to it.
    fn release(&mut self) -> ReleasedClient {
        self.connected = false;
        self.phase = SessionPhase::Idle;
        self.generation += 1;
        self.media_player = None;
        self.current_app = None;
        ReleasedClient {
            client: self.api_client.take(),
            pending: mem::take(&mut self.pending),
            web_apps: self.web_apps.drain().map(|(_, app)| app).collect(),
        }
    }
}

struct ReleasedClient {
    client: Option<Arc<dyn CastClient>>,
    pending: Vec<PendingCommand>,
    web_apps: Vec<CastWebAppSession>,
}

pub(crate) struct SessionInner {
    description: ServiceDescription,
    settings: CastSettings,
    factory: Arc<dyn CastClientFactory>,
    dispatcher: Dispatcher,
    config: Mutex<ServiceConfig>,
    state: Mutex<SessionState>,
    listener: Mutex<Option<Arc<dyn ConnectionListener>>>,
    play_state_subscribers: Arc<SubscriberSet<PlayState>>,
    media_info_subscribers: Arc<SubscriberSet<MediaInfo>>,
    volume_subscribers: Arc<SubscriberSet<f32>>,
    mute_subscribers: Arc<SubscriberSet<bool>>,
}

#[derive(Clone)]
pub struct CastSession {
    inner: Arc<SessionInner>,
}

/// Non-owning reference held by web-app sessions.
#[derive(Clone)]
pub(crate) struct WeakCastSession(Weak<SessionInner>);

impl WeakCastSession {
    pub(crate) fn upgrade(&self) -> Option<CastSession> {
        self.0.upgrade().map(|inner| CastSession { inner })
    }
}

impl CastSession {
    pub fn new(
        description: ServiceDescription,
        config: ServiceConfig,
        settings: CastSettings,
        factory: Arc<dyn CastClientFactory>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                description,
                settings,
                factory,
                dispatcher,
                config: Mutex::new(config),
                state: Mutex::new(SessionState {
                    phase: SessionPhase::Idle,
                    connected: false,
                    generation: 0,
                    api_client: None,
                    cast_device: None,
                    media_player: None,
                    current_app: None,
                    pending: Vec::new(),
                    web_apps: HashMap::new(),
                }),
                listener: Mutex::new(None),
                play_state_subscribers: SubscriberSet::new(),
                media_info_subscribers: SubscriberSet::new(),
                volume_subscribers: SubscriberSet::new(),
                mute_subscribers: SubscriberSet::new(),
            }),
        }
    }

    pub fn description(&self) -> &ServiceDescription {
        &self.inner.description
    }

    pub fn settings(&self) -> &CastSettings {
        &self.inner.settings
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub fn config(&self) -> ServiceConfig {
        self.inner.config.lock().unwrap().clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.state.lock().unwrap().phase
    }

    pub fn is_connected(&self) -> bool {
        self.inner.state.lock().unwrap().connected
    }

    /// Device handle copied from the description by the last `connect`.
    pub fn cast_device(&self) -> Option<CastDeviceInfo> {
        self.inner.state.lock().unwrap().cast_device.clone()
    }

    pub fn has_client(&self) -> bool {
        self.inner.state.lock().unwrap().api_client.is_some()
    }

    pub fn has_media_player(&self) -> bool {
        self.inner.state.lock().unwrap().media_player.is_some()
    }

    pub fn current_launch_session(&self) -> Option<LaunchSession> {
        self.inner.state.lock().unwrap().current_app.clone()
    }

    pub fn set_listener(&self, listener: Option<Arc<dyn ConnectionListener>>) {
        *self.inner.listener.lock().unwrap() = listener;
    }

    pub fn media_player(&self) -> &dyn MediaPlayer {
        self
    }

    pub fn media_control(&self) -> &dyn MediaControl {
        self
    }

    pub fn volume_control(&self) -> &dyn VolumeControl {
        self
    }

    pub fn web_app_launcher(&self) -> &dyn WebAppLauncher {
        self
    }

    pub fn connect(&self) {
        let inner = &self.inner;
        let (device, existing, generation) = {
            let mut state = inner.state.lock().unwrap();
            state.cast_device = inner.description.device().cloned();
            let Some(device) = state.cast_device.clone() else {
                drop(state);
                warn!(service = inner.description.uuid(), "No Cast device to connect to");
                self.handle_connection_failed(CastError::precondition(
                    "Service description has no Cast device",
                ));
                return;
            };
            if state.api_client.is_none() {
                state.generation += 1;
            }
            (device, state.api_client.clone(), state.generation)
        };

        let client = match existing {
            Some(client) => client,
            None => {
                let events = Arc::new(SessionEvents {
                    session: Arc::downgrade(inner),
                    generation,
                });
                let created = inner.factory.create(&device, events);
                let (client, ready) = {
                    let mut state = inner.state.lock().unwrap();
                    if state.generation != generation {
                        debug!(device = %device.friendly_name, "Cast client superseded while being created");
                        return;
                    }
                    let client = state.api_client.get_or_insert(created).clone();
                    // Connected from inside `create`, before the client was stored.
                    let ready = if state.connected { mem::take(&mut state.pending) } else { Vec::new() };
                    (client, ready)
                };
                for command in ready {
                    command(Ok(client.clone()));
                }
                client
            }
        };

        if client.is_connecting() || client.is_connected() {
            debug!(device = %device.friendly_name, "Cast client already connecting or connected");
            return;
        }
        {
            let mut state = inner.state.lock().unwrap();
            if state.generation != generation {
                return;
            }
            state.phase = SessionPhase::Connecting;
        }

        info!(device = inner.description.friendly_name(), "Connecting to Cast device");
        client.connect();
    }

    pub fn disconnect(&self) {
        let released = {
            let mut state = self.inner.state.lock().unwrap();
            if state.api_client.is_none() {
                debug!("disconnect() without a Cast client, nothing to do");
                return;
            }
            state.release()
        };
        self.set_config_connected(false);

        let Some(client) = released.client else {
            return;
        };
        for app in &released.web_apps {
            app.detach(&client);
        }
        client.disconnect();
        info!(device = self.inner.description.friendly_name(), "Disconnected from Cast device");

        for command in released.pending {
            command(Err(CastError::disconnected()));
        }
        self.notify_listener(|listener, session| listener.on_disconnect(session, None));
    }

    /// Runs `command` with a connected client, connecting first if needed.
    pub(crate) fn run_command<F>(&self, command: F)
    where
        F: FnOnce(Result<Arc<dyn CastClient>, CastError>) + Send + 'static,
    {
        let client = self.inner.state.lock().unwrap().api_client.clone();
        if let Some(client) = client.filter(|c| c.is_connected()) {
            return command(Ok(client));
        }

        // The connection may have completed since the check above.
        let mut command: Option<PendingCommand> = Some(Box::new(command));
        let ready = {
            let mut state = self.inner.state.lock().unwrap();
            match state.api_client.clone() {
                Some(client) if state.connected => Some(client),
                _ => {
                    state.pending.extend(command.take());
                    None
                }
            }
        };
        match (ready, command) {
            (Some(client), Some(command)) => command(Ok(client)),
            _ => self.connect(),
        }
    }

    pub(crate) fn connected_client(&self) -> Option<Arc<dyn CastClient>> {
        let client = self.inner.state.lock().unwrap().api_client.clone();
        client.filter(|c| c.is_connected())
    }

    pub(crate) fn downgrade(&self) -> WeakCastSession {
        WeakCastSession(Arc::downgrade(&self.inner))
    }

    fn handle(&self) -> PlayerHandle {
        let state = self.inner.state.lock().unwrap();
        PlayerHandle {
            client: state.api_client.clone(),
            player: state.media_player.clone(),
        }
    }

    fn set_phase(&self, phase: SessionPhase) {
        self.inner.state.lock().unwrap().phase = phase;
    }

    fn set_config_connected(&self, connected: bool) {
        self.inner.config.lock().unwrap().connected = connected;
    }

    fn clear_media_player(&self) {
        let mut state = self.inner.state.lock().unwrap();
        state.media_player = None;
        state.phase = state.settled_phase();
    }

    fn notify_listener<F>(&self, f: F)
    where
        F: FnOnce(&Arc<dyn ConnectionListener>, &CastSession) + Send + 'static,
    {
        let session = self.clone();
        self.inner.dispatcher.post(move || {
            let listener = session.inner.listener.lock().unwrap().clone();
            if let Some(listener) = listener {
                f(&listener, &session);
            }
        });
    }

    fn launch_session_for(&self, app: &ApplicationConnection, kind: LaunchSessionType) -> LaunchSession {
        LaunchSession {
            app_id: app.metadata.application_id.clone(),
            app_name: Some(app.metadata.name.clone()),
            session_id: app.session_id.clone(),
            session_type: kind,
            service_uuid: self.inner.description.uuid().to_string(),
        }
    }

    // -- connection events --------------------------------------------------

    fn is_current(&self, generation: u64) -> bool {
        self.inner.state.lock().unwrap().generation == generation
    }

    fn generation(&self) -> u64 {
        self.inner.state.lock().unwrap().generation
    }

    /// Whether `client` is still the session's client for `generation`.
    fn is_bound(&self, generation: u64, client: &Arc<dyn CastClient>) -> bool {
        let state = self.inner.state.lock().unwrap();
        state.generation == generation
            && state.api_client.as_ref().is_some_and(|current| same_object(current, client))
    }

    fn handle_connected(&self) {
        let (client, pending) = {
            let mut state = self.inner.state.lock().unwrap();
            state.connected = true;
            if matches!(state.phase, SessionPhase::Idle | SessionPhase::Connecting) {
                state.phase = SessionPhase::Connected;
            }
            let client = state.api_client.clone();
            let pending = if client.is_some() { mem::take(&mut state.pending) } else { Vec::new() };
            (client, pending)
        };
        self.set_config_connected(true);
        info!(device = self.inner.description.friendly_name(), "Connected to Cast device");
        self.notify_listener(|listener, session| listener.on_connection_success(session));

        let Some(client) = client else {
            return;
        };
        for command in pending {
            command(Ok(client.clone()));
        }
    }

    fn handle_connection_failed(&self, error: CastError) {
        let released = self.inner.state.lock().unwrap().release();
        self.set_config_connected(false);
        warn!(device = self.inner.description.friendly_name(), "Cast connection failed: {}", error);

        for app in released.web_apps {
            app.notify_disconnected();
        }
        for command in released.pending {
            command(Err(error.clone()));
        }
        self.notify_listener(move |listener, session| listener.on_connection_failure(session, &error));
    }

    fn handle_connection_suspended(&self, cause: SuspendCause) {
        {
            let mut state = self.inner.state.lock().unwrap();
            state.connected = false;
            state.phase = SessionPhase::Connecting;
        }
        self.set_config_connected(false);
        warn!(device = self.inner.description.friendly_name(), ?cause, "Cast connection suspended");
        self.notify_listener(|listener, session| listener.on_connection_suspended(session));
    }

    fn handle_application_disconnected(&self, error: Option<CastError>) {
        let web_apps: Vec<CastWebAppSession> = {
            let mut state = self.inner.state.lock().unwrap();
            state.media_player = None;
            state.current_app = None;
            state.phase = state.settled_phase();
            state.web_apps.drain().map(|(_, app)| app).collect()
        };
        match error {
            Some(err) => warn!("Receiver application disconnected: {}", err),
            None => debug!("Receiver application disconnected"),
        }
        for app in web_apps {
            app.notify_disconnected();
        }
    }

    fn handle_volume_changed(&self, level: f32, muted: bool) {
        self.inner.volume_subscribers.notify(&self.inner.dispatcher, level);
        self.inner.mute_subscribers.notify(&self.inner.dispatcher, muted);
    }

    // -- media launch -------------------------------------------------------

    fn launch_media(&self, media: CastMediaInfo, listener: ResponseListener<MediaLaunch>) {
        let session = self.clone();
        let listener = SharedListener::new(listener);
        self.run_command(move |client| match client {
            Ok(client) => session.launch_media_on(client, media, listener),
            Err(err) => listener.post(&session.inner.dispatcher, Err(err)),
        });
    }

    fn launch_media_on(
        &self,
        client: Arc<dyn CastClient>,
        media: CastMediaInfo,
        listener: SharedListener<MediaLaunch>,
    ) {
        let dispatcher = &self.inner.dispatcher;
        let app_id = self.inner.settings.media_app_id.clone();
        let generation = self.generation();

        let status = match client.application_status() {
            Ok(status) => status,
            Err(err) => {
                warn!(app_id = %app_id, "Cannot read receiver application status: {}", err);
                self.clear_media_player();
                listener.post(dispatcher, Err(err));
                return;
            }
        };
        let running_app = self.current_launch_session().map(|ls| ls.app_id);
        let relaunch_if_running = status.is_none() || running_app.as_deref() != Some(app_id.as_str());
        self.set_phase(SessionPhase::AppLaunching);
        debug!(app_id = %app_id, relaunch_if_running, "Launching media receiver");

        let session = self.clone();
        let launch_client = client.clone();
        let launch_listener = listener.clone();
        let launched = client.launch_application(
            &app_id,
            LaunchOptions { relaunch_if_running },
            Box::new(move |result| {
                session.on_media_app_launched(generation, launch_client, result, media, launch_listener)
            }),
        );

        if let Err(err) = launched {
            warn!(app_id = %app_id, "Media receiver launch failed: {}", err);
            self.clear_media_player();
            listener.post(dispatcher, Err(err));
        }
    }

    fn on_media_app_launched(
        &self,
        generation: u64,
        client: Arc<dyn CastClient>,
        result: Result<ApplicationConnection, CastError>,
        media: CastMediaInfo,
        listener: SharedListener<MediaLaunch>,
    ) {
        let dispatcher = self.inner.dispatcher.clone();
        if !self.is_bound(generation, &client) {
            debug!(generation, "Media receiver launch completed for a released Cast client");
            listener.post(&dispatcher, Err(CastError::disconnected()));
            return;
        }
        let player = match result.and_then(|app| client.media_player().map(|p| (app, p))) {
            Ok(found) => found,
            Err(err) => {
                warn!("Media receiver did not start: {}", err);
                self.clear_media_player();
                listener.post(&dispatcher, Err(err));
                return;
            }
        };
        let (app, player) = player;

        let mut state = self.inner.state.lock().unwrap();
        if state.generation != generation {
            drop(state);
            listener.post(&dispatcher, Err(CastError::disconnected()));
            return;
        }
        let launch_session = self.launch_session_for(&app, LaunchSessionType::Media);
        state.media_player = Some(player.clone());
        state.current_app = Some(launch_session.clone());
        state.phase = SessionPhase::AppReady;
        drop(state);

        player.set_status_listener(Some(Arc::new(PlayerEvents {
            session: self.downgrade(),
        })));
        info!(
            app_id = %launch_session.app_id,
            session_id = %launch_session.session_id,
            content = %media.content_id,
            "Media receiver ready, loading media"
        );

        let session = self.clone();
        let load_client = client.clone();
        player.load(
            &client,
            &media,
            true,
            Box::new(move |result| {
                let result = if session.is_bound(generation, &load_client) {
                    result.map(|_| MediaLaunch {
                        launch_session,
                        media_control: true,
                    })
                } else {
                    Err(CastError::disconnected())
                };
                listener.post(&dispatcher, result);
            }),
        );
    }

    // -- web apps -----------------------------------------------------------

    fn start_web_app<F>(
        &self,
        kind: &'static str,
        existing: Option<CastWebAppSession>,
        listener: ResponseListener<CastWebAppSession>,
        request: F,
    ) where
        F: FnOnce(
                &Arc<dyn CastClient>,
                Box<dyn FnOnce(Result<ApplicationConnection, CastError>) + Send>,
            ) -> Result<(), CastError>
            + Send
            + 'static,
    {
        let session = self.clone();
        let listener = SharedListener::new(listener);
        self.run_command(move |client| {
            let dispatcher = session.inner.dispatcher.clone();
            let client = match client {
                Ok(client) => client,
                Err(err) => return listener.post(&dispatcher, Err(err)),
            };
            session.set_phase(SessionPhase::AppLaunching);

            let generation = session.generation();
            let started = session.clone();
            let started_client = client.clone();
            let started_listener = listener.clone();
            let issued = request(
                &client,
                Box::new(move |result| {
                    started.on_web_app_started(generation, &started_client, result, existing, started_listener)
                }),
            );
            if let Err(err) = issued {
                warn!("Web app {} failed: {}", kind, err);
                session.clear_media_player();
                listener.post(&dispatcher, Err(err));
            }
        });
    }

    fn on_web_app_started(
        &self,
        generation: u64,
        client: &Arc<dyn CastClient>,
        result: Result<ApplicationConnection, CastError>,
        existing: Option<CastWebAppSession>,
        listener: SharedListener<CastWebAppSession>,
    ) {
        let dispatcher = self.inner.dispatcher.clone();
        if !self.is_bound(generation, client) {
            debug!(generation, "Web app start completed for a released Cast client");
            listener.post(&dispatcher, Err(CastError::disconnected()));
            return;
        }
        let app = match result {
            Ok(app) => app,
            Err(err) => {
                warn!("Web app did not start: {}", err);
                self.clear_media_player();
                listener.post(&dispatcher, Err(err));
                return;
            }
        };

        let launch_session = self.launch_session_for(&app, LaunchSessionType::WebApp);
        let cached = existing.or_else(|| self.web_app_session(&launch_session.app_id));
        let web_app = match cached {
            Some(web_app) => {
                web_app.set_launch_session(launch_session.clone());
                web_app
            }
            None => CastWebAppSession::new(launch_session.clone(), self),
        };
        {
            let mut state = self.inner.state.lock().unwrap();
            if state.generation != generation {
                drop(state);
                listener.post(&dispatcher, Err(CastError::disconnected()));
                return;
            }
            state.current_app = Some(launch_session.clone());
            state.phase = SessionPhase::AppReady;
            state.web_apps.insert(launch_session.app_id.clone(), web_app.clone());
        }
        info!(app_id = %launch_session.app_id, session_id = %launch_session.session_id, "Web app ready");
        listener.post(&dispatcher, Ok(web_app));
    }

    /// Joins a running web app, binding the result to `existing` when given.
    pub(crate) fn join_web_app_as(
        &self,
        launch_session: &LaunchSession,
        existing: Option<CastWebAppSession>,
        listener: ResponseListener<CastWebAppSession>,
    ) {
        let app_id = launch_session.app_id.clone();
        let session_id = launch_session.session_id.clone();
        self.start_web_app("join", existing, listener, move |client, callback| {
            let session_id = Some(session_id.as_str()).filter(|s| !s.is_empty());
            client.join_application(&app_id, session_id, callback)
        });
    }

    /// Web-app session opened for `app_id`, if any.
    pub fn web_app_session(&self, app_id: &str) -> Option<CastWebAppSession> {
        self.inner.state.lock().unwrap().web_apps.get(app_id).cloned()
    }

    fn stop_app(&self, launch_session: &LaunchSession, listener: ResponseListener<()>) {
        let session = self.clone();
        let launch_session = launch_session.clone();
        let listener = SharedListener::new(listener);
        self.run_command(move |client| {
            let dispatcher = session.inner.dispatcher.clone();
            let client = match client {
                Ok(client) => client,
                Err(err) => return listener.post(&dispatcher, Err(err)),
            };

            let generation = session.generation();
            let stopped = session.clone();
            let stopped_client = client.clone();
            let stopped_session = launch_session.clone();
            let stopped_listener = listener.clone();
            let issued = client.stop_application(
                &launch_session.session_id,
                Box::new(move |result| {
                    let result = if stopped.is_bound(generation, &stopped_client) {
                        result
                    } else {
                        Err(CastError::disconnected())
                    };
                    if result.is_ok() {
                        stopped.forget_app(&stopped_session);
                    }
                    stopped_listener.post(&stopped.inner.dispatcher, result);
                }),
            );
            if let Err(err) = issued {
                listener.post(&dispatcher, Err(err));
            }
        });
    }

    fn forget_app(&self, launch_session: &LaunchSession) {
        let mut state = self.inner.state.lock().unwrap();
        let is_current = state
            .current_app
            .as_ref()
            .is_some_and(|app| app.session_id == launch_session.session_id);
        if is_current {
            state.current_app = None;
            state.media_player = None;
            state.phase = state.settled_phase();
        }
        state.web_apps.remove(&launch_session.app_id);
    }

    fn volume_command<T, F>(&self, listener: ResponseListener<T>, f: F)
    where
        T: Send + 'static,
        F: FnOnce(&dyn CastClient) -> Result<T, CastError> + Send + 'static,
    {
        let dispatcher = self.inner.dispatcher.clone();
        self.run_command(move |client| {
            let result = client.and_then(|client| f(client.as_ref()));
            listener.post(&dispatcher, result);
        });
    }
}

impl CapabilityMethods for CastSession {
    fn session_kind(&self) -> SessionKind {
        SessionKind::Cast
    }
}

impl MediaControl for CastSession {
    fn play(&self, listener: ResponseListener<()>) {
        self.handle().play(&self.inner.dispatcher, listener);
    }

    fn pause(&self, listener: ResponseListener<()>) {
        self.handle().pause(&self.inner.dispatcher, listener);
    }

    fn stop(&self, listener: ResponseListener<()>) {
        self.handle().stop(&self.inner.dispatcher, listener);
    }

    fn rewind(&self, listener: ResponseListener<()>) {
        unsupported(&self.inner.dispatcher, "rewind", listener);
    }

    fn fast_forward(&self, listener: ResponseListener<()>) {
        unsupported(&self.inner.dispatcher, "fast_forward", listener);
    }

    fn previous(&self, listener: ResponseListener<()>) {
        unsupported(&self.inner.dispatcher, "previous", listener);
    }

    fn next(&self, listener: ResponseListener<()>) {
        unsupported(&self.inner.dispatcher, "next", listener);
    }

    fn seek(&self, position: Duration, listener: ResponseListener<()>) {
        self.handle().seek(&self.inner.dispatcher, position, listener);
    }

    fn get_duration(&self, listener: ResponseListener<Duration>) {
        self.handle().duration(&self.inner.dispatcher, listener);
    }

    fn get_position(&self, listener: ResponseListener<Duration>) {
        self.handle().position(&self.inner.dispatcher, listener);
    }

    fn get_play_state(&self, listener: ResponseListener<PlayState>) {
        self.handle().play_state(&self.inner.dispatcher, listener);
    }

    fn subscribe_play_state<F>(&self, f: F) -> Subscription
    where
        F: Fn(PlayState) + Send + Sync + 'static,
    {
        self.inner.play_state_subscribers.subscribe(f)
    }
}

impl MediaPlayer for CastSession {
    fn play_media(&self, media: MediaInfo, should_loop: bool, listener: ResponseListener<MediaLaunch>) {
        let cast_media = build_cast_media(&media, MetadataKind::Movie, should_loop);
        self.launch_media(cast_media, listener);
    }

    fn display_image(&self, media: MediaInfo, listener: ResponseListener<MediaLaunch>) {
        let cast_media = build_cast_media(&media, MetadataKind::Photo, false);
        self.launch_media(cast_media, listener);
    }

    fn close_media(&self, launch_session: &LaunchSession, listener: ResponseListener<()>) {
        self.stop_app(launch_session, listener);
    }

    fn get_media_info(&self, listener: ResponseListener<MediaInfo>) {
        let result = self
            .handle()
            .player
            .and_then(|player| player.media_status())
            .and_then(|status| status.media)
            .map(|media| MediaInfo::from_cast_media(&media))
            .ok_or_else(CastError::no_media);
        listener.post(&self.inner.dispatcher, result);
    }

    fn subscribe_media_info<F>(&self, f: F) -> Subscription
    where
        F: Fn(MediaInfo) + Send + Sync + 'static,
    {
        self.inner.media_info_subscribers.subscribe(f)
    }
}

impl VolumeControl for CastSession {
    fn volume_up(&self, listener: ResponseListener<()>) {
        let step = self.inner.settings.volume_step;
        self.volume_command(listener, move |client| {
            let level = client.volume()?;
            client.set_volume((level + step).clamp(0.0, 1.0))
        });
    }

    fn volume_down(&self, listener: ResponseListener<()>) {
        let step = self.inner.settings.volume_step;
        self.volume_command(listener, move |client| {
            let level = client.volume()?;
            client.set_volume((level - step).clamp(0.0, 1.0))
        });
    }

    fn set_volume(&self, level: f32, listener: ResponseListener<()>) {
        if !(0.0..=1.0).contains(&level) {
            listener.post_error(
                &self.inner.dispatcher,
                CastError::precondition("Volume must be between 0.0 and 1.0"),
            );
            return;
        }
        self.volume_command(listener, move |client| client.set_volume(level));
    }

    fn get_volume(&self, listener: ResponseListener<f32>) {
        self.volume_command(listener, |client| client.volume());
    }

    fn set_mute(&self, mute: bool, listener: ResponseListener<()>) {
        self.volume_command(listener, move |client| client.set_mute(mute));
    }

    fn get_mute(&self, listener: ResponseListener<bool>) {
        self.volume_command(listener, |client| client.is_mute());
    }

    fn subscribe_volume<F>(&self, f: F) -> Subscription
    where
        F: Fn(f32) + Send + Sync + 'static,
    {
        self.inner.volume_subscribers.subscribe(f)
    }

    fn subscribe_mute<F>(&self, f: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.inner.mute_subscribers.subscribe(f)
    }
}

impl WebAppLauncher for CastSession {
    fn launch_web_app(
        &self,
        app_id: &str,
        relaunch_if_running: bool,
        listener: ResponseListener<CastWebAppSession>,
    ) {
        let app_id = app_id.to_string();
        self.start_web_app("launch", None, listener, move |client, callback| {
            client.launch_application(&app_id, LaunchOptions { relaunch_if_running }, callback)
        });
    }

    fn join_web_app(&self, launch_session: &LaunchSession, listener: ResponseListener<CastWebAppSession>) {
        self.join_web_app_as(launch_session, None, listener);
    }

    fn close_web_app(&self, launch_session: &LaunchSession, listener: ResponseListener<()>) {
        if let Some(app) = self.web_app_session(&launch_session.app_id) {
            app.disconnect_from_web_app();
        }
        self.stop_app(launch_session, listener);
    }
}

/// Connection event sink handed to the client factory.
struct SessionEvents {
    session: Weak<SessionInner>,
    generation: u64,
}

impl SessionEvents {
    fn session(&self) -> Option<CastSession> {
        let session = CastSession {
            inner: self.session.upgrade()?,
        };
        if session.is_current(self.generation) {
            Some(session)
        } else {
            debug!(generation = self.generation, "Ignoring event from a released Cast client");
            None
        }
    }
}

impl ConnectionEvents for SessionEvents {
    fn on_connected(&self) {
        if let Some(session) = self.session() {
            session.handle_connected();
        }
    }

    fn on_connection_suspended(&self, cause: SuspendCause) {
        if let Some(session) = self.session() {
            session.handle_connection_suspended(cause);
        }
    }

    fn on_connection_failed(&self, error: CastError) {
        if let Some(session) = self.session() {
            session.handle_connection_failed(error);
        }
    }

    fn on_application_disconnected(&self, error: Option<CastError>) {
        if let Some(session) = self.session() {
            session.handle_application_disconnected(error);
        }
    }

    fn on_volume_changed(&self, level: f32, muted: bool) {
        if let Some(session) = self.session() {
            session.handle_volume_changed(level, muted);
        }
    }
}

/// Forwards receiver media status pushes to the session subscribers.
struct PlayerEvents {
    session: WeakCastSession,
}

impl MediaStatusListener for PlayerEvents {
    fn on_status_updated(&self) {
        let Some(session) = self.session.upgrade() else {
            return;
        };
        let status = session.handle().player.and_then(|p| p.media_status());
        if let Some(status) = status {
            let state = PlayState::from(&status);
            session
                .inner
                .play_state_subscribers
                .notify(&session.inner.dispatcher, state);
        }
    }

    fn on_metadata_updated(&self) {
        let Some(session) = self.session.upgrade() else {
            return;
        };
        let media = session
            .handle()
            .player
            .and_then(|p| p.media_status())
            .and_then(|s| s.media);
        if let Some(media) = media {
            session
                .inner
                .media_info_subscribers
                .notify(&session.inner.dispatcher, MediaInfo::from_cast_media(&media));
        }
    }
}
