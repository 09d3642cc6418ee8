use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pmocast::capabilities::media_control;
use pmocast::mock::{AppRequest, MockCastClient, MockCastClientFactory, MockRouteRegistrar, PlayerCall};
use pmocast::platform::RouteInfo;
use pmocast::{
    CapabilityMethods, CastDeviceInfo, CastDiscoveryProvider, CastError, CastSession, CastSettings,
    CastWebAppSession, Dispatcher, DiscoveryProviderListener, MediaControl, MediaInfo, MediaPlayer,
    PlayState, ResponseListener, ServiceConfig, ServiceDescription, SessionPhase, VolumeControl,
    WebAppLauncher, WebAppMessage, WebAppSessionListener,
};

type Slot<T> = Arc<Mutex<Option<Result<T, CastError>>>>;

fn slot<T: Send + 'static>() -> (Slot<T>, ResponseListener<T>) {
    let cell: Slot<T> = Arc::new(Mutex::new(None));
    let sink = cell.clone();
    (cell, ResponseListener::new(move |r| *sink.lock().unwrap() = Some(r)))
}

fn taken<T>(cell: &Slot<T>) -> Result<T, CastError> {
    cell.lock().unwrap().take().expect("listener was not called")
}

#[derive(Default)]
struct Services(Mutex<Vec<ServiceDescription>>);

impl DiscoveryProviderListener for Services {
    fn on_service_added(&self, service: &ServiceDescription) {
        self.0.lock().unwrap().push(service.clone());
    }

    fn on_service_removed(&self, service: &ServiceDescription) {
        self.0.lock().unwrap().retain(|s| s.uuid() != service.uuid());
    }
}

#[derive(Default)]
struct Inbox(Mutex<Vec<Option<WebAppMessage>>>);

impl WebAppSessionListener for Inbox {
    fn on_receive_message(&self, _: &CastWebAppSession, message: Option<WebAppMessage>) {
        self.0.lock().unwrap().push(message);
    }
}

fn kitchen() -> CastDeviceInfo {
    CastDeviceInfo::new("kitchen-1", "Kitchen")
        .with_address(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)), 8009)
        .with_model("Chromecast")
}

/// Discovers the kitchen receiver and returns its description.
fn discover(dispatcher: &Dispatcher) -> (CastDiscoveryProvider, Arc<MockRouteRegistrar>, ServiceDescription) {
    let registrar = MockRouteRegistrar::new();
    let provider = CastDiscoveryProvider::new(&CastSettings::default(), dispatcher.clone(), registrar.clone());
    let services = Arc::new(Services::default());
    provider.add_listener(services.clone());
    provider.start();

    registrar.announce(RouteInfo::for_device(kitchen()));
    dispatcher.run_pending();

    let description = services.0.lock().unwrap()[0].clone();
    (provider, registrar, description)
}

fn open_session(dispatcher: &Dispatcher, description: &ServiceDescription) -> (CastSession, Arc<MockCastClient>) {
    let client = MockCastClient::responsive();
    let session = CastSession::new(
        description.clone(),
        ServiceConfig::for_service(description),
        CastSettings::default(),
        MockCastClientFactory::new(client.clone()),
        dispatcher.clone(),
    );
    (session, client)
}

#[test]
fn test_discovered_receiver_plays_media() {
    let dispatcher = Dispatcher::new("cast-flow");
    let (provider, _registrar, description) = discover(&dispatcher);
    assert_eq!(description.uuid(), "kitchen-1");
    assert_eq!(provider.found_services().len(), 1);

    let (session, client) = open_session(&dispatcher, &description);
    let states = Arc::new(Mutex::new(Vec::new()));
    let sink = states.clone();
    let _sub = session.subscribe_play_state(move |s| sink.lock().unwrap().push(s));

    let media = MediaInfo::builder("http://10.0.0.2/song.flac", "audio/flac")
        .title("Song")
        .duration(Duration::from_secs(180))
        .build();
    let (launched, listener) = slot();
    session.play_media(media, false, listener);
    dispatcher.run_pending();

    let launch = taken(&launched).unwrap();
    assert_eq!(launch.launch_session.app_id, "CC1AD845");
    assert!(launch.media_control);
    assert_eq!(session.phase(), SessionPhase::AppReady);
    assert!(session.is_connected());
    assert!(states.lock().unwrap().contains(&PlayState::Playing));

    let (paused, listener) = slot();
    session.pause(listener);
    let (seeked, seek_listener) = slot();
    session.seek(Duration::from_secs(42), seek_listener);
    dispatcher.run_pending();
    assert!(taken(&paused).is_ok());
    assert!(taken(&seeked).is_ok());

    let calls = client.player().calls();
    assert!(matches!(calls[0], PlayerCall::Load { autoplay: true, .. }));
    assert_eq!(calls[1], PlayerCall::Pause);
    assert!(matches!(calls[2], PlayerCall::Seek { position, .. } if position == Duration::from_secs(42)));

    let (duration, listener) = slot();
    session.get_duration(listener);
    dispatcher.run_pending();
    assert_eq!(taken(&duration).unwrap(), Duration::from_secs(180));
}

#[test]
fn test_unsupported_commands_fail_through_listener() {
    let dispatcher = Dispatcher::new("cast-flow");
    let (_provider, _registrar, description) = discover(&dispatcher);
    let (session, _client) = open_session(&dispatcher, &description);

    assert!(!session.has_capability(media_control::REWIND));
    let (rewound, listener) = slot();
    session.rewind(listener);
    dispatcher.run_pending();
    assert!(taken(&rewound).unwrap_err().is_not_supported());
}

#[test]
fn test_volume_round_trip() {
    let dispatcher = Dispatcher::new("cast-flow");
    let (_provider, _registrar, description) = discover(&dispatcher);
    let (session, _client) = open_session(&dispatcher, &description);

    let levels = Arc::new(Mutex::new(Vec::new()));
    let sink = levels.clone();
    let _sub = session.subscribe_volume(move |v| sink.lock().unwrap().push(v));

    session.set_volume(0.25, ResponseListener::ignore());
    let (volume, listener) = slot();
    session.get_volume(listener);
    dispatcher.run_pending();

    assert_eq!(taken(&volume).unwrap(), 0.25);
    assert_eq!(*levels.lock().unwrap(), vec![0.25]);
}

#[test]
fn test_web_app_messaging_and_close() {
    let dispatcher = Dispatcher::new("cast-flow");
    let (_provider, _registrar, description) = discover(&dispatcher);
    let (session, client) = open_session(&dispatcher, &description);

    let (launched, listener) = slot();
    session.launch_web_app("ABCD1234", false, listener);
    dispatcher.run_pending();
    let web_app = taken(&launched).unwrap();
    assert_eq!(web_app.launch_session().app_id, "ABCD1234");

    let inbox = Arc::new(Inbox::default());
    web_app.set_listener(Some(inbox.clone() as Arc<dyn WebAppSessionListener>));
    let (connected, listener) = slot();
    web_app.connect(listener);
    dispatcher.run_pending();
    assert!(taken(&connected).is_ok());
    assert!(web_app.is_connected());

    let (sent, listener) = slot();
    web_app.send_message("ping", listener);
    dispatcher.run_pending();
    assert!(taken(&sent).is_ok());
    assert_eq!(
        client.sent_messages(),
        vec![("urn:x-cast:com.connectsdk".to_string(), "ping".to_string())]
    );

    assert!(client.deliver_message("urn:x-cast:com.connectsdk", Some(r#"{"pong":true}"#)));
    dispatcher.run_pending();
    {
        let inbox = inbox.0.lock().unwrap();
        assert_eq!(inbox.len(), 1);
        assert!(inbox[0].as_ref().and_then(|m| m.as_json()).is_some());
    }

    let (closed, listener) = slot();
    session.close_web_app(&web_app.launch_session(), listener);
    dispatcher.run_pending();
    assert!(taken(&closed).is_ok());
    assert!(!web_app.is_connected());
    assert!(session.web_app_session("ABCD1234").is_none());
    assert!(matches!(client.app_requests().last(), Some(AppRequest::Stop { .. })));
}

#[test]
fn test_withdrawn_route_removes_service() {
    let dispatcher = Dispatcher::new("cast-flow");
    let (provider, registrar, _description) = discover(&dispatcher);

    registrar.withdraw(RouteInfo::for_device(kitchen()));
    dispatcher.run_pending();
    assert!(provider.is_empty());
}
