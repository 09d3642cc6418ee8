//! Web application sessions opened on a Cast receiver.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{debug, warn};

use crate::capabilities::{CapabilityMethods, SessionKind};
use crate::channel::{CastServiceChannel, WebAppMessage};
use crate::control::WebAppLauncher;
use crate::dispatcher::Dispatcher;
use crate::errors::CastError;
use crate::listener::{ResponseListener, SharedListener};
use crate::model::LaunchSession;
use crate::platform::CastClient;
use crate::session::{CastSession, WeakCastSession};

/// Receives messages from, and the end of, a web-app session.
pub trait WebAppSessionListener: Send + Sync {
    fn on_receive_message(&self, session: &CastWebAppSession, message: Option<WebAppMessage>);

    fn on_web_app_session_disconnect(&self, session: &CastWebAppSession) {
        debug!(app_id = %session.launch_session().app_id, "Web app session ended");
    }
}

pub(crate) struct WebAppInner {
    launch_session: Mutex<LaunchSession>,
    service: WeakCastSession,
    dispatcher: Dispatcher,
    namespace: String,
    listener: Mutex<Option<Arc<dyn WebAppSessionListener>>>,
    channel: Mutex<Option<Arc<CastServiceChannel>>>,
}

/// A web application running on the receiver, with its message channel.
///
/// The session holds only a weak reference to the [`CastSession`] that
/// opened it; once that session is dropped every command fails with
/// `PreconditionFailed`.
#[derive(Clone)]
pub struct CastWebAppSession {
    inner: Arc<WebAppInner>,
}

impl CastWebAppSession {
    pub(crate) fn new(launch_session: LaunchSession, service: &CastSession) -> Self {
        Self {
            inner: Arc::new(WebAppInner {
                launch_session: Mutex::new(launch_session),
                service: service.downgrade(),
                dispatcher: service.dispatcher().clone(),
                namespace: service.settings().web_app_namespace.clone(),
                listener: Mutex::new(None),
                channel: Mutex::new(None),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<WebAppInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade_inner(&self) -> std::sync::Weak<WebAppInner> {
        Arc::downgrade(&self.inner)
    }

    pub fn launch_session(&self) -> LaunchSession {
        self.inner.launch_session.lock().unwrap().clone()
    }

    pub(crate) fn set_launch_session(&self, launch_session: LaunchSession) {
        *self.inner.launch_session.lock().unwrap() = launch_session;
    }

    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub fn set_listener(&self, listener: Option<Arc<dyn WebAppSessionListener>>) {
        *self.inner.listener.lock().unwrap() = listener;
    }

    pub fn listener(&self) -> Option<Arc<dyn WebAppSessionListener>> {
        self.inner.listener.lock().unwrap().clone()
    }

    /// True while the message channel is registered on the receiver.
    pub fn is_connected(&self) -> bool {
        self.inner.channel.lock().unwrap().is_some()
    }

    fn service(&self) -> Result<CastSession, CastError> {
        self.inner
            .service
            .upgrade()
            .ok_or_else(|| CastError::precondition("Cast session is gone"))
    }

    /// Registers the message channel, connecting the Cast session first if
    /// needed.
    pub fn connect(&self, listener: ResponseListener<()>) {
        let service = match self.service() {
            Ok(service) => service,
            Err(err) => return listener.post_error(&self.inner.dispatcher, err),
        };

        let web_app = self.clone();
        service.run_command(move |client| {
            let result = client.and_then(|client| web_app.open_channel(&client));
            listener.post(&web_app.inner.dispatcher, result);
        });
    }

    fn open_channel(&self, client: &Arc<dyn CastClient>) -> Result<(), CastError> {
        let app_id = self.launch_session().app_id;
        let channel = {
            let mut slot = self.inner.channel.lock().unwrap();
            slot.get_or_insert_with(|| Arc::new(CastServiceChannel::new(&app_id, self)))
                .clone()
        };

        if let Err(err) = client.set_message_received_callbacks(&self.inner.namespace, channel) {
            warn!(app_id = %app_id, "Cannot register message channel: {}", err);
            self.inner.channel.lock().unwrap().take();
            return Err(err);
        }
        debug!(app_id = %app_id, namespace = %self.inner.namespace, "Message channel open");
        Ok(())
    }

    /// Joins the running application, then opens the message channel.
    pub fn join(&self, listener: ResponseListener<()>) {
        let service = match self.service() {
            Ok(service) => service,
            Err(err) => return listener.post_error(&self.inner.dispatcher, err),
        };

        let launch_session = self.launch_session();
        service.join_web_app_as(
            &launch_session,
            Some(self.clone()),
            ResponseListener::new(move |result: Result<CastWebAppSession, CastError>| match result {
                Ok(web_app) => web_app.connect(listener),
                Err(err) => listener.complete(Err(err)),
            }),
        );
    }

    /// Unregisters the message channel. The application keeps running.
    pub fn disconnect_from_web_app(&self) {
        let Some(_channel) = self.inner.channel.lock().unwrap().take() else {
            return;
        };
        let client = self.inner.service.upgrade().and_then(|s| s.connected_client());
        if let Some(client) = client {
            if let Err(err) = client.remove_message_received_callbacks(&self.inner.namespace) {
                warn!(namespace = %self.inner.namespace, "Cannot remove message channel: {}", err);
            }
        }
        self.notify_disconnected();
    }

    /// Sends a text message on the web-app namespace.
    pub fn send_message(&self, message: &str, listener: ResponseListener<()>) {
        let dispatcher = &self.inner.dispatcher;
        if message.is_empty() {
            return listener.post_error(dispatcher, CastError::precondition("Message is empty"));
        }
        if !self.is_connected() {
            return listener.post_error(
                dispatcher,
                CastError::precondition("Web app session is not connected"),
            );
        }
        let Some(client) = self.inner.service.upgrade().and_then(|s| s.connected_client()) else {
            return listener.post_error(dispatcher, CastError::not_connected());
        };

        let listener = SharedListener::new(listener);
        let delivered = listener.clone();
        let callback_dispatcher = dispatcher.clone();
        let sent = client.send_message(
            &self.inner.namespace,
            message,
            Box::new(move |result| delivered.post(&callback_dispatcher, result)),
        );
        if let Err(err) = sent {
            warn!(namespace = %self.inner.namespace, "Message not sent: {}", err);
            listener.post(dispatcher, Err(err));
        }
    }

    /// Sends `message` serialised as JSON text.
    pub fn send_json(&self, message: &Value, listener: ResponseListener<()>) {
        match serde_json::to_string(message) {
            Ok(text) => self.send_message(&text, listener),
            Err(err) => listener.post_error(&self.inner.dispatcher, CastError::precondition(&err.to_string())),
        }
    }

    /// Closes the channel and stops the application on the receiver.
    pub fn close(&self, listener: ResponseListener<()>) {
        let service = match self.service() {
            Ok(service) => service,
            Err(err) => return listener.post_error(&self.inner.dispatcher, err),
        };
        service.close_web_app(&self.launch_session(), listener);
    }

    /// Tells the listener the session ended, once per open channel.
    pub(crate) fn notify_disconnected(&self) {
        self.inner.channel.lock().unwrap().take();
        let web_app = self.clone();
        self.inner.dispatcher.post(move || {
            if let Some(listener) = web_app.listener() {
                listener.on_web_app_session_disconnect(&web_app);
            }
        });
    }

    /// Unregisters the channel from a client that is being released.
    pub(crate) fn detach(&self, client: &Arc<dyn CastClient>) {
        if self.inner.channel.lock().unwrap().is_none() {
            return;
        }
        if let Err(err) = client.remove_message_received_callbacks(&self.inner.namespace) {
            debug!("Message channel already gone: {}", err);
        }
        self.notify_disconnected();
    }
}

impl CapabilityMethods for CastWebAppSession {
    fn session_kind(&self) -> SessionKind {
        SessionKind::CastWebApp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{AppRequest, MockCastClient, MockCastClientFactory};
    use crate::model::{CastDeviceInfo, LaunchSessionType, ServiceConfig, ServiceDescription};
    use crate::settings::CastSettings;

    struct Recorder {
        messages: Mutex<Vec<Option<WebAppMessage>>>,
        disconnects: Mutex<usize>,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                messages: Mutex::new(Vec::new()),
                disconnects: Mutex::new(0),
            })
        }
    }

    impl WebAppSessionListener for Recorder {
        fn on_receive_message(&self, _: &CastWebAppSession, message: Option<WebAppMessage>) {
            self.messages.lock().unwrap().push(message);
        }

        fn on_web_app_session_disconnect(&self, _: &CastWebAppSession) {
            *self.disconnects.lock().unwrap() += 1;
        }
    }

    fn outcome() -> (Arc<Mutex<Vec<Result<(), CastError>>>>, ResponseListener<()>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, ResponseListener::new(move |r| sink.lock().unwrap().push(r)))
    }

    /// Session with a launched web app, channel not yet open.
    fn launched() -> (CastSession, Arc<MockCastClient>, CastWebAppSession) {
        let dispatcher = Dispatcher::new("webapp-test");
        let client = MockCastClient::responsive();
        let description = ServiceDescription::from_device(CastDeviceInfo::new("dev-1", "Kitchen"));
        let session = CastSession::new(
            description.clone(),
            ServiceConfig::for_service(&description),
            CastSettings::default(),
            MockCastClientFactory::new(client.clone()),
            dispatcher.clone(),
        );

        let slot = Arc::new(Mutex::new(None));
        let sink = slot.clone();
        session.launch_web_app(
            "ABCD1234",
            true,
            ResponseListener::new(move |r| *sink.lock().unwrap() = Some(r)),
        );
        dispatcher.run_pending();
        let web_app = slot.lock().unwrap().take().unwrap().unwrap();
        (session, client, web_app)
    }

    #[test]
    fn test_connect_registers_channel_on_namespace() {
        let (session, client, web_app) = launched();
        let (seen, listener) = outcome();
        web_app.connect(listener);
        session.dispatcher().run_pending();

        assert_eq!(*seen.lock().unwrap(), vec![Ok(())]);
        assert!(web_app.is_connected());
        assert!(client.has_message_callback("urn:x-cast:com.connectsdk"));
    }

    #[test]
    fn test_messages_reach_the_listener() {
        let (session, client, web_app) = launched();
        let recorder = Recorder::new();
        web_app.set_listener(Some(recorder.clone() as Arc<dyn WebAppSessionListener>));
        web_app.connect(ResponseListener::ignore());

        assert!(client.deliver_message("urn:x-cast:com.connectsdk", Some("hello")));
        assert!(client.deliver_message("urn:x-cast:com.connectsdk", None));
        session.dispatcher().run_pending();

        assert_eq!(
            *recorder.messages.lock().unwrap(),
            vec![Some(WebAppMessage::Text("hello".to_string())), None]
        );
    }

    #[test]
    fn test_send_message_requires_open_channel() {
        let (session, client, web_app) = launched();
        let (seen, listener) = outcome();
        web_app.send_message("ping", listener);
        session.dispatcher().run_pending();

        assert!(matches!(
            seen.lock().unwrap()[0],
            Err(CastError::PreconditionFailed(_))
        ));
        assert!(client.sent_messages().is_empty());
    }

    #[test]
    fn test_send_json_uses_namespace() {
        let (session, client, web_app) = launched();
        web_app.connect(ResponseListener::ignore());
        let (seen, listener) = outcome();
        web_app.send_json(&serde_json::json!({"type": "ping"}), listener);
        session.dispatcher().run_pending();

        assert_eq!(*seen.lock().unwrap(), vec![Ok(())]);
        assert_eq!(
            client.sent_messages(),
            vec![(
                "urn:x-cast:com.connectsdk".to_string(),
                r#"{"type":"ping"}"#.to_string()
            )]
        );
    }

    #[test]
    fn test_send_message_requires_connected_client() {
        let (session, client, web_app) = launched();
        web_app.connect(ResponseListener::ignore());
        client.set_connected(false);

        let (seen, listener) = outcome();
        web_app.send_message("ping", listener);
        session.dispatcher().run_pending();
        assert_eq!(*seen.lock().unwrap(), vec![Err(CastError::not_connected())]);
    }

    #[test]
    fn test_disconnect_from_web_app_notifies_once() {
        let (session, client, web_app) = launched();
        let recorder = Recorder::new();
        web_app.set_listener(Some(recorder.clone() as Arc<dyn WebAppSessionListener>));
        web_app.connect(ResponseListener::ignore());

        web_app.disconnect_from_web_app();
        web_app.disconnect_from_web_app();
        session.dispatcher().run_pending();

        assert!(!web_app.is_connected());
        assert!(!client.has_message_callback("urn:x-cast:com.connectsdk"));
        assert_eq!(*recorder.disconnects.lock().unwrap(), 1);
    }

    #[test]
    fn test_session_disconnect_detaches_channel() {
        let (session, client, web_app) = launched();
        let recorder = Recorder::new();
        web_app.set_listener(Some(recorder.clone() as Arc<dyn WebAppSessionListener>));
        web_app.connect(ResponseListener::ignore());

        session.disconnect();
        session.dispatcher().run_pending();

        assert!(!web_app.is_connected());
        assert!(!client.has_message_callback("urn:x-cast:com.connectsdk"));
        assert_eq!(*recorder.disconnects.lock().unwrap(), 1);
    }

    #[test]
    fn test_close_stops_the_application() {
        let (session, client, web_app) = launched();
        web_app.connect(ResponseListener::ignore());
        let session_id = web_app.launch_session().session_id;

        let (seen, listener) = outcome();
        web_app.close(listener);
        session.dispatcher().run_pending();

        assert_eq!(*seen.lock().unwrap(), vec![Ok(())]);
        assert_eq!(
            client.app_requests().last(),
            Some(&AppRequest::Stop { session_id })
        );
        assert!(session.web_app_session("ABCD1234").is_none());
    }

    #[test]
    fn test_join_rebinds_same_session() {
        let (session, client, web_app) = launched();
        let first_id = web_app.launch_session().session_id;

        let (seen, listener) = outcome();
        web_app.join(listener);
        session.dispatcher().run_pending();

        assert_eq!(*seen.lock().unwrap(), vec![Ok(())]);
        assert!(matches!(
            client.app_requests().last(),
            Some(AppRequest::Join { session_id: Some(id), .. }) if *id == first_id
        ));
        assert!(web_app.is_connected());
        assert_eq!(web_app.launch_session().session_type, LaunchSessionType::WebApp);
        assert_eq!(
            session.web_app_session("ABCD1234").map(|w| w.launch_session().session_id),
            Some(web_app.launch_session().session_id)
        );
    }

    #[test]
    fn test_dropped_cast_session_fails_commands() {
        let (session, _client, web_app) = launched();
        let dispatcher = session.dispatcher().clone();
        drop(session);

        let (seen, listener) = outcome();
        web_app.connect(listener);
        dispatcher.run_pending();
        assert!(matches!(
            seen.lock().unwrap()[0],
            Err(CastError::PreconditionFailed(_))
        ));
    }

    #[test]
    fn test_web_app_capabilities() {
        let (_session, _client, web_app) = launched();
        assert_eq!(web_app.capabilities().len(), 8);
        assert!(web_app.has_capability(crate::capabilities::web_app_launcher::MESSAGE_SEND_JSON));
        assert!(!web_app.has_capability(crate::capabilities::media_control::PLAY));
    }
}
