//! Message channel between a web-app session and its receiver application.

use std::fmt;
use std::sync::{Arc, Weak};

use serde_json::{Map, Value};
use tracing::trace;

use crate::dispatcher::Dispatcher;
use crate::model::CastDeviceInfo;
use crate::platform::MessageReceivedCallback;
use crate::webapp::{CastWebAppSession, WebAppInner};

/// Payload received from a web application.
#[derive(Debug, Clone, PartialEq)]
pub enum WebAppMessage {
    Text(String),
    /// Payloads that parse as a JSON object.
    Json(Map<String, Value>),
}

impl WebAppMessage {
    /// Objects are also recognised in relaxed syntax (single quotes,
    /// unquoted keys, trailing commas), as web senders often produce it.
    pub fn parse(raw: &str) -> Self {
        let value = serde_json::from_str::<Value>(raw).or_else(|_| json5::from_str::<Value>(raw));
        match value {
            Ok(Value::Object(map)) => WebAppMessage::Json(map),
            _ => WebAppMessage::Text(raw.to_string()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            WebAppMessage::Text(text) => Some(text),
            WebAppMessage::Json(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&Map<String, Value>> {
        match self {
            WebAppMessage::Json(map) => Some(map),
            WebAppMessage::Text(_) => None,
        }
    }
}

impl fmt::Display for WebAppMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebAppMessage::Text(text) => f.write_str(text),
            WebAppMessage::Json(map) => {
                let text = serde_json::to_string(map).map_err(|_| fmt::Error)?;
                f.write_str(&text)
            }
        }
    }
}

/// Receiver-side callback registered on the web-app namespace.
pub struct CastServiceChannel {
    app_id: String,
    namespace: String,
    dispatcher: Dispatcher,
    session: Weak<WebAppInner>,
}

impl CastServiceChannel {
    pub fn new(app_id: &str, session: &CastWebAppSession) -> Self {
        Self {
            app_id: app_id.to_string(),
            namespace: session.namespace().to_string(),
            dispatcher: session.dispatcher().clone(),
            session: session.downgrade_inner(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }
}

impl MessageReceivedCallback for CastServiceChannel {
    fn on_message_received(
        &self,
        _sender: Option<&CastDeviceInfo>,
        _namespace: Option<&str>,
        message: Option<&str>,
    ) {
        if self.session.upgrade().is_none() {
            trace!(app_id = %self.app_id, "Message for a closed web app session dropped");
            return;
        }

        let message = message.map(WebAppMessage::parse);
        let session = self.session.clone();
        let app_id = self.app_id.clone();
        self.dispatcher.post(move || {
            let Some(inner) = session.upgrade() else {
                return;
            };
            let web_app = CastWebAppSession::from_inner(inner);
            match web_app.listener() {
                Some(listener) => listener.on_receive_message(&web_app, message),
                None => trace!(app_id = %app_id, "No web app listener, message dropped"),
            }
        });
    }
}

impl fmt::Debug for CastServiceChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CastServiceChannel")
            .field("app_id", &self.app_id)
            .field("namespace", &self.namespace)
            .finish()
    }
}
