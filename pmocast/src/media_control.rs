//! Transport commands bound to the receiver's media player.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::dispatcher::Dispatcher;
use crate::errors::CastError;
use crate::listener::{ResponseListener, Subscription};
use crate::media::{MediaStatus, PlayState, ResumeState};
use crate::platform::{CastClient, RemoteMediaPlayer};

/// Playback control of the media loaded on a receiver.
///
/// Every outcome is delivered once, through the session dispatcher.
pub trait MediaControl {
    fn play(&self, listener: ResponseListener<()>);
    fn pause(&self, listener: ResponseListener<()>);
    fn stop(&self, listener: ResponseListener<()>);
    fn rewind(&self, listener: ResponseListener<()>);
    fn fast_forward(&self, listener: ResponseListener<()>);
    fn previous(&self, listener: ResponseListener<()>);
    fn next(&self, listener: ResponseListener<()>);
    fn seek(&self, position: Duration, listener: ResponseListener<()>);
    fn get_duration(&self, listener: ResponseListener<Duration>);
    fn get_position(&self, listener: ResponseListener<Duration>);
    fn get_play_state(&self, listener: ResponseListener<PlayState>);
    fn subscribe_play_state<F>(&self, f: F) -> Subscription
    where
        Self: Sized,
        F: Fn(PlayState) + Send + Sync + 'static;
}

/// Snapshot of what a media command needs: the connection and the player
/// obtained from the last successful launch.
pub(crate) struct PlayerHandle {
    pub(crate) client: Option<Arc<dyn CastClient>>,
    pub(crate) player: Option<Arc<dyn RemoteMediaPlayer>>,
}

impl PlayerHandle {
    fn player(&self) -> Result<&Arc<dyn RemoteMediaPlayer>, CastError> {
        self.player.as_ref().ok_or_else(CastError::no_media)
    }

    fn connected_client(&self) -> Result<&Arc<dyn CastClient>, CastError> {
        match &self.client {
            Some(client) if client.is_connected() => Ok(client),
            _ => Err(CastError::not_connected()),
        }
    }

    fn status(&self) -> Result<MediaStatus, CastError> {
        self.player()?.media_status().ok_or_else(CastError::no_media)
    }

    fn ready(&self) -> Result<(&Arc<dyn CastClient>, &Arc<dyn RemoteMediaPlayer>), CastError> {
        let player = self.player()?;
        let client = self.connected_client()?;
        Ok((client, player))
    }

    pub(crate) fn play(&self, dispatcher: &Dispatcher, listener: ResponseListener<()>) {
        match self.ready() {
            Ok((client, player)) => {
                let dispatcher = dispatcher.clone();
                player.play(client, Box::new(move |r| listener.post(&dispatcher, r)));
            }
            Err(err) => listener.post_error(dispatcher, err),
        }
    }

    pub(crate) fn pause(&self, dispatcher: &Dispatcher, listener: ResponseListener<()>) {
        match self.ready() {
            Ok((client, player)) => {
                let dispatcher = dispatcher.clone();
                player.pause(client, Box::new(move |r| listener.post(&dispatcher, r)));
            }
            Err(err) => listener.post_error(dispatcher, err),
        }
    }

    pub(crate) fn stop(&self, dispatcher: &Dispatcher, listener: ResponseListener<()>) {
        match self.ready() {
            Ok((client, player)) => {
                let dispatcher = dispatcher.clone();
                player.stop(client, Box::new(move |r| listener.post(&dispatcher, r)));
            }
            Err(err) => listener.post_error(dispatcher, err),
        }
    }

    /// Checks for loaded media before the connection, so a seek without
    /// media always reports the missing media.
    pub(crate) fn seek(
        &self,
        dispatcher: &Dispatcher,
        position: Duration,
        listener: ResponseListener<()>,
    ) {
        let checked = self.status().and_then(|_| self.ready());
        match checked {
            Ok((client, player)) => {
                debug!(position_ms = position.as_millis() as u64, "Seeking");
                let dispatcher = dispatcher.clone();
                player.seek(
                    client,
                    position,
                    ResumeState::Unchanged,
                    Box::new(move |r| listener.post(&dispatcher, r)),
                );
            }
            Err(err) => listener.post_error(dispatcher, err),
        }
    }

    pub(crate) fn duration(&self, dispatcher: &Dispatcher, listener: ResponseListener<Duration>) {
        let result = self
            .status()
            .and_then(|_| self.player().map(|p| p.stream_duration()));
        listener.post(dispatcher, result);
    }

    pub(crate) fn position(&self, dispatcher: &Dispatcher, listener: ResponseListener<Duration>) {
        let result = self
            .status()
            .and_then(|_| self.player().map(|p| p.approximate_stream_position()));
        listener.post(dispatcher, result);
    }

    pub(crate) fn play_state(&self, dispatcher: &Dispatcher, listener: ResponseListener<PlayState>) {
        let result = self.status().map(|status| PlayState::from(&status));
        listener.post(dispatcher, result);
    }
}

pub(crate) fn unsupported(dispatcher: &Dispatcher, operation: &str, listener: ResponseListener<()>) {
    listener.post_error(dispatcher, CastError::not_supported(operation));
}
