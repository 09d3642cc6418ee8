//! Command surfaces exposed by a Cast session, besides [`MediaControl`].
//!
//! [`MediaControl`]: crate::media_control::MediaControl

use crate::listener::{ResponseListener, Subscription};
use crate::media::MediaInfo;
use crate::model::LaunchSession;
use crate::webapp::CastWebAppSession;

/// Result of a successful `play_media` or `display_image`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaLaunch {
    pub launch_session: LaunchSession,
    /// Whether transport commands can reach the loaded media.
    pub media_control: bool,
}

pub trait MediaPlayer {
    fn play_media(&self, media: MediaInfo, should_loop: bool, listener: ResponseListener<MediaLaunch>);
    fn display_image(&self, media: MediaInfo, listener: ResponseListener<MediaLaunch>);
    fn close_media(&self, launch_session: &LaunchSession, listener: ResponseListener<()>);
    fn get_media_info(&self, listener: ResponseListener<MediaInfo>);
    fn subscribe_media_info<F>(&self, f: F) -> Subscription
    where
        Self: Sized,
        F: Fn(MediaInfo) + Send + Sync + 'static;
}

/// Receiver volume, from 0.0 to 1.0.
pub trait VolumeControl {
    fn volume_up(&self, listener: ResponseListener<()>);
    fn volume_down(&self, listener: ResponseListener<()>);
    fn set_volume(&self, level: f32, listener: ResponseListener<()>);
    fn get_volume(&self, listener: ResponseListener<f32>);
    fn set_mute(&self, mute: bool, listener: ResponseListener<()>);
    fn get_mute(&self, listener: ResponseListener<bool>);
    fn subscribe_volume<F>(&self, f: F) -> Subscription
    where
        Self: Sized,
        F: Fn(f32) + Send + Sync + 'static;
    fn subscribe_mute<F>(&self, f: F) -> Subscription
    where
        Self: Sized,
        F: Fn(bool) + Send + Sync + 'static;
}

pub trait WebAppLauncher {
    fn launch_web_app(
        &self,
        app_id: &str,
        relaunch_if_running: bool,
        listener: ResponseListener<CastWebAppSession>,
    );
    fn join_web_app(&self, launch_session: &LaunchSession, listener: ResponseListener<CastWebAppSession>);
    fn close_web_app(&self, launch_session: &LaunchSession, listener: ResponseListener<()>);
}
