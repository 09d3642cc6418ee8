//! Capability tokens advertised by Cast sessions.
//!
//! The set is declared per session kind and never depends on the
//! connection state, so callers can gate their UI before connecting.

pub type Capability = &'static str;

pub mod media_player {
    use super::Capability;

    pub const DISPLAY_IMAGE: Capability = "MediaPlayer.Display.Image";
    pub const PLAY_VIDEO: Capability = "MediaPlayer.Play.Video";
    pub const PLAY_AUDIO: Capability = "MediaPlayer.Play.Audio";
    pub const PLAY_PLAYLIST: Capability = "MediaPlayer.Play.Playlist";
    pub const CLOSE: Capability = "MediaPlayer.Close";
    pub const METADATA_TITLE: Capability = "MediaPlayer.MetaData.Title";
    pub const METADATA_DESCRIPTION: Capability = "MediaPlayer.MetaData.Description";
    pub const METADATA_THUMBNAIL: Capability = "MediaPlayer.MetaData.Thumbnail";
    pub const METADATA_MIME_TYPE: Capability = "MediaPlayer.MetaData.MimeType";
    pub const MEDIA_INFO_GET: Capability = "MediaPlayer.MediaInfo.Get";
    pub const MEDIA_INFO_SUBSCRIBE: Capability = "MediaPlayer.MediaInfo.Subscribe";
    pub const SUBTITLE_WEBVTT: Capability = "MediaPlayer.Subtitle.WebVTT";
}

pub mod volume_control {
    use super::Capability;

    pub const VOLUME_GET: Capability = "VolumeControl.Get";
    pub const VOLUME_SET: Capability = "VolumeControl.Set";
    pub const VOLUME_UP_DOWN: Capability = "VolumeControl.UpDown";
    pub const VOLUME_SUBSCRIBE: Capability = "VolumeControl.Subscribe";
    pub const MUTE_GET: Capability = "VolumeControl.Mute.Get";
    pub const MUTE_SET: Capability = "VolumeControl.Mute.Set";
    pub const MUTE_SUBSCRIBE: Capability = "VolumeControl.Mute.Subscribe";
}

pub mod media_control {
    use super::Capability;

    pub const PLAY: Capability = "MediaControl.Play";
    pub const PAUSE: Capability = "MediaControl.Pause";
    pub const STOP: Capability = "MediaControl.Stop";
    pub const REWIND: Capability = "MediaControl.Rewind";
    pub const FAST_FORWARD: Capability = "MediaControl.FastForward";
    pub const NEXT: Capability = "MediaControl.Next";
    pub const PREVIOUS: Capability = "MediaControl.Previous";
    pub const DURATION: Capability = "MediaControl.Duration";
    pub const SEEK: Capability = "MediaControl.Seek";
    pub const POSITION: Capability = "MediaControl.Position";
    pub const PLAY_STATE: Capability = "MediaControl.PlayState";
    pub const PLAY_STATE_SUBSCRIBE: Capability = "MediaControl.PlayState.Subscribe";
}

pub mod web_app_launcher {
    use super::Capability;

    pub const LAUNCH: Capability = "WebAppLauncher.Launch";
    pub const MESSAGE_SEND: Capability = "WebAppLauncher.Message.Send";
    pub const MESSAGE_RECEIVE: Capability = "WebAppLauncher.Message.Receive";
    pub const MESSAGE_SEND_JSON: Capability = "WebAppLauncher.Message.Send.JSON";
    pub const MESSAGE_RECEIVE_JSON: Capability = "WebAppLauncher.Message.Receive.JSON";
    pub const CONNECT: Capability = "WebAppLauncher.Connect";
    pub const DISCONNECT: Capability = "WebAppLauncher.Disconnect";
    pub const JOIN: Capability = "WebAppLauncher.Join";
    pub const CLOSE: Capability = "WebAppLauncher.Close";
}

/// Kind of session a capability set is declared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    /// Full Cast receiver session (media, volume, web apps).
    Cast,
    /// Web application session opened on a Cast receiver.
    CastWebApp,
}

const CAST_CAPABILITIES: &[Capability] = &[
    media_player::DISPLAY_IMAGE,
    media_player::PLAY_VIDEO,
    media_player::PLAY_AUDIO,
    media_player::CLOSE,
    media_player::METADATA_TITLE,
    media_player::METADATA_DESCRIPTION,
    media_player::METADATA_THUMBNAIL,
    media_player::METADATA_MIME_TYPE,
    media_player::MEDIA_INFO_GET,
    media_player::MEDIA_INFO_SUBSCRIBE,
    media_player::SUBTITLE_WEBVTT,
    volume_control::VOLUME_GET,
    volume_control::VOLUME_SET,
    volume_control::VOLUME_UP_DOWN,
    volume_control::VOLUME_SUBSCRIBE,
    volume_control::MUTE_GET,
    volume_control::MUTE_SET,
    volume_control::MUTE_SUBSCRIBE,
    media_control::PLAY,
    media_control::PAUSE,
    media_control::STOP,
    media_control::DURATION,
    media_control::SEEK,
    media_control::POSITION,
    media_control::PLAY_STATE,
    media_control::PLAY_STATE_SUBSCRIBE,
    web_app_launcher::LAUNCH,
    web_app_launcher::MESSAGE_SEND,
    web_app_launcher::MESSAGE_RECEIVE,
    web_app_launcher::MESSAGE_SEND_JSON,
    web_app_launcher::MESSAGE_RECEIVE_JSON,
    web_app_launcher::CONNECT,
    web_app_launcher::DISCONNECT,
    web_app_launcher::JOIN,
    web_app_launcher::CLOSE,
];

const CAST_WEB_APP_CAPABILITIES: &[Capability] = &[
    web_app_launcher::MESSAGE_SEND,
    web_app_launcher::MESSAGE_RECEIVE,
    web_app_launcher::MESSAGE_SEND_JSON,
    web_app_launcher::MESSAGE_RECEIVE_JSON,
    web_app_launcher::CONNECT,
    web_app_launcher::DISCONNECT,
    web_app_launcher::JOIN,
    web_app_launcher::CLOSE,
];

pub fn capabilities_for(kind: SessionKind) -> &'static [Capability] {
    match kind {
        SessionKind::Cast => CAST_CAPABILITIES,
        SessionKind::CastWebApp => CAST_WEB_APP_CAPABILITIES,
    }
}

/// Capability queries shared by every session type.
pub trait CapabilityMethods {
    fn session_kind(&self) -> SessionKind;

    fn capabilities(&self) -> &'static [Capability] {
        capabilities_for(self.session_kind())
    }

    fn has_capability(&self, capability: &str) -> bool {
        self.capabilities().contains(&capability)
    }

    fn has_capabilities(&self, capabilities: &[&str]) -> bool {
        capabilities.iter().all(|c| self.has_capability(c))
    }

    fn has_any_capability(&self, capabilities: &[&str]) -> bool {
        capabilities.iter().any(|c| self.has_capability(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Holder(SessionKind);

    impl CapabilityMethods for Holder {
        fn session_kind(&self) -> SessionKind {
            self.0
        }
    }

    #[test]
    fn test_cast_table_has_no_duplicates() {
        let caps = capabilities_for(SessionKind::Cast);
        let unique: HashSet<_> = caps.iter().collect();
        assert_eq!(caps.len(), 35);
        assert_eq!(unique.len(), caps.len());
    }

    #[test]
    fn test_cast_session_excludes_unsupported_transport() {
        let holder = Holder(SessionKind::Cast);
        assert!(holder.has_capability(media_control::SEEK));
        assert!(!holder.has_capability(media_control::REWIND));
        assert!(!holder.has_capability(media_control::NEXT));
        assert!(!holder.has_capability(media_player::PLAY_PLAYLIST));
    }

    #[test]
    fn test_capability_set_queries() {
        let holder = Holder(SessionKind::CastWebApp);
        assert!(holder.has_capabilities(&[
            web_app_launcher::MESSAGE_SEND,
            web_app_launcher::MESSAGE_RECEIVE_JSON
        ]));
        assert!(!holder.has_capabilities(&[web_app_launcher::CLOSE, media_control::PLAY]));
        assert!(holder.has_any_capability(&[media_control::PLAY, web_app_launcher::CLOSE]));
        assert!(!holder.has_any_capability(&[]));
    }
}
