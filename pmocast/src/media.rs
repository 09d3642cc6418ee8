//! Media descriptions, as given by callers and as sent to the receiver.
//!
//! [`MediaInfo`] is what an application asks to play. [`CastMediaInfo`] is
//! the receiver-native load request built from it by
//! [`build_cast_media`].

use std::time::Duration;

/// Id of the single subtitle track attached to a load request.
pub const SUBTITLE_TRACK_ID: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub url: String,
    pub mime_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ImageInfo {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            mime_type: None,
            width: None,
            height: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleInfo {
    url: String,
    mime_type: Option<String>,
    language: Option<String>,
    label: Option<String>,
}

impl SubtitleInfo {
    pub fn builder(url: &str) -> SubtitleInfoBuilder {
        SubtitleInfoBuilder {
            info: SubtitleInfo {
                url: url.to_string(),
                mime_type: None,
                language: None,
                label: None,
            },
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

pub struct SubtitleInfoBuilder {
    info: SubtitleInfo,
}

impl SubtitleInfoBuilder {
    pub fn mime_type(mut self, mime_type: &str) -> Self {
        self.info.mime_type = Some(mime_type.to_string());
        self
    }

    pub fn language(mut self, language: &str) -> Self {
        self.info.language = Some(language.to_string());
        self
    }

    pub fn label(mut self, label: &str) -> Self {
        self.info.label = Some(label.to_string());
        self
    }

    pub fn build(self) -> SubtitleInfo {
        self.info
    }
}

/// Media requested by an application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    url: String,
    mime_type: String,
    title: Option<String>,
    description: Option<String>,
    images: Vec<ImageInfo>,
    subtitle: Option<SubtitleInfo>,
    duration: Option<Duration>,
}

impl MediaInfo {
    pub fn builder(url: &str, mime_type: &str) -> MediaInfoBuilder {
        MediaInfoBuilder {
            info: MediaInfo {
                url: url.to_string(),
                mime_type: mime_type.to_string(),
                title: None,
                description: None,
                images: Vec::new(),
                subtitle: None,
                duration: None,
            },
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn images(&self) -> &[ImageInfo] {
        &self.images
    }

    pub fn subtitle(&self) -> Option<&SubtitleInfo> {
        self.subtitle.as_ref()
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Rebuilds caller-facing media info from what the receiver reports.
    pub fn from_cast_media(media: &CastMediaInfo) -> Self {
        let metadata = media.metadata.as_ref();
        MediaInfo {
            url: media.content_id.clone(),
            mime_type: media.content_type.clone(),
            title: metadata.and_then(|m| m.title.clone()),
            description: metadata.and_then(|m| m.subtitle.clone()),
            images: metadata
                .map(|m| m.images.iter().map(|url| ImageInfo::new(url)).collect())
                .unwrap_or_default(),
            subtitle: None,
            duration: media.duration,
        }
    }
}

pub struct MediaInfoBuilder {
    info: MediaInfo,
}

impl MediaInfoBuilder {
    pub fn title(mut self, title: &str) -> Self {
        self.info.title = Some(title.to_string());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.info.description = Some(description.to_string());
        self
    }

    pub fn icon(mut self, url: &str) -> Self {
        self.info.images.push(ImageInfo::new(url));
        self
    }

    pub fn image(mut self, image: ImageInfo) -> Self {
        self.info.images.push(image);
        self
    }

    pub fn subtitle(mut self, subtitle: SubtitleInfo) -> Self {
        self.info.subtitle = Some(subtitle);
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.info.duration = Some(duration);
        self
    }

    pub fn build(self) -> MediaInfo {
        self.info
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    None,
    Buffered,
    Live,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    Generic,
    Movie,
    Photo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastMetadata {
    pub kind: MetadataKind,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackType {
    Text,
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSubtype {
    Subtitles,
    Captions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTrack {
    pub id: u64,
    pub track_type: TrackType,
    pub subtype: Option<TrackSubtype>,
    pub content_id: String,
    pub content_type: Option<String>,
    pub language: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatMode {
    Off,
    Single,
}

/// Load request understood by the receiver's media player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastMediaInfo {
    pub content_id: String,
    pub content_type: String,
    pub stream_type: StreamType,
    pub metadata: Option<CastMetadata>,
    pub tracks: Vec<MediaTrack>,
    pub repeat_mode: RepeatMode,
    pub duration: Option<Duration>,
}

/// Builds the receiver load request for `info`.
///
/// Only the first image is forwarded as artwork, and at most one text track
/// is attached when the media carries a subtitle.
pub fn build_cast_media(info: &MediaInfo, kind: MetadataKind, should_loop: bool) -> CastMediaInfo {
    let metadata = CastMetadata {
        kind,
        title: info.title.clone(),
        subtitle: info.description.clone(),
        images: info.images.first().map(|i| i.url.clone()).into_iter().collect(),
    };

    let tracks = info
        .subtitle
        .as_ref()
        .map(|subtitle| MediaTrack {
            id: SUBTITLE_TRACK_ID,
            track_type: TrackType::Text,
            subtype: Some(TrackSubtype::Subtitles),
            content_id: subtitle.url.clone(),
            content_type: subtitle.mime_type.clone(),
            language: subtitle.language.clone(),
            name: subtitle.label.clone(),
        })
        .into_iter()
        .collect();

    let stream_type = match kind {
        MetadataKind::Photo => StreamType::None,
        _ => StreamType::Buffered,
    };

    CastMediaInfo {
        content_id: info.url.clone(),
        content_type: info.mime_type.clone(),
        stream_type,
        metadata: Some(metadata),
        tracks,
        repeat_mode: if should_loop { RepeatMode::Single } else { RepeatMode::Off },
        duration: info.duration,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Unknown,
    Idle,
    Playing,
    Paused,
    Buffering,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleReason {
    Finished,
    Cancelled,
    Interrupted,
    Error,
}

/// Last status reported by the receiver's media player.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaStatus {
    pub media_session_id: i32,
    pub player_state: PlayerState,
    pub idle_reason: Option<IdleReason>,
    pub media: Option<CastMediaInfo>,
    pub position: Duration,
    pub volume: Option<f32>,
    pub muted: Option<bool>,
}

impl MediaStatus {
    pub fn new(media_session_id: i32, player_state: PlayerState) -> Self {
        Self {
            media_session_id,
            player_state,
            idle_reason: None,
            media: None,
            position: Duration::ZERO,
            volume: None,
            muted: None,
        }
    }
}

/// Caller-facing playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Unknown,
    Idle,
    Playing,
    Paused,
    Buffering,
    Finished,
}

impl From<&MediaStatus> for PlayState {
    fn from(status: &MediaStatus) -> Self {
        match status.player_state {
            PlayerState::Unknown => PlayState::Unknown,
            PlayerState::Playing => PlayState::Playing,
            PlayerState::Paused => PlayState::Paused,
            PlayerState::Buffering => PlayState::Buffering,
            PlayerState::Idle => match status.idle_reason {
                Some(IdleReason::Finished) => PlayState::Finished,
                _ => PlayState::Idle,
            },
        }
    }
}

/// How playback resumes after a seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeState {
    Unchanged,
    Play,
    Pause,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_id_and_type_come_from_url_and_mime() {
        let info = MediaInfo::builder("http://host/video.mp4", "video/mp4")
            .title("Title")
            .description("Description")
            .icon("http://host/icon.png")
            .build();

        let media = build_cast_media(&info, MetadataKind::Movie, false);
        assert_eq!(media.content_id, "http://host/video.mp4");
        assert_eq!(media.content_type, "video/mp4");
        assert_eq!(media.stream_type, StreamType::Buffered);
        assert_eq!(media.repeat_mode, RepeatMode::Off);

        let metadata = media.metadata.unwrap();
        assert_eq!(metadata.kind, MetadataKind::Movie);
        assert_eq!(metadata.title.as_deref(), Some("Title"));
        assert_eq!(metadata.subtitle.as_deref(), Some("Description"));
        assert_eq!(metadata.images, vec!["http://host/icon.png".to_string()]);
        assert!(media.tracks.is_empty());
    }

    #[test]
    fn test_only_first_icon_is_forwarded() {
        let info = MediaInfo::builder("u", "audio/flac")
            .icon("first")
            .icon("second")
            .build();
        let media = build_cast_media(&info, MetadataKind::Movie, true);
        assert_eq!(media.metadata.unwrap().images, vec!["first".to_string()]);
        assert_eq!(media.repeat_mode, RepeatMode::Single);
    }

    #[test]
    fn test_subtitle_with_all_fields_becomes_one_text_track() {
        let subtitle = SubtitleInfo::builder("http://host/subs.vtt")
            .mime_type("text/vtt")
            .language("en")
            .label("English")
            .build();
        let info = MediaInfo::builder("u", "video/mp4").subtitle(subtitle).build();

        let media = build_cast_media(&info, MetadataKind::Movie, false);
        assert_eq!(media.tracks.len(), 1);
        let track = &media.tracks[0];
        assert_eq!(track.id, SUBTITLE_TRACK_ID);
        assert_eq!(track.track_type, TrackType::Text);
        assert_eq!(track.subtype, Some(TrackSubtype::Subtitles));
        assert_eq!(track.content_id, "http://host/subs.vtt");
        assert_eq!(track.content_type.as_deref(), Some("text/vtt"));
        assert_eq!(track.language.as_deref(), Some("en"));
        assert_eq!(track.name.as_deref(), Some("English"));
    }

    #[test]
    fn test_subtitle_with_url_only_leaves_fields_absent() {
        let info = MediaInfo::builder("u", "video/mp4")
            .subtitle(SubtitleInfo::builder("http://host/subs.vtt").build())
            .build();

        let media = build_cast_media(&info, MetadataKind::Movie, false);
        let track = &media.tracks[0];
        assert_eq!(track.content_id, "http://host/subs.vtt");
        assert!(track.content_type.is_none());
        assert!(track.language.is_none());
        assert!(track.name.is_none());
    }

    #[test]
    fn test_photo_has_no_stream() {
        let info = MediaInfo::builder("http://host/p.jpg", "image/jpeg").build();
        let media = build_cast_media(&info, MetadataKind::Photo, false);
        assert_eq!(media.stream_type, StreamType::None);
        assert!(media.metadata.unwrap().images.is_empty());
    }

    #[test]
    fn test_idle_finished_maps_to_finished() {
        let mut status = MediaStatus::new(1, PlayerState::Idle);
        assert_eq!(PlayState::from(&status), PlayState::Idle);
        status.idle_reason = Some(IdleReason::Finished);
        assert_eq!(PlayState::from(&status), PlayState::Finished);
    }
}
