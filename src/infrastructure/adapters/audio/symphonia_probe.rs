//! Symphonia Probe - 基于 symphonia 的音频元数据读取
//!
//! 实现 AudioProbePort。只探测容器与默认音轨参数，不解码音频数据

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey};
use symphonia::core::probe::Hint;

use crate::application::ports::{AudioProbeError, AudioProbePort, AudioTags};

#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaProbe;

impl SymphoniaProbe {
    pub fn new() -> Self {
        Self
    }

    fn tag_name(key: Option<StandardTagKey>, raw: &str) -> String {
        match key {
            Some(StandardTagKey::TrackTitle) => "title".to_string(),
            Some(StandardTagKey::Artist) => "artist".to_string(),
            Some(StandardTagKey::AlbumArtist) => "album_artist".to_string(),
            Some(StandardTagKey::Album) => "album".to_string(),
            Some(StandardTagKey::Composer) => "composer".to_string(),
            Some(StandardTagKey::Date) => "date".to_string(),
            Some(StandardTagKey::Genre) => "genre".to_string(),
            Some(StandardTagKey::TrackNumber) => "track".to_string(),
            _ => raw.to_lowercase(),
        }
    }

    fn collect_tags(revision: &MetadataRevision, out: &mut BTreeMap<String, String>) {
        for tag in revision.tags() {
            let value = tag.value.to_string();
            if value.trim().is_empty() {
                continue;
            }
            out.entry(Self::tag_name(tag.std_key, &tag.key))
                .or_insert(value);
        }
    }
}

impl AudioProbePort for SymphoniaProbe {
    fn probe(&self, path: &Path) -> Result<AudioTags, AudioProbeError> {
        let file = File::open(path).map_err(|e| AudioProbeError::IoError(e.to_string()))?;
        let file_size = file.metadata().map(|m| m.len()).unwrap_or(0);
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let mut probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| AudioProbeError::Unsupported(e.to_string()))?;

        let mut tags = AudioTags::default();

        if let Some(mut metadata) = probed.metadata.get() {
            if let Some(revision) = metadata.skip_to_latest() {
                Self::collect_tags(revision, &mut tags.metadata);
            }
        }
        if let Some(revision) = probed.format.metadata().current() {
            Self::collect_tags(revision, &mut tags.metadata);
        }

        let Some(track) = probed.format.default_track() else {
            return Ok(tags);
        };
        let params = &track.codec_params;

        tags.sample_rate = params.sample_rate.unwrap_or(0);
        tags.channels = params.channels.map(|c| c.count() as u32).unwrap_or(0);

        tags.duration = match (params.time_base, params.n_frames) {
            (Some(tb), Some(frames)) => {
                let time = tb.calc_time(frames);
                time.seconds as f64 + time.frac
            }
            (None, Some(frames)) if tags.sample_rate > 0 => frames as f64 / tags.sample_rate as f64,
            _ => 0.0,
        };

        // 平均码率：容器大小 / 时长
        if tags.duration > 0.0 {
            tags.bitrate = ((file_size as f64 * 8.0) / tags.duration) as u32;
        }

        Ok(tags)
    }
}
