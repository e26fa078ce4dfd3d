//! Media probing for layer files.

use std::fs::File;
use std::path::Path;

use log::debug;
use symphonia::core::{
    codecs::{CodecParameters, CODEC_TYPE_NULL},
    formats::FormatOptions,
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::{Hint, ProbeResult},
};

use crate::error::LayerError;

/// Basic stream facts of one layer file.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerInfo {
    pub path: String,
    pub sample_rate: u32,
    pub channels: u32,
    pub duration: f64,
}

impl LayerInfo {
    /// Whether two layers differ in length by more than `window` seconds.
    pub fn differs_from(&self, other: &LayerInfo, window: f64) -> bool {
        (self.duration - other.duration).abs() > window
    }
}

/// Convert codec frame counts to seconds using the track time base.
fn duration_from_params(codec_params: &CodecParameters) -> Option<f64> {
    let time_base = codec_params.time_base?;
    let frames = codec_params.n_frames?;
    let time = time_base.calc_time(codec_params.start_ts + frames);
    Some(time.seconds as f64 + time.frac)
}

fn probe(path: &str) -> Result<ProbeResult, LayerError> {
    let file = File::open(path).map_err(|source| LayerError::Io {
        path: path.to_string(),
        source,
    })?;

    let mut hint = Hint::new();
    if let Some(ext) = Path::new(path).extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(&ext.to_lowercase());
    }

    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| LayerError::Decode {
            path: path.to_string(),
            reason: err.to_string(),
        })
}

/// Probe sample rate, channel count and duration of a layer file.
///
/// Duration comes from the container metadata when present, otherwise from
/// a full packet scan.
pub fn probe_layer(path: &str) -> Result<LayerInfo, LayerError> {
    let mut probed = probe(path)?;

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
        .cloned()
        .ok_or_else(|| LayerError::Decode {
            path: path.to_string(),
            reason: "no audio track".to_string(),
        })?;

    let params = &track.codec_params;
    let sample_rate = params.sample_rate.unwrap_or(0);
    let channels = params.channels.map(|c| c.count() as u32).unwrap_or(0);

    let duration = match duration_from_params(params) {
        Some(duration) => duration,
        None => {
            debug!("no frame count for {}, scanning packets", path);
            let mut last_ts = 0u64;
            while let Ok(packet) = probed.format.next_packet() {
                if packet.track_id() == track.id {
                    last_ts = last_ts.max(packet.ts() + packet.dur());
                }
            }
            match (params.time_base, sample_rate) {
                (Some(time_base), _) => {
                    let time = time_base.calc_time(last_ts);
                    time.seconds as f64 + time.frac
                }
                (None, rate) if rate > 0 => last_ts as f64 / rate as f64,
                _ => 0.0,
            }
        }
    };

    Ok(LayerInfo {
        path: path.to_string(),
        sample_rate,
        channels,
        duration,
    })
}
