use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::thread;
use std::time::Duration;

use log::{debug, error, warn};
use parking_lot::Mutex;
use rodio::mixer::Mixer;
use rodio::source::Buffered;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};

use crate::container::info::probe_layer;
use crate::error::LayerError;
use crate::playback::layer::{LayerLoader, PlayOptions, SoundLayer};

const OUTPUT_STREAM_OPEN_RETRIES: usize = 3;
const OUTPUT_STREAM_OPEN_RETRY_MS: u64 = 200;

type CachedSource = Buffered<Decoder<BufReader<File>>>;

/// Open the default output device with bounded retries.
///
/// The returned stream must outlive every layer created from the loader.
pub fn open_default_output() -> Result<(OutputStream, RodioLoader), LayerError> {
    for attempt in 1..=OUTPUT_STREAM_OPEN_RETRIES {
        match OutputStreamBuilder::open_default_stream() {
            Ok(mut stream) => {
                stream.log_on_drop(false);
                let loader = RodioLoader::new(stream.mixer().clone());
                return Ok((stream, loader));
            }
            Err(err) => {
                if attempt == OUTPUT_STREAM_OPEN_RETRIES {
                    error!(
                        "failed to open default output stream after {} attempts: {}",
                        OUTPUT_STREAM_OPEN_RETRIES, err
                    );
                    return Err(LayerError::Playback(err.to_string()));
                }
                warn!(
                    "open_default_stream attempt {}/{} failed: {}",
                    attempt, OUTPUT_STREAM_OPEN_RETRIES, err
                );
                thread::sleep(Duration::from_millis(OUTPUT_STREAM_OPEN_RETRY_MS));
            }
        }
    }
    Err(LayerError::Playback("no output stream".to_string()))
}

/// Fully decode a layer file into a clonable buffered source and its
/// duration.
fn decode(path: &str) -> Result<(CachedSource, f64), LayerError> {
    let file = File::open(path).map_err(|source| LayerError::Io {
        path: path.to_string(),
        source,
    })?;
    let decoder = Decoder::new(BufReader::new(file)).map_err(|err| LayerError::Decode {
        path: path.to_string(),
        reason: err.to_string(),
    })?;
    let duration = decoder
        .total_duration()
        .map(|duration| duration.as_secs_f64())
        .or_else(|| probe_layer(path).ok().map(|info| info.duration))
        .unwrap_or(0.0);
    let source = decoder.buffered();
    // Clones share one frame list; draining one decodes it for all of them.
    let samples = source.clone().count();
    debug!("decoded {} ({:.2}s, {} samples)", path, duration, samples);
    Ok((source, duration))
}

/// Decodes layer files once and hands out sink-backed layers.
pub struct RodioLoader {
    mixer: Mixer,
    cache: Mutex<HashMap<String, (CachedSource, f64)>>,
}

impl RodioLoader {
    pub fn new(mixer: Mixer) -> Self {
        Self {
            mixer,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, path: &str) -> Result<(CachedSource, f64), LayerError> {
        if let Some(entry) = self.cache.lock().get(path) {
            return Ok(entry.clone());
        }

        let entry = decode(path)?;
        self.cache.lock().insert(path.to_string(), entry.clone());
        Ok(entry)
    }

    pub fn cached_paths(&self) -> usize {
        self.cache.lock().len()
    }
}

impl LayerLoader for RodioLoader {
    fn load(&self, path: &str) -> Result<Box<dyn SoundLayer>, LayerError> {
        let (source, duration) = self.cached(path)?;
        Ok(Box::new(RodioLayer {
            path: path.to_string(),
            source,
            duration,
            mixer: self.mixer.clone(),
            sink: None,
            offset: 0.0,
            looping: false,
            volume: 0.0,
        }))
    }

    fn preload(&self, path: &str) -> Result<(), LayerError> {
        self.cached(path).map(|_| ())
    }

    fn evict(&self, path: &str) {
        if self.cache.lock().remove(path).is_some() {
            debug!("evicted {} from the decode cache", path);
        }
    }
}

/// One layer playing through its own [`Sink`].
pub struct RodioLayer {
    path: String,
    source: CachedSource,
    duration: f64,
    mixer: Mixer,
    sink: Option<Sink>,
    offset: f64,
    looping: bool,
    volume: f32,
}

impl SoundLayer for RodioLayer {
    fn play(&mut self, options: PlayOptions) -> Result<(), LayerError> {
        self.stop();

        let sink = Sink::connect_new(&self.mixer);
        sink.set_volume(options.volume);
        let offset = Duration::from_secs_f64(options.offset.max(0.0));
        if options.looping {
            sink.append(self.source.clone().repeat_infinite().skip_duration(offset));
        } else {
            sink.append(self.source.clone().skip_duration(offset));
        }
        sink.play();

        self.sink = Some(sink);
        self.offset = options.offset;
        self.looping = options.looping;
        self.volume = options.volume;
        debug!("{} playing from {:.3}s", self.path, self.offset);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn current_time(&self) -> f64 {
        let Some(sink) = &self.sink else {
            return 0.0;
        };
        let elapsed = self.offset + sink.get_pos().as_secs_f64();
        if self.looping && self.duration > 0.0 {
            elapsed % self.duration
        } else {
            elapsed
        }
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        if let Some(sink) = &self.sink {
            sink.set_volume(volume);
        }
    }

    fn is_playing(&self) -> bool {
        self.sink
            .as_ref()
            .map_or(false, |sink| !sink.empty() && !sink.is_paused())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &std::path::Path, sample_rate: u32, samples: &[i16]) {
        let data_len = (samples.len() * 2) as u32;
        let mut bytes = Vec::with_capacity(44 + data_len as usize);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn decoded_source_replays_every_sample() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pulse.wav");
        let samples: Vec<i16> = (0..800).map(|i| ((i % 40) * 100) as i16).collect();
        write_wav(&path, 8_000, &samples);

        let (source, duration) = decode(path.to_str().unwrap()).unwrap();
        assert!((duration - 0.1).abs() < 0.01);
        assert_eq!(source.clone().count(), 800);
        assert_eq!(source.count(), 800);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = decode("/definitely/not/here.ogg").err().unwrap();
        assert!(matches!(err, LayerError::Io { .. }));
    }
}
