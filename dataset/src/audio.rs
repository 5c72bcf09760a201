use std::{fs::File, io, path::Path};

use symphonia::core::{
    audio::{AudioBuffer, Signal},
    codecs::DecoderOptions,
    errors::Error as SymphoniaError,
    formats::FormatOptions,
    io::{MediaSourceStream, MediaSourceStreamOptions},
    meta::MetadataOptions,
    probe::Hint,
};
use tracing::{debug, instrument, trace, warn};

use crate::DatasetError;

/// A fully decoded audio file, one sample vector per channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Waveform {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl Waveform {
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel, counting only frames every channel has.
    pub fn frames(&self) -> usize {
        self.channels.iter().map(Vec::len).min().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Frame-major samples, `[l0, r0, l1, r1, ...]` for stereo.
    pub fn interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.frames() * self.channel_count());
        for frame in 0..self.frames() {
            out.extend(self.channels.iter().map(|channel| channel[frame]));
        }
        out
    }
}

/// Decodes a whole audio file into `f32` samples.
#[instrument(level = "trace")]
pub fn load_waveform(path: &Path) -> Result<Waveform, DatasetError> {
    let decode_error = |source| DatasetError::Decode {
        path: path.to_path_buf(),
        source,
    };

    let registry = symphonia::default::get_codecs();
    let probe = symphonia::default::get_probe();
    let file = File::open(path)?;
    let stream = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }
    let mut format = probe
        .format(
            &hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(decode_error)?;

    let track = format
        .format
        .default_track()
        .ok_or_else(|| DatasetError::NoAudioTrack {
            path: path.to_path_buf(),
        })?;
    let mut decoder = registry
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(decode_error)?;
    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.unwrap_or_default();
    debug!(params = ?track.codec_params, "read codec params");

    let mut channels: Vec<Vec<f32>> = Vec::new();

    loop {
        let packet = match format.format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err)) if err.kind() == io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(err) => return Err(decode_error(err)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(reason)) => {
                warn!(reason, "skipping undecodable packet");
                continue;
            }
            Err(err) => return Err(decode_error(err)),
        };
        let mut converted: AudioBuffer<f32> =
            AudioBuffer::new(decoded.capacity() as u64, *decoded.spec());
        decoded.convert(&mut converted);
        let planes = converted.planes();
        let planes_slice = planes.planes();
        if channels.len() != planes_slice.len() {
            trace!("resizing channels due to size mismatch");
            channels.resize_with(planes_slice.len(), Vec::new);
        }
        channels
            .iter_mut()
            .zip(planes_slice)
            .for_each(|(channel, plane)| channel.extend_from_slice(plane));
    }

    Ok(Waveform {
        sample_rate,
        channels,
    })
}
