//! Synthetic sine-wave PCM, for exercising the recorder without hardware.

use std::f64::consts::TAU;
use std::thread;
use std::time::{Duration, Instant};

use wav_recorder_core::processing::wav_format::{self, WaveHeader};
use wav_recorder_core::{AudioRead, AudioSource, CaptureError};

/// [`AudioSource`] producing a sine tone in any accepted PCM format.
///
/// Paced sources release samples at the sample rate, like a real device:
/// a read waits (up to its timeout) until a full buffer is due. Unpaced
/// sources fill every buffer immediately.
pub struct ToneSource {
    format: WaveHeader,
    frequency_hz: f64,
    amplitude: f64,
    paced: bool,
    frames_emitted: u64,
    started_at: Option<Instant>,
}

impl ToneSource {
    pub fn new(channels: u16, sample_rate: u32, bit_depth: u16, frequency_hz: f64) -> Result<Self, CaptureError> {
        let format = wav_format::build_header(channels, sample_rate, bit_depth)?;
        if !(frequency_hz.is_finite() && frequency_hz > 0.0) {
            return Err(CaptureError::ConfigurationFailed(format!(
                "invalid tone frequency: {}",
                frequency_hz
            )));
        }
        Ok(Self {
            format,
            frequency_hz,
            amplitude: 0.5,
            paced: true,
            frames_emitted: 0,
            started_at: None,
        })
    }

    /// Peak level in `0.0..=1.0` of full scale (default 0.5).
    pub fn amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude.clamp(0.0, 1.0);
        self
    }

    pub fn paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }

    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted
    }

    /// Frames the device would have produced by now.
    fn frames_due(&self, start: Instant) -> u64 {
        let produced = (start.elapsed().as_secs_f64() * self.format.sample_rate as f64) as u64;
        produced.saturating_sub(self.frames_emitted)
    }

    fn render(&mut self, buffer: &mut [u8], frames: usize) -> usize {
        let frame_bytes = self.format.block_align as usize;
        let sample_bytes = self.format.bytes_per_sample() as usize;
        let rate = self.format.sample_rate as f64;

        for (i, frame) in buffer.chunks_exact_mut(frame_bytes).take(frames).enumerate() {
            let n = self.frames_emitted + i as u64;
            let value = self.amplitude * (TAU * self.frequency_hz * n as f64 / rate).sin();
            let sample = encode_sample(value, self.format.bit_depth);
            for channel in frame.chunks_exact_mut(sample_bytes) {
                channel.copy_from_slice(&sample[..sample_bytes]);
            }
        }
        self.frames_emitted += frames as u64;
        frames * frame_bytes
    }
}

/// Little-endian PCM encoding of `value` in `-1.0..=1.0`. 8-bit PCM is unsigned.
fn encode_sample(value: f64, bit_depth: u16) -> [u8; 4] {
    let v = value.clamp(-1.0, 1.0);
    match bit_depth {
        8 => [(v * 127.0 + 128.0).round() as u8, 0, 0, 0],
        16 => {
            let s = (v * i16::MAX as f64).round() as i16;
            let b = s.to_le_bytes();
            [b[0], b[1], 0, 0]
        }
        24 => {
            let s = (v * 8_388_607.0).round() as i32;
            let b = s.to_le_bytes();
            [b[0], b[1], b[2], 0]
        }
        _ => ((v * i32::MAX as f64).round() as i32).to_le_bytes(),
    }
}

impl AudioSource for ToneSource {
    fn start(&mut self) -> Result<(), CaptureError> {
        self.frames_emitted = 0;
        self.started_at = Some(Instant::now());
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8], timeout: Duration) -> AudioRead {
        let Some(start) = self.started_at else {
            return AudioRead::Error("tone source is not started".into());
        };
        let capacity = buffer.len() / self.format.block_align as usize;
        if capacity == 0 {
            return AudioRead::Error(format!(
                "buffer of {} bytes holds no {}-byte frame",
                buffer.len(),
                self.format.block_align
            ));
        }

        if !self.paced {
            return AudioRead::Data(self.render(buffer, capacity));
        }

        let rate = self.format.sample_rate as f64;
        let full_at = start + Duration::from_secs_f64((self.frames_emitted + capacity as u64) as f64 / rate);
        let wait = full_at.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            thread::sleep(wait.min(timeout));
        }

        let due = self.frames_due(start).min(capacity as u64) as usize;
        if due == 0 {
            return AudioRead::Timeout;
        }
        AudioRead::Data(self.render(buffer, due))
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.started_at = None;
        Ok(())
    }

    fn describe(&self) -> String {
        format!(
            "{:.1} Hz tone ({} Hz, {} ch, {}-bit{})",
            self.frequency_hz,
            self.format.sample_rate,
            self.format.channels,
            self.format.bit_depth,
            if self.paced { ", real time" } else { "" }
        )
    }
}
