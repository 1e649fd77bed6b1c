//! Real-time voice processing for the native microphone
//!
//! Lightweight stand-ins for platform voice processing: a DC-blocking
//! high-pass, a noise gate with hysteresis and a slow automatic gain control.
//! All state is carried across blocks so the capture callback can run them
//! incrementally.

use crate::domain::device::ConstraintProfile;

/// High-pass cutoff of the DC blocker
const DC_CUTOFF_HZ: f32 = 80.0;

/// Gate opens above this level
const GATE_THRESHOLD_DBFS: f32 = -55.0;
const GATE_ATTACK_S: f32 = 0.005;
const GATE_RELEASE_S: f32 = 0.120;

const AGC_TARGET_RMS: f32 = 0.10;
const AGC_MAX_GAIN: f32 = 8.0;
const AGC_MIN_GAIN: f32 = 0.1;
/// AGC gain follows the measured level with this time constant
const AGC_TIME_CONSTANT_S: f32 = 0.5;

fn db_to_amp(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Per-stream processing chain
#[derive(Debug, Clone)]
pub struct VoiceProcessor {
    sample_rate: u32,
    channels: usize,
    dc_block: bool,
    noise_gate: bool,
    agc: bool,
    // DC blocker state per channel
    x_prev: Vec<f32>,
    y_prev: Vec<f32>,
    // Gate state
    gate_open: bool,
    gate_gain: f32,
    // AGC state
    agc_gain: f32,
}

impl VoiceProcessor {
    /// Build the chain a profile asks for, or `None` when nothing is requested.
    /// Echo cancellation has no native counterpart and is only logged.
    pub fn for_profile(profile: &ConstraintProfile, sample_rate: u32, channels: u16) -> Option<Self> {
        if !profile.wants_processing() {
            return None;
        }
        if profile.echo_cancellation {
            log::warn!("Echo cancellation is not available on this audio backend; use headphones");
        }
        let channels = usize::from(channels.max(1));
        Some(Self {
            sample_rate: sample_rate.max(1),
            channels,
            dc_block: profile.noise_suppression,
            noise_gate: profile.noise_suppression,
            agc: profile.auto_gain_control,
            x_prev: vec![0.0; channels],
            y_prev: vec![0.0; channels],
            gate_open: false,
            gate_gain: 0.0,
            agc_gain: 1.0,
        })
    }

    /// Process an interleaved block in place
    pub fn process(&mut self, samples: &mut [f32]) {
        if self.dc_block {
            self.apply_dc_block(samples);
        }
        if self.noise_gate {
            self.apply_noise_gate(samples);
        }
        if self.agc {
            self.apply_agc(samples);
        }
    }

    fn apply_dc_block(&mut self, samples: &mut [f32]) {
        let r = (-2.0 * std::f32::consts::PI * DC_CUTOFF_HZ / self.sample_rate as f32).exp();
        for (i, x) in samples.iter_mut().enumerate() {
            let c = i % self.channels;
            let y = *x - self.x_prev[c] + r * self.y_prev[c];
            self.x_prev[c] = *x;
            self.y_prev[c] = y;
            *x = y;
        }
    }

    fn apply_noise_gate(&mut self, samples: &mut [f32]) {
        let open_amp = db_to_amp(GATE_THRESHOLD_DBFS);
        // Hysteresis
        let close_amp = open_amp * 0.85;
        let fs = self.sample_rate as f32;
        let attack_alpha = (-1.0 / (GATE_ATTACK_S * fs)).exp();
        let release_alpha = (-1.0 / (GATE_RELEASE_S * fs)).exp();

        for frame in samples.chunks_mut(self.channels) {
            let env = frame.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
            if self.gate_open {
                if env < close_amp {
                    self.gate_open = false;
                }
            } else if env > open_amp {
                self.gate_open = true;
            }

            let target = if self.gate_open { 1.0 } else { 0.0 };
            let alpha = if target > self.gate_gain {
                attack_alpha
            } else {
                release_alpha
            };
            self.gate_gain = target + alpha * (self.gate_gain - target);

            for s in frame.iter_mut() {
                *s *= self.gate_gain;
            }
        }
    }

    fn apply_agc(&mut self, samples: &mut [f32]) {
        if samples.is_empty() {
            return;
        }
        let sum_sq: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
        let rms = (sum_sq / samples.len() as f64).sqrt() as f32;

        // Hold the gain through silence
        if rms > 1e-4 {
            let desired = (AGC_TARGET_RMS / rms).clamp(AGC_MIN_GAIN, AGC_MAX_GAIN);
            let block_s = samples.len() as f32 / (self.channels as f32 * self.sample_rate as f32);
            let coeff = 1.0 - (-block_s / AGC_TIME_CONSTANT_S).exp();
            self.agc_gain += (desired - self.agc_gain) * coeff;
        }

        for s in samples.iter_mut() {
            *s = (*s * self.agc_gain).clamp(-1.0, 1.0);
        }
    }
}
