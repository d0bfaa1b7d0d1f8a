//! Audio output using cpal
//!
//! Binds an output device with a pull-based callback model: the device
//! calls back whenever its buffer needs refilling and a [`PlaybackPump`]
//! fills it. The format is negotiated from the decoded stream's native
//! spec, and whatever the device actually grants is what the filter graph
//! gets built against, so binding happens before graph construction.
//!
//! The stream is built paused; playback starts only on an explicit
//! [`AudioOutput::play`].

use crate::error::{Error, Result};
use crate::pump::PlaybackPump;
use crate::types::{ContextConfig, DeviceSpec, SampleSpec};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, Device, Host, SampleFormat, SampleRate, Stream, StreamConfig,
    SupportedBufferSize, SupportedStreamConfig,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Map a clamped f32 sample onto the unsigned 16-bit range.
///
/// Silence must land on the exact midpoint 32768, otherwise every quiet
/// stretch carries a one-LSB DC offset.
fn f32_to_u16(sample: f32) -> u16 {
    ((sample + 1.0) * 32768.0).min(65535.0) as u16
}

/// Output device binding with a paused-until-play stream.
pub struct AudioOutput {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    granted: DeviceSpec,
    stream: Option<Stream>,
    volume: Arc<Mutex<f32>>,

    /// Set by the cpal error callback; the stream is considered dead
    error_flag: Arc<AtomicBool>,
}

impl AudioOutput {
    /// List available audio output devices.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::DeviceOpen(format!("failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Open an output device negotiated against the stream's native format.
    ///
    /// Prefers the native rate, stereo layout and f32 samples; falls back
    /// to the device's default configuration. The granted spec is available
    /// from [`AudioOutput::granted`] and may differ from the request.
    pub fn open(native: SampleSpec, config: &ContextConfig) -> Result<Self> {
        let host = cpal::default_host();
        let device = Self::select_device(&host, config.device.as_deref())?;

        let supported = Self::get_best_config(&device, native)?;
        let sample_format = supported.sample_format();
        let supported_buffer = supported.buffer_size().clone();
        let mut stream_config = supported.config();

        // Pin the buffer size so the graph sink and the device agree on
        // the frame granularity, clamped into whatever the device allows.
        let buffer_frames = match supported_buffer {
            SupportedBufferSize::Range { min, max } => {
                let clamped = config.buffer_frames.clamp(min, max);
                if clamped != config.buffer_frames {
                    warn!(
                        "buffer size {} outside device range {}..={}, using {}",
                        config.buffer_frames, min, max, clamped
                    );
                }
                stream_config.buffer_size = BufferSize::Fixed(clamped);
                clamped
            }
            SupportedBufferSize::Unknown => {
                debug!("device does not report a buffer size range, keeping its default");
                config.buffer_frames
            }
        };

        let granted = DeviceSpec {
            rate: stream_config.sample_rate.0,
            channels: stream_config.channels,
            buffer_frames,
        };

        info!(
            "audio device '{}': {} Hz, {} ch, {:?}, {} frames/buffer",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            granted.rate,
            granted.channels,
            sample_format,
            buffer_frames
        );

        Ok(Self {
            device,
            config: stream_config,
            sample_format,
            granted,
            stream: None,
            volume: Arc::new(Mutex::new(config.volume.clamp(0.0, 1.0))),
            error_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Find the requested device, falling back to the default output.
    fn select_device(host: &Host, requested: Option<&str>) -> Result<Device> {
        if let Some(name) = requested {
            let mut devices = host
                .output_devices()
                .map_err(|e| Error::DeviceOpen(format!("failed to enumerate devices: {}", e)))?;

            if let Some(device) = devices.find(|d| d.name().ok().as_deref() == Some(name)) {
                info!("using requested audio device: {}", name);
                return Ok(device);
            }
            warn!("device '{}' not found, falling back to default", name);
        }

        let device = host.default_output_device().ok_or_else(|| {
            Error::DeviceOpen("no default output device available".to_string())
        })?;
        debug!(
            "using default audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );
        Ok(device)
    }

    /// Pick the closest supported configuration to the native format.
    fn get_best_config(device: &Device, native: SampleSpec) -> Result<SupportedStreamConfig> {
        let configs: Vec<_> = device
            .supported_output_configs()
            .map_err(|e| Error::DeviceOpen(format!("failed to get device configs: {}", e)))?
            .collect();

        let rate_in_range = |config: &cpal::SupportedStreamConfigRange| {
            config.min_sample_rate().0 <= native.rate && config.max_sample_rate().0 >= native.rate
        };

        // First choice: native channel count at the native rate, f32.
        // Second: stereo at the native rate, f32 (the converter maps the
        // mix bus to whatever layout is granted anyway).
        let preferred = configs
            .iter()
            .find(|c| {
                c.channels() == native.channels
                    && rate_in_range(c)
                    && c.sample_format() == SampleFormat::F32
            })
            .or_else(|| {
                configs.iter().find(|c| {
                    c.channels() == 2 && rate_in_range(c) && c.sample_format() == SampleFormat::F32
                })
            });

        if let Some(range) = preferred {
            return Ok(range.clone().with_sample_rate(SampleRate(native.rate)));
        }

        // Fallback: whatever the device calls its default
        device
            .default_output_config()
            .map_err(|e| Error::DeviceOpen(format!("failed to get default config: {}", e)))
    }

    /// Format the device actually granted.
    pub fn granted(&self) -> DeviceSpec {
        self.granted
    }

    /// Build the output stream around the pump, leaving it paused.
    ///
    /// Fails with [`Error::UnsupportedFormat`] when the device wants a
    /// sample format with no conversion from the f32 mix bus.
    pub fn start(&mut self, pump: PlaybackPump) -> Result<()> {
        if self.stream.is_some() {
            return Err(Error::InvalidState("audio stream already started".to_string()));
        }

        let pump = Arc::new(Mutex::new(pump));
        let volume = Arc::clone(&self.volume);

        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream_f32(pump, volume)?,
            SampleFormat::I16 => self.build_stream_i16(pump, volume)?,
            SampleFormat::U16 => self.build_stream_u16(pump, volume)?,
            sample_format => {
                return Err(Error::UnsupportedFormat(format!(
                    "no playback path for device format {:?}",
                    sample_format
                )));
            }
        };

        // Hold the stream paused; play() is an explicit transition
        stream
            .pause()
            .map_err(|e| Error::DeviceOpen(format!("failed to hold stream paused: {}", e)))?;
        self.stream = Some(stream);

        info!("audio stream ready (paused)");
        Ok(())
    }

    fn build_stream_f32(
        &self,
        pump: Arc<Mutex<PlaybackPump>>,
        volume: Arc<Mutex<f32>>,
    ) -> Result<Stream> {
        let error_flag = Arc::clone(&self.error_flag);

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut pump = pump.lock().unwrap();
                    let current_volume = *volume.lock().unwrap();

                    pump.fill(data);
                    for sample in data.iter_mut() {
                        *sample = (*sample * current_volume).clamp(-1.0, 1.0);
                    }
                },
                move |err| {
                    error!("audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::DeviceOpen(format!("failed to build stream: {}", e)))?;

        Ok(stream)
    }

    fn build_stream_i16(
        &self,
        pump: Arc<Mutex<PlaybackPump>>,
        volume: Arc<Mutex<f32>>,
    ) -> Result<Stream> {
        let error_flag = Arc::clone(&self.error_flag);
        let mut scratch: Vec<f32> = Vec::new();

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    let mut pump = pump.lock().unwrap();
                    let current_volume = *volume.lock().unwrap();

                    scratch.resize(data.len(), 0.0);
                    pump.fill(&mut scratch);
                    for (dst, src) in data.iter_mut().zip(scratch.iter()) {
                        let sample = (src * current_volume).clamp(-1.0, 1.0);
                        *dst = (sample * i16::MAX as f32) as i16;
                    }
                },
                move |err| {
                    error!("audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::DeviceOpen(format!("failed to build stream: {}", e)))?;

        Ok(stream)
    }

    fn build_stream_u16(
        &self,
        pump: Arc<Mutex<PlaybackPump>>,
        volume: Arc<Mutex<f32>>,
    ) -> Result<Stream> {
        let error_flag = Arc::clone(&self.error_flag);
        let mut scratch: Vec<f32> = Vec::new();

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [u16], _: &cpal::OutputCallbackInfo| {
                    let mut pump = pump.lock().unwrap();
                    let current_volume = *volume.lock().unwrap();

                    scratch.resize(data.len(), 0.0);
                    pump.fill(&mut scratch);
                    for (dst, src) in data.iter_mut().zip(scratch.iter()) {
                        let sample = (src * current_volume).clamp(-1.0, 1.0);
                        *dst = f32_to_u16(sample);
                    }
                },
                move |err| {
                    error!("audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::DeviceOpen(format!("failed to build stream: {}", e)))?;

        Ok(stream)
    }

    /// Resume callback invocation.
    pub fn play(&self) -> Result<()> {
        match &self.stream {
            Some(stream) => stream
                .play()
                .map_err(|e| Error::DeviceOpen(format!("failed to start stream: {}", e))),
            None => Err(Error::InvalidState("audio stream not started".to_string())),
        }
    }

    /// Suspend callback invocation. Decode state is untouched.
    pub fn pause(&self) -> Result<()> {
        match &self.stream {
            Some(stream) => stream
                .pause()
                .map_err(|e| Error::DeviceOpen(format!("failed to pause stream: {}", e))),
            None => Err(Error::InvalidState("audio stream not started".to_string())),
        }
    }

    /// Stop the device and drop the stream.
    ///
    /// Dropping the stream also drops the pump moved into its callback, so
    /// after this returns no callback can touch the graph or decoder.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            info!("stopping audio stream");
            if let Err(e) = stream.pause() {
                warn!("failed to pause stream while stopping: {}", e);
            }
            drop(stream);
        }
    }

    /// Set output volume, clamped to [0.0, 1.0].
    pub fn set_volume(&self, volume: f32) {
        let clamped = volume.clamp(0.0, 1.0);
        *self.volume.lock().unwrap() = clamped;
        debug!("volume set to {:.2}", clamped);
    }

    /// Current output volume.
    pub fn volume(&self) -> f32 {
        *self.volume.lock().unwrap()
    }

    /// Whether the device reported a stream error.
    pub fn has_error(&self) -> bool {
        self.error_flag.load(Ordering::SeqCst)
    }

    /// Name of the bound device.
    pub fn device_name(&self) -> String {
        self.device.name().unwrap_or_else(|_| "Unknown".to_string())
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        self.stop();
    }
}
