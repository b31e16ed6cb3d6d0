//! Producer and consumer threads.
//!
//! The producer owns the camera: it grabs, cleans, warps and segments depth
//! frames, runs calibration on request and applies settings reloads and
//! camera restarts. The consumer owns the display: it renders the latest
//! published frame in the current mode and turns key presses into flag
//! changes. Both loops exit once `running` is cleared, and whichever thread
//! leaves first clears it for the other.

use crate::artifacts::ArtifactWriter;
use crate::render::{calibration_target, render_frame};
use crate::shared::RunStats;
use crate::{
    Command, ControlFlags, DepthCamera, Display, FrameAggregator, PipelineError, ProcessedFrame,
    RenderMode, Settings, SettingsSource, Shared, StatsSnapshot,
};
use depthcast_calib::{calibrate_detailed, locate_target};
use depthcast_core::{apply_morphology, warp_perspective_gray, Homography};
use depthcast_segment::{segment, RegionList};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::thread;

/// Clears `running` when dropped, including during unwinding.
struct StopOnExit<'a>(&'a ControlFlags);

impl Drop for StopOnExit<'_> {
    fn drop(&mut self) {
        self.0.stop();
    }
}

/// What a finished run did.
#[derive(Clone, Debug, Serialize)]
pub struct RunSummary {
    pub stats: StatsSnapshot,
    pub final_mode: RenderMode,
    pub homography: Homography,
    /// Version of the last published frame, `0` when none was published.
    pub last_frame_version: u64,
}

/// Cloneable view of a running pipeline, used to stop it from outside
/// (e.g. a Ctrl-C handler) and to observe its state.
#[derive(Clone, Debug)]
pub struct PipelineHandle {
    shared: Arc<Shared>,
}

impl PipelineHandle {
    pub fn stop(&self) {
        self.shared.flags.stop();
    }

    pub fn flags(&self) -> &ControlFlags {
        &self.shared.flags
    }

    pub fn latest_frame(&self) -> Option<Arc<ProcessedFrame>> {
        self.shared.frames.latest()
    }

    pub fn homography(&self) -> Homography {
        *self.shared.homography.read()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    pub fn settings(&self) -> Settings {
        self.shared.settings.snapshot()
    }
}

pub struct Pipeline {
    shared: Arc<Shared>,
    source: Box<dyn SettingsSource>,
    camera: Box<dyn DepthCamera>,
    display: Box<dyn Display>,
}

impl Pipeline {
    pub fn new(
        settings: Settings,
        source: Box<dyn SettingsSource>,
        camera: Box<dyn DepthCamera>,
        display: Box<dyn Display>,
    ) -> Result<Self, PipelineError> {
        settings.validate()?;
        Ok(Self {
            shared: Arc::new(Shared::new(settings, ControlFlags::default())),
            source,
            camera,
            display,
        })
    }

    /// Start in `mode` instead of blank.
    pub fn with_mode(self, mode: RenderMode) -> Self {
        self.shared.flags.set_mode(mode);
        self
    }

    pub fn handle(&self) -> PipelineHandle {
        PipelineHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Open the camera, run both threads until quit and close the camera.
    ///
    /// Returns the first fatal error raised by either thread.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "info", skip_all))]
    pub fn run(self) -> Result<RunSummary, PipelineError> {
        let Pipeline {
            shared,
            source,
            mut camera,
            mut display,
        } = self;

        let settings = shared.settings.snapshot();
        camera
            .open(&settings.camera)
            .map_err(PipelineError::CameraOpen)?;
        info!(
            "pipeline started: projector {}x{}, settings from {}",
            settings.projector.width,
            settings.projector.height,
            source.describe()
        );

        let outcome = thread::scope(|s| -> Result<(), PipelineError> {
            let producer = thread::Builder::new()
                .name("producer".into())
                .spawn_scoped(s, || {
                    Producer::new(&shared, source.as_ref(), camera.as_mut(), &settings).run()
                })
                .map_err(|e| {
                    shared.flags.stop();
                    PipelineError::Spawn("producer", e)
                })?;
            let consumer = thread::Builder::new()
                .name("consumer".into())
                .spawn_scoped(s, || Consumer::new(&shared, display.as_mut()).run());
            let consumer = match consumer {
                Ok(handle) => handle,
                Err(e) => {
                    shared.flags.stop();
                    // The spawn error is what gets reported.
                    let _ = producer.join();
                    return Err(PipelineError::Spawn("consumer", e));
                }
            };

            let produced = producer.join();
            let consumed = consumer.join();
            produced.map_err(|_| PipelineError::ThreadPanicked("producer"))??;
            consumed.map_err(|_| PipelineError::ThreadPanicked("consumer"))?;
            Ok(())
        });

        camera.close();
        outcome?;

        let summary = RunSummary {
            stats: shared.stats.snapshot(),
            final_mode: shared.flags.mode(),
            homography: *shared.homography.read(),
            last_frame_version: shared.frames.version(),
        };
        info!(
            "pipeline stopped: {} grabbed, {} published, {} rendered",
            summary.stats.frames_grabbed, summary.stats.frames_published, summary.stats.frames_rendered
        );
        Ok(summary)
    }
}

struct Producer<'a> {
    shared: &'a Shared,
    source: &'a dyn SettingsSource,
    camera: &'a mut dyn DepthCamera,
    aggregator: FrameAggregator,
    artifacts: ArtifactWriter,
}

impl<'a> Producer<'a> {
    fn new(
        shared: &'a Shared,
        source: &'a dyn SettingsSource,
        camera: &'a mut dyn DepthCamera,
        settings: &Settings,
    ) -> Self {
        Self {
            shared,
            source,
            camera,
            aggregator: FrameAggregator::new(settings.camera.frames_to_aggregate),
            artifacts: ArtifactWriter::new(&settings.output),
        }
    }

    fn run(mut self) -> Result<(), PipelineError> {
        let shared = self.shared;
        let flags = &shared.flags;
        let _stop = StopOnExit(flags);
        while flags.is_running() {
            let settings = self.cycle()?;
            thread::sleep(settings.timing.producer_sleep());
        }
        debug!("producer finished");
        Ok(())
    }

    /// One producer iteration; returns the settings it ran with.
    fn cycle(&mut self) -> Result<Settings, PipelineError> {
        let shared = self.shared;
        let flags = &shared.flags;
        if flags.take_reload() {
            self.reload();
        }
        let settings = self.shared.settings.snapshot();
        self.aggregator
            .set_window(settings.camera.frames_to_aggregate);

        if flags.take_restart() {
            info!("restarting camera");
            self.camera
                .restart(&settings.camera)
                .map_err(PipelineError::CameraRestart)?;
            self.aggregator.clear();
            RunStats::bump(&self.shared.stats.camera_restarts);
        }

        if flags.calibration_requested() {
            self.calibrate(&settings);
        } else if flags.grab_enabled() {
            self.process(&settings);
        }
        Ok(settings)
    }

    fn reload(&mut self) {
        let stats = &self.shared.stats;
        match self.shared.settings.reload(self.source) {
            Ok(new) => {
                info!("settings reloaded from {}", self.source.describe());
                if let Err(e) = self.camera.apply_settings(&new.camera) {
                    warn!("camera rejected reloaded settings: {e}");
                }
                self.artifacts = ArtifactWriter::new(&new.output);
                RunStats::bump(&stats.settings_reloads);
            }
            Err(e) => {
                warn!(
                    "reloading settings from {} failed, keeping previous: {e}",
                    self.source.describe()
                );
                RunStats::bump(&stats.reload_failures);
            }
        }
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all))]
    fn process(&mut self, settings: &Settings) {
        let stats = &self.shared.stats;
        let captured = match self.camera.grab() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("grab failed: {e}");
                RunStats::bump(&stats.grab_failures);
                return;
            }
        };
        RunStats::bump(&stats.frames_grabbed);

        let Some(depth) = self.aggregator.push(captured.depth) else {
            return;
        };
        let cleaned = apply_morphology(&depth, &settings.preprocessing);

        let homography = *self.shared.homography.read();
        let Some(projector_from_camera_inv) = homography.inverse() else {
            warn!("current homography is singular, skipping frame");
            return;
        };
        let (pw, ph) = settings.projector_size();
        let warped = warp_perspective_gray(&cleaned.view(), &projector_from_camera_inv, pw, ph);

        let regions = if self.shared.flags.processing_enabled() {
            segment(&warped.view(), &settings.segmentation)
        } else {
            RegionList {
                width: pw,
                height: ph,
                ..RegionList::default()
            }
        };
        debug!(
            "{} regions ({} undersized, {} dropped)",
            regions.len(),
            regions.undersized,
            regions.dropped
        );

        self.artifacts.write_warped(&warped);
        self.artifacts.write_regions(&regions);

        self.shared.frames.publish(ProcessedFrame {
            version: 0,
            depth: warped,
            regions,
            homography,
        });
        RunStats::bump(&stats.frames_published);
    }

    /// Capture the lit target and replace the homography. On failure the
    /// request stays pending and the next cycle tries again.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "info", skip_all))]
    fn calibrate(&mut self, settings: &Settings) {
        let stats = &self.shared.stats;
        let gate = self.shared.gate.enter();
        if !gate.wait_target_shown(settings.timing.wait_timeout()) {
            debug!("calibration target not on screen yet");
            return;
        }

        let captured = match self.camera.grab() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("grab for calibration failed: {e}");
                RunStats::bump(&stats.grab_failures);
                return;
            }
        };
        RunStats::bump(&stats.frames_grabbed);

        let result = locate_target(&captured.intensity, &settings.calibration.target).and_then(
            |target| {
                calibrate_detailed(&target, settings.projector_size(), &settings.calibration)
                    .map(|cal| (target, cal))
            },
        );
        match result {
            Ok((target, cal)) => {
                *self.shared.homography.write() = cal.homography;
                let roi = target.to_gray_image();
                if let Err(e) = self.camera.set_region_of_interest(&roi) {
                    warn!("camera rejected region of interest: {e}");
                }
                self.artifacts.write_roi(&roi);
                self.artifacts.write_calibration(&cal);
                self.aggregator.clear();
                self.shared.flags.clear_calibration();
                RunStats::bump(&stats.calibrations);
                info!("calibration done, target area {}", target.area);
            }
            Err(e) => {
                warn!("calibration failed, retrying: {e}");
                RunStats::bump(&stats.calibration_failures);
            }
        }
    }
}

struct Consumer<'a> {
    shared: &'a Shared,
    display: &'a mut dyn Display,
    tick: u64,
}

impl<'a> Consumer<'a> {
    fn new(shared: &'a Shared, display: &'a mut dyn Display) -> Self {
        Self {
            shared,
            display,
            tick: 0,
        }
    }

    fn run(mut self) {
        let shared = self.shared;
        let flags = &shared.flags;
        let _stop = StopOnExit(flags);
        while flags.is_running() {
            let timeout = self.shared.settings.snapshot().timing.wait_timeout();
            if !self.shared.settings.wait_available(timeout) {
                continue;
            }
            let settings = self.shared.settings.snapshot();
            self.show_frame(&settings);

            if let Some(key) = self.display.poll_key(settings.timing.key_poll()) {
                self.handle_key(key);
            }
            if flags.is_paused() {
                self.pause_loop(&settings);
            }
        }
        debug!("consumer finished");
    }

    fn show_frame(&mut self, settings: &Settings) {
        let shared = self.shared;
        let gate = &shared.gate;
        let flags = &shared.flags;
        let calibrating = gate.is_active() || flags.calibration_requested();
        let frame = if calibrating {
            calibration_target(&settings.projector)
        } else {
            let latest = self.shared.frames.latest();
            render_frame(flags.mode(), latest.as_deref(), &settings.projector, self.tick)
        };
        match self.display.show(&frame) {
            Ok(()) => {
                RunStats::bump(&self.shared.stats.frames_rendered);
                if calibrating {
                    gate.mark_target_shown();
                }
            }
            Err(e) => warn!("display failed: {e}"),
        }
        self.tick = self.tick.wrapping_add(1);
    }

    fn handle_key(&mut self, key: char) {
        let Some(cmd) = Command::from_key(key) else {
            debug!("ignored key {key:?}");
            return;
        };
        debug!("key {key:?} -> {cmd:?}");
        let flags = &self.shared.flags;
        if flags.apply(cmd) {
            match cmd {
                Command::NextMode | Command::SetMode(_) => info!("render mode {:?}", flags.mode()),
                Command::PrevSetting | Command::NextSetting => {
                    info!("adjusting {}", flags.selected_setting().name())
                }
                Command::Calibrate => info!("calibration requested"),
                _ => {}
            }
            return;
        }
        if let Command::Adjust(steps) = cmd {
            let setting = flags.selected_setting();
            let value = self
                .shared
                .settings
                .update(|s| setting.nudge(&mut s.segmentation, steps));
            info!("{} = {value}", setting.name());
        }
    }

    /// Input-only loop while paused; a step shows exactly one more frame.
    fn pause_loop(&mut self, settings: &Settings) {
        info!("paused");
        let shared = self.shared;
        let flags = &shared.flags;
        while flags.is_running() && flags.is_paused() {
            let Some(key) = self.display.wait_key() else {
                continue;
            };
            if Command::from_key(key) == Some(Command::Step) {
                self.show_frame(settings);
            } else {
                self.handle_key(key);
            }
        }
        if flags.is_running() {
            info!("resumed");
        }
    }
}
