//! Depth camera boundary and the cameras shipped with the crate.

use crate::{artifacts, CameraError, CameraSettings};
use depthcast_core::{DepthFrame, GrayImage};
use log::{debug, info};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// One grab: the depth map plus the intensity image used for calibration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturedFrame {
    pub depth: DepthFrame,
    pub intensity: GrayImage,
}

/// A stereo/depth camera as seen by the pipeline.
pub trait DepthCamera: Send {
    fn open(&mut self, settings: &CameraSettings) -> Result<(), CameraError>;

    fn grab(&mut self) -> Result<CapturedFrame, CameraError>;

    /// Apply runtime-tunable settings without reopening.
    fn apply_settings(&mut self, settings: &CameraSettings) -> Result<(), CameraError>;

    fn restart(&mut self, settings: &CameraSettings) -> Result<(), CameraError> {
        self.close();
        self.open(settings)
    }

    /// Restrict depth computation to the non-zero pixels of `roi`.
    fn set_region_of_interest(&mut self, roi: &GrayImage) -> Result<(), CameraError>;

    fn close(&mut self);
}

/// Bitwise AND over the last `window` depth frames.
///
/// A pixel survives only when it is lit in every frame of the window, which
/// suppresses flicker along object edges.
#[derive(Clone, Debug)]
pub struct FrameAggregator {
    window: usize,
    frames: VecDeque<DepthFrame>,
}

impl FrameAggregator {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            frames: VecDeque::new(),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn set_window(&mut self, window: usize) {
        let window = window.max(1);
        if window != self.window {
            self.window = window;
            self.frames.clear();
        }
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Add a frame; returns the combined frame once the window is full.
    pub fn push(&mut self, frame: DepthFrame) -> Option<DepthFrame> {
        if self
            .frames
            .front()
            .is_some_and(|f| (f.width, f.height) != (frame.width, frame.height))
        {
            self.frames.clear();
        }
        self.frames.push_back(frame);
        while self.frames.len() > self.window {
            self.frames.pop_front();
        }
        if self.frames.len() < self.window {
            return None;
        }
        let mut frames = self.frames.iter();
        let mut out = frames.next()?.clone();
        for f in frames {
            for (o, v) in out.data.iter_mut().zip(&f.data) {
                *o &= *v;
            }
        }
        Some(out)
    }
}

fn apply_roi(frame: &mut GrayImage, roi: Option<&GrayImage>) {
    let Some(roi) = roi else {
        return;
    };
    if (roi.width, roi.height) != (frame.width, frame.height) {
        return;
    }
    for (v, m) in frame.data.iter_mut().zip(&roi.data) {
        if *m == 0 {
            *v = 0;
        }
    }
}

fn check_roi(roi: &GrayImage, size: (usize, usize)) -> Result<(), CameraError> {
    if (roi.width, roi.height) != size {
        return Err(CameraError::SizeMismatch {
            path: PathBuf::from("<roi>"),
            expected: size,
            got: (roi.width, roi.height),
        });
    }
    Ok(())
}

/// Plays back recorded 8-bit depth PNGs in a loop.
#[derive(Debug)]
pub struct ReplayCamera {
    depth_paths: Vec<PathBuf>,
    intensity_path: Option<PathBuf>,
    frames: Vec<DepthFrame>,
    intensity: Option<GrayImage>,
    cursor: usize,
    roi: Option<GrayImage>,
    opened: bool,
}

impl ReplayCamera {
    /// `source` is a single PNG or a directory of PNGs played in name order.
    pub fn new(source: impl AsRef<Path>) -> Result<Self, CameraError> {
        let source = source.as_ref();
        let depth_paths = if source.is_dir() {
            let mut paths: Vec<PathBuf> = std::fs::read_dir(source)?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| {
                    p.extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
                })
                .collect();
            paths.sort();
            paths
        } else {
            vec![source.to_path_buf()]
        };
        if depth_paths.is_empty() {
            return Err(CameraError::NoFrames(source.to_path_buf()));
        }
        Ok(Self {
            depth_paths,
            intensity_path: None,
            frames: Vec::new(),
            intensity: None,
            cursor: 0,
            roi: None,
            opened: false,
        })
    }

    /// Intensity image returned with every frame. Without one, the depth
    /// frame doubles as intensity.
    pub fn with_intensity(mut self, path: impl Into<PathBuf>) -> Self {
        self.intensity_path = Some(path.into());
        self
    }

    pub fn frame_count(&self) -> usize {
        self.depth_paths.len()
    }
}

impl DepthCamera for ReplayCamera {
    fn open(&mut self, _settings: &CameraSettings) -> Result<(), CameraError> {
        let mut frames: Vec<DepthFrame> = Vec::with_capacity(self.depth_paths.len());
        for path in &self.depth_paths {
            let frame = artifacts::load_gray_png(path)?;
            if let Some(first) = frames.first() {
                if (frame.width, frame.height) != (first.width, first.height) {
                    return Err(CameraError::SizeMismatch {
                        path: path.clone(),
                        expected: (first.width, first.height),
                        got: (frame.width, frame.height),
                    });
                }
            }
            frames.push(frame);
        }
        self.intensity = match &self.intensity_path {
            Some(path) => Some(artifacts::load_gray_png(path)?),
            None => None,
        };
        info!("replay camera opened with {} frames", frames.len());
        self.frames = frames;
        self.cursor = 0;
        self.opened = true;
        Ok(())
    }

    fn grab(&mut self) -> Result<CapturedFrame, CameraError> {
        if !self.opened || self.frames.is_empty() {
            return Err(CameraError::NotOpen);
        }
        let mut depth = self.frames[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.frames.len();
        let intensity = self.intensity.clone().unwrap_or_else(|| depth.clone());
        apply_roi(&mut depth, self.roi.as_ref());
        Ok(CapturedFrame { depth, intensity })
    }

    fn apply_settings(&mut self, _settings: &CameraSettings) -> Result<(), CameraError> {
        Ok(())
    }

    fn set_region_of_interest(&mut self, roi: &GrayImage) -> Result<(), CameraError> {
        if let Some(first) = self.frames.first() {
            check_roi(roi, (first.width, first.height))?;
        }
        self.roi = Some(roi.clone());
        Ok(())
    }

    fn close(&mut self) {
        if self.opened {
            debug!("replay camera closed");
        }
        self.opened = false;
        self.frames.clear();
    }
}

/// Observable state of a [`SyntheticCamera`], shared with the caller.
#[derive(Debug, Default)]
pub struct CameraProbe {
    pub opened: AtomicBool,
    pub closed: AtomicBool,
    pub grabs: AtomicU64,
    pub restarts: AtomicU64,
    pub roi_set: AtomicBool,
}

/// In-memory camera returning a fixed scene.
#[derive(Debug)]
pub struct SyntheticCamera {
    depth: DepthFrame,
    intensity: GrayImage,
    fail_every: Option<u64>,
    fail_restart: bool,
    roi: Option<GrayImage>,
    opened: bool,
    probe: Arc<CameraProbe>,
}

impl SyntheticCamera {
    pub fn new(depth: DepthFrame, intensity: GrayImage) -> Self {
        Self {
            depth,
            intensity,
            fail_every: None,
            fail_restart: false,
            roi: None,
            opened: false,
            probe: Arc::new(CameraProbe::default()),
        }
    }

    /// Every `n`-th grab (1-based) fails.
    pub fn failing_every(mut self, n: u64) -> Self {
        self.fail_every = Some(n.max(1));
        self
    }

    pub fn failing_restart(mut self) -> Self {
        self.fail_restart = true;
        self
    }

    pub fn probe(&self) -> Arc<CameraProbe> {
        Arc::clone(&self.probe)
    }
}

impl DepthCamera for SyntheticCamera {
    fn open(&mut self, _settings: &CameraSettings) -> Result<(), CameraError> {
        self.opened = true;
        self.probe.opened.store(true, Ordering::Release);
        self.probe.closed.store(false, Ordering::Release);
        Ok(())
    }

    fn grab(&mut self) -> Result<CapturedFrame, CameraError> {
        if !self.opened {
            return Err(CameraError::NotOpen);
        }
        let n = self.probe.grabs.fetch_add(1, Ordering::AcqRel) + 1;
        if self.fail_every.is_some_and(|every| n % every == 0) {
            return Err(CameraError::Grab(format!("synthetic failure on grab {n}")));
        }
        let mut depth = self.depth.clone();
        apply_roi(&mut depth, self.roi.as_ref());
        Ok(CapturedFrame {
            depth,
            intensity: self.intensity.clone(),
        })
    }

    fn apply_settings(&mut self, _settings: &CameraSettings) -> Result<(), CameraError> {
        Ok(())
    }

    fn restart(&mut self, settings: &CameraSettings) -> Result<(), CameraError> {
        self.probe.restarts.fetch_add(1, Ordering::AcqRel);
        self.close();
        if self.fail_restart {
            return Err(CameraError::Open("synthetic restart failure".into()));
        }
        self.open(settings)
    }

    fn set_region_of_interest(&mut self, roi: &GrayImage) -> Result<(), CameraError> {
        check_roi(roi, (self.depth.width, self.depth.height))?;
        self.roi = Some(roi.clone());
        self.probe.roi_set.store(true, Ordering::Release);
        Ok(())
    }

    fn close(&mut self) {
        self.opened = false;
        self.probe.closed.store(true, Ordering::Release);
    }
}
