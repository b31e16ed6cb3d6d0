//! State shared between the producer and consumer threads.

use crate::{ControlFlags, Settings, SettingsError, SettingsSource};
use depthcast_core::{GrayImage, Homography};
use depthcast_segment::RegionList;
use parking_lot::{Condvar, Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Current settings plus the "being replaced" condition.
///
/// A reload marks the slot unavailable, reads the source without holding
/// the lock, then swaps the new value in and wakes waiters. A failed reload
/// keeps the previous settings.
#[derive(Debug)]
pub struct SettingsSlot {
    settings: Mutex<Settings>,
    unavailable: AtomicBool,
    ready: Condvar,
}

impl SettingsSlot {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(settings),
            unavailable: AtomicBool::new(false),
            ready: Condvar::new(),
        }
    }

    pub fn snapshot(&self) -> Settings {
        self.settings.lock().clone()
    }

    pub fn is_available(&self) -> bool {
        !self.unavailable.load(Ordering::Acquire)
    }

    /// Mutate the settings in place and return the closure's result.
    pub fn update<R>(&self, f: impl FnOnce(&mut Settings) -> R) -> R {
        f(&mut *self.settings.lock())
    }

    /// Replace the settings from `source`.
    pub fn reload(&self, source: &dyn SettingsSource) -> Result<Settings, SettingsError> {
        {
            let _guard = self.settings.lock();
            self.unavailable.store(true, Ordering::Release);
        }
        let loaded = source.load();

        let mut guard = self.settings.lock();
        if let Ok(new) = &loaded {
            *guard = new.clone();
        }
        self.unavailable.store(false, Ordering::Release);
        drop(guard);
        self.ready.notify_all();
        loaded
    }

    /// Block until the settings are available or `timeout` elapses.
    /// Returns whether they are available.
    pub fn wait_available(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.settings.lock();
        while self.unavailable.load(Ordering::Acquire) {
            if self.ready.wait_until(&mut guard, deadline).timed_out() {
                return self.is_available();
            }
        }
        true
    }
}

/// Held by the producer while it captures the calibration target.
///
/// While the gate is active the consumer shows the full-white target frame
/// and reports each one it has put on screen, so the producer only grabs
/// once the target is really being projected.
#[derive(Debug, Default)]
pub struct CalibrationGate {
    shown: Mutex<u64>,
    active: AtomicBool,
    target_shown: Condvar,
}

/// Keeps a [`CalibrationGate`] active until dropped.
#[must_use]
pub struct GateGuard<'a> {
    gate: &'a CalibrationGate,
    entered_at: u64,
}

impl CalibrationGate {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn enter(&self) -> GateGuard<'_> {
        let shown = self.shown.lock();
        self.active.store(true, Ordering::Release);
        GateGuard {
            gate: self,
            entered_at: *shown,
        }
    }

    /// Called by the consumer after a target frame has been displayed.
    pub fn mark_target_shown(&self) {
        let mut shown = self.shown.lock();
        *shown += 1;
        drop(shown);
        self.target_shown.notify_all();
    }
}

impl GateGuard<'_> {
    /// Wait until a target frame has been shown since the gate was entered.
    pub fn wait_target_shown(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut shown = self.gate.shown.lock();
        while *shown <= self.entered_at {
            if self
                .gate
                .target_shown
                .wait_until(&mut shown, deadline)
                .timed_out()
            {
                return *shown > self.entered_at;
            }
        }
        true
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.active.store(false, Ordering::Release);
    }
}

/// One processed depth frame in projector space.
#[derive(Clone, Debug)]
pub struct ProcessedFrame {
    /// Assigned by [`FrameSlot::publish`], starting at 1.
    pub version: u64,
    /// Cleaned depth warped into projector coordinates.
    pub depth: GrayImage,
    /// Empty when processing is switched off.
    pub regions: RegionList,
    /// Homography the frame was warped with.
    pub homography: Homography,
}

/// Latest published frame. Readers get an `Arc` and never block the
/// producer for longer than a pointer swap.
#[derive(Debug, Default)]
pub struct FrameSlot {
    latest: Mutex<Option<Arc<ProcessedFrame>>>,
    version: AtomicU64,
}

impl FrameSlot {
    pub fn publish(&self, mut frame: ProcessedFrame) -> u64 {
        let mut latest = self.latest.lock();
        let version = self.version.load(Ordering::Relaxed) + 1;
        frame.version = version;
        *latest = Some(Arc::new(frame));
        self.version.store(version, Ordering::Release);
        version
    }

    pub fn latest(&self) -> Option<Arc<ProcessedFrame>> {
        self.latest.lock().clone()
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }
}

/// Counters updated by both threads.
#[derive(Debug, Default)]
pub struct RunStats {
    pub frames_grabbed: AtomicU64,
    pub grab_failures: AtomicU64,
    pub frames_published: AtomicU64,
    pub frames_rendered: AtomicU64,
    pub calibrations: AtomicU64,
    pub calibration_failures: AtomicU64,
    pub settings_reloads: AtomicU64,
    pub reload_failures: AtomicU64,
    pub camera_restarts: AtomicU64,
}

impl RunStats {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            frames_grabbed: get(&self.frames_grabbed),
            grab_failures: get(&self.grab_failures),
            frames_published: get(&self.frames_published),
            frames_rendered: get(&self.frames_rendered),
            calibrations: get(&self.calibrations),
            calibration_failures: get(&self.calibration_failures),
            settings_reloads: get(&self.settings_reloads),
            reload_failures: get(&self.reload_failures),
            camera_restarts: get(&self.camera_restarts),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub frames_grabbed: u64,
    pub grab_failures: u64,
    pub frames_published: u64,
    pub frames_rendered: u64,
    pub calibrations: u64,
    pub calibration_failures: u64,
    pub settings_reloads: u64,
    pub reload_failures: u64,
    pub camera_restarts: u64,
}

/// Everything both threads see.
#[derive(Debug)]
pub struct Shared {
    pub flags: ControlFlags,
    pub settings: SettingsSlot,
    pub gate: CalibrationGate,
    pub frames: FrameSlot,
    /// Camera-to-projector mapping; written only by a successful calibration.
    pub homography: RwLock<Homography>,
    pub stats: RunStats,
}

impl Shared {
    pub fn new(settings: Settings, flags: ControlFlags) -> Self {
        Self {
            flags,
            settings: SettingsSlot::new(settings),
            gate: CalibrationGate::default(),
            frames: FrameSlot::default(),
            homography: RwLock::new(Homography::identity()),
            stats: RunStats::default(),
        }
    }
}
