//! Keyboard commands and the flags they flip.
//!
//! Every flag is its own atomic: the consumer thread writes them from key
//! presses and the producer thread reads them once per cycle. No flag
//! guards other data.

use crate::AdjustableSetting;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

/// What the consumer projects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    #[default]
    Blank,
    Solid,
    TestPattern,
    Depth,
    Regions,
    Patterns,
}

impl RenderMode {
    pub const ALL: [RenderMode; 6] = [
        Self::Blank,
        Self::Solid,
        Self::TestPattern,
        Self::Depth,
        Self::Regions,
        Self::Patterns,
    ];

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() as usize + 1) % Self::ALL.len()]
    }
}

/// A decoded key press.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Quit,
    TogglePause,
    /// Pause when running; show one more frame when paused.
    Step,
    Calibrate,
    ToggleGrab,
    ToggleProcess,
    ReloadSettings,
    RestartCamera,
    NextMode,
    SetMode(RenderMode),
    PrevSetting,
    NextSetting,
    Adjust(i32),
}

impl Command {
    pub fn from_key(key: char) -> Option<Self> {
        let cmd = match key {
            'q' | 'Q' | '\u{1b}' => Self::Quit,
            'p' | 'P' => Self::TogglePause,
            ' ' => Self::Step,
            'c' | 'C' => Self::Calibrate,
            'g' | 'G' => Self::ToggleGrab,
            'h' | 'H' => Self::ToggleProcess,
            'l' | 'L' => Self::ReloadSettings,
            'r' | 'R' => Self::RestartCamera,
            'm' | 'M' => Self::NextMode,
            '[' => Self::PrevSetting,
            ']' => Self::NextSetting,
            '+' | '=' => Self::Adjust(1),
            '-' | '_' => Self::Adjust(-1),
            d @ '0'..='9' => {
                let index = d.to_digit(10)? as u8;
                Self::SetMode(RenderMode::from_index(index)?)
            }
            _ => return None,
        };
        Some(cmd)
    }
}

/// Shared run-state flags.
#[derive(Debug)]
pub struct ControlFlags {
    running: AtomicBool,
    paused: AtomicBool,
    grab: AtomicBool,
    process: AtomicBool,
    calibrate: AtomicBool,
    reload_settings: AtomicBool,
    restart_camera: AtomicBool,
    mode: AtomicU8,
    selected_setting: AtomicUsize,
}

impl Default for ControlFlags {
    fn default() -> Self {
        Self::new(RenderMode::default())
    }
}

impl ControlFlags {
    pub fn new(mode: RenderMode) -> Self {
        Self {
            running: AtomicBool::new(true),
            paused: AtomicBool::new(false),
            grab: AtomicBool::new(true),
            process: AtomicBool::new(true),
            calibrate: AtomicBool::new(false),
            reload_settings: AtomicBool::new(false),
            restart_camera: AtomicBool::new(false),
            mode: AtomicU8::new(mode.index()),
            selected_setting: AtomicUsize::new(0),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Ask both loops to exit after their current iteration.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    pub fn grab_enabled(&self) -> bool {
        self.grab.load(Ordering::Relaxed)
    }

    pub fn processing_enabled(&self) -> bool {
        self.process.load(Ordering::Relaxed)
    }

    pub fn calibration_requested(&self) -> bool {
        self.calibrate.load(Ordering::Acquire)
    }

    pub fn request_calibration(&self) {
        self.calibrate.store(true, Ordering::Release);
    }

    pub fn clear_calibration(&self) {
        self.calibrate.store(false, Ordering::Release);
    }

    pub fn request_reload(&self) {
        self.reload_settings.store(true, Ordering::Release);
    }

    /// Consume a pending reload request.
    pub fn take_reload(&self) -> bool {
        self.reload_settings.swap(false, Ordering::AcqRel)
    }

    pub fn request_restart(&self) {
        self.restart_camera.store(true, Ordering::Release);
    }

    /// Consume a pending camera restart request.
    pub fn take_restart(&self) -> bool {
        self.restart_camera.swap(false, Ordering::AcqRel)
    }

    /// Current render mode; an out-of-range stored value reads as blank.
    pub fn mode(&self) -> RenderMode {
        RenderMode::from_index(self.mode.load(Ordering::Relaxed)).unwrap_or_default()
    }

    pub fn set_mode(&self, mode: RenderMode) {
        self.mode.store(mode.index(), Ordering::Relaxed);
    }

    pub fn selected_setting(&self) -> AdjustableSetting {
        AdjustableSetting::from_index(self.selected_setting.load(Ordering::Relaxed))
    }

    fn select_offset(&self, offset: isize) -> AdjustableSetting {
        let n = AdjustableSetting::ALL.len() as isize;
        let current = self.selected_setting().index() as isize;
        let next = (current + offset).rem_euclid(n) as usize;
        self.selected_setting.store(next, Ordering::Relaxed);
        AdjustableSetting::from_index(next)
    }

    /// Apply a flag command. Returns `false` for commands the flags alone
    /// cannot carry out (setting adjustments and single steps while paused).
    pub fn apply(&self, cmd: Command) -> bool {
        match cmd {
            Command::Quit => self.stop(),
            Command::TogglePause => {
                self.paused.fetch_xor(true, Ordering::Relaxed);
            }
            Command::Step => {
                if self.is_paused() {
                    return false;
                }
                self.set_paused(true);
            }
            Command::Calibrate => self.request_calibration(),
            Command::ToggleGrab => {
                self.grab.fetch_xor(true, Ordering::Relaxed);
            }
            Command::ToggleProcess => {
                self.process.fetch_xor(true, Ordering::Relaxed);
            }
            Command::ReloadSettings => self.request_reload(),
            Command::RestartCamera => self.request_restart(),
            Command::NextMode => self.set_mode(self.mode().next()),
            Command::SetMode(mode) => self.set_mode(mode),
            Command::PrevSetting => {
                self.select_offset(-1);
            }
            Command::NextSetting => {
                self.select_offset(1);
            }
            Command::Adjust(_) => return false,
        }
        true
    }
}
