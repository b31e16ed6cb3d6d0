//! Output window boundary and its headless implementations.

use crate::DisplayError;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use depthcast_core::GrayImage;
use image::RgbImage;
use log::{info, warn};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Where projector frames go and key presses come from.
pub trait Display: Send {
    fn show(&mut self, frame: &RgbImage) -> Result<(), DisplayError>;

    /// Next key press, waiting at most `timeout`.
    fn poll_key(&mut self, timeout: Duration) -> Option<char>;

    /// Block until a key arrives or the display has no more input.
    fn wait_key(&mut self) -> Option<char> {
        self.poll_key(Duration::from_millis(100))
    }
}

/// No window: keys come from stdin, and every `preview_every`-th frame is
/// written as a PNG when a preview path is set.
pub struct HeadlessDisplay {
    keys: Receiver<char>,
    preview: Option<PathBuf>,
    preview_every: u64,
    shown: u64,
}

impl HeadlessDisplay {
    /// Reads keys from stdin on a background thread. Each character of an
    /// entered line is one key press; end of input quits.
    pub fn stdin() -> Result<Self, DisplayError> {
        Self::from_reader(std::io::stdin())
    }

    /// Like [`HeadlessDisplay::stdin`], for any line-oriented input.
    pub fn from_reader(input: impl Read + Send + 'static) -> Result<Self, DisplayError> {
        let (tx, rx) = crossbeam_channel::unbounded();
        std::thread::Builder::new()
            .name("stdin-keys".into())
            .spawn(move || {
                for line in BufReader::new(input).lines() {
                    let Ok(line) = line else {
                        break;
                    };
                    for c in line.chars() {
                        if tx.send(c).is_err() {
                            return;
                        }
                    }
                }
                info!("key input ended, quitting");
                let _ = tx.send('q');
            })?;
        Ok(Self::from_channel(rx))
    }

    pub fn from_channel(keys: Receiver<char>) -> Self {
        Self {
            keys,
            preview: None,
            preview_every: 1,
            shown: 0,
        }
    }

    pub fn with_preview(mut self, path: impl Into<PathBuf>, every: u64) -> Self {
        self.preview = Some(path.into());
        self.preview_every = every.max(1);
        self
    }

    pub fn frames_shown(&self) -> u64 {
        self.shown
    }
}

impl Display for HeadlessDisplay {
    fn show(&mut self, frame: &RgbImage) -> Result<(), DisplayError> {
        self.shown += 1;
        if let Some(path) = &self.preview {
            if (self.shown - 1) % self.preview_every == 0 {
                frame.save(path)?;
            }
        }
        Ok(())
    }

    fn poll_key(&mut self, timeout: Duration) -> Option<char> {
        match self.keys.recv_timeout(timeout) {
            Ok(c) => Some(c),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                // Avoid spinning once input is gone.
                std::thread::sleep(timeout);
                None
            }
        }
    }
}

/// What a [`ScriptedDisplay`] has been shown.
#[derive(Debug, Default)]
pub struct DisplayLog {
    pub frames: u64,
    /// Frames that were entirely white.
    pub white_frames: u64,
    pub last: Option<RgbImage>,
    /// Keys handed out so far.
    pub keys_sent: Vec<char>,
}

impl DisplayLog {
    /// Last frame reduced to its red channel, handy for comparisons.
    pub fn last_gray(&self) -> Option<GrayImage> {
        let last = self.last.as_ref()?;
        GrayImage::from_raw(
            last.width() as usize,
            last.height() as usize,
            last.pixels().map(|p| p.0[0]).collect(),
        )
        .ok()
    }
}

/// Plays a fixed key script. A key is released once at least `after_frames`
/// frames have been shown; optionally quits when the script runs out.
pub struct ScriptedDisplay {
    script: VecDeque<(u64, char)>,
    quit_when_done: bool,
    log: Arc<Mutex<DisplayLog>>,
}

impl ScriptedDisplay {
    /// `script` holds `(after_frames, key)` pairs in order.
    pub fn new(script: impl IntoIterator<Item = (u64, char)>) -> Self {
        Self {
            script: script.into_iter().collect(),
            quit_when_done: false,
            log: Arc::new(Mutex::new(DisplayLog::default())),
        }
    }

    pub fn quit_when_done(mut self) -> Self {
        self.quit_when_done = true;
        self
    }

    pub fn log(&self) -> Arc<Mutex<DisplayLog>> {
        Arc::clone(&self.log)
    }
}

impl Display for ScriptedDisplay {
    fn show(&mut self, frame: &RgbImage) -> Result<(), DisplayError> {
        let mut log = self.log.lock();
        log.frames += 1;
        if frame.pixels().all(|p| p.0 == [255, 255, 255]) {
            log.white_frames += 1;
        }
        log.last = Some(frame.clone());
        Ok(())
    }

    fn poll_key(&mut self, timeout: Duration) -> Option<char> {
        let shown = self.log.lock().frames;
        let key = match self.script.front().copied() {
            Some((after, key)) if shown >= after => {
                self.script.pop_front();
                Some(key)
            }
            Some(_) => None,
            None if self.quit_when_done => Some('q'),
            None => None,
        };
        match key {
            Some(k) => self.log.lock().keys_sent.push(k),
            None => std::thread::sleep(timeout),
        }
        key
    }

    /// While paused no frames are shown, so pending keys are released
    /// regardless of their frame count.
    fn wait_key(&mut self) -> Option<char> {
        if let Some((_, key)) = self.script.pop_front() {
            self.log.lock().keys_sent.push(key);
            return Some(key);
        }
        if self.quit_when_done {
            return Some('q');
        }
        warn!("scripted display has no keys left while waiting");
        std::thread::sleep(Duration::from_millis(10));
        None
    }
}
