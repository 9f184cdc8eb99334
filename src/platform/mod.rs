//! Platform abstraction layer
//!
//! The simulation core never talks to a window, a mixer or an OS event
//! queue directly. Instead every screen receives a [`Context`] bundling
//! trait objects for:
//! - Rendering (image blits, text, screenshots)
//! - Audio (named cues, background music pause state)
//! - Time (frame pacing)
//! - Input (drained event batches)
//!
//! Headless implementations live here too; they drive the binary and the
//! integration tests without any windowing stack.

use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::time::Duration;

use glam::Vec2;

/// A key the game cares about. Anything else is dropped at the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Space,
    Escape,
    P,
    S,
    PrintScreen,
}

/// An input event delivered to the active screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Window close request or equivalent.
    Quit,
    KeyDown(Key),
}

/// Drawing backend. Image ids are opaque strings resolved by the
/// implementation's own cache.
pub trait Renderer {
    /// Screen size in pixels.
    fn size(&self) -> Vec2;
    /// Clear the whole frame to a solid color.
    fn fill(&mut self, color: [u8; 3]);
    /// Fill an axis-aligned rectangle.
    fn fill_rect(&mut self, top_left: Vec2, size: Vec2, color: [u8; 3]);
    /// Draw an image with its top-left corner at `top_left`.
    fn blit(&mut self, image: &str, top_left: Vec2);
    /// Draw a line of text with its top-left corner at `position`.
    fn draw_text(&mut self, text: &str, position: Vec2);
    /// Finish the current frame.
    fn present(&mut self);
    /// Dump the current frame to a file.
    fn screenshot(&mut self, path: &Path) -> io::Result<()>;
}

/// Sound backend. Cues are the names from the sound table; music is a
/// single looping background track.
pub trait Audio {
    fn play(&mut self, cue: &str);
    fn pause_music(&mut self);
    fn unpause_music(&mut self);
}

/// Frame pacing. `tick` sleeps as needed to hold the target frame rate and
/// returns the wall time elapsed since the previous tick.
pub trait Clock {
    fn tick(&mut self, fps: u32) -> Duration;
}

/// Source of input events. `drain` returns everything queued since the last
/// call, oldest first.
pub trait InputSource {
    fn drain(&mut self) -> Vec<Event>;
}

/// Everything a screen needs from the outside world, plus the global
/// sound/music switches.
pub struct Context {
    pub renderer: Box<dyn Renderer>,
    pub audio: Box<dyn Audio>,
    pub clock: Box<dyn Clock>,
    pub input: Box<dyn InputSource>,
    pub fps: u32,
    pub sound_enabled: bool,
    pub music_enabled: bool,
}

impl Context {
    /// Play a named cue, honoring the global sound switch.
    pub fn play_sound(&mut self, cue: &str) {
        if self.sound_enabled {
            self.audio.play(cue);
        }
    }

    /// Pause or resume background music, honoring the global music switch.
    pub fn set_music_paused(&mut self, paused: bool) {
        if !self.music_enabled {
            return;
        }
        if paused {
            self.audio.pause_music();
        } else {
            self.audio.unpause_music();
        }
    }
}

/// One recorded draw call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Fill([u8; 3]),
    FillRect(Vec2, Vec2, [u8; 3]),
    Blit(String, Vec2),
    Text(String, Vec2),
}

/// Renderer that records draw calls instead of drawing. Used by the
/// headless binary and by tests asserting on what a screen drew.
pub struct HeadlessRenderer {
    size: Vec2,
    pub ops: Vec<DrawOp>,
    pub frames_presented: u32,
}

impl HeadlessRenderer {
    pub fn new(size: Vec2) -> Self {
        Self {
            size,
            ops: Vec::new(),
            frames_presented: 0,
        }
    }
}

impl Renderer for HeadlessRenderer {
    fn size(&self) -> Vec2 {
        self.size
    }

    fn fill(&mut self, color: [u8; 3]) {
        self.ops.push(DrawOp::Fill(color));
    }

    fn fill_rect(&mut self, top_left: Vec2, size: Vec2, color: [u8; 3]) {
        self.ops.push(DrawOp::FillRect(top_left, size, color));
    }

    fn blit(&mut self, image: &str, top_left: Vec2) {
        self.ops.push(DrawOp::Blit(image.to_string(), top_left));
    }

    fn draw_text(&mut self, text: &str, position: Vec2) {
        self.ops.push(DrawOp::Text(text.to_string(), position));
    }

    fn present(&mut self) {
        self.frames_presented += 1;
        self.ops.clear();
    }

    fn screenshot(&mut self, path: &Path) -> io::Result<()> {
        let mut dump = String::new();
        for op in &self.ops {
            dump.push_str(&format!("{op:?}\n"));
        }
        std::fs::write(path, dump)
    }
}

/// Audio backend that records played cues and the music pause state.
#[derive(Default)]
pub struct RecordingAudio {
    pub played: Vec<String>,
    pub music_paused: bool,
}

impl Audio for RecordingAudio {
    fn play(&mut self, cue: &str) {
        self.played.push(cue.to_string());
    }

    fn pause_music(&mut self) {
        self.music_paused = true;
    }

    fn unpause_music(&mut self) {
        self.music_paused = false;
    }
}

/// Clock that never sleeps and reports a fixed frame time. Keeps headless
/// runs deterministic.
pub struct FixedClock {
    step: Duration,
}

impl FixedClock {
    /// A clock stepping at exactly the nominal frame time of `fps`.
    pub fn with_fps(fps: u32) -> Self {
        Self {
            step: Duration::from_secs_f64(1.0 / f64::from(fps.max(1))),
        }
    }
}

impl Clock for FixedClock {
    fn tick(&mut self, _fps: u32) -> Duration {
        self.step
    }
}

/// Input source replaying a pre-recorded script, one event batch per frame.
/// Once the script runs out it yields empty batches.
pub struct ScriptedInput {
    batches: VecDeque<Vec<Event>>,
}

impl ScriptedInput {
    pub fn new(batches: Vec<Vec<Event>>) -> Self {
        Self {
            batches: batches.into(),
        }
    }

    /// A script that stays idle for `frames` frames, then requests quit.
    pub fn idle_then_quit(frames: usize) -> Self {
        let mut batches = vec![Vec::new(); frames];
        batches.push(vec![Event::Quit]);
        Self::new(batches)
    }
}

impl InputSource for ScriptedInput {
    fn drain(&mut self) -> Vec<Event> {
        self.batches.pop_front().unwrap_or_default()
    }
}

/// A fully headless context with the standard deterministic collaborators.
pub fn headless_context(size: Vec2, fps: u32, input: ScriptedInput) -> Context {
    Context {
        renderer: Box::new(HeadlessRenderer::new(size)),
        audio: Box::new(RecordingAudio::default()),
        clock: Box::new(FixedClock::with_fps(fps)),
        input: Box::new(input),
        fps,
        sound_enabled: true,
        music_enabled: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_input_replays_in_order() {
        let mut input = ScriptedInput::new(vec![
            vec![Event::KeyDown(Key::Space)],
            vec![],
            vec![Event::Quit],
        ]);
        assert_eq!(input.drain(), vec![Event::KeyDown(Key::Space)]);
        assert_eq!(input.drain(), vec![]);
        assert_eq!(input.drain(), vec![Event::Quit]);
        // exhausted scripts stay quiet
        assert_eq!(input.drain(), vec![]);
    }

    #[test]
    fn test_fixed_clock_reports_nominal_frame_time() {
        let mut clock = FixedClock::with_fps(60);
        let dt = clock.tick(60);
        assert!((dt.as_secs_f32() - 1.0 / 60.0).abs() < 1e-6);
    }

    use std::cell::RefCell;
    use std::rc::Rc;

    /// Recorder that stays inspectable after being boxed into a context.
    struct SharedAudio(Rc<RefCell<RecordingAudio>>);

    impl Audio for SharedAudio {
        fn play(&mut self, cue: &str) {
            self.0.borrow_mut().play(cue);
        }

        fn pause_music(&mut self) {
            self.0.borrow_mut().pause_music();
        }

        fn unpause_music(&mut self) {
            self.0.borrow_mut().unpause_music();
        }
    }

    #[test]
    fn test_context_sound_switch_mutes_cues() {
        let recorder = Rc::new(RefCell::new(RecordingAudio::default()));
        let mut ctx = headless_context(Vec2::new(100.0, 100.0), 60, ScriptedInput::new(vec![]));
        ctx.audio = Box::new(SharedAudio(Rc::clone(&recorder)));

        ctx.play_sound("click");
        ctx.sound_enabled = false;
        ctx.play_sound("click");
        assert_eq!(recorder.borrow().played, vec!["click".to_string()]);
    }

    #[test]
    fn test_context_music_switch_blocks_pausing() {
        let recorder = Rc::new(RefCell::new(RecordingAudio::default()));
        let mut ctx = headless_context(Vec2::new(100.0, 100.0), 60, ScriptedInput::new(vec![]));
        ctx.audio = Box::new(SharedAudio(Rc::clone(&recorder)));

        ctx.music_enabled = false;
        ctx.set_music_paused(true);
        assert!(!recorder.borrow().music_paused);

        ctx.music_enabled = true;
        ctx.set_music_paused(true);
        assert!(recorder.borrow().music_paused);
    }

    #[test]
    fn test_recording_audio_tracks_music_state() {
        let mut audio = RecordingAudio::default();
        audio.pause_music();
        assert!(audio.music_paused);
        audio.unpause_music();
        assert!(!audio.music_paused);
    }
}
