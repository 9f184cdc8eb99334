//! Interactive screen state machine
//!
//! A [`Screen`] is anything that owns the display for a while: a running
//! level, a menu, a game-over card. Each screen declares which [`Status`]
//! values it may take and which of those mean "keep looping"; [`run`] drives
//! the draw/input/update cycle until the screen leaves its running set and
//! reports it is ready to hand the display back.

use std::collections::BTreeMap;
use std::path::Path;

use log::{info, warn};

use crate::platform::{Context, Event, Key};

/// Lifecycle state of a screen. Each screen accepts only a subset of these;
/// storing one outside the screen's declared set is a programming error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Waiting for `run` to start the frame loop.
    Prepared,
    Running,
    Paused,
    /// Exit the whole application.
    Terminate,
    /// Leave this screen, back to whatever invoked it.
    Quit,
    LevelCleared,
    LevelFailed,
    /// Persist the level state, then leave.
    LevelSave,
}

/// An input-triggered action a screen knows how to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ScreenAction {
    Screenshot,
    TogglePause,
    DropBomb,
    SaveAndQuit,
    QuitScreen,
}

/// Keyboard layout of a screen.
pub type KeyBindings = BTreeMap<Key, ScreenAction>;

/// One interactive screen.
///
/// Implementors store a [`Status`] and expose it via `status`/`store_status`;
/// all transitions go through [`Screen::set_status`], which enforces the
/// screen's declared status set. The default `handle_event` turns a window
/// quit into [`Status::Terminate`] and dispatches key presses through the
/// screen's bindings.
pub trait Screen {
    /// Every status this screen may take.
    fn valid_statuses(&self) -> &[Status];

    /// The statuses during which the frame loop keeps going.
    fn running_statuses(&self) -> &[Status];

    fn status(&self) -> Status;

    /// Raw status storage. Use [`Screen::set_status`] instead.
    fn store_status(&mut self, status: Status);

    /// Transition to `status`.
    ///
    /// # Panics
    /// If `status` is not in [`Screen::valid_statuses`]; such a transition
    /// is a bug in the caller, not a runtime condition.
    fn set_status(&mut self, status: Status) {
        assert!(
            self.valid_statuses().contains(&status),
            "status {status:?} is not valid for this screen"
        );
        self.store_status(status);
    }

    fn is_running(&self) -> bool {
        self.running_statuses().contains(&self.status())
    }

    /// Whether the screen has finished any end-of-life display and the loop
    /// may stop. Screens with a lingering final frame override this.
    fn ready_to_quit(&self) -> bool {
        true
    }

    fn bindings(&self) -> &KeyBindings;

    fn draw(&mut self, ctx: &mut Context);

    /// Advance the screen by `dt` seconds. Screens without simulation state
    /// ignore it.
    fn update_state(&mut self, _dt: f32, _ctx: &mut Context) {}

    fn perform(&mut self, action: ScreenAction, ctx: &mut Context);

    fn handle_event(&mut self, event: Event, ctx: &mut Context) {
        match event {
            Event::Quit => self.set_status(Status::Terminate),
            Event::KeyDown(key) => {
                let action = self.bindings().get(&key).copied();
                if let Some(action) = action {
                    self.perform(action, ctx);
                }
            }
        }
    }
}

/// Drive a screen's frame loop until it finishes, returning its final
/// status.
///
/// The loop continues while the screen is running, and after that while the
/// screen still wants its final display shown. Each iteration draws one
/// frame, paces to the target frame rate, feeds the screen all pending
/// input and advances its state.
pub fn run(screen: &mut dyn Screen, ctx: &mut Context) -> Status {
    screen.set_status(Status::Running);
    while screen.is_running() || !screen.ready_to_quit() {
        screen.draw(ctx);
        ctx.renderer.present();
        let dt = ctx.clock.tick(ctx.fps).as_secs_f32();
        for event in ctx.input.drain() {
            screen.handle_event(event, ctx);
        }
        screen.update_state(dt, ctx);
    }
    screen.status()
}

/// Save the current frame next to the binary. Failures are logged, never
/// fatal.
pub fn save_screenshot(ctx: &mut Context) {
    let path = Path::new("screenshot.png");
    match ctx.renderer.screenshot(path) {
        Ok(()) => info!("saved screenshot to {}", path.display()),
        Err(err) => warn!("could not save screenshot to {}: {err}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{headless_context, ScriptedInput};
    use glam::Vec2;

    /// Minimal screen: counts frames, quits itself after a fixed number,
    /// optionally lingers for a few extra frames.
    struct StubScreen {
        status: Status,
        bindings: KeyBindings,
        frames: u32,
        quit_after: u32,
        linger: u32,
        performed: Vec<ScreenAction>,
    }

    impl StubScreen {
        fn new(quit_after: u32, linger: u32) -> Self {
            Self {
                status: Status::Prepared,
                bindings: KeyBindings::from([
                    (Key::Escape, ScreenAction::QuitScreen),
                    (Key::Space, ScreenAction::DropBomb),
                ]),
                frames: 0,
                quit_after,
                linger,
                performed: Vec::new(),
            }
        }
    }

    impl Screen for StubScreen {
        fn valid_statuses(&self) -> &[Status] {
            &[Status::Prepared, Status::Running, Status::Terminate, Status::Quit]
        }

        fn running_statuses(&self) -> &[Status] {
            &[Status::Running]
        }

        fn status(&self) -> Status {
            self.status
        }

        fn store_status(&mut self, status: Status) {
            self.status = status;
        }

        fn ready_to_quit(&self) -> bool {
            self.linger == 0
        }

        fn bindings(&self) -> &KeyBindings {
            &self.bindings
        }

        fn draw(&mut self, _ctx: &mut Context) {
            self.frames += 1;
        }

        fn update_state(&mut self, _dt: f32, _ctx: &mut Context) {
            if self.is_running() {
                if self.frames >= self.quit_after {
                    self.set_status(Status::Quit);
                }
            } else if self.linger > 0 {
                self.linger -= 1;
            }
        }

        fn perform(&mut self, action: ScreenAction, _ctx: &mut Context) {
            self.performed.push(action);
            if action == ScreenAction::QuitScreen {
                self.set_status(Status::Quit);
            }
        }
    }

    fn ctx_with(input: ScriptedInput) -> Context {
        headless_context(Vec2::new(640.0, 480.0), 60, input)
    }

    #[test]
    fn test_run_loops_until_screen_quits() {
        let mut screen = StubScreen::new(5, 0);
        let mut ctx = ctx_with(ScriptedInput::new(vec![]));
        let status = run(&mut screen, &mut ctx);
        assert_eq!(status, Status::Quit);
        assert_eq!(screen.frames, 5);
    }

    #[test]
    fn test_run_keeps_drawing_while_lingering() {
        let mut screen = StubScreen::new(3, 4);
        let mut ctx = ctx_with(ScriptedInput::new(vec![]));
        run(&mut screen, &mut ctx);
        // 3 running frames plus 4 lingering ones
        assert_eq!(screen.frames, 7);
    }

    #[test]
    fn test_window_quit_terminates() {
        let mut screen = StubScreen::new(100, 0);
        let mut ctx = ctx_with(ScriptedInput::new(vec![
            vec![],
            vec![Event::Quit],
        ]));
        let status = run(&mut screen, &mut ctx);
        assert_eq!(status, Status::Terminate);
        assert_eq!(screen.frames, 2);
    }

    #[test]
    fn test_key_events_dispatch_through_bindings() {
        let mut screen = StubScreen::new(100, 0);
        let mut ctx = ctx_with(ScriptedInput::new(vec![
            vec![Event::KeyDown(Key::Space)],
            vec![Event::KeyDown(Key::P)], // unbound, ignored
            vec![Event::KeyDown(Key::Escape)],
        ]));
        run(&mut screen, &mut ctx);
        assert_eq!(
            screen.performed,
            vec![ScreenAction::DropBomb, ScreenAction::QuitScreen]
        );
    }

    #[test]
    #[should_panic(expected = "not valid for this screen")]
    fn test_invalid_status_panics() {
        let mut screen = StubScreen::new(1, 0);
        screen.set_status(Status::LevelCleared);
    }
}
