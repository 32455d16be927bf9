//! Terminal `VideoSink` (§6's key/event surface), the minimal idiomatic
//! stand-in for a window/event pump: raw-mode key polling on a background
//! thread, forwarded to the engine through a bounded channel.

use crossbeam_channel::{Receiver, Sender};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal;
use playback_engine::control::InputEvent;
use playback_engine::sinks::{UserEvent, VideoSink};

const SEEK_STEP_SECONDS: f64 = 10.0;

fn key_to_event(code: KeyCode) -> Option<InputEvent> {
    match code {
        KeyCode::Up => Some(InputEvent::VolumeUp),
        KeyCode::Down => Some(InputEvent::VolumeDown),
        KeyCode::Left => Some(InputEvent::SeekRelative(-SEEK_STEP_SECONDS)),
        KeyCode::Right => Some(InputEvent::SeekRelative(SEEK_STEP_SECONDS)),
        KeyCode::Char(' ') => Some(InputEvent::TogglePause),
        KeyCode::Tab => Some(InputEvent::CycleStream),
        KeyCode::Char('q') | KeyCode::Esc => Some(InputEvent::Quit),
        _ => None,
    }
}

pub struct TermVideoSink {
    events: Receiver<InputEvent>,
    raw_mode_enabled: bool,
}

impl TermVideoSink {
    pub fn new() -> std::io::Result<Self> {
        let raw_mode_enabled = terminal::enable_raw_mode().is_ok();
        let (tx, rx): (Sender<InputEvent>, Receiver<InputEvent>) = crossbeam_channel::unbounded();
        std::thread::Builder::new()
            .name("term-input".to_string())
            .spawn(move || input_pump(tx))
            .expect("spawn term-input");
        Ok(Self { events: rx, raw_mode_enabled })
    }
}

impl Drop for TermVideoSink {
    fn drop(&mut self) {
        if self.raw_mode_enabled {
            let _ = terminal::disable_raw_mode();
        }
    }
}

impl VideoSink for TermVideoSink {
    fn present_frame(&mut self, pixels: &[u8], w: u32, h: u32) {
        tracing::trace!(bytes = pixels.len(), width = w, height = h, "presented frame");
    }

    fn poll_events(&mut self) -> Vec<InputEvent> {
        self.events.try_iter().collect()
    }

    fn post_user_event(&mut self, kind: UserEvent) {
        tracing::trace!(?kind, "user event");
    }
}

fn input_pump(tx: Sender<InputEvent>) {
    loop {
        match event::poll(std::time::Duration::from_millis(50)) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    if let Some(ev) = key_to_event(key.code) {
                        let is_quit = matches!(ev, InputEvent::Quit);
                        if tx.send(ev).is_err() || is_quit {
                            return;
                        }
                    }
                }
                Ok(Event::Resize(_, _)) => {
                    if tx.send(InputEvent::Resize).is_err() {
                        return;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "terminal event read failed");
                    return;
                }
            },
            Ok(false) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "terminal event poll failed");
                return;
            }
        }
    }
}
