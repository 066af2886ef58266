use crate::buttons::{Button, PLAYER_COUNT};
use std::collections::VecDeque;
use std::io;

/// raw levels sampled from the input device, before edge detection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputFrame {
    /// per-player button level masks
    pub buttons: [u16; PLAYER_COUNT],
    /// bit 0 left, bit 1 right, bit 2 middle
    pub mouse_buttons: u8,
}

impl InputFrame {
    pub fn player0(buttons: &[Button]) -> Self {
        let mut frame = InputFrame::default();
        for b in buttons {
            frame.buttons[0] |= b.mask();
        }
        frame
    }
}

/// reads button levels
pub trait Input {
    /// sample the current button levels
    fn poll(&mut self) -> Result<InputFrame, io::Error>;

    /// sample only player 0's escape and pause levels; used between ticks, so
    /// it must not disturb what the next `poll` reports
    fn poll_system_buttons(&mut self) -> Result<u16, io::Error> {
        let system = Button::Escape.mask() | Button::Pause.mask();
        Ok(self.poll()?.buttons[0] & system)
    }

    /// the cart asked for the mouse pointer to be captured, or released
    fn set_pointer_lock(&mut self, _locked: bool) {}
}

/// dummy Input implementation for testing: replays frames, then keeps
/// reporting the last one
#[derive(Debug, Default)]
pub struct DummyInput {
    frames: VecDeque<InputFrame>,
    last: InputFrame,
    polls: usize,
    pub pointer_locked: bool,
}

impl DummyInput {
    pub fn new(frames: &[InputFrame]) -> Self {
        DummyInput {
            frames: frames.iter().copied().collect(),
            ..Default::default()
        }
    }

    /// nothing held for `polls` samples, then escape held
    pub fn escape_after(polls: usize) -> Self {
        let mut frames = vec![InputFrame::default(); polls];
        frames.push(InputFrame::player0(&[Button::Escape]));
        DummyInput::new(&frames)
    }

    pub fn push(&mut self, frame: InputFrame) {
        self.frames.push_back(frame);
    }

    pub fn polls(&self) -> usize {
        self.polls
    }
}

impl Input for DummyInput {
    fn poll(&mut self) -> Result<InputFrame, io::Error> {
        self.polls += 1;
        if let Some(frame) = self.frames.pop_front() {
            self.last = frame;
        }
        Ok(self.last)
    }

    fn poll_system_buttons(&mut self) -> Result<u16, io::Error> {
        let system = Button::Escape.mask() | Button::Pause.mask();
        let next = self.frames.front().copied().unwrap_or(self.last);
        Ok(next.buttons[0] & system)
    }

    fn set_pointer_lock(&mut self, locked: bool) {
        self.pointer_locked = locked;
    }
}

#[cfg(feature = "term")]
pub use self::term::{TermInput, TermKey};

#[cfg(feature = "term")]
mod term {
    use super::{Input, InputFrame};
    use crate::buttons::Button;
    use crossterm::event::{poll, read, Event, KeyCode, KeyEventKind, KeyModifiers};
    use crossterm::terminal;
    use std::collections::HashMap;
    use std::io;
    use std::time::{Duration, Instant};

    /// terminals only report presses and auto-repeats, so a key counts as
    /// held until this long after its last event
    const HOLD_WINDOW: Duration = Duration::from_millis(300);

    /// arrows and z/x for player 0, esdf and tab/q for player 1
    const CONVENTIONAL_KEYMAP: [(KeyCode, (usize, Button)); 20] = [
        (KeyCode::Left, (0, Button::Left)),
        (KeyCode::Right, (0, Button::Right)),
        (KeyCode::Up, (0, Button::Up)),
        (KeyCode::Down, (0, Button::Down)),
        (KeyCode::Char('z'), (0, Button::Action1)),
        (KeyCode::Char('c'), (0, Button::Action1)),
        (KeyCode::Char('n'), (0, Button::Action1)),
        (KeyCode::Char('x'), (0, Button::Action2)),
        (KeyCode::Char('v'), (0, Button::Action2)),
        (KeyCode::Char('m'), (0, Button::Action2)),
        (KeyCode::Enter, (0, Button::Pause)),
        (KeyCode::Char('p'), (0, Button::Pause)),
        (KeyCode::Esc, (0, Button::Escape)),
        (KeyCode::Char('s'), (1, Button::Left)),
        (KeyCode::Char('f'), (1, Button::Right)),
        (KeyCode::Char('e'), (1, Button::Up)),
        (KeyCode::Char('d'), (1, Button::Down)),
        (KeyCode::Tab, (1, Button::Action1)),
        (KeyCode::Char('q'), (1, Button::Action2)),
        (KeyCode::Char('a'), (1, Button::Action2)),
    ];

    /// keys the dialogs care about
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum TermKey {
        Up,
        Down,
        Confirm,
        Cancel,
    }

    /// keyboard input from a raw-mode terminal, via crossterm
    pub struct TermInput {
        keymap: HashMap<KeyCode, (usize, Button)>,
        last_seen: HashMap<(usize, Button), Instant>,
    }

    impl TermInput {
        pub fn new() -> Result<Self, io::Error> {
            terminal::enable_raw_mode()?;
            Ok(TermInput {
                keymap: HashMap::from(CONVENTIONAL_KEYMAP),
                last_seen: HashMap::new(),
            })
        }

        fn read_events(&mut self) -> Result<(), io::Error> {
            while poll(Duration::from_millis(0))? {
                if let Event::Key(evt) = read()? {
                    let code = if evt.modifiers.contains(KeyModifiers::CONTROL)
                        && evt.code == KeyCode::Char('c')
                    {
                        KeyCode::Esc
                    } else {
                        evt.code
                    };
                    match self.keymap.get(&code) {
                        Some(&target) if evt.kind == KeyEventKind::Release => {
                            self.last_seen.remove(&target);
                        }
                        Some(&target) => {
                            self.last_seen.insert(target, Instant::now());
                        }
                        None => log::debug!("unmapped key {:?}", evt.code),
                    }
                }
            }
            Ok(())
        }

        fn levels(&mut self) -> InputFrame {
            let now = Instant::now();
            self.last_seen
                .retain(|_, seen| now.duration_since(*seen) < HOLD_WINDOW);
            let mut frame = InputFrame::default();
            for &(player, button) in self.last_seen.keys() {
                frame.buttons[player] |= button.mask();
            }
            frame
        }

        /// block up to `timeout` for a dialog key; other keys are dropped
        pub fn read_key(&mut self, timeout: Duration) -> Result<Option<TermKey>, io::Error> {
            if !poll(timeout)? {
                return Ok(None);
            }
            if let Event::Key(evt) = read()? {
                if evt.kind == KeyEventKind::Release {
                    return Ok(None);
                }
                self.last_seen.clear();
                return Ok(match evt.code {
                    KeyCode::Up => Some(TermKey::Up),
                    KeyCode::Down => Some(TermKey::Down),
                    KeyCode::Enter | KeyCode::Char('z') | KeyCode::Char('c') => {
                        Some(TermKey::Confirm)
                    }
                    KeyCode::Esc => Some(TermKey::Cancel),
                    _ => None,
                });
            }
            Ok(None)
        }
    }

    impl Drop for TermInput {
        fn drop(&mut self) {
            if let Err(e) = terminal::disable_raw_mode() {
                log::warn!("failed to leave raw mode: {}", e);
            }
        }
    }

    impl Input for TermInput {
        fn poll(&mut self) -> Result<InputFrame, io::Error> {
            self.read_events()?;
            Ok(self.levels())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_keymap_covers_both_players() {
            let keymap: HashMap<KeyCode, (usize, Button)> = HashMap::from(CONVENTIONAL_KEYMAP);
            assert_eq!(keymap.len(), CONVENTIONAL_KEYMAP.len());
            for player in 0..2 {
                for b in [Button::Left, Button::Right, Button::Up, Button::Down] {
                    assert!(keymap.values().any(|&t| t == (player, b)));
                }
            }
            assert_eq!(keymap[&KeyCode::Esc], (0, Button::Escape));
        }
    }
}
