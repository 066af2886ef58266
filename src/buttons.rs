//! Button edge detection and keyboard-style auto-repeat.
//!
//! Everything here is measured in logic ticks, never wall time, so repeat
//! cadence follows the tick rate, including while the scheduler is catching
//! up after a stall.

pub const PLAYER_COUNT: usize = 2;
pub const BUTTON_COUNT: usize = 8;

/// ticks before the first repeat when the delay register is 0
pub const DEFAULT_REPEAT_DELAY: u8 = 15;
/// ticks between repeats when the interval register is 0
pub const DEFAULT_REPEAT_INTERVAL: u8 = 4;

const REPEAT_DISABLED: u8 = 255;

/// logical buttons, in bit order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Left = 0,
    Right = 1,
    Up = 2,
    Down = 3,
    Action1 = 4,
    Action2 = 5,
    Pause = 6,
    Escape = 7,
}

impl Button {
    pub const ALL: [Button; BUTTON_COUNT] = [
        Button::Left,
        Button::Right,
        Button::Up,
        Button::Down,
        Button::Action1,
        Button::Action2,
        Button::Pause,
        Button::Escape,
    ];

    pub fn bit(self) -> usize {
        self as usize
    }

    pub fn mask(self) -> u16 {
        1 << self.bit()
    }

    /// only the directions auto-repeat; everything else is edge-only
    pub fn repeats(self) -> bool {
        matches!(self, Button::Left | Button::Right | Button::Up | Button::Down)
    }
}

/// when a button went down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownSince {
    /// up, or down but not yet seen
    #[default]
    Released,
    /// already down when tracking started; waits for a release
    Ignored,
    /// went down (or last repeated) at this tick
    Since(u32),
}

/// decoded auto-repeat delay register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatDelay {
    Default,
    Ticks(u8),
    Disabled,
}

impl RepeatDelay {
    pub fn from_register(value: u8) -> Self {
        match value {
            0 => RepeatDelay::Default,
            REPEAT_DISABLED => RepeatDelay::Disabled,
            n => RepeatDelay::Ticks(n),
        }
    }

    fn ticks(self) -> Option<u32> {
        match self {
            RepeatDelay::Default => Some(DEFAULT_REPEAT_DELAY as u32),
            RepeatDelay::Ticks(n) => Some(n as u32),
            RepeatDelay::Disabled => None,
        }
    }
}

/// decoded auto-repeat interval register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatInterval {
    Default,
    Ticks(u8),
}

impl RepeatInterval {
    pub fn from_register(value: u8) -> Self {
        match value {
            0 => RepeatInterval::Default,
            n => RepeatInterval::Ticks(n),
        }
    }

    fn ticks(self) -> u32 {
        match self {
            RepeatInterval::Default => DEFAULT_REPEAT_INTERVAL as u32,
            RepeatInterval::Ticks(n) => n as u32,
        }
    }
}

/// Per-player held/pressed masks plus the bookkeeping behind them.
#[derive(Debug, Clone)]
pub struct ButtonState {
    held: [u16; PLAYER_COUNT],
    pressed: [u16; PLAYER_COUNT],
    down_since: [[DownSince; BUTTON_COUNT]; PLAYER_COUNT],
    first_repeat: [u16; PLAYER_COUNT],
}

impl Default for ButtonState {
    fn default() -> Self {
        Self::new()
    }
}

impl ButtonState {
    /// startup state: anything already down is ignored until released
    pub fn new() -> Self {
        ButtonState {
            held: [0; PLAYER_COUNT],
            pressed: [0; PLAYER_COUNT],
            down_since: [[DownSince::Ignored; BUTTON_COUNT]; PLAYER_COUNT],
            first_repeat: [0; PLAYER_COUNT],
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Recompute held and pressed from raw levels. Called once per logic tick.
    pub fn update(
        &mut self,
        tick: u32,
        levels: [u16; PLAYER_COUNT],
        delay: RepeatDelay,
        interval: RepeatInterval,
    ) {
        let delay = delay.ticks();
        let interval = interval.ticks();
        for p in 0..PLAYER_COUNT {
            self.held[p] = levels[p];
            self.pressed[p] = 0;
            for button in Button::ALL {
                let i = button.bit();
                let mask = button.mask();
                if levels[p] & mask == 0 {
                    self.down_since[p][i] = DownSince::Released;
                    self.first_repeat[p] &= !mask;
                    continue;
                }
                match self.down_since[p][i] {
                    DownSince::Ignored => {}
                    DownSince::Released => {
                        self.down_since[p][i] = DownSince::Since(tick);
                        self.pressed[p] |= mask;
                    }
                    DownSince::Since(t) if button.repeats() => {
                        let waited = tick.wrapping_sub(t);
                        let repeated = self.first_repeat[p] & mask != 0;
                        let fire = match delay {
                            Some(delay) if !repeated => waited >= delay,
                            _ => repeated && waited >= interval,
                        };
                        if fire {
                            self.down_since[p][i] = DownSince::Since(tick);
                            self.first_repeat[p] |= mask;
                            self.pressed[p] |= mask;
                        }
                    }
                    DownSince::Since(_) => {}
                }
            }
        }
    }

    /// stop a held button from producing an edge until it is released
    pub fn ignore_until_released(&mut self, player: usize, button: Button) {
        self.down_since[player][button.bit()] = DownSince::Ignored;
        self.pressed[player] &= !button.mask();
    }

    pub fn held(&self, player: usize) -> u16 {
        self.held[player]
    }

    pub fn pressed(&self, player: usize) -> u16 {
        self.pressed[player]
    }

    pub fn down_since(&self, player: usize, button: Button) -> DownSince {
        self.down_since[player][button.bit()]
    }

    /// is the button down this tick
    pub fn btn(&self, button: Button, player: usize) -> bool {
        player < PLAYER_COUNT && self.held[player] & button.mask() != 0
    }

    /// did the button go down, or repeat, this tick
    pub fn btnp(&self, button: Button, player: usize) -> bool {
        player < PLAYER_COUNT && self.pressed[player] & button.mask() != 0
    }
}
