//! Stand-in collaborators so the binary has something to run: a raw cart
//! container, a checker that accepts everything and a test card that needs
//! no script language.

use crate::buttons::{Button, PLAYER_COUNT};
use crate::cart::{CartParser, CartSource, Compatibility, CompatibilityChecker, ParsedCart};
use crate::error::ParseError;
use crate::machine::Machine;
use crate::memory::{
    CartSnapshot, LiveMemory, MemoryMap, CART_MEMORY_SIZE, SCREEN, SCREEN_HEIGHT, SCREEN_WIDTH,
};
use crate::script::{ScriptEngine, Signal};
use std::borrow::Cow;
use std::fs;
use std::path::Path;

/// Raw container: the cart image verbatim, then the script as UTF-8 text.
/// A file no longer than the image has no script.
#[derive(Debug, Default)]
pub struct RawCartParser;

impl CartParser for RawCartParser {
    fn parse(&self, source: &CartSource) -> Result<ParsedCart, ParseError> {
        let bytes: Cow<[u8]> = match source {
            CartSource::Path(p) => Cow::Owned(fs::read(p)?),
            CartSource::Buffer(b) => Cow::Borrowed(b.as_slice()),
        };
        let snapshot = CartSnapshot::from_bytes(&bytes);
        if bytes.len() <= CART_MEMORY_SIZE {
            return Ok(ParsedCart {
                snapshot,
                script: None,
            });
        }
        let script = std::str::from_utf8(&bytes[CART_MEMORY_SIZE..])
            .map_err(|e| ParseError::Malformed(format!("script is not utf-8: {}", e)))?;
        Ok(ParsedCart {
            snapshot,
            script: Some(script.to_string()),
        })
    }
}

#[derive(Debug, Default)]
pub struct PermissiveChecker;

impl CompatibilityChecker for PermissiveChecker {
    fn check(&self, _path: Option<&Path>, _script: &str) -> Compatibility {
        Compatibility::Full
    }
}

pub const TESTCARD_CARTDATA_ID: &str = "pocket8_testcard";

const BAR_HEIGHT: usize = 96;
const BUTTON_ROW: usize = 104;
const RUNS_ROW: usize = 116;

/// set one pixel of the default screen
fn pset(memory: &mut LiveMemory, x: usize, y: usize, colour: u8) {
    if x >= SCREEN_WIDTH || y >= SCREEN_HEIGHT {
        return;
    }
    let addr = SCREEN + (y * SCREEN_WIDTH / 2 + x / 2) as u16;
    let byte = memory.peek(addr);
    let byte = if x & 1 == 0 {
        (byte & 0xf0) | (colour & 0xf)
    } else {
        (byte & 0x0f) | (colour << 4)
    };
    memory.poke(addr, byte);
}

fn block(memory: &mut LiveMemory, x: usize, y: usize, size: usize, colour: u8) {
    for dy in 0..size {
        for dx in 0..size {
            pset(memory, x + dx, y + dy, colour);
        }
    }
}

/// Palette bars, a cursor steered with the arrows, live button lamps and a
/// run counter kept in cartdata. Action1 changes the cursor colour, action2
/// restarts the cart.
#[derive(Debug)]
pub struct TestCardEngine {
    cursor: (usize, usize),
    colour: u8,
    runs: u32,
}

impl Default for TestCardEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TestCardEngine {
    pub fn new() -> Self {
        TestCardEngine {
            cursor: (SCREEN_WIDTH / 2, BAR_HEIGHT / 2),
            colour: 7,
            runs: 0,
        }
    }

    /// how many times the card has been started, per its save data
    pub fn runs(&self) -> u32 {
        self.runs
    }
}

impl ScriptEngine for TestCardEngine {
    fn init(&mut self, _script: &str, m: &mut Machine) -> Result<(), Signal> {
        *self = TestCardEngine::new();
        if let Err(e) = m.open_cartdata(TESTCARD_CARTDATA_ID) {
            log::warn!("test card runs without save data: {}", e);
            return Ok(());
        }
        let window = m.cartdata_mut();
        let mut count = [0u8; 4];
        count.copy_from_slice(&window[..4]);
        self.runs = u32::from_le_bytes(count).wrapping_add(1);
        window[..4].copy_from_slice(&self.runs.to_le_bytes());
        log::info!("test card run {}", self.runs);
        Ok(())
    }

    fn update(&mut self, m: &mut Machine) -> Result<(), Signal> {
        if m.btnp(Button::Action2, 0) {
            return Err(m.restart());
        }
        if m.btnp(Button::Action1, 0) {
            self.colour = (self.colour + 1) % 16;
        }
        let (x, y) = &mut self.cursor;
        if m.btn(Button::Left, 0) {
            *x = x.saturating_sub(1);
        }
        if m.btn(Button::Right, 0) {
            *x = (*x + 1).min(SCREEN_WIDTH - 1);
        }
        if m.btn(Button::Up, 0) {
            *y = y.saturating_sub(1);
        }
        if m.btn(Button::Down, 0) {
            *y = (*y + 1).min(BAR_HEIGHT - 1);
        }
        Ok(())
    }

    fn draw(&mut self, m: &mut Machine) -> Result<(), Signal> {
        let lamps: Vec<(bool, bool)> = (0..PLAYER_COUNT)
            .flat_map(|p| Button::ALL.iter().map(move |&b| (p, b)))
            .map(|(p, b)| (m.btn(b, p), m.btnp(b, p)))
            .collect();
        let memory = m.memory_mut();
        memory.clear_screen();
        for y in 0..BAR_HEIGHT {
            for x in 0..SCREEN_WIDTH {
                pset(memory, x, y, (x / 8) as u8);
            }
        }
        for (i, &(held, pressed)) in lamps.iter().enumerate() {
            let colour = match (held, pressed) {
                (_, true) => 8,
                (true, false) => 7,
                _ => 5,
            };
            block(memory, 4 + i * 7, BUTTON_ROW, 5, colour);
        }
        for bit in 0..16 {
            let colour = if self.runs & (1 << bit) != 0 { 11 } else { 1 };
            block(memory, 4 + bit * 7, RUNS_ROW, 5, colour);
        }
        let (x, y) = self.cursor;
        block(memory, x.saturating_sub(1), y.saturating_sub(1), 3, self.colour);
        Ok(())
    }

    fn has_main_loop_callbacks(&self) -> bool {
        true
    }

    fn shutdown(&mut self) {
        *self = TestCardEngine::new();
    }
}
