// NB. addresses are u16 as per the console; lengths are usize to stop endless casting

/// Represents an addressable machine memory
pub trait MemoryMap {
    /// write a chunk of bytes into "RAM"
    fn write(&mut self, data: &[u8], addr: u16) {
        self.get_rw_slice(addr, data.len()).copy_from_slice(data);
    }

    /// read a single byte
    fn peek(&self, addr: u16) -> u8 {
        self.get_ro_slice(addr, 1)[0]
    }

    /// write a single byte
    fn poke(&mut self, addr: u16, value: u8) {
        self.get_rw_slice(addr, 1)[0] = value;
    }

    /// fill a range with one value
    fn fill(&mut self, addr: u16, len: usize, value: u8) {
        self.get_rw_slice(addr, len).fill(value);
    }

    /// get a r/w slice of the underlying memory (heap)
    fn get_rw_slice(&mut self, addr: u16, len: usize) -> &mut [u8];

    /// get a r/o slice of the underlying memory (heap)
    fn get_ro_slice(&self, addr: u16, len: usize) -> &[u8];
}

/// how much RAM we have
pub const MEMORY_SIZE: usize = 0x10000;

/// how much of it comes from the cart image (gfx, map, sfx, music)
pub const CART_MEMORY_SIZE: usize = 0x4300;

/// Memory map of the live machine:
///   0x0000-0x42ff  cart data (copied from the cart snapshot)
///   0x4300-0x5dff  general use
///   0x5e00-0x5eff  cartdata window (persistent)
///   0x5f00-0x5f3f  draw state
///   0x5f40-0x5f7f  hardware state
///   0x5f80-0x5fff  gpio
///   0x6000-0x7fff  screen
///   0x8000-0xffff  general use
pub const CARTDATA: u16 = 0x5e00;
pub const CARTDATA_SIZE: usize = 0x100;

pub const DRAW_STATE: u16 = 0x5f00;
pub const DRAW_STATE_SIZE: usize = 0x40;
pub const DRAW_PALETTE: u16 = 0x5f00;
pub const SCREEN_PALETTE: u16 = 0x5f10;
pub const CLIP_RECT: u16 = 0x5f20;
pub const PEN_COLOR: u16 = 0x5f25;
pub const DEVKIT_MODE: u16 = 0x5f2d;

pub const HARDWARE_STATE: u16 = 0x5f40;
pub const HARDWARE_STATE_SIZE: usize = 0x40;
pub const RNG_STATE: u16 = 0x5f44;
pub const RNG_STATE_SIZE: usize = 8;
pub const BUTTON_STATE: u16 = 0x5f4c;
pub const SCREEN_PHYS: u16 = 0x5f55;
pub const MAP_START: u16 = 0x5f56;
pub const MAP_WIDTH: u16 = 0x5f57;
pub const AUTO_REPEAT_DELAY: u16 = 0x5f5c;
pub const AUTO_REPEAT_INTERVAL: u16 = 0x5f5d;

pub const SCREEN: u16 = 0x6000;
pub const SCREEN_SIZE: usize = 0x2000;
pub const SCREEN_WIDTH: usize = 128;
pub const SCREEN_HEIGHT: usize = 128;

const DEVKIT_MOUSE_BUTTONS: u8 = 0x2;
const DEVKIT_POINTER_LOCK: u8 = 0x4;

const DEFAULT_PEN_COLOR: u8 = 6;
const TRANSPARENT_BIT: u8 = 0x10;

/// Immutable memory image decoded from a cart. Restarting a cart copies it
/// back over live memory, so it is never written after load.
#[derive(Clone, PartialEq, Eq)]
pub struct CartSnapshot {
    bytes: Box<[u8]>,
}

impl CartSnapshot {
    /// build a snapshot from decoded cart bytes; short images are zero padded
    /// and anything past the cart region is dropped
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut bytes = vec![0u8; CART_MEMORY_SIZE].into_boxed_slice();
        let len = data.len().min(CART_MEMORY_SIZE);
        bytes[..len].copy_from_slice(&data[..len]);
        CartSnapshot { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for CartSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartSnapshot")
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// devkit mode register flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevkitMode(u8);

impl DevkitMode {
    /// mouse buttons are routed into player 0's button bits
    pub fn mouse_buttons(self) -> bool {
        self.0 & DEVKIT_MOUSE_BUTTONS != 0
    }

    pub fn pointer_lock(self) -> bool {
        self.0 & DEVKIT_POINTER_LOCK != 0
    }
}

/// The screen as the display backend sees it: 4 bits per pixel, low nibble
/// first, mapped through the screen palette.
pub struct Frame<'a> {
    pixels: &'a [u8],
    palette: &'a [u8],
}

impl<'a> Frame<'a> {
    pub fn width(&self) -> usize {
        SCREEN_WIDTH
    }

    pub fn height(&self) -> usize {
        SCREEN_HEIGHT
    }

    /// screen palette entry for the pixel at x, y
    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        let byte = self.pixels[(x >> 1) + y * (SCREEN_WIDTH / 2)];
        let index = if x & 1 == 0 { byte & 0xf } else { byte >> 4 };
        self.palette[index as usize]
    }
}

/// The live machine memory. Exactly one exists per running machine.
pub struct LiveMemory {
    bytes: Box<[u8]>,
}

impl MemoryMap for LiveMemory {
    fn get_rw_slice(&mut self, addr: u16, len: usize) -> &mut [u8] {
        let a = addr as usize;
        &mut self.bytes[a..(a + len)]
    }
    fn get_ro_slice(&self, addr: u16, len: usize) -> &[u8] {
        let a = addr as usize;
        &self.bytes[a..(a + len)]
    }
}

impl Default for LiveMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveMemory {
    /// zeroed memory
    pub fn new() -> Self {
        LiveMemory {
            bytes: vec![0u8; MEMORY_SIZE].into_boxed_slice(),
        }
    }

    /// copy the pristine cart image over the cart region
    pub fn install(&mut self, snapshot: &CartSnapshot) {
        self.bytes[..CART_MEMORY_SIZE].copy_from_slice(snapshot.as_bytes());
    }

    /// the cart region, for comparing against a snapshot
    pub fn cart_region(&self) -> &[u8] {
        &self.bytes[..CART_MEMORY_SIZE]
    }

    /// zero draw and hardware state, then put back the power-on defaults
    pub fn reset_draw_state(&mut self) {
        self.fill(DRAW_STATE, DRAW_STATE_SIZE, 0);
        self.fill(HARDWARE_STATE, HARDWARE_STATE_SIZE, 0);
        self.poke(SCREEN_PHYS, (SCREEN >> 8) as u8);
        self.poke(MAP_START, 0x20);
        self.poke(MAP_WIDTH, 128);
        self.poke(PEN_COLOR, DEFAULT_PEN_COLOR);
        for c in 0..16u8 {
            let transparent = if c == 0 { TRANSPARENT_BIT } else { 0 };
            self.poke(DRAW_PALETTE + c as u16, c | transparent);
            self.poke(SCREEN_PALETTE + c as u16, c);
        }
        self.write(&[0, 0, SCREEN_WIDTH as u8, SCREEN_HEIGHT as u8], CLIP_RECT);
    }

    pub fn clear_screen(&mut self) {
        self.fill(SCREEN, SCREEN_SIZE, 0);
    }

    pub fn cartdata(&self) -> &[u8] {
        self.get_ro_slice(CARTDATA, CARTDATA_SIZE)
    }

    pub fn cartdata_mut(&mut self) -> &mut [u8] {
        self.get_rw_slice(CARTDATA, CARTDATA_SIZE)
    }

    pub fn rng_state(&self) -> &[u8] {
        self.get_ro_slice(RNG_STATE, RNG_STATE_SIZE)
    }

    pub fn devkit_mode(&self) -> DevkitMode {
        DevkitMode(self.peek(DEVKIT_MODE))
    }

    /// the screen as selected by the screen-phys register
    pub fn frame(&self) -> Frame<'_> {
        let mut base = (self.peek(SCREEN_PHYS) as usize) << 8;
        if base + SCREEN_SIZE > MEMORY_SIZE {
            base = SCREEN as usize;
        }
        Frame {
            pixels: &self.bytes[base..base + SCREEN_SIZE],
            palette: self.get_ro_slice(SCREEN_PALETTE, 16),
        }
    }
}
