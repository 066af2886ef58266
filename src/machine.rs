use crate::backend::{Backend, PauseChoice};
use crate::buttons::{Button, ButtonState, RepeatDelay, RepeatInterval, PLAYER_COUNT};
use crate::cart::Compatibility;
use crate::cartdata::CartdataStore;
use crate::config::Config;
use crate::error::CartdataError;
use crate::memory::{
    CartSnapshot, LiveMemory, MemoryMap, AUTO_REPEAT_DELAY, AUTO_REPEAT_INTERVAL, BUTTON_STATE,
};
use crate::rng;
use crate::scheduler::SchedulerState;
use crate::script::{LoadRequest, Signal};
use std::path::{Path, PathBuf};

/// mouse bits 0-2 land on action1, action2 and pause
const MOUSE_BUTTON_SHIFT: u16 = 4;
const MOUSE_BUTTON_MASK: u8 = 0x7;

/// One running console: live memory, input, save data and pacing, on top of
/// a borrowed backend. This is what script callbacks see.
pub struct Machine<'a> {
    pub(crate) backend: &'a mut dyn Backend,
    pub(crate) config: Config,
    pub(crate) memory: LiveMemory,
    pub(crate) buttons: ButtonState,
    pub(crate) cartdata: CartdataStore,
    pub(crate) sched: SchedulerState,
    modal_active: bool,
    pointer_lock: bool,
    cart_dir: Option<PathBuf>,
    param: String,
}

impl<'a> Machine<'a> {
    pub fn new(backend: &'a mut dyn Backend, config: Config) -> Machine<'a> {
        let cartdata = CartdataStore::new(config.cartdata_dir.clone());
        let sched = SchedulerState::new(config.target_tick_ms());
        Machine {
            backend,
            config,
            memory: LiveMemory::new(),
            buttons: ButtonState::new(),
            cartdata,
            sched,
            modal_active: false,
            pointer_lock: false,
            cart_dir: None,
            param: String::new(),
        }
    }

    pub fn memory(&self) -> &LiveMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut LiveMemory {
        &mut self.memory
    }

    pub fn buttons(&self) -> &ButtonState {
        &self.buttons
    }

    pub fn btn(&self, button: Button, player: usize) -> bool {
        self.buttons.btn(button, player)
    }

    pub fn btnp(&self, button: Button, player: usize) -> bool {
        self.buttons.btnp(button, player)
    }

    /// logic ticks since the cart (re)started
    pub fn frame_counter(&self) -> u32 {
        self.sched.frame_counter
    }

    pub fn measured_fps(&self) -> u32 {
        self.sched.measured_fps
    }

    /// the parameter string the cart was started with
    pub fn param(&self) -> &str {
        &self.param
    }

    pub fn cartdata(&self) -> &CartdataStore {
        &self.cartdata
    }

    /// attach the save record `id` to the cartdata window
    pub fn open_cartdata(&mut self, id: &str) -> Result<(), CartdataError> {
        self.cartdata.open(id, &mut self.memory)
    }

    /// the cartdata window changed; written back at the end of the tick
    pub fn mark_cartdata_dirty(&mut self) {
        self.cartdata.mark_dirty();
    }

    /// the cartdata window, marked dirty
    pub fn cartdata_mut(&mut self) -> &mut [u8] {
        self.cartdata.mark_dirty();
        self.memory.cartdata_mut()
    }

    /// reseed the generator, as a script's srand does
    pub fn seed_rng(&mut self, seed: u32) {
        rng::seed(&mut self.memory, seed);
    }

    /// for a callback to return when the cart should start over
    pub fn restart(&self) -> Signal {
        Signal::Restart
    }

    pub fn abort(&self) -> Signal {
        Signal::Abort
    }

    /// signal to load another cart; relative paths are against the current
    /// cart's directory
    pub fn load(&self, path: impl AsRef<Path>, param: Option<&str>) -> Signal {
        Signal::Load(LoadRequest {
            path: self.resolve_path(path.as_ref()),
            param: param.map(str::to_string),
        })
    }

    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.cart_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub(crate) fn set_cart(&mut self, dir: Option<PathBuf>, param: Option<String>) {
        self.cart_dir = dir;
        self.param = param.unwrap_or_default();
    }

    /// Put the machine in its power-on state for `snapshot`: memory, pacing,
    /// registers, screen, rng and input, in that order.
    pub(crate) fn start(&mut self, snapshot: &CartSnapshot) -> Result<(), Signal> {
        self.memory.install(snapshot);
        self.sched.reset();
        self.memory.reset_draw_state();
        self.memory.clear_screen();
        rng::seed(&mut self.memory, rng::wall_clock_seed());
        self.buttons.reset();
        self.modal_active = false;
        self.update_input()
    }

    /// Sample the backend and recompute button state for this tick, then
    /// honour escape and pause.
    pub(crate) fn update_input(&mut self) -> Result<(), Signal> {
        let devkit = self.memory.devkit_mode();
        if devkit.pointer_lock() != self.pointer_lock {
            self.pointer_lock = devkit.pointer_lock();
            self.backend.set_pointer_lock(self.pointer_lock);
        }

        let frame = self.backend.poll()?;
        let mut levels = frame.buttons;
        if devkit.mouse_buttons() {
            levels[0] |= ((frame.mouse_buttons & MOUSE_BUTTON_MASK) as u16) << MOUSE_BUTTON_SHIFT;
        }
        let delay = RepeatDelay::from_register(self.memory.peek(AUTO_REPEAT_DELAY));
        let interval = RepeatInterval::from_register(self.memory.peek(AUTO_REPEAT_INTERVAL));
        self.buttons
            .update(self.sched.frame_counter, levels, delay, interval);
        for p in 0..PLAYER_COUNT {
            self.memory
                .poke(BUTTON_STATE + p as u16, self.buttons.held(p) as u8);
        }

        if self.buttons.btn(Button::Escape, 0) {
            log::info!("escape held, aborting cart");
            return Err(Signal::Abort);
        }
        if self.buttons.btnp(Button::Pause, 0) {
            return self.request_pause();
        }
        Ok(())
    }

    /// open the pause menu unless a dialog is already up
    pub(crate) fn request_pause(&mut self) -> Result<(), Signal> {
        if self.modal_active {
            return Ok(());
        }
        self.show_pause_menu()
    }

    fn show_pause_menu(&mut self) -> Result<(), Signal> {
        self.modal_active = true;
        let choice = self.backend.pause_menu();
        self.modal_active = false;
        match choice? {
            PauseChoice::Continue => {
                for b in [Button::Action1, Button::Action2, Button::Pause] {
                    self.buttons.ignore_until_released(0, b);
                }
                Ok(())
            }
            PauseChoice::Restart => Err(Signal::Restart),
            PauseChoice::Quit => Err(Signal::Abort),
        }
    }

    pub(crate) fn show_compatibility_warning(&mut self, compatibility: Compatibility) {
        self.modal_active = true;
        if let Err(e) = self.backend.compatibility_warning(compatibility) {
            log::warn!("compatibility dialog failed: {}", e);
        }
        self.modal_active = false;
    }

    pub(crate) fn close_cartdata(&mut self) {
        if let Err(e) = self.cartdata.close(&self.memory) {
            log::warn!("closing cartdata: {}", e);
        }
    }
}
