//! Fixed-rate main loop. Logic ticks are never dropped; rendering is skipped
//! while the loop is behind, and forced at least once every `fps` ticks.

use crate::buttons::Button;
use crate::machine::Machine;
use crate::script::{ScriptEngine, Signal};
use std::time::Duration;

/// pacing bookkeeping for one running cart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerState {
    pub(crate) frame_counter: u32,
    pub(crate) ticks_since_present: u32,
    /// signed milliseconds the loop is behind schedule
    pub(crate) debt: i64,
    pub(crate) target_tick_ms: i64,
    pub(crate) measured_fps: u32,
    /// set by the last present; None until then
    pub(crate) tick_start: Option<Duration>,
    /// escape/pause levels seen by the last `pump_events`
    pub(crate) system_levels: u16,
}

impl SchedulerState {
    pub fn new(target_tick_ms: i64) -> Self {
        SchedulerState {
            frame_counter: 0,
            ticks_since_present: 0,
            debt: 0,
            target_tick_ms,
            measured_fps: 0,
            tick_start: None,
            system_levels: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = SchedulerState::new(self.target_tick_ms);
    }

    pub fn debt(&self) -> i64 {
        self.debt
    }
}

fn millis(d: Duration) -> i64 {
    d.as_millis().min(i64::MAX as u128) as i64
}

impl<'a> Machine<'a> {
    /// Drive `engine` until something raises a signal, then hand it back.
    pub fn main_loop(&mut self, engine: &mut dyn ScriptEngine) -> Signal {
        loop {
            if let Err(signal) = self.step(engine) {
                log::debug!("main loop left at tick {}: {}", self.sched.frame_counter, signal);
                return signal;
            }
        }
    }

    /// one logic tick, plus a render when the schedule allows it
    fn step(&mut self, engine: &mut dyn ScriptEngine) -> Result<(), Signal> {
        engine.update(self)?;
        self.sched.ticks_since_present += 1;
        self.sched.debt += self.elapsed_ms();

        let target = self.sched.target_tick_ms;
        let hard_cap = self.sched.ticks_since_present >= self.config.tick_rate();
        if self.sched.debt < target || hard_cap {
            let draw_start = self.backend.now();
            engine.draw(self)?;
            self.sched.debt += millis(self.backend.now().saturating_sub(draw_start));
            self.present()?;
            if hard_cap {
                log::debug!("forced present after {} ticks", self.sched.ticks_since_present);
                self.sched.debt = 0;
            } else {
                self.sched.debt = (self.sched.debt - target).max(-target);
            }
            self.sched.ticks_since_present = 0;
        } else {
            log::debug!("skipping render, {}ms behind", self.sched.debt);
            self.post_tick()?;
            self.sched.debt -= target;
        }
        Ok(())
    }

    /// Present the screen and finish the tick. Scripts that run their own
    /// loop call this in place of returning from a callback.
    pub fn flip(&mut self) -> Result<(), Signal> {
        self.present()
    }

    /// Check escape and pause between ticks without touching the rest of
    /// input, for scripts busy inside a single callback. A pause already
    /// down at this tick's input poll was handled there.
    pub fn pump_events(&mut self) -> Result<(), Signal> {
        let levels = self.backend.poll_system_buttons()?;
        let newly = levels & !(self.buttons.held(0) | self.sched.system_levels);
        self.sched.system_levels = levels;
        if levels & Button::Escape.mask() != 0 {
            log::info!("escape held, aborting cart");
            return Err(Signal::Abort);
        }
        if newly & Button::Pause.mask() != 0 {
            return self.request_pause();
        }
        Ok(())
    }

    /// milliseconds since the last present
    fn elapsed_ms(&self) -> i64 {
        match self.sched.tick_start {
            Some(start) => millis(self.backend.now().saturating_sub(start)),
            None => 0,
        }
    }

    fn present(&mut self) -> Result<(), Signal> {
        if !self.backend.wait_presented(self.config.present_timeout)? {
            log::warn!(
                "previous frame still presenting after {:?}",
                self.config.present_timeout
            );
        }
        self.backend.present(&self.memory.frame())?;

        let elapsed = self.elapsed_ms();
        let sleep = (self.sched.target_tick_ms - elapsed).max(0);
        self.sched.measured_fps = (1000 / (elapsed + sleep).max(1)) as u32;
        self.backend.sleep(Duration::from_millis(sleep as u64));
        self.sched.tick_start = Some(self.backend.now());
        self.post_tick()
    }

    /// end-of-tick work shared by rendered and skipped ticks
    fn post_tick(&mut self) -> Result<(), Signal> {
        if let Err(e) = self.cartdata.flush(&self.memory) {
            log::warn!("cartdata write failed: {}", e);
        }
        self.update_input()?;
        self.sched.frame_counter = self.sched.frame_counter.wrapping_add(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Headless, ManualClock, PauseChoice};
    use crate::cartdata::tests::scratch_dir;
    use crate::config::Config;
    use crate::input::{DummyInput, InputFrame};
    use crate::memory::{MemoryMap, CARTDATA};

    /// engine whose callbacks cost fixed amounts of (manual) time
    struct CostEngine {
        clock: ManualClock,
        update_ms: u64,
        draw_ms: u64,
        updates: u32,
        draws: u32,
    }

    impl CostEngine {
        fn new(clock: &ManualClock, update_ms: u64) -> Self {
            CostEngine {
                clock: clock.clone(),
                update_ms,
                draw_ms: 0,
                updates: 0,
                draws: 0,
            }
        }
    }

    impl ScriptEngine for CostEngine {
        fn init(&mut self, _script: &str, _machine: &mut Machine) -> Result<(), Signal> {
            Ok(())
        }

        fn update(&mut self, _machine: &mut Machine) -> Result<(), Signal> {
            self.updates += 1;
            self.clock.advance_ms(self.update_ms);
            Ok(())
        }

        fn draw(&mut self, _machine: &mut Machine) -> Result<(), Signal> {
            self.draws += 1;
            self.clock.advance_ms(self.draw_ms);
            Ok(())
        }

        fn has_main_loop_callbacks(&self) -> bool {
            true
        }

        fn shutdown(&mut self) {}
    }

    fn headless() -> (Headless<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        (Headless::with_clock(DummyInput::default(), clock.clone()), clock)
    }

    #[test]
    fn test_idle_loop_presents_every_tick() -> Result<(), Signal> {
        let (mut backend, clock) = headless();
        let mut engine = CostEngine::new(&clock, 0);
        {
            let mut m = Machine::new(&mut backend, Config::default());
            for _ in 0..20 {
                m.step(&mut engine)?;
            }
            assert_eq!(m.frame_counter(), 20);
            assert_eq!(m.measured_fps(), 30);
        }
        assert_eq!(engine.draws, 20);
        assert_eq!(backend.display.presented, 20);
        assert_eq!(clock.slept(), Duration::from_millis(20 * 33));
        Ok(())
    }

    #[test]
    fn test_overload_forces_present_every_fps_ticks() -> Result<(), Signal> {
        let (mut backend, clock) = headless();
        let mut engine = CostEngine::new(&clock, 100);
        let mut presented_at = Vec::new();
        {
            let mut m = Machine::new(&mut backend, Config::default());
            for i in 1..=61 {
                let before = engine.draws;
                m.step(&mut engine)?;
                if engine.draws > before {
                    presented_at.push(i);
                    if i > 1 {
                        assert_eq!(m.sched.debt(), 0);
                    }
                }
            }
            // no logic ticks were dropped
            assert_eq!(m.frame_counter(), 61);
        }
        assert_eq!(presented_at, vec![1, 31, 61]);
        assert_eq!(engine.updates, 61);
        Ok(())
    }

    #[test]
    fn test_hard_cap_follows_clamped_fps() -> Result<(), Signal> {
        let (mut backend, clock) = headless();
        let mut engine = CostEngine::new(&clock, 100);
        let mut config = Config::default();
        config.fps = 5000;
        let mut m = Machine::new(&mut backend, config);
        let mut presented_at = Vec::new();
        for i in 1..=1001 {
            let before = engine.draws;
            m.step(&mut engine)?;
            if engine.draws > before {
                presented_at.push(i);
            }
        }
        assert_eq!(presented_at, vec![1, 1001]);
        Ok(())
    }

    #[test]
    fn test_debt_never_below_minus_target() -> Result<(), Signal> {
        let (mut backend, clock) = headless();
        let mut engine = CostEngine::new(&clock, 0);
        let mut m = Machine::new(&mut backend, Config::default());
        for _ in 0..5 {
            m.step(&mut engine)?;
            assert!(m.sched.debt() >= -33);
        }
        Ok(())
    }

    #[test]
    fn test_slow_present_warns_but_continues() -> Result<(), Signal> {
        let (mut backend, clock) = headless();
        backend.display.pending_waits = 1;
        let mut engine = CostEngine::new(&clock, 0);
        {
            let mut m = Machine::new(&mut backend, Config::default());
            for _ in 0..3 {
                m.step(&mut engine)?;
            }
        }
        assert_eq!(backend.display.presented, 3);
        Ok(())
    }

    #[test]
    fn test_main_loop_returns_signal() {
        struct QuitAt(u32);
        impl ScriptEngine for QuitAt {
            fn init(&mut self, _: &str, _: &mut Machine) -> Result<(), Signal> {
                Ok(())
            }
            fn update(&mut self, m: &mut Machine) -> Result<(), Signal> {
                if m.frame_counter() == self.0 {
                    return Err(m.restart());
                }
                Ok(())
            }
            fn draw(&mut self, _: &mut Machine) -> Result<(), Signal> {
                Ok(())
            }
            fn has_main_loop_callbacks(&self) -> bool {
                true
            }
            fn shutdown(&mut self) {}
        }

        let (mut backend, _clock) = headless();
        let mut m = Machine::new(&mut backend, Config::default());
        assert_eq!(m.main_loop(&mut QuitAt(7)), Signal::Restart);
        assert_eq!(m.frame_counter(), 7);
    }

    #[test]
    fn test_many_cartdata_writes_flush_once() -> Result<(), Signal> {
        let (mut backend, clock) = headless();
        let mut config = Config::default();
        config.cartdata_dir = scratch_dir("sched");
        let mut m = Machine::new(&mut backend, config);
        m.open_cartdata("counter")
            .map_err(|e| Signal::Fault(e.to_string()))?;
        for i in 0..8 {
            m.memory_mut().poke(CARTDATA + i, 0x40 + i as u8);
            m.mark_cartdata_dirty();
        }
        m.step(&mut CostEngine::new(&clock, 0))?;
        assert_eq!(m.cartdata().writes(), 1);
        m.step(&mut CostEngine::new(&clock, 0))?;
        assert_eq!(m.cartdata().writes(), 1);
        Ok(())
    }

    #[test]
    fn test_pump_events() {
        let (mut backend, _clock) = headless();
        backend.input.push(InputFrame::player0(&[Button::Pause]));
        backend.pause_choices.push_back(PauseChoice::Continue);
        backend.pause_choices.push_back(PauseChoice::Quit);
        {
            let mut m = Machine::new(&mut backend, Config::default());
            assert_eq!(m.pump_events(), Ok(()));
            // still held, so no second menu
            assert_eq!(m.pump_events(), Ok(()));
        }
        assert_eq!(backend.pause_choices, vec![PauseChoice::Quit]);

        backend.input = DummyInput::new(&[InputFrame::player0(&[Button::Escape])]);
        let mut m = Machine::new(&mut backend, Config::default());
        assert_eq!(m.pump_events(), Err(Signal::Abort));
    }

    #[test]
    fn test_pump_events_skips_pause_seen_by_input_poll() {
        let pause = InputFrame::player0(&[Button::Pause]);
        let input = DummyInput::new(&[InputFrame::default(), pause, pause]);
        let mut backend = Headless::with_clock(input, ManualClock::new());
        backend.pause_choices.extend([PauseChoice::Continue, PauseChoice::Quit]);
        {
            let mut m = Machine::new(&mut backend, Config::default());
            assert_eq!(m.update_input(), Ok(()));
            assert_eq!(m.update_input(), Ok(()));
            assert_eq!(m.pump_events(), Ok(()));
        }
        assert_eq!(backend.pause_choices, vec![PauseChoice::Quit]);
    }

    #[test]
    fn test_flip_presents_and_ticks() -> Result<(), Signal> {
        let (mut backend, _clock) = headless();
        {
            let mut m = Machine::new(&mut backend, Config::default());
            m.flip()?;
            m.flip()?;
            assert_eq!(m.frame_counter(), 2);
        }
        assert_eq!(backend.display.presented, 2);
        Ok(())
    }
}
