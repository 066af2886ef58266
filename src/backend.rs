use crate::cart::Compatibility;
use crate::display::{Display, DummyDisplay};
use crate::input::{DummyInput, Input, InputFrame};
use crate::memory::Frame;
use std::cell::Cell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// monotonic time plus a coarse sleep
pub trait Clock {
    /// time since some fixed origin
    fn now(&self) -> Duration;
    fn sleep(&mut self, duration: Duration);
}

/// wall clock; sleeps with spin_sleep so short waits don't overshoot
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&mut self, duration: Duration) {
        spin_sleep::sleep(duration);
    }
}

/// Clock that only moves when told to. Clones share the same time, so a test
/// can keep a handle and advance it from inside a script engine.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
    slept: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    /// total time handed to `sleep`
    pub fn slept(&self) -> Duration {
        self.slept.get()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&mut self, duration: Duration) {
        self.slept.set(self.slept.get() + duration);
        self.advance(duration);
    }
}

/// what the player picked from the pause menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseChoice {
    Continue,
    Restart,
    Quit,
}

/// modal UI; both calls block until the player dismisses them
pub trait Dialogs {
    fn pause_menu(&mut self) -> Result<PauseChoice, io::Error>;
    fn compatibility_warning(&mut self, compatibility: Compatibility) -> Result<(), io::Error>;
}

/// everything a machine needs from the platform
pub trait Backend: Display + Input + Clock + Dialogs {}

impl<T: Display + Input + Clock + Dialogs> Backend for T {}

/// Backend with no screen or keyboard. Input is scripted, dialogs answer from
/// a queue (continuing when it runs dry), and the clock defaults to wall time.
pub struct Headless<C: Clock = SystemClock> {
    pub display: DummyDisplay,
    pub input: DummyInput,
    pub clock: C,
    pub pause_choices: VecDeque<PauseChoice>,
    /// every warning shown, in order
    pub warnings: Vec<Compatibility>,
}

impl Headless<SystemClock> {
    pub fn new(input: DummyInput) -> Self {
        Headless::with_clock(input, SystemClock::new())
    }
}

impl<C: Clock> Headless<C> {
    pub fn with_clock(input: DummyInput, clock: C) -> Self {
        Headless {
            display: DummyDisplay::new(),
            input,
            clock,
            pause_choices: VecDeque::new(),
            warnings: Vec::new(),
        }
    }
}

impl<C: Clock> Display for Headless<C> {
    fn present(&mut self, frame: &Frame) -> Result<(), io::Error> {
        self.display.present(frame)
    }

    fn wait_presented(&mut self, timeout: Duration) -> Result<bool, io::Error> {
        self.display.wait_presented(timeout)
    }
}

impl<C: Clock> Input for Headless<C> {
    fn poll(&mut self) -> Result<InputFrame, io::Error> {
        self.input.poll()
    }

    fn poll_system_buttons(&mut self) -> Result<u16, io::Error> {
        self.input.poll_system_buttons()
    }

    fn set_pointer_lock(&mut self, locked: bool) {
        self.input.set_pointer_lock(locked)
    }
}

impl<C: Clock> Clock for Headless<C> {
    fn now(&self) -> Duration {
        self.clock.now()
    }

    fn sleep(&mut self, duration: Duration) {
        self.clock.sleep(duration)
    }
}

impl<C: Clock> Dialogs for Headless<C> {
    fn pause_menu(&mut self) -> Result<PauseChoice, io::Error> {
        let choice = self.pause_choices.pop_front().unwrap_or(PauseChoice::Continue);
        log::info!("pause menu: {:?}", choice);
        Ok(choice)
    }

    fn compatibility_warning(&mut self, compatibility: Compatibility) -> Result<(), io::Error> {
        log::warn!("compatibility warning: {:?}", compatibility);
        self.warnings.push(compatibility);
        Ok(())
    }
}

#[cfg(feature = "term")]
pub use self::term::TermBackend;

#[cfg(feature = "term")]
mod term {
    use super::{Clock, Dialogs, PauseChoice, SystemClock};
    use crate::cart::Compatibility;
    use crate::display::{Display, TermDisplay};
    use crate::input::{Input, InputFrame, TermInput, TermKey};
    use crate::memory::Frame;
    use std::io;
    use std::time::Duration;

    const KEY_WAIT: Duration = Duration::from_millis(250);
    const PAUSE_ITEMS: [(&str, PauseChoice); 3] = [
        ("continue", PauseChoice::Continue),
        ("restart cart", PauseChoice::Restart),
        ("quit", PauseChoice::Quit),
    ];

    /// terminal display and keyboard bundled with the wall clock
    pub struct TermBackend {
        display: TermDisplay,
        input: TermInput,
        clock: SystemClock,
    }

    impl TermBackend {
        pub fn new() -> Result<Self, io::Error> {
            let input = TermInput::new()?;
            let display = TermDisplay::new()?;
            Ok(TermBackend {
                display,
                input,
                clock: SystemClock::new(),
            })
        }
    }

    impl Display for TermBackend {
        fn present(&mut self, frame: &Frame) -> Result<(), io::Error> {
            self.display.present(frame)
        }
    }

    impl Input for TermBackend {
        fn poll(&mut self) -> Result<InputFrame, io::Error> {
            self.input.poll()
        }
    }

    impl Clock for TermBackend {
        fn now(&self) -> Duration {
            self.clock.now()
        }

        fn sleep(&mut self, duration: Duration) {
            self.clock.sleep(duration)
        }
    }

    impl Dialogs for TermBackend {
        fn pause_menu(&mut self) -> Result<PauseChoice, io::Error> {
            let labels: Vec<&str> = PAUSE_ITEMS.iter().map(|(label, _)| *label).collect();
            let mut selected = 0;
            loop {
                self.display.draw_menu("paused", &labels, Some(selected))?;
                match self.input.read_key(KEY_WAIT)? {
                    Some(TermKey::Up) => selected = (selected + labels.len() - 1) % labels.len(),
                    Some(TermKey::Down) => selected = (selected + 1) % labels.len(),
                    Some(TermKey::Confirm) => return Ok(PAUSE_ITEMS[selected].1),
                    Some(TermKey::Cancel) => return Ok(PauseChoice::Continue),
                    None => {}
                }
            }
        }

        fn compatibility_warning(&mut self, compatibility: Compatibility) -> Result<(), io::Error> {
            let lines: &[&str] = match compatibility {
                Compatibility::Full => return Ok(()),
                Compatibility::Partial => &[
                    "this cart uses features",
                    "that may not work here",
                    "",
                    "press z to continue",
                ],
                Compatibility::Unsupported => &[
                    "this cart cannot run here",
                    "",
                    "press z to return",
                ],
            };
            loop {
                self.display.draw_menu("warning", lines, None)?;
                if let Some(TermKey::Confirm) = self.input.read_key(KEY_WAIT)? {
                    return Ok(());
                }
            }
        }
    }
}
