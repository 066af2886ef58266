use crate::cart::{CartParser, CartSource, Compatibility, CompatibilityChecker, ParsedCart};
use crate::error::LoadError;
use crate::machine::Machine;
use crate::memory::CartSnapshot;
use crate::script::{ScriptEngine, Signal};
use std::path::{Path, PathBuf};

/// where the controller is in a cart's life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Loading,
    CompatibilityGate,
    Running,
    RestartRequested,
    LoadRequested,
    AbortRequested,
}

/// how a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// init returned and there was no main loop to run
    Finished,
    /// the cart, or the player, asked to stop
    Aborted,
    /// the compatibility checker refused the cart
    Blocked,
    Faulted(String),
}

/// Loads carts and turns the signals they raise into state transitions.
/// The run loop here is the only place a `Signal` is acted on.
pub struct Controller<'a> {
    machine: Machine<'a>,
    engine: &'a mut dyn ScriptEngine,
    parser: &'a dyn CartParser,
    checker: &'a dyn CompatibilityChecker,
    state: LifecycleState,
    /// init has been called since the last shutdown
    engine_live: bool,
}

impl<'a> Controller<'a> {
    pub fn new(
        machine: Machine<'a>,
        engine: &'a mut dyn ScriptEngine,
        parser: &'a dyn CartParser,
        checker: &'a dyn CompatibilityChecker,
    ) -> Controller<'a> {
        Controller {
            machine,
            engine,
            parser,
            checker,
            state: LifecycleState::Idle,
            engine_live: false,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn machine(&self) -> &Machine<'a> {
        &self.machine
    }

    /// load and run the cart at `path`, following any carts it loads
    pub fn run_file(
        &mut self,
        path: impl AsRef<Path>,
        param: Option<&str>,
    ) -> Result<Outcome, LoadError> {
        let source = CartSource::Path(path.as_ref().to_path_buf());
        self.run(source, param.map(str::to_string))
    }

    /// run a cart already in memory; its relative loads resolve against the
    /// working directory
    pub fn run_buffer(
        &mut self,
        bytes: Vec<u8>,
        param: Option<&str>,
    ) -> Result<Outcome, LoadError> {
        self.run(CartSource::Buffer(bytes), param.map(str::to_string))
    }

    fn transition(&mut self, to: LifecycleState) {
        log::debug!("lifecycle {:?} -> {:?}", self.state, to);
        self.state = to;
    }

    fn run(
        &mut self,
        mut source: CartSource,
        mut param: Option<String>,
    ) -> Result<Outcome, LoadError> {
        loop {
            self.transition(LifecycleState::Loading);
            let (snapshot, script) = self.load(&source)?;
            let dir = source.path().map(cart_dir);
            self.machine.set_cart(dir, param.take());

            if !self.machine.config.skip_compat_check {
                self.transition(LifecycleState::CompatibilityGate);
                let compatibility = self.checker.check(source.path(), &script);
                if compatibility != Compatibility::Full {
                    log::warn!("{}: compatibility {:?}", source.describe(), compatibility);
                    self.machine.show_compatibility_warning(compatibility);
                }
                if compatibility == Compatibility::Unsupported {
                    self.to_idle();
                    return Ok(Outcome::Blocked);
                }
            }

            let outcome = match self.run_cart(&snapshot, &script) {
                None => Outcome::Finished,
                Some(Signal::Load(request)) => {
                    self.transition(LifecycleState::LoadRequested);
                    log::info!("cart requested load of {}", request.path.display());
                    self.shutdown_engine();
                    self.machine.close_cartdata();
                    source = CartSource::Path(request.path);
                    param = request.param;
                    continue;
                }
                Some(Signal::Fault(msg)) => {
                    log::error!("{}: {}", source.describe(), msg);
                    Outcome::Faulted(msg)
                }
                Some(_) => {
                    self.transition(LifecycleState::AbortRequested);
                    Outcome::Aborted
                }
            };
            self.to_idle();
            return Ok(outcome);
        }
    }

    fn load(&self, source: &CartSource) -> Result<(CartSnapshot, String), LoadError> {
        log::info!("loading {}", source.describe());
        let ParsedCart { snapshot, script } =
            self.parser.parse(source).map_err(|e| LoadError::Parse {
                path: source.describe(),
                source: e,
            })?;
        match script {
            Some(script) => Ok((snapshot, script)),
            None => Err(LoadError::InvalidCart {
                path: source.describe(),
            }),
        }
    }

    /// Start the cart and run it until it raises something other than a
    /// restart. None means init finished with no main loop to enter.
    fn run_cart(&mut self, snapshot: &CartSnapshot, script: &str) -> Option<Signal> {
        loop {
            self.transition(LifecycleState::Running);
            let signal = match self.boot(snapshot, script) {
                Err(signal) => signal,
                Ok(())
                    if self.machine.config.skip_main_loop_if_idle
                        && !self.engine.has_main_loop_callbacks() =>
                {
                    return None
                }
                Ok(()) => self.machine.main_loop(&mut *self.engine),
            };
            if signal != Signal::Restart {
                return Some(signal);
            }
            self.transition(LifecycleState::RestartRequested);
            log::info!("restarting cart");
            self.shutdown_engine();
            self.machine.close_cartdata();
        }
    }

    fn boot(&mut self, snapshot: &CartSnapshot, script: &str) -> Result<(), Signal> {
        self.machine.start(snapshot)?;
        self.engine_live = true;
        self.engine.init(script, &mut self.machine)
    }

    fn shutdown_engine(&mut self) {
        if self.engine_live {
            self.engine.shutdown();
            self.engine_live = false;
        }
    }

    fn to_idle(&mut self) {
        self.shutdown_engine();
        self.machine.close_cartdata();
        self.transition(LifecycleState::Idle);
    }
}

/// the directory a cart's relative loads resolve against
fn cart_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Headless, ManualClock};
    use crate::config::Config;
    use crate::error::ParseError;
    use crate::input::DummyInput;
    use crate::memory::{MemoryMap, CART_MEMORY_SIZE};

    /// hands out carts by path; a buffer is used as its own snapshot
    struct TableParser(Vec<(&'static str, Option<&'static str>)>);

    impl CartParser for TableParser {
        fn parse(&self, source: &CartSource) -> Result<ParsedCart, ParseError> {
            match source {
                CartSource::Buffer(bytes) => Ok(ParsedCart {
                    snapshot: CartSnapshot::from_bytes(bytes),
                    script: Some("buffer".to_string()),
                }),
                CartSource::Path(p) => self
                    .0
                    .iter()
                    .find(|(name, _)| Path::new(name) == p)
                    .map(|(name, script)| ParsedCart {
                        snapshot: CartSnapshot::from_bytes(name.as_bytes()),
                        script: script.map(str::to_string),
                    })
                    .ok_or_else(|| ParseError::Malformed(p.display().to_string())),
            }
        }
    }

    struct Rating(Compatibility);

    impl CompatibilityChecker for Rating {
        fn check(&self, _path: Option<&Path>, _script: &str) -> Compatibility {
            self.0
        }
    }

    /// Follows a per-init plan of what to raise from the first update. Every
    /// init records the script, the frame counter and the cart region.
    #[derive(Default)]
    struct PlanEngine {
        plan: Vec<Signal>,
        inits: Vec<(String, u32, Vec<u8>)>,
        shutdowns: usize,
        callbacks: bool,
    }

    impl ScriptEngine for PlanEngine {
        fn init(&mut self, script: &str, m: &mut Machine) -> Result<(), Signal> {
            self.inits.push((
                script.to_string(),
                m.frame_counter(),
                m.memory().cart_region().to_vec(),
            ));
            // scribble over the cart region so restart has something to undo
            m.memory_mut().fill(0, CART_MEMORY_SIZE, 0xff);
            Ok(())
        }

        fn update(&mut self, _m: &mut Machine) -> Result<(), Signal> {
            if self.plan.is_empty() {
                return Err(Signal::Abort);
            }
            Err(self.plan.remove(0))
        }

        fn draw(&mut self, _m: &mut Machine) -> Result<(), Signal> {
            Ok(())
        }

        fn has_main_loop_callbacks(&self) -> bool {
            self.callbacks
        }

        fn shutdown(&mut self) {
            self.shutdowns += 1;
        }
    }

    fn engine(plan: Vec<Signal>) -> PlanEngine {
        PlanEngine {
            plan,
            callbacks: true,
            ..Default::default()
        }
    }

    fn backend() -> Headless<ManualClock> {
        Headless::with_clock(DummyInput::default(), ManualClock::new())
    }

    fn carts() -> TableParser {
        TableParser(vec![
            ("carts/a.p8", Some("a")),
            ("carts/b.p8", Some("b")),
            ("carts/empty.p8", None),
        ])
    }

    #[test]
    fn test_restart_reinstalls_snapshot() -> Result<(), LoadError> {
        let mut b = backend();
        let mut e = engine(vec![Signal::Restart]);
        let parser = carts();
        let checker = Rating(Compatibility::Full);
        {
            let machine = Machine::new(&mut b, Config::default());
            let mut c = Controller::new(machine, &mut e, &parser, &checker);
            assert_eq!(c.run_file("carts/a.p8", None)?, Outcome::Aborted);
            assert_eq!(c.state(), LifecycleState::Idle);
        }
        let inits = &e.inits;
        assert_eq!(inits.len(), 2);
        assert_eq!(inits[0], inits[1]);
        assert_eq!(inits[1].1, 0);
        let snapshot = CartSnapshot::from_bytes(b"carts/a.p8");
        assert_eq!(&inits[1].2[..], snapshot.as_bytes());
        Ok(())
    }

    #[test]
    fn test_missing_script_is_invalid_cart() {
        let mut b = backend();
        let mut e = engine(vec![]);
        let parser = carts();
        let checker = Rating(Compatibility::Full);
        let machine = Machine::new(&mut b, Config::default());
        let mut c = Controller::new(machine, &mut e, &parser, &checker);
        match c.run_file("carts/empty.p8", None) {
            Err(LoadError::InvalidCart { path }) => assert_eq!(path, "carts/empty.p8"),
            other => panic!("expected InvalidCart, got {:?}", other),
        }
        assert!(matches!(
            c.run_file("carts/nope.p8", None),
            Err(LoadError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_request_runs_next_cart() -> Result<(), LoadError> {
        let mut b = backend();
        let mut e = engine(vec![Signal::Load(crate::script::LoadRequest {
            path: PathBuf::from("carts/b.p8"),
            param: Some("from a".to_string()),
        })]);
        let parser = carts();
        let checker = Rating(Compatibility::Full);
        {
            let machine = Machine::new(&mut b, Config::default());
            let mut c = Controller::new(machine, &mut e, &parser, &checker);
            assert_eq!(c.run_file("carts/a.p8", None)?, Outcome::Aborted);
            assert_eq!(c.machine().param(), "from a");
        }
        let scripts: Vec<String> = e.inits.iter().map(|i| i.0.clone()).collect();
        assert_eq!(scripts, vec!["a", "b"]);
        // once for the load, once on the way to idle
        assert_eq!(e.shutdowns, 2);
        Ok(())
    }

    #[test]
    fn test_partial_warns_then_runs() -> Result<(), LoadError> {
        let mut b = backend();
        let mut e = engine(vec![Signal::Restart]);
        let parser = carts();
        let checker = Rating(Compatibility::Partial);
        {
            let machine = Machine::new(&mut b, Config::default());
            let mut c = Controller::new(machine, &mut e, &parser, &checker);
            assert_eq!(c.run_file("carts/a.p8", None)?, Outcome::Aborted);
        }
        // restart skips the gate
        assert_eq!(b.warnings, vec![Compatibility::Partial]);
        assert_eq!(e.inits.len(), 2);
        Ok(())
    }

    #[test]
    fn test_unsupported_is_blocked() -> Result<(), LoadError> {
        let mut b = backend();
        let mut e = engine(vec![]);
        let parser = carts();
        let checker = Rating(Compatibility::Unsupported);
        {
            let machine = Machine::new(&mut b, Config::default());
            let mut c = Controller::new(machine, &mut e, &parser, &checker);
            assert_eq!(c.run_file("carts/a.p8", None)?, Outcome::Blocked);
            assert_eq!(c.state(), LifecycleState::Idle);
        }
        assert_eq!(b.warnings, vec![Compatibility::Unsupported]);
        assert!(e.inits.is_empty());
        assert_eq!(e.shutdowns, 0);
        Ok(())
    }

    #[test]
    fn test_skip_compat_check() -> Result<(), LoadError> {
        let mut b = backend();
        let mut e = engine(vec![]);
        let parser = carts();
        let checker = Rating(Compatibility::Unsupported);
        let mut config = Config::default();
        config.skip_compat_check = true;
        {
            let machine = Machine::new(&mut b, config);
            let mut c = Controller::new(machine, &mut e, &parser, &checker);
            assert_eq!(c.run_file("carts/a.p8", None)?, Outcome::Aborted);
        }
        assert!(b.warnings.is_empty());
        Ok(())
    }

    #[test]
    fn test_skip_idle_main_loop() -> Result<(), LoadError> {
        let mut b = backend();
        let mut e = engine(vec![Signal::Restart]);
        e.callbacks = false;
        let parser = carts();
        let checker = Rating(Compatibility::Full);
        let mut config = Config::default();
        config.skip_main_loop_if_idle = true;
        {
            let machine = Machine::new(&mut b, config);
            let mut c = Controller::new(machine, &mut e, &parser, &checker);
            assert_eq!(c.run_buffer(vec![1, 2, 3], None)?, Outcome::Finished);
        }
        assert_eq!(b.display.presented, 0);
        assert_eq!(e.plan.len(), 1);
        Ok(())
    }

    #[test]
    fn test_fault_is_reported() -> Result<(), LoadError> {
        let mut b = backend();
        let mut e = engine(vec![Signal::Fault("attempt to call nil".to_string())]);
        let parser = carts();
        let checker = Rating(Compatibility::Full);
        let machine = Machine::new(&mut b, Config::default());
        let mut c = Controller::new(machine, &mut e, &parser, &checker);
        assert_eq!(
            c.run_buffer(vec![], Some("p"))?,
            Outcome::Faulted("attempt to call nil".to_string())
        );
        assert_eq!(c.machine().param(), "p");
        Ok(())
    }

    #[test]
    fn test_cart_dir() {
        assert_eq!(cart_dir(Path::new("carts/a.p8")), PathBuf::from("carts"));
        assert_eq!(cart_dir(Path::new("a.p8")), PathBuf::from("."));
    }
}
