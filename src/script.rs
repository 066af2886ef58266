use crate::machine::Machine;
use std::fmt;
use std::path::PathBuf;

/// a cart asked for another cart to be loaded in its place
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub path: PathBuf,
    /// parameter string visible to the new cart
    pub param: Option<String>,
}

/// Non-local lifecycle transfer. Raised anywhere below a script callback and
/// carried up as `Err(Signal)`; only the lifecycle controller acts on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Restart,
    Load(LoadRequest),
    Abort,
    /// the script or the backend failed; the cart stops
    Fault(String),
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Restart => write!(f, "restart"),
            Signal::Load(req) => write!(f, "load {}", req.path.display()),
            Signal::Abort => write!(f, "abort"),
            Signal::Fault(msg) => write!(f, "fault: {}", msg),
        }
    }
}

impl From<std::io::Error> for Signal {
    fn from(e: std::io::Error) -> Self {
        Signal::Fault(e.to_string())
    }
}

/// The script runtime a cart's code executes in. Every callback gets the
/// machine so it can read buttons, touch memory, present frames or raise a
/// signal.
pub trait ScriptEngine {
    /// run the cart's top level and its init callback
    fn init(&mut self, script: &str, machine: &mut Machine) -> Result<(), Signal>;

    /// one logic tick
    fn update(&mut self, machine: &mut Machine) -> Result<(), Signal>;

    /// render into screen memory; skipped on ticks that are not presented
    fn draw(&mut self, machine: &mut Machine) -> Result<(), Signal>;

    /// false when the script defined neither update nor draw
    fn has_main_loop_callbacks(&self) -> bool;

    /// drop all script state; the next call will be `init`
    fn shutdown(&mut self);
}
