use std::error::Error;
use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser};
use env_logger::Env;

use pocket8::backend::{Backend, Headless};
use pocket8::config::{
    Config, DEFAULT_CARTDATA_DIR, DEFAULT_FPS, DEFAULT_PRESENT_TIMEOUT, MAX_FPS, MIN_FPS,
};
use pocket8::demo::{PermissiveChecker, RawCartParser, TestCardEngine};
use pocket8::error::LoadError;
use pocket8::input::DummyInput;
use pocket8::lifecycle::{Controller, Outcome};
use pocket8::machine::Machine;

#[derive(Parser, Debug)]
#[command(name = "pocket8")]
#[command(about = "Fantasy console runtime, showing its test card", long_about = None)]
struct Args {
    /// Cart file to run
    cart: PathBuf,

    /// Parameter string handed to the cart
    #[arg(short, long)]
    param: Option<String>,

    /// Run the cart without checking compatibility first
    #[arg(long, action = ArgAction::SetTrue)]
    skip_compat_check: bool,

    /// Return after init if the cart has no update or draw
    #[arg(short = 'x', long = "skip-idle", action = ArgAction::SetTrue)]
    skip_idle: bool,

    /// Logic ticks per second
    #[arg(
        long,
        default_value_t = DEFAULT_FPS,
        value_parser = clap::value_parser!(u32).range(MIN_FPS as i64..=MAX_FPS as i64)
    )]
    fps: u32,

    /// Directory holding cartdata records
    #[arg(long, default_value = DEFAULT_CARTDATA_DIR)]
    cartdata_dir: PathBuf,

    /// No terminal: scripted input and no display
    #[arg(long, action = ArgAction::SetTrue)]
    headless: bool,

    /// With --headless, ticks before escape is pressed
    #[arg(long, default_value_t = 300)]
    frames: usize,
}

impl Args {
    fn config(&self) -> Config {
        Config {
            fps: self.fps,
            cartdata_dir: self.cartdata_dir.clone(),
            present_timeout: DEFAULT_PRESENT_TIMEOUT,
            skip_compat_check: self.skip_compat_check,
            skip_main_loop_if_idle: self.skip_idle,
        }
    }
}

fn run(args: &Args, backend: &mut dyn Backend) -> Result<Outcome, LoadError> {
    let machine = Machine::new(backend, args.config());
    let mut engine = TestCardEngine::new();
    let parser = RawCartParser;
    let checker = PermissiveChecker;
    let mut controller = Controller::new(machine, &mut engine, &parser, &checker);
    controller.run_file(&args.cart, args.param.as_deref())
}

fn run_headless(args: &Args) -> Result<Outcome, LoadError> {
    let mut backend = Headless::new(DummyInput::escape_after(args.frames));
    let outcome = run(args, &mut backend);
    log::info!("presented {} frames", backend.display.presented);
    outcome
}

#[cfg(feature = "term")]
fn run_terminal(args: &Args) -> Result<Result<Outcome, LoadError>, Box<dyn Error>> {
    let mut backend = pocket8::backend::TermBackend::new()?;
    let outcome = run(args, &mut backend);
    drop(backend);
    // move the shell prompt below the last frame
    for _ in 0..34 {
        println!();
    }
    Ok(outcome)
}

#[cfg(not(feature = "term"))]
fn run_terminal(args: &Args) -> Result<Result<Outcome, LoadError>, Box<dyn Error>> {
    log::warn!("built without terminal support, running headless");
    Ok(run_headless(args))
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let outcome = if args.headless {
        run_headless(&args)
    } else {
        run_terminal(&args)?
    };

    match outcome {
        Ok(Outcome::Faulted(msg)) => {
            eprintln!("{}: {}", args.cart.display(), msg);
            process::exit(1);
        }
        Ok(outcome) => {
            log::info!("{}: {:?}", args.cart.display(), outcome);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}
