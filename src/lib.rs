//! # pocket8
//!
//! Runtime core for a PICO-8 style fantasy console: paces a cart's script at
//! a fixed tick rate, turns raw button levels into held/pressed state, and
//! owns the cart's life from load through restart, load-new and abort.
//!
//! ## Design
//!
//! * one `Machine` per running console; no globals
//! * hardware is behind traits (display, input, clock, dialogs) so the
//!   terminal frontend, headless runs and tests all drive the same core
//! * the script engine, cart container and compatibility check are
//!   collaborators too; the core never interprets script text
//! * restart / load / abort are a `Signal` returned up through every
//!   callback as `Err`, and acted on in exactly one place
//! * logic ticks are never dropped; rendering is what gets skipped
//!
//! ## Model
//!
//! ```text
//! Controller
//!  |-- parser, checker, engine
//!  |-- Machine(backend, config)
//!  |    |-- LiveMemory (cart image, cartdata window, registers, screen)
//!  |    |-- ButtonState (edges + auto-repeat, in ticks)
//!  |    |-- CartdataStore (256 byte save record, flushed per tick)
//!  |    `-- SchedulerState (frame counter, debt, fps)
//!  `-- run loop
//!       |-- load -> compatibility gate -> start -> init
//!       |-- main_loop: update; draw + present when on schedule
//!       `-- Signal::Restart | Load | Abort | Fault -> next state
//! ```
pub mod backend;
pub mod buttons;
pub mod cart;
pub mod cartdata;
pub mod config;
pub mod demo;
pub mod display;
pub mod error;
pub mod input;
pub mod lifecycle;
pub mod machine;
pub mod memory;
pub mod rng;
pub mod scheduler;
pub mod script;
