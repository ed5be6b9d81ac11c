//! Closed-loop position control for a geared DC motor with quadrature-encoder
//! feedback, on no-std embedded platforms.
//!
//! For a runnable host simulation, see `qpos-app/mock-mcu`.
#![no_std]

pub mod utils;

#[doc(hidden)]
pub use static_cell as __static_cell;
