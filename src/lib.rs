//! Body-gesture recognition over depth-sensor skeleton streams, plus the
//! daemon that turns recognized gestures into desktop input.

pub mod actions;
pub mod cli;
pub mod config;
pub mod controller;
pub mod gestures;
pub mod input;
pub mod ipc;
pub mod logging;
pub mod pose;
pub mod segments;
pub mod synth;
