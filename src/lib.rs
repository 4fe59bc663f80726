#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod constants;
pub mod presence;
pub mod rules;
