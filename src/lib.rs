// src/lib.rs

pub mod advice;
pub mod api;
pub mod attachment;
pub mod config;
pub mod error;
pub mod features;
pub mod kb;
pub mod parser;
pub mod services;
pub mod state;
pub mod tone;
