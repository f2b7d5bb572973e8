pub mod action;
pub mod compare;
pub mod config;
pub mod grading;
pub mod language;
pub mod problem;
pub mod sandbox;
pub mod serdable;
pub mod str_interp;
pub mod style;
pub mod template;

pub use crate::config::Config;
