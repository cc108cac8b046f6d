#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::uninlined_format_args
)]

pub mod channels;
pub mod config;
pub mod cooldown;
pub mod gateway;
pub mod intake;
pub mod providers;
pub mod reply;
pub mod safety;

pub use config::Config;
