//! ef-command: turns an encoding profile and a source analysis into one
//! external-process invocation.
//!
//! The only contract with the process runner is the flat argument string
//! produced here: tool arguments (without the program name), space-joined,
//! each argument quoted by [`quote::quote_arg`] when needed so that
//! [`quote::split_command_line`] recovers it exactly.

pub mod builder;
pub mod filter;
pub mod hwaccel;
pub mod quote;
pub mod scale;
pub mod synthesizer;
pub mod thumbnail;
pub mod tonemap;

pub use builder::CommandBuilder;
pub use filter::FilterGraph;
pub use hwaccel::HardwareAccelerator;
pub use quote::{join_args, quote_arg, split_command_line};
pub use scale::ScaleDecision;
pub use synthesizer::{CommandSynthesizer, Rendition};
pub use thumbnail::thumbnail_command;
