//! Configuration structures for packaging runs.
//!
//! [`Settings`] is the validated, immutable configuration handed to the core by
//! the CLI layer. It is constructed through [`SettingsBuilder`].

mod builder;
mod core;
mod runtime;

pub use builder::SettingsBuilder;
pub use self::core::Settings;
pub use runtime::ContainerRuntime;
