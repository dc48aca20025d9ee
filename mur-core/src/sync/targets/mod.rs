//! Built-in target adapter variants

mod per_pattern;
mod settings;
mod single_file;

pub use per_pattern::PerPatternTarget;
pub use settings::SettingsTarget;
pub use single_file::SingleFileTarget;
