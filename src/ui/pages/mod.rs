pub mod control;
pub mod settings;

pub use control::{render_index, IndexView};
pub use settings::{render_settings, SettingsView};
