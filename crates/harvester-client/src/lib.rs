pub mod browser;

pub use browser::{ChromiumLauncher, ChromiumSession};
