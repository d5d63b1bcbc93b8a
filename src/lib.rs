pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod playback;
pub mod screen;


pub use error::*;
pub use models::*;
pub use playback::{CompletionNotifier, PlaybackDelegate};
pub use screen::{AacScreen, ScreenEvent, ScreenPresenter};
