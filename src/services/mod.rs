//! Service layer separating I/O and progress reporting from matte logic

pub mod io;
pub mod progress;

pub use io::ImageIOService;
pub use progress::{AssetStage, ConsoleProgressReporter, NoOpProgressReporter, ProgressReporter};
