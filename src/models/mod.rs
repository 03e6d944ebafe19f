pub mod catalog;
pub mod playlist;
pub mod progress;

pub use catalog::*;
pub use playlist::*;
pub use progress::*;
