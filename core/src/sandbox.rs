pub mod cancel;
pub mod executor;
pub mod limits;
mod memwatch;
pub mod process;
mod reaper;
mod rlimit;
pub mod settings;
pub mod workspace;

pub use cancel::*;
pub use executor::*;
pub use limits::*;
pub use process::*;
pub use settings::*;
pub use workspace::*;
