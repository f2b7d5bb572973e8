pub mod grader;
pub mod pool;
pub mod verdict;

pub use grader::*;
pub use pool::*;
pub use verdict::*;
