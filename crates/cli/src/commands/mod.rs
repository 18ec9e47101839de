pub mod catalog;
pub mod check;
pub mod detection;
pub mod report;
pub mod summary;

pub use catalog::*;
pub use check::*;
pub use detection::*;
pub use report::*;
pub use summary::*;
