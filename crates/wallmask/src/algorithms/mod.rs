pub mod color;
pub mod cleaning;
pub mod extraction;
pub mod simplification;

pub use color::*;
pub use cleaning::*;
pub use extraction::*;
pub use simplification::*;
