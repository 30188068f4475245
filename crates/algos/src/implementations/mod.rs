pub mod example;
pub mod otsu;
pub mod stardist;

pub use example::*;
pub use otsu::*;
pub use stardist::*;
