// HTTP routes
pub mod callbacks;
pub mod distribution;
pub mod health;
pub mod voice;

pub use callbacks::*;
pub use distribution::*;
pub use health::*;
pub use voice::*;
