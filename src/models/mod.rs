pub mod hash;
pub mod prediction;
pub mod rect;

pub use hash::ColorHash;
pub use prediction::Prediction;
pub use rect::Rect;
