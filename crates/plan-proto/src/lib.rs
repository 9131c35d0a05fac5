pub mod category;
pub mod raw;

pub use category::Category;
pub use raw::{RawBox, RawPoint, RawPrediction, RawResponse};
