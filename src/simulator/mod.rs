pub mod sample;
pub mod signals;

pub use sample::{SampleObject, SampleStatus};
