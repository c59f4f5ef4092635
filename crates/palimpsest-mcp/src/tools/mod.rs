pub mod memory;
#[cfg(feature = "parser")]
pub mod index;
pub mod normalize;
pub mod query;
pub mod sync;
