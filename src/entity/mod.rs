pub mod catalog;
pub mod meta;
pub mod traits;

pub use catalog::*;
pub use meta::Meta;
pub use traits::{Entity, EntityMeta};
