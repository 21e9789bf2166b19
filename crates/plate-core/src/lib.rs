mod core;
mod error;
mod image;
mod inline;
mod ops;
mod read;
mod registry;
mod serde_value;
mod structure;
mod transforms;

pub use crate::core::*;
pub use crate::error::*;
pub use crate::image::*;
pub use crate::ops::*;
pub use crate::read::*;
pub use crate::registry::*;
pub use crate::serde_value::*;
