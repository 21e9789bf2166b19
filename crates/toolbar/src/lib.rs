mod actions;
mod config;
mod derive;
mod error;
mod floating_link;
mod geometry;
mod image_component;
mod image_dialog;
mod image_loader;
mod items;
mod state;
mod toolbar;

pub use crate::actions::*;
pub use crate::config::*;
pub use crate::derive::*;
pub use crate::error::*;
pub use crate::floating_link::*;
pub use crate::geometry::*;
pub use crate::image_component::*;
pub use crate::image_dialog::*;
pub use crate::image_loader::*;
pub use crate::items::*;
pub use crate::state::*;
pub use crate::toolbar::*;
