//! Media types shared between the registry and the processing chain

pub mod flv;
pub mod unit;

pub use flv::{FlvTag, FlvTagType};
pub use unit::{MediaKind, MediaUnit};
