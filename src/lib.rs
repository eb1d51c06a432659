#![allow(non_snake_case)]

mod arpeggio;
mod converter;
mod detect;
mod encoding;
mod header;
mod merger;
mod midi_importer;
mod model;
mod spans;
mod tempo;
mod util;

pub use arpeggio::*;
pub use converter::*;
pub use detect::*;
pub use encoding::*;
pub use header::*;
pub use merger::*;
pub use midi_importer::*;
pub use model::config::*;
pub use model::score::*;
pub use model::song::*;
pub use spans::*;
pub use tempo::*;
pub use util::*;
