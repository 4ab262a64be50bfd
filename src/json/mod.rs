//! JSON Import/Export für Entity-Bestände und Validierungsergebnisse.
//!
//! Ein Bestand ist ein JSON-Array von Entity-Records. Die Variante ergibt
//! sich aus dem Präfix der ID (`n`, `w`, `r`).

mod record;
pub mod parser;
pub mod writer;

pub use parser::parse_entities;
pub use record::EntityRecord;
pub use writer::{write_entities, write_issues};
