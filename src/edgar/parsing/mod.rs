pub mod aggregate;
pub mod html;
pub mod layout;
pub mod text;
pub mod types;
pub mod xml;

pub use types::{Diagnostic, RawHolding, RawTransaction, Severity};
