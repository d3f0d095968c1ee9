//! Configuration emitters
//!
//! Pure functions from config types to file text. Rendering is deterministic:
//! equal configs render byte-equal text, which drift detection relies on.

pub mod nginx;
pub mod supervisor;
