pub mod conflicts;
pub mod links;
pub mod traverse;
pub mod validator;

pub use conflicts::detect_conflict;
pub use links::{link_items, unlink_items};
pub use traverse::walk;
pub use validator::validate_relationship;
