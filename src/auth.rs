//! Access credentials, the process-wide credential holder, and claim decoding.

pub mod claims;
pub mod credential;
pub mod holder;

pub use claims::*;
pub use credential::*;
pub use holder::*;
