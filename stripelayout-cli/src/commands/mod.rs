//! CLI Commands

pub mod locate;
pub mod split;
pub mod verify;

pub use locate::run as locate;
pub use split::run as split;
pub use verify::run as verify;
