pub mod directory;
pub mod model;
pub mod probe;

pub use directory::{ServerDirectory, Upsert};
pub use model::{Reachability, Server, ServerAddress, ServerAnnouncement};
