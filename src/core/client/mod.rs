pub mod model;
pub mod registry;

pub use model::{GameClient, ValidationStatus};
pub use registry::ClientRegistry;
