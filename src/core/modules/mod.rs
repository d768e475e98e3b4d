pub mod manager;
pub mod model;

pub use manager::ModuleManager;
pub use model::Module;
