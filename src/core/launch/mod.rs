pub mod supervisor;
pub mod task;
pub mod validator;

pub use supervisor::{InstanceStatus, ProcessSupervisor, RunningInstance};
pub use task::build_launch_command;
pub use validator::{validate_loadout, Loadout};
