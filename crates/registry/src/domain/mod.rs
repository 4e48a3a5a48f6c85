pub mod confirmation;
pub mod device_registry;
pub mod employee_registry;
pub mod form_state;
pub mod workbench;

pub use confirmation::*;
pub use device_registry::*;
pub use employee_registry::*;
pub use form_state::*;
pub use workbench::*;
