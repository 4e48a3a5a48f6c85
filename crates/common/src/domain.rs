mod device;
mod employee;
mod record_store;
mod result;

pub use device::*;
pub use employee::*;
pub use record_store::*;
pub use result::*;
