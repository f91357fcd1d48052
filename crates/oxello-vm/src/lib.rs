pub use self::{hardware::*, inst::*, register_vm::*, sandbox::*, tag_vm::*, traits::*};

pub mod hardware;
pub mod inst;
pub mod register_vm;
pub mod sandbox;
pub mod tag_vm;
pub mod traits;
