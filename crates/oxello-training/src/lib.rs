pub use self::{experiment::*, population::*, selection::*};

pub mod experiment;
pub mod population;
pub mod selection;
