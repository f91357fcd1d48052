pub use self::{move_evaluator::*, score_cache::*, testcase::*};

pub mod move_evaluator;
pub mod score_cache;
pub mod testcase;
