pub use self::board::*;

pub(crate) mod board;
