mod lock;
mod mutex;
mod sequence;

pub use lock::*;
pub(crate) use mutex::*;
pub(crate) use sequence::*;
