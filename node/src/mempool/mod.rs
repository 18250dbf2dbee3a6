pub mod error;
pub mod pool;

pub use error::{MempoolError, MempoolResult};
pub use pool::TransactionPool;
