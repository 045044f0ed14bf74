pub mod cancel;
pub mod comparator;
mod equality;
pub mod file_operations;
mod listing;
pub mod reporter;

pub use cancel::CancelFlag;
pub use comparator::TreeComparator;
pub use file_operations::{FileOperation, FileOperations, OperationResult};
pub use reporter::{ChangeEvent, ChangeReporter, EventLog};
