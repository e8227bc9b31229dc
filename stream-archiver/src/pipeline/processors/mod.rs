//! Stage processors run by the worker pools.

mod execute;
mod traits;
mod upload;

pub use execute::ExecuteCommandProcessor;
pub use traits::{Processor, ProcessorOutput};
pub use upload::PublishProcessor;
