//! Data models shared by the API client and the upload core.

mod file;
mod task;
mod upload;

pub use file::*;
pub use task::*;
pub use upload::*;
