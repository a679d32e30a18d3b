pub mod archive;
pub mod notification;
pub mod processor;
pub mod resizer;
pub mod storage;
