pub mod endpoint;
pub mod file_exist;
pub mod target;
