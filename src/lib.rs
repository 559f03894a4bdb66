pub mod opensprinkler;
pub mod utils;
