pub mod descriptor;
pub mod dir;
pub mod environ;
pub mod error;
pub mod flags;
pub mod stat;
pub mod types;
pub mod unicode;
