pub mod dir;
pub mod port;

pub use dir::NativeDir;
pub use port::{NativeEnvironment, PosixPort};
