pub mod dir;
pub mod port;
pub mod win32;

pub use dir::NativeDir;
pub use port::WindowsPort;
pub use win32::NativeEnvironment;
