pub mod codec;
pub mod frame;
pub mod primitive;

pub use codec::Message;
