pub mod http;
pub mod imaging;
pub mod inference;
pub mod pipeline;
pub mod v4l2;
