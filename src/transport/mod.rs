mod link;
mod pump;

pub use link::{ChannelLink, ProcessLink, WrapperMessage};
pub use pump::spawn_output_reader;
