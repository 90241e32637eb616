pub mod codec;
pub mod fletcher;
pub mod frame;
pub mod stats;
pub mod stream_parser;

pub use codec::LocalCodec;
pub use fletcher::FletcherAccumulator;
pub use frame::{Frame, FrameType};
pub use stats::{ChannelStats, GlobalStats, StatsSnapshot};
pub use stream_parser::{DecodeEvent, ParserState, StreamParser};
