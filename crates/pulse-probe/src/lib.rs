pub mod dispatch;
pub mod http;
pub mod ping;
pub mod prober;

pub use dispatch::{PingOptions, TargetProber};
pub use http::HttpProber;
pub use ping::{parse_ping_output, PingProber, PingTransport, SystemPing};
pub use prober::Prober;
