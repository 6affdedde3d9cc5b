// Core modules for the rediska connection layer
pub mod error; // Error enum + ErrorKind + Result alias
pub mod options; // Options struct, option names/values, defaults
pub mod transport; // Transport trait + TcpTransport (socket2)
pub mod connection; // Connection: connect/write/read_line/read/disconnect

// Re-export the public surface for easier access
pub use connection::{Connection, EOL};
pub use error::{Error, ErrorKind, Result};
pub use options::{OptionName, OptionValue, Options, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_WEIGHT};
pub use transport::{Endpoint, TcpTransport, Transport};
