use crate::framing::{Framing, DEFAULT_MAX_FRAME_BYTES};
use crate::structured_data::DuplicateIds;

/// Port the listener binds when none is given.
pub const DEFAULT_PORT: u16 = 6601;

/// Size of the per-connection read buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Runtime knobs of the listener and its connections.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub framing: Framing,
    /// Bytes per socket read. With [`Framing::PerRead`] this is also the
    /// largest message that arrives in one piece.
    pub buffer_size: usize,
    /// Frame size limit for the newline and octet-counting framings.
    pub max_frame_bytes: usize,
    /// Connections served at once, `None` for no limit.
    pub max_connections: Option<usize>,
    pub duplicate_ids: DuplicateIds,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            framing: Framing::PerRead,
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            max_connections: None,
            duplicate_ids: DuplicateIds::Preserve,
        }
    }
}
