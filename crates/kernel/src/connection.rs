//! Seams to the host process: where player moves come from and where
//! rendered viewports go.

use crate::display::Viewport;

/// A batch of move characters received from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
    pub moves: String,
    /// Client-side timestamp of the batch, echoed back in the viewport.
    pub timestamp: u64,
}

/// A player's link to the outside world. Implementations must tolerate being
/// called from worker threads.
pub trait Connection: Send + Sync {
    /// Move batches received since the last call.
    fn take_moves(&self) -> Vec<MoveRequest>;

    /// Queue one pre-serialized message for delivery.
    fn send(&self, message: Vec<u8>);

    /// The client has gone away; the world removes its player.
    fn is_closed(&self) -> bool {
        false
    }
}

/// Turns a viewport into the bytes a client understands.
pub trait DisplaySerializer: Send + Sync {
    fn serialize(&self, viewport: &Viewport, out: &mut Vec<u8>);
}
