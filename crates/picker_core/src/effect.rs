use crate::{MediaId, ScanOrigin, StateSnapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    ScanPage { origin: ScanOrigin },
    StartContinuousDetection,
    StopContinuousDetection,
    BroadcastState(StateSnapshot),
    CommandRejected(Rejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    UnknownMediaId(MediaId),
    NotSelected(MediaId),
}
