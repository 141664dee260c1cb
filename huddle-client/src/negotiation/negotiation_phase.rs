/// Which side of the offer/answer exchange a machine plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationRole {
    /// Saw the peer's presence announcement and sends the offer.
    Initiator,
    /// Received the peer's offer and sends the answer.
    Responder,
}

/// Initiator: `Idle → OfferCreating → CandidateGathering → OfferReady →
/// AwaitingAnswer → Connected`.
///
/// Responder: `Idle → AnswerCreating → CandidateGathering → AnswerReady →
/// Connected`.
///
/// `Failed` can follow any non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationPhase {
    Idle,
    OfferCreating,
    AnswerCreating,
    CandidateGathering,
    OfferReady,
    AnswerReady,
    AwaitingAnswer,
    Connected,
    Failed,
}

impl NegotiationPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, NegotiationPhase::Connected | NegotiationPhase::Failed)
    }
}
