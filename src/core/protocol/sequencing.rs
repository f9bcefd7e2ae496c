use super::{ClientEnvelope, ProtocolError, ProtocolResult};

/// Per-direction sequence counters for one session.
///
/// Inbound: an envelope is accepted only when its `seq` is exactly one past
/// the last accepted one, it does not acknowledge a server sequence number we
/// have not issued, and its `id` matches the session. Outbound: every stamp
/// increments the server counter and echoes the client counter.
#[derive(Debug, Clone, Default)]
pub struct SequenceTracker {
    last_client_seq: u64,
    last_server_seq: u64,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_client_seq(&self) -> u64 {
        self.last_client_seq
    }

    pub fn last_server_seq(&self) -> u64 {
        self.last_server_seq
    }

    /// Validate an inbound envelope and advance the client counter.
    ///
    /// Checks run in a fixed order (sequence, acknowledgment, session id) and
    /// the counter is left untouched when any of them fails.
    pub fn accept(&mut self, envelope: &ClientEnvelope, session_id: &str) -> ProtocolResult<()> {
        let expected = self.last_client_seq + 1;
        if envelope.seq != expected {
            return Err(ProtocolError::UnexpectedSequence {
                expected,
                received: envelope.seq,
            });
        }

        if envelope.serverseq > self.last_server_seq {
            return Err(ProtocolError::ServerSequenceAhead {
                acknowledged: envelope.serverseq,
                issued: self.last_server_seq,
            });
        }

        if envelope.id != session_id {
            return Err(ProtocolError::SessionMismatch {
                expected: session_id.to_string(),
                received: envelope.id.clone(),
            });
        }

        self.last_client_seq = envelope.seq;
        Ok(())
    }

    /// Reserve the next outbound sequence number.
    ///
    /// Returns `(seq, clientseq)` for the envelope being built.
    pub fn stamp(&mut self) -> (u64, u64) {
        self.last_server_seq += 1;
        (self.last_server_seq, self.last_client_seq)
    }
}
