//! Summary stream events

use crate::errors::ClientError;

/// One incremental fragment of a generated answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamToken {
    pub text: String,
}

/// Terminal state of a summary stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    Completed(String),
    Failed(ClientError),
}

/// Tagged event yielded by a summary stream
///
/// Zero or more `Token`s are followed by at most one terminal event.
#[derive(Debug, Clone, PartialEq)]
pub enum SummaryEvent {
    Token(String),
    Completed(String),
    Failed(ClientError),
}

impl SummaryEvent {
    /// Whether this event ends the stream
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SummaryEvent::Token(_))
    }

    /// Token payload, if this is a token event
    pub fn token(&self) -> Option<StreamToken> {
        match self {
            SummaryEvent::Token(text) => Some(StreamToken { text: text.clone() }),
            _ => None,
        }
    }

    /// Terminal outcome, if this is a terminal event
    pub fn outcome(&self) -> Option<StreamOutcome> {
        match self {
            SummaryEvent::Token(_) => None,
            SummaryEvent::Completed(text) => Some(StreamOutcome::Completed(text.clone())),
            SummaryEvent::Failed(err) => Some(StreamOutcome::Failed(err.clone())),
        }
    }
}
