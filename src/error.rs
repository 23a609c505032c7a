use dnsrelay_proto::buffer::{ReaderError, WriterError};
use dnsrelay_resolver::prelude::ForwardError;

#[derive(Debug)]
pub enum HandleError {
    Store(sqlx::Error),
    Forward(ForwardError),
    Writer(WriterError),
    Reader(ReaderError),
    NoQuestion,
}

impl std::fmt::Display for HandleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "record store error: {err}"),
            Self::Forward(err) => write!(f, "forward error: {err}"),
            Self::Writer(err) => write!(f, "couldn't encode packet: {err:?}"),
            Self::Reader(err) => write!(f, "couldn't decode packet: {err}"),
            Self::NoQuestion => write!(f, "query carried no question"),
        }
    }
}

impl std::error::Error for HandleError {}

impl From<sqlx::Error> for HandleError {
    fn from(value: sqlx::Error) -> Self {
        Self::Store(value)
    }
}

impl From<ForwardError> for HandleError {
    fn from(value: ForwardError) -> Self {
        Self::Forward(value)
    }
}

impl From<WriterError> for HandleError {
    fn from(value: WriterError) -> Self {
        Self::Writer(value)
    }
}

impl From<ReaderError> for HandleError {
    fn from(value: ReaderError) -> Self {
        Self::Reader(value)
    }
}
