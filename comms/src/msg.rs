use std::{borrow::Cow, io};

use crate::{
    Deserialize, Serialize,
    specs::{
        ContentRef, Identity,
        fit::{FitIns, FitRes},
        ledger::{Answer, Call, Query, TxId, TxReceipt},
    },
};

type Header = u32;
const HEADER_SIZE: usize = size_of::<Header>();

const ERR_KIND: Header = 0;
const CONTROL_KIND: Header = 1;
const BLOB_KIND: Header = 2;

/// The command for the `Control` variant of the `Msg` enum.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// First message a trainer sends once a coordinator connects to it.
    Hello { identity: Identity },
    Fit(FitIns),
    FitRes(FitRes),

    /// Read-only ledger call.
    Query(Query),
    Answer(Answer),
    /// State mutating ledger call, answered with `Pending`.
    Submit { from: Identity, call: Call },
    Pending { tx: TxId },
    /// Asks for the receipt of a previously submitted transaction.
    Receipt { tx: TxId },
    ReceiptReply(Option<TxReceipt>),

    /// Asks the blob store for the payload behind `reference`.
    Get { reference: ContentRef },
    /// The blob store's answer to a `Msg::Blob` upload.
    Stored { reference: String },
    Missing { reference: ContentRef },

    Disconnect,
}

/// The application layer message for the entire system.
#[derive(Debug)]
pub enum Msg<'a> {
    Control(Command),
    Blob(&'a [u8]),
    Err(Cow<'a, str>),
}

impl Msg<'_> {
    /// A short name for the message's kind, meant for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Msg::Control(_) => "control",
            Msg::Blob(_) => "blob",
            Msg::Err(_) => "err",
        }
    }

    fn buf_is_too_small<T>(size: usize) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("The given buffer is too small {size}, must at least be {HEADER_SIZE} bytes"),
        ))
    }

    fn invalid_kind<T>(kind: Header) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Received an invalid kind header {kind}"),
        ))
    }
}

impl<'a> Serialize<'a> for Msg<'a> {
    fn serialize(&'a self, buf: &mut Vec<u8>) -> io::Result<Option<&'a [u8]>> {
        match self {
            Msg::Err(e) => {
                buf.extend_from_slice(&ERR_KIND.to_be_bytes());
                Ok(Some(e.as_bytes()))
            }
            Msg::Control(cmd) => {
                buf.extend_from_slice(&CONTROL_KIND.to_be_bytes());
                serde_json::to_writer(&mut *buf, cmd).map_err(io::Error::other)?;
                Ok(None)
            }
            Msg::Blob(bytes) => {
                buf.extend_from_slice(&BLOB_KIND.to_be_bytes());
                Ok(Some(*bytes))
            }
        }
    }
}

impl<'a> Deserialize<'a> for Msg<'a> {
    fn deserialize(buf: &'a [u8]) -> io::Result<Self> {
        let Some((kind_buf, rest)) = buf.split_first_chunk::<HEADER_SIZE>() else {
            return Self::buf_is_too_small(buf.len());
        };

        let kind = Header::from_be_bytes(*kind_buf);

        match kind {
            ERR_KIND => {
                let text = str::from_utf8(rest)
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

                Ok(Self::Err(Cow::Borrowed(text)))
            }
            CONTROL_KIND => {
                let cmd = serde_json::from_slice(rest)?;
                Ok(Self::Control(cmd))
            }
            BLOB_KIND => Ok(Self::Blob(rest)),
            other => Self::invalid_kind(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_body(msg: &Msg<'_>) -> Vec<u8> {
        let mut buf = Vec::new();
        let tail = msg.serialize(&mut buf).unwrap().map(<[u8]>::to_vec);
        buf.extend(tail.unwrap_or_default());
        buf
    }

    #[test]
    fn control_messages_survive_encoding() {
        let cmd = Command::Fit(FitIns { round: 7 });
        let body = frame_body(&Msg::Control(cmd.clone()));

        match Msg::deserialize(&body).unwrap() {
            Msg::Control(got) => assert_eq!(got, cmd),
            other => panic!("unexpected message kind {}", other.kind()),
        }
    }

    #[test]
    fn blob_payload_is_borrowed_verbatim() {
        let payload = [9u8, 0, 1, 255];
        let body = frame_body(&Msg::Blob(&payload));

        let Msg::Blob(got) = Msg::deserialize(&body).unwrap() else {
            panic!("expected a blob");
        };
        assert_eq!(got, &payload[..]);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let body = 42u32.to_be_bytes();
        assert!(Msg::deserialize(&body).is_err());
    }

    #[test]
    fn short_buffer_is_rejected() {
        assert!(Msg::deserialize(&[0, 1]).is_err());
    }
}
