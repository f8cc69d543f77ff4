//! Outbound stream of response messages
//!
//! The transport hands the read service a `ResponseSink`. A send either
//! delivers the message in order or fails; a failed sink is never retried.

use std::io::Write;
use std::sync::mpsc::{Sender, SyncSender};

use tsread_core::{Error, Result};
use tsread_wire::{write_message, ReadResponse};

/// Destination of the messages of one read call.
pub trait ResponseSink {
    /// Deliver one message, blocking for back-pressure if needed.
    ///
    /// # Errors
    ///
    /// Returns `StreamSend` if the peer is gone or the transport failed.
    fn send(&mut self, response: ReadResponse) -> Result<()>;
}

impl<K: ResponseSink + ?Sized> ResponseSink for &mut K {
    fn send(&mut self, response: ReadResponse) -> Result<()> {
        (**self).send(response)
    }
}

impl<K: ResponseSink + ?Sized> ResponseSink for Box<K> {
    fn send(&mut self, response: ReadResponse) -> Result<()> {
        (**self).send(response)
    }
}

/// Collects every message; never fails
impl ResponseSink for Vec<ReadResponse> {
    fn send(&mut self, response: ReadResponse) -> Result<()> {
        self.push(response);
        Ok(())
    }
}

/// Bounded channel: a full channel blocks the read, a dropped receiver is a
/// cancelled peer
impl ResponseSink for SyncSender<ReadResponse> {
    fn send(&mut self, response: ReadResponse) -> Result<()> {
        SyncSender::send(self, response)
            .map_err(|_| Error::StreamSend("receiver disconnected".to_string()))
    }
}

impl ResponseSink for Sender<ReadResponse> {
    fn send(&mut self, response: ReadResponse) -> Result<()> {
        Sender::send(self, response)
            .map_err(|_| Error::StreamSend("receiver disconnected".to_string()))
    }
}

/// Writes each message with the length-prefixed wire codec and flushes it
#[derive(Debug)]
pub struct WriterSink<W: Write> {
    writer: W,
}

impl<W: Write> WriterSink<W> {
    /// Wrap a writer
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ResponseSink for WriterSink<W> {
    fn send(&mut self, response: ReadResponse) -> Result<()> {
        write_message(&mut self.writer, &response)
            .and_then(|()| self.writer.flush().map_err(Error::from))
            .map_err(|e| Error::StreamSend(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::mpsc;
    use tsread_wire::read_message;

    #[test]
    fn test_sync_sender_reports_disconnect() {
        let (mut tx, rx) = mpsc::sync_channel::<ReadResponse>(1);
        ResponseSink::send(&mut tx, ReadResponse::default()).unwrap();
        assert!(rx.recv().unwrap().is_empty());
        drop(rx);
        let err = ResponseSink::send(&mut tx, ReadResponse::default()).unwrap_err();
        assert!(err.is_send());
    }

    #[test]
    fn test_writer_sink_frames_messages() {
        let mut sink = WriterSink::new(Vec::new());
        sink.send(ReadResponse::default()).unwrap();
        sink.send(ReadResponse::default()).unwrap();
        let mut r = Cursor::new(sink.into_inner());
        assert!(read_message::<_, ReadResponse>(&mut r).unwrap().is_some());
        assert!(read_message::<_, ReadResponse>(&mut r).unwrap().is_some());
        assert!(read_message::<_, ReadResponse>(&mut r).unwrap().is_none());
    }

    #[test]
    fn test_writer_sink_maps_io_failure() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        let mut sink = WriterSink::new(Broken);
        assert!(sink.send(ReadResponse::default()).unwrap_err().is_send());
    }
}
