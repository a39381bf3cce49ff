// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The decode-session boundary: feeding the engine and publishing decoded frames as pooled
//! buffers.
//!
//! The engine itself (codec selection, hardware context setup, the actual decode calls) is a
//! black box behind [`DecodeEngine`]. The session's job starts when the engine reports a
//! frame ready: take a slot from the pool, move the frame into it, hand the caller a
//! reference-counted buffer. The caller's final release is the only path back into the pool.

use std::sync::Arc;

use log::debug;
use log::error;
use thiserror::Error;

use crate::drm::DrmDevice;
use crate::frame::DecodedFrame;
use crate::pool::PrimeBufferPool;
use crate::pool::PrimeVideoBuffer;

/// One demuxed compressed packet, borrowed from the caller for the duration of the send.
#[derive(Clone, Copy, Debug)]
pub struct Packet<'a> {
    pub data: &'a [u8],
    /// Presentation timestamp in the engine's time base.
    pub pts: Option<i64>,
    /// Decode timestamp in the engine's time base.
    pub dts: Option<i64>,
}

/// Outcome of feeding a packet to the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendStatus {
    /// The packet was consumed.
    Accepted,
    /// The engine's input queue is full; drain pictures with `next_picture` and resend.
    TryAgain,
    /// The engine already saw end of stream and will accept no further input.
    EndOfStream,
}

/// What the engine produced on a receive call.
pub enum EngineEvent<F> {
    /// A decoded hardware frame, ownership transferred to the caller.
    Frame(F),
    /// No picture available until more input is sent.
    NeedsData,
    /// The stream is fully drained.
    EndOfStream,
}

/// Errors surfaced by the decode engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("not enough hardware resources to back the frame")]
    OutOfResources,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The hardware decode engine collaborating with the session.
///
/// Implementations own packet parsing and the decode call sequence; the session only moves
/// data across this boundary.
pub trait DecodeEngine {
    type Frame: DecodedFrame;

    /// Feeds one compressed packet.
    fn send_packet(&mut self, packet: Packet) -> Result<SendStatus, EngineError>;

    /// Asks for the next decoded frame.
    fn receive_frame(&mut self) -> Result<EngineEvent<Self::Frame>, EngineError>;

    /// Signals end of input so remaining queued pictures flush out through `receive_frame`.
    fn begin_drain(&mut self) -> Result<(), EngineError>;

    /// Discards all queued input and pending pictures, e.g. on seek.
    fn flush(&mut self) -> Result<(), EngineError>;
}

/// A decode failure for a single picture. The session and its pool remain usable.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("not enough hardware resources to back the frame")]
    OutOfResources,
    #[error("decode engine failure: {0}")]
    Engine(#[source] anyhow::Error),
}

impl From<EngineError> for DecodeError {
    fn from(e: EngineError) -> DecodeError {
        match e {
            EngineError::OutOfResources => DecodeError::OutOfResources,
            EngineError::Other(e) => DecodeError::Engine(e),
        }
    }
}

/// Result of asking the session for the next picture.
pub enum PictureEvent<F> {
    /// A published buffer holding the decoded frame, at reference count one.
    Picture(PrimeVideoBuffer<F>),
    /// Send more input first.
    NeedsData,
    /// All pictures delivered.
    EndOfStream,
}

/// A hardware decode session publishing decoded frames through a buffer pool.
///
/// Whether this decode path exists at all is the caller's capability decision; construction
/// takes the negotiated device explicitly and consults no global state.
pub struct DecodeSession<E: DecodeEngine> {
    engine: E,
    pool: Arc<PrimeBufferPool<E::Frame>>,
    draining: bool,
}

impl<E: DecodeEngine> DecodeSession<E> {
    pub fn new(engine: E, device: Arc<dyn DrmDevice>) -> DecodeSession<E> {
        DecodeSession {
            engine,
            pool: PrimeBufferPool::new(device),
            draining: false,
        }
    }

    /// The pool backing this session's published buffers.
    pub fn pool(&self) -> &Arc<PrimeBufferPool<E::Frame>> {
        &self.pool
    }

    /// Feeds one compressed packet to the engine.
    pub fn send(&mut self, packet: Packet) -> Result<SendStatus, DecodeError> {
        let status = self.engine.send_packet(packet).map_err(|e| {
            error!("send packet failed: {}", e);
            DecodeError::from(e)
        })?;
        Ok(status)
    }

    /// Signals end of input; subsequent `next_picture` calls flush out the queued pictures
    /// and finish with [`PictureEvent::EndOfStream`].
    pub fn begin_drain(&mut self) -> Result<(), DecodeError> {
        if !self.draining {
            self.engine.begin_drain()?;
            self.draining = true;
        }
        Ok(())
    }

    /// Returns the next decoded picture as a reference-counted buffer, or reports that the
    /// engine needs input or reached end of stream.
    ///
    /// On success the buffer is at reference count one and the caller's eventual release (of
    /// it and every clone) recycles the slot. A failure is picture-level; the session stays
    /// usable for the next call.
    pub fn next_picture(&mut self) -> Result<PictureEvent<E::Frame>, DecodeError> {
        let frame = match self.engine.receive_frame() {
            Ok(EngineEvent::Frame(frame)) => frame,
            Ok(EngineEvent::NeedsData) => return Ok(PictureEvent::NeedsData),
            Ok(EngineEvent::EndOfStream) => {
                self.draining = false;
                return Ok(PictureEvent::EndOfStream);
            }
            Err(e) => {
                error!("receive frame failed: {}", e);
                return Err(e.into());
            }
        };

        let buffer = self.pool.get();
        buffer.reset(frame);
        debug!(
            "published frame in slot {} ({} slots total)",
            buffer.id(),
            self.pool.num_slots()
        );
        Ok(PictureEvent::Picture(buffer))
    }

    /// Flushes the engine, e.g. on seek. Buffers already published stay valid and return to
    /// the pool through their holders' releases as usual.
    pub fn reset(&mut self) -> Result<(), DecodeError> {
        self.engine.flush()?;
        self.draining = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io;

    use super::*;
    use crate::frame::Fourcc;
    use crate::frame::FrameDescriptor;
    use crate::frame::FrameMetadata;

    struct NullDevice;

    impl DrmDevice for NullDevice {
        fn remove_framebuffer(&self, _fb_id: u32) -> io::Result<()> {
            Ok(())
        }

        fn close_buffer(&self, _handle: u32) -> io::Result<()> {
            Ok(())
        }
    }

    struct TestFrame {
        descriptor: FrameDescriptor,
        metadata: FrameMetadata,
    }

    impl TestFrame {
        fn new(pts: i64) -> TestFrame {
            TestFrame {
                descriptor: FrameDescriptor {
                    fourcc: Fourcc::new(b'N', b'V', b'1', b'2'),
                    width: 320,
                    height: 240,
                    objects: Vec::new(),
                    planes: Vec::new(),
                },
                metadata: FrameMetadata {
                    width: 320,
                    height: 240,
                    pts: Some(pts),
                    ..Default::default()
                },
            }
        }
    }

    impl DecodedFrame for TestFrame {
        fn descriptor(&self) -> &FrameDescriptor {
            &self.descriptor
        }

        fn metadata(&self) -> &FrameMetadata {
            &self.metadata
        }
    }

    /// Plays back a scripted sequence of receive results.
    struct ScriptedEngine {
        events: VecDeque<Result<EngineEvent<TestFrame>, EngineError>>,
        drained: bool,
        flushed: bool,
    }

    impl ScriptedEngine {
        fn new(events: Vec<Result<EngineEvent<TestFrame>, EngineError>>) -> ScriptedEngine {
            ScriptedEngine {
                events: events.into(),
                drained: false,
                flushed: false,
            }
        }
    }

    impl DecodeEngine for ScriptedEngine {
        type Frame = TestFrame;

        fn send_packet(&mut self, _packet: Packet) -> Result<SendStatus, EngineError> {
            Ok(SendStatus::Accepted)
        }

        fn receive_frame(&mut self) -> Result<EngineEvent<TestFrame>, EngineError> {
            self.events
                .pop_front()
                .unwrap_or(Ok(EngineEvent::NeedsData))
        }

        fn begin_drain(&mut self) -> Result<(), EngineError> {
            self.drained = true;
            Ok(())
        }

        fn flush(&mut self) -> Result<(), EngineError> {
            self.flushed = true;
            Ok(())
        }
    }

    fn new_session(
        events: Vec<Result<EngineEvent<TestFrame>, EngineError>>,
    ) -> DecodeSession<ScriptedEngine> {
        DecodeSession::new(ScriptedEngine::new(events), Arc::new(NullDevice))
    }

    #[test]
    fn publishes_frames_through_the_pool() {
        let mut session = new_session(vec![
            Ok(EngineEvent::Frame(TestFrame::new(100))),
            Ok(EngineEvent::NeedsData),
        ]);

        let buffer = match session.next_picture().unwrap() {
            PictureEvent::Picture(buffer) => buffer,
            _ => panic!("expected a picture"),
        };
        assert_eq!(buffer.metadata().pts, Some(100));
        assert_eq!(session.pool().num_in_flight(), 1);

        assert!(matches!(
            session.next_picture().unwrap(),
            PictureEvent::NeedsData
        ));

        drop(buffer);
        assert_eq!(session.pool().num_free(), 1);
    }

    #[test]
    fn out_of_resources_is_picture_level() {
        let mut session = new_session(vec![
            Err(EngineError::OutOfResources),
            Ok(EngineEvent::Frame(TestFrame::new(33))),
        ]);

        assert!(matches!(
            session.next_picture(),
            Err(DecodeError::OutOfResources)
        ));

        // The pool stays usable and the next picture decodes normally.
        match session.next_picture().unwrap() {
            PictureEvent::Picture(buffer) => assert_eq!(buffer.metadata().pts, Some(33)),
            _ => panic!("expected a picture"),
        }
    }

    #[test]
    fn drain_runs_to_end_of_stream() {
        let mut session = new_session(vec![
            Ok(EngineEvent::Frame(TestFrame::new(1))),
            Ok(EngineEvent::EndOfStream),
        ]);

        session.begin_drain().unwrap();
        session.begin_drain().unwrap();
        assert!(session.engine.drained);

        assert!(matches!(
            session.next_picture().unwrap(),
            PictureEvent::Picture(_)
        ));
        assert!(matches!(
            session.next_picture().unwrap(),
            PictureEvent::EndOfStream
        ));
        assert!(!session.draining);
    }

    #[test]
    fn reset_flushes_the_engine() {
        let mut session = new_session(vec![Ok(EngineEvent::Frame(TestFrame::new(5)))]);

        let buffer = match session.next_picture().unwrap() {
            PictureEvent::Picture(buffer) => buffer,
            _ => panic!("expected a picture"),
        };

        session.reset().unwrap();
        assert!(session.engine.flushed);

        // A buffer published before the flush still returns through its own release.
        drop(buffer);
        assert_eq!(session.pool().num_free(), 1);
    }
}
