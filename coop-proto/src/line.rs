//! Line reassembly for the reply direction.
//!
//! Serial reads return arbitrary chunks: a frame may arrive split across
//! reads, and one read may carry several frames. [`LineBuffer`] accumulates
//! bytes and hands out complete lines in arrival order. How the stream is
//! chunked never changes which lines come out.

use std::collections::VecDeque;
use std::mem;

use bytes::BytesMut;

use crate::codec::{TERMINATOR, decode};
use crate::message::Reply;

/// Longest line kept in full. Bytes past it are dropped up to the terminator.
pub const MAX_LINE_LEN: usize = 256;

/// A terminated line taken from a [`LineBuffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// A line of at most [`MAX_LINE_LEN`] bytes, terminator stripped.
    Complete(Vec<u8>),
    /// A line longer than [`MAX_LINE_LEN`] bytes.
    Overlong {
        /// The first [`MAX_LINE_LEN`] bytes.
        prefix: Vec<u8>,
        /// Number of bytes dropped after the prefix.
        dropped: usize,
    },
}

impl Line {
    /// Classifies the line. Overlong lines are always [`Reply::Malformed`].
    pub fn into_reply(self) -> Reply {
        match self {
            Self::Complete(bytes) => decode(&bytes),
            Self::Overlong { prefix, .. } => Reply::Malformed { raw: prefix },
        }
    }
}

/// Accumulates received bytes and splits them on the frame terminator.
#[derive(Debug, Default)]
pub struct LineBuffer {
    /// Kept bytes of the unterminated line, at most [`MAX_LINE_LEN`].
    partial: BytesMut,
    /// Bytes of the unterminated line dropped past [`MAX_LINE_LEN`].
    dropped: usize,
    /// Terminated lines not yet taken.
    ready: VecDeque<Line>,
}

impl LineBuffer {
    /// Creates an empty line buffer.
    pub fn new() -> Self {
        Self {
            partial: BytesMut::with_capacity(MAX_LINE_LEN),
            dropped: 0,
            ready: VecDeque::new(),
        }
    }

    /// Appends received data.
    pub fn push(&mut self, mut data: &[u8]) {
        while let Some(end) = data.iter().position(|&b| b == TERMINATOR) {
            self.extend(&data[..end]);
            self.finish_line();
            data = &data[end + 1..];
        }
        self.extend(data);
    }

    /// Returns the next terminated line. Empty lines are returned as well.
    pub fn next_line(&mut self) -> Option<Line> {
        self.ready.pop_front()
    }

    /// Number of received bytes of the unterminated line, dropped ones included.
    pub fn buffered_len(&self) -> usize {
        self.partial.len() + self.dropped
    }

    /// Drops the unterminated line and any lines not yet taken.
    pub fn clear(&mut self) {
        self.partial.clear();
        self.dropped = 0;
        self.ready.clear();
    }

    fn extend(&mut self, bytes: &[u8]) {
        let keep = bytes.len().min(MAX_LINE_LEN - self.partial.len());
        self.partial.extend_from_slice(&bytes[..keep]);
        self.dropped += bytes.len() - keep;
    }

    fn finish_line(&mut self) {
        let bytes = self.partial.split().to_vec();
        let line = match mem::take(&mut self.dropped) {
            0 => Line::Complete(bytes),
            dropped => Line::Overlong {
                prefix: bytes,
                dropped,
            },
        };
        self.ready.push_back(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(bytes: &[u8]) -> Option<Line> {
        Some(Line::Complete(bytes.to_vec()))
    }

    /// Feeds `stream` split at `cuts` and collects every line.
    fn lines_of(stream: &[u8], cuts: &[usize]) -> Vec<Line> {
        let mut lines = LineBuffer::new();
        let mut start = 0;
        for &cut in cuts.iter().chain([stream.len()].iter()) {
            lines.push(&stream[start..cut]);
            start = cut;
        }
        std::iter::from_fn(|| lines.next_line()).collect()
    }

    #[test]
    fn splits_multiple_lines_in_one_chunk() {
        let mut lines = LineBuffer::new();
        lines.push(b"CC\nCCX\n");

        assert_eq!(lines.next_line(), complete(b"CC"));
        assert_eq!(lines.next_line(), complete(b"CCX"));
        assert!(lines.next_line().is_none());
        assert_eq!(lines.buffered_len(), 0);
    }

    #[test]
    fn reassembles_partial_line() {
        let mut lines = LineBuffer::new();
        lines.push(b"CCR");
        assert!(lines.next_line().is_none());
        assert_eq!(lines.buffered_len(), 3);

        lines.push(b"Tfoo\nCC");
        assert_eq!(lines.next_line(), complete(b"CCRTfoo"));
        assert!(lines.next_line().is_none());
        assert_eq!(lines.buffered_len(), 2);
    }

    #[test]
    fn yields_empty_lines() {
        let mut lines = LineBuffer::new();
        lines.push(b"\n\n");
        assert_eq!(lines.next_line(), complete(b""));
        assert_eq!(lines.next_line(), complete(b""));
        assert!(lines.next_line().is_none());
    }

    #[test]
    fn line_of_exactly_max_len_is_complete() {
        let mut stream = vec![b'x'; MAX_LINE_LEN];
        stream.push(TERMINATOR);
        assert_eq!(
            lines_of(&stream, &[100]),
            vec![Line::Complete(vec![b'x'; MAX_LINE_LEN])]
        );
    }

    #[test]
    fn overlong_line_keeps_prefix_and_counts_the_rest() {
        let mut lines = LineBuffer::new();
        lines.push(&[b'x'; MAX_LINE_LEN + 10]);
        assert!(lines.next_line().is_none());
        assert_eq!(lines.buffered_len(), MAX_LINE_LEN + 10);

        lines.push(b"yy\nCC\n");
        assert_eq!(
            lines.next_line(),
            Some(Line::Overlong {
                prefix: vec![b'x'; MAX_LINE_LEN],
                dropped: 12,
            })
        );
        assert_eq!(lines.next_line(), complete(b"CC"));
    }

    #[test]
    fn chunking_does_not_change_lines() {
        let mut stream = b"CC\nCCRT".to_vec();
        stream.extend(std::iter::repeat_n(b'9', 297));
        stream.extend_from_slice(b"\nCCRT12:00\n");

        let reference = lines_of(&stream, &[]);
        assert_eq!(reference.len(), 3);
        let chunkings: [&[usize]; 4] = [&[259], &[203, 283], &[1, 2, 3, 4, 5], &[100, 300, 303, 305]];
        for cuts in chunkings {
            assert_eq!(lines_of(&stream, cuts), reference, "cuts {cuts:?}");
        }
    }

    #[test]
    fn overlong_lines_are_malformed() {
        let mut stream = b"CCRT".to_vec();
        stream.extend(std::iter::repeat_n(b'0', 297));
        stream.push(TERMINATOR);

        let replies: Vec<Reply> = lines_of(&stream, &[200, 280])
            .into_iter()
            .map(Line::into_reply)
            .collect();
        assert_eq!(replies.len(), 1);
        assert!(matches!(&replies[0], Reply::Malformed { raw } if raw.len() == MAX_LINE_LEN));
    }

    #[test]
    fn clear_drops_partial_line() {
        let mut lines = LineBuffer::new();
        lines.push(&[b'x'; MAX_LINE_LEN + 1]);
        lines.clear();
        assert_eq!(lines.buffered_len(), 0);
        lines.push(b"CC\n");
        assert_eq!(lines.next_line(), complete(b"CC"));
    }
}
