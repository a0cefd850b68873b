//! Incremental decoder for `Transfer-Encoding: chunked` bodies.
//!
//! The decoder never copies data. Each call reports how many input bytes it
//! consumed and, when it reached chunk payload, the range of that payload in
//! the input. Callers that re-frame a body collect the payload ranges;
//! callers that relay a body verbatim forward the consumed bytes as they are.

use std::ops::Range;

use crate::http::parser::ParseError;

/// Longest accepted chunk-size or trailer line
const MAX_LINE: usize = 8 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkEvent {
    /// Payload bytes at this range of the input
    Data(Range<usize>),
    /// The input ended mid-frame; feed more bytes
    NeedMore,
    /// The last chunk and trailers were consumed
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Size,
    Data(u64),
    DataEnd,
    Trailer,
    Done,
}

#[derive(Debug)]
pub struct ChunkedDecoder {
    state: State,
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: State::Size }
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Advances through `input`, stopping at the first payload slice, at
    /// the end of the input, or at the end of the body.
    ///
    /// Returns the number of bytes consumed from the front of `input`.
    pub fn decode(&mut self, input: &[u8]) -> Result<(usize, ChunkEvent), ParseError> {
        let mut pos = 0;

        loop {
            match self.state {
                State::Size => {
                    let Some(line) = next_line(&input[pos..])? else {
                        return Ok((pos, ChunkEvent::NeedMore));
                    };
                    let size = parse_chunk_size(&input[pos..pos + line])?;
                    pos += line + 2;

                    self.state = if size == 0 {
                        State::Trailer
                    } else {
                        State::Data(size)
                    };
                }

                State::Data(remaining) => {
                    let available = (input.len() - pos) as u64;
                    if available == 0 {
                        return Ok((pos, ChunkEvent::NeedMore));
                    }

                    let take = remaining.min(available) as usize;
                    let range = pos..pos + take;
                    pos += take;

                    let left = remaining - take as u64;
                    self.state = if left == 0 {
                        State::DataEnd
                    } else {
                        State::Data(left)
                    };
                    return Ok((pos, ChunkEvent::Data(range)));
                }

                State::DataEnd => {
                    if input.len() - pos < 2 {
                        return Ok((pos, ChunkEvent::NeedMore));
                    }
                    if &input[pos..pos + 2] != b"\r\n" {
                        return Err(ParseError::InvalidChunk);
                    }
                    pos += 2;
                    self.state = State::Size;
                }

                State::Trailer => {
                    let Some(line) = next_line(&input[pos..])? else {
                        return Ok((pos, ChunkEvent::NeedMore));
                    };
                    pos += line + 2;

                    // Trailer fields are skipped; an empty line ends the body.
                    if line == 0 {
                        self.state = State::Done;
                        return Ok((pos, ChunkEvent::Done));
                    }
                }

                State::Done => return Ok((pos, ChunkEvent::Done)),
            }
        }
    }
}

/// Length of the next CRLF-terminated line, excluding the CRLF.
fn next_line(input: &[u8]) -> Result<Option<usize>, ParseError> {
    match input.windows(2).position(|w| w == b"\r\n") {
        Some(pos) if pos > MAX_LINE => Err(ParseError::InvalidChunk),
        Some(pos) => Ok(Some(pos)),
        None if input.len() > MAX_LINE => Err(ParseError::InvalidChunk),
        None => Ok(None),
    }
}

fn parse_chunk_size(line: &[u8]) -> Result<u64, ParseError> {
    let line = std::str::from_utf8(line).map_err(|_| ParseError::InvalidChunk)?;
    // Chunk extensions (";name=value") are ignored.
    let size = line.split(';').next().unwrap_or("").trim();

    if size.is_empty() || size.len() > 16 {
        return Err(ParseError::InvalidChunk);
    }
    u64::from_str_radix(size, 16).map_err(|_| ParseError::InvalidChunk)
}
