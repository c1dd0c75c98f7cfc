//! Rendering of received payloads.
//!
//! The `Renderer` trait is the seam the command-line layer plugs into;
//! `StreamRenderer` is the in-process implementation that writes to any pair
//! of `Write` streams.

use std::io::{self, Write};

use serde_json::Value;

use crate::classify::{classify, ContentKind};
use crate::error::ApiError;

const BINARY_WARNING: &str = "WARNING: The response body is displayed in hex representation\n         because it is binary data.\n";

const BYTES_PER_LINE: usize = 16;

pub trait Renderer {
    fn render(&mut self, bytes: &[u8], kind: ContentKind) -> Result<(), ApiError>;

    /// Render `bytes` using the kind the classifier picks for them.
    fn render_bytes(&mut self, bytes: &[u8]) -> Result<(), ApiError> {
        self.render(bytes, classify(bytes))
    }
}

/// Hex dump in the layout of `od -t x1`: octal offsets, sixteen bytes per
/// line, repeated lines collapsed to `*`, and the total length last.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::new();
    let mut previous: Option<&[u8]> = None;
    let mut collapsed = false;

    for (idx, chunk) in bytes.chunks(BYTES_PER_LINE).enumerate() {
        if chunk.len() == BYTES_PER_LINE && previous == Some(chunk) {
            if !collapsed {
                out.push_str("*\n");
                collapsed = true;
            }
            continue;
        }
        collapsed = false;
        previous = Some(chunk);

        out.push_str(&format!("{:07o}", idx * BYTES_PER_LINE));
        for byte in chunk {
            out.push_str(&format!(" {byte:02x}"));
        }
        out.push('\n');
    }
    out.push_str(&format!("{:07o}\n", bytes.len()));
    out
}

/// Writes rendered payloads to `out`, and warnings to `err`.
pub struct StreamRenderer<O, E> {
    out: O,
    err: E,
    passthrough: bool,
}

impl<O: Write, E: Write> StreamRenderer<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self {
            out,
            err,
            passthrough: false,
        }
    }

    /// Write every payload unchanged, whatever its kind.
    pub fn passthrough(mut self, passthrough: bool) -> Self {
        self.passthrough = passthrough;
        self
    }

    pub fn into_inner(self) -> (O, E) {
        (self.out, self.err)
    }

    fn write(&mut self, bytes: &[u8], kind: ContentKind) -> io::Result<()> {
        if self.passthrough {
            self.out.write_all(bytes)?;
            return self.out.flush();
        }
        match kind {
            ContentKind::Json => {
                let value: Value = serde_json::from_slice(bytes)?;
                let mut pretty = serde_json::to_vec_pretty(&value)?;
                pretty.push(b'\n');
                self.out.write_all(&pretty)?;
            }
            ContentKind::Text => self.out.write_all(bytes)?,
            ContentKind::Binary => {
                self.err.write_all(BINARY_WARNING.as_bytes())?;
                self.err.flush()?;
                self.out.write_all(hex_dump(bytes).as_bytes())?;
            }
        }
        self.out.flush()
    }
}

impl<O: Write, E: Write> Renderer for StreamRenderer<O, E> {
    fn render(&mut self, bytes: &[u8], kind: ContentKind) -> Result<(), ApiError> {
        self.write(bytes, kind).map_err(ApiError::Render)
    }
}
