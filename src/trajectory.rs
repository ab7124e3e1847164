//! Camera input files.
//!
//! Both files are plain whitespace-separated numbers; line breaks carry no
//! meaning.
//!
//! - Intrinsics: `height width` followed by the nine entries of `K`, row by row.
//! - Trajectory: a frame count `N`, then `N` records of nine numbers each:
//!   eye xyz, look-at xyz, up xyz.
//!
//! The trajectory is read lazily, one pose per frame, so a truncated file is
//! only reported when the frame that needs the missing record comes up.

use std::fmt;
use std::path::Path;

use glam::DVec3;

use crate::camera::{CameraPose, Intrinsics};
use crate::error::{RenderError, RenderResult};

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Why a token could not be read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenError {
    /// Input ended; `index` is the zero-based index of the missing token.
    UnexpectedEof { index: usize },
    /// Token `index` is not a number of the expected kind.
    Invalid { index: usize, token: String },
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof { index } => {
                write!(f, "unexpected end of input at token {index}")
            }
            Self::Invalid { index, token } => {
                write!(f, "token {index} ({token:?}) is not a valid number")
            }
        }
    }
}

/// Cursor over whitespace-separated tokens.
#[derive(Clone, Debug)]
pub struct TokenReader<'a> {
    text: &'a str,
    pos: usize,
    index: usize,
}

impl<'a> TokenReader<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            index: 0,
        }
    }

    /// Number of tokens consumed so far.
    pub fn tokens_read(&self) -> usize {
        self.index
    }

    /// Next raw token, or `None` at end of input.
    pub fn next_token(&mut self) -> Option<&'a str> {
        let text: &'a str = self.text;
        let rest = &text[self.pos..];
        let Some(start) = rest.find(|c: char| !c.is_whitespace()) else {
            self.pos = text.len();
            return None;
        };
        let rest = &rest[start..];
        let len = rest.find(char::is_whitespace).unwrap_or(rest.len());
        self.pos += start + len;
        self.index += 1;
        Some(&rest[..len])
    }

    fn parse_next<T: std::str::FromStr>(&mut self) -> Result<T, TokenError> {
        let index = self.index;
        let token = self
            .next_token()
            .ok_or(TokenError::UnexpectedEof { index })?;
        token.parse().map_err(|_| TokenError::Invalid {
            index,
            token: token.to_string(),
        })
    }

    pub fn parse_int(&mut self) -> Result<i64, TokenError> {
        self.parse_next()
    }

    /// A finite floating-point number.
    pub fn parse_f64(&mut self) -> Result<f64, TokenError> {
        let index = self.index;
        let value: f64 = self.parse_next()?;
        if !value.is_finite() {
            return Err(TokenError::Invalid {
                index,
                token: value.to_string(),
            });
        }
        Ok(value)
    }

    pub fn parse_vec3(&mut self) -> Result<DVec3, TokenError> {
        Ok(DVec3::new(
            self.parse_f64()?,
            self.parse_f64()?,
            self.parse_f64()?,
        ))
    }

    /// Nine numbers, row by row.
    pub fn parse_mat3_rows(&mut self) -> Result<[[f64; 3]; 3], TokenError> {
        let mut rows = [[0.0; 3]; 3];
        for row in &mut rows {
            for value in row.iter_mut() {
                *value = self.parse_f64()?;
            }
        }
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Intrinsics
// ---------------------------------------------------------------------------

/// Parse intrinsics text: `height width K00 K01 K02 K10 ... K22`.
///
/// # Errors
///
/// Returns [`RenderError::MalformedIntrinsics`] on missing or non-numeric
/// tokens and non-positive dimensions.
pub fn parse_intrinsics(text: &str) -> RenderResult<Intrinsics> {
    let mut tokens = TokenReader::new(text);
    let malformed = |err: TokenError| RenderError::MalformedIntrinsics(err.to_string());
    let height = tokens.parse_int().map_err(malformed)?;
    let width = tokens.parse_int().map_err(malformed)?;
    let rows = tokens.parse_mat3_rows().map_err(malformed)?;
    let dimension = |value: i64, name: &str| {
        u32::try_from(value)
            .ok()
            .filter(|&v| v > 0)
            .ok_or_else(|| RenderError::MalformedIntrinsics(format!("{name} {value} is not positive")))
    };
    Ok(Intrinsics::from_rows(
        dimension(width, "width")?,
        dimension(height, "height")?,
        rows,
    ))
}

/// Read and parse an intrinsics file.
///
/// # Errors
///
/// [`RenderError::Io`] if the file cannot be read, otherwise as
/// [`parse_intrinsics`].
pub fn read_intrinsics(path: &Path) -> RenderResult<Intrinsics> {
    let text = std::fs::read_to_string(path).map_err(|err| RenderError::io(path, err))?;
    parse_intrinsics(&text)
}

// ---------------------------------------------------------------------------
// Trajectory
// ---------------------------------------------------------------------------

/// Lazily parsed trajectory.
///
/// Yields exactly `frame_count()` items unless a record is malformed, in
/// which case the error is yielded once and iteration stops.
#[derive(Clone, Debug)]
pub struct TrajectoryReader {
    text: String,
    pos: usize,
    tokens_read: usize,
    frame_count: usize,
    next_frame: usize,
    failed: bool,
}

impl TrajectoryReader {
    /// Parse the frame count from `text`; poses are read on iteration.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::MalformedTrajectory`] if the count is missing,
    /// non-numeric or negative.
    pub fn new(text: String) -> RenderResult<Self> {
        let mut tokens = TokenReader::new(&text);
        let count = tokens
            .parse_int()
            .map_err(|err| RenderError::MalformedTrajectory(format!("frame count: {err}")))?;
        let frame_count = usize::try_from(count).map_err(|_| {
            RenderError::MalformedTrajectory(format!("frame count {count} is negative"))
        })?;
        let (pos, tokens_read) = (tokens.pos, tokens.index);
        Ok(Self {
            text,
            pos,
            tokens_read,
            frame_count,
            next_frame: 0,
            failed: false,
        })
    }

    /// Read a trajectory file.
    ///
    /// # Errors
    ///
    /// [`RenderError::Io`] if the file cannot be read, otherwise as
    /// [`new`](Self::new).
    pub fn from_file(path: &Path) -> RenderResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|err| RenderError::io(path, err))?;
        Self::new(text)
    }

    /// Frame count declared by the file.
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    fn read_pose(&mut self) -> Result<CameraPose, TokenError> {
        let mut tokens = TokenReader {
            text: &self.text,
            pos: self.pos,
            index: self.tokens_read,
        };
        let eye = tokens.parse_vec3()?;
        let look_at = tokens.parse_vec3()?;
        let up = tokens.parse_vec3()?;
        self.pos = tokens.pos;
        self.tokens_read = tokens.index;
        Ok(CameraPose::new(eye, look_at, up))
    }
}

impl Iterator for TrajectoryReader {
    type Item = RenderResult<CameraPose>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.next_frame >= self.frame_count {
            return None;
        }
        let frame = self.next_frame;
        self.next_frame += 1;
        match self.read_pose() {
            Ok(pose) => Some(Ok(pose)),
            Err(err) => {
                self.failed = true;
                Some(Err(RenderError::MalformedTrajectory(format!(
                    "frame {frame}: {err}"
                ))))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.failed {
            0
        } else {
            self.frame_count - self.next_frame
        };
        (0, Some(remaining))
    }
}
