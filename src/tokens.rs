//! Codebook token streams produced by the music generator.

use anyhow::{Result, ensure};

/// A rank-3 buffer of codebook indices laid out as `batch × codebooks × frames`.
///
/// Only the time (frame) axis is ever sliced or concatenated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenStream {
    batch: usize,
    codebooks: usize,
    frames: usize,
    codes: Vec<u32>,
}

impl TokenStream {
    /// Build a stream from row-major codes (`[b][k][t]`).
    pub fn new(batch: usize, codebooks: usize, frames: usize, codes: Vec<u32>) -> Result<Self> {
        ensure!(
            codes.len() == batch * codebooks * frames,
            "token buffer has {} codes, expected {batch}x{codebooks}x{frames}",
            codes.len()
        );
        Ok(Self {
            batch,
            codebooks,
            frames,
            codes,
        })
    }

    /// Build a single-batch stream from one row of codes per codebook.
    pub fn from_rows(rows: &[Vec<u32>]) -> Result<Self> {
        let frames = rows.first().map_or(0, Vec::len);
        ensure!(
            rows.iter().all(|r| r.len() == frames),
            "codebook rows have different lengths"
        );
        let codes = rows.iter().flatten().copied().collect();
        Self::new(1, rows.len(), frames, codes)
    }

    pub fn batch(&self) -> usize {
        self.batch
    }

    pub fn codebooks(&self) -> usize {
        self.codebooks
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    pub fn codes(&self) -> &[u32] {
        &self.codes
    }

    /// Codes of one `(batch, codebook)` row across all frames.
    pub fn row(&self, batch: usize, codebook: usize) -> &[u32] {
        let start = (batch * self.codebooks + codebook) * self.frames;
        &self.codes[start..start + self.frames]
    }

    /// Frames `[start, end)` of every row.
    pub fn slice_frames(&self, start: usize, end: usize) -> TokenStream {
        let end = end.min(self.frames);
        let start = start.min(end);
        let frames = end - start;

        let mut codes = Vec::with_capacity(self.batch * self.codebooks * frames);
        for b in 0..self.batch {
            for k in 0..self.codebooks {
                codes.extend_from_slice(&self.row(b, k)[start..end]);
            }
        }

        TokenStream {
            batch: self.batch,
            codebooks: self.codebooks,
            frames,
            codes,
        }
    }

    /// The last `frames` frames (the whole stream if it is shorter).
    pub fn tail(&self, frames: usize) -> TokenStream {
        self.slice_frames(self.frames.saturating_sub(frames), self.frames)
    }

    /// Concatenate `other` after `self` along the time axis.
    pub fn concat_time(&self, other: &TokenStream) -> Result<TokenStream> {
        ensure!(
            self.batch == other.batch && self.codebooks == other.codebooks,
            "cannot concatenate {}x{} tokens with {}x{} tokens",
            self.batch,
            self.codebooks,
            other.batch,
            other.codebooks
        );

        let frames = self.frames + other.frames;
        let mut codes = Vec::with_capacity(self.batch * self.codebooks * frames);
        for b in 0..self.batch {
            for k in 0..self.codebooks {
                codes.extend_from_slice(self.row(b, k));
                codes.extend_from_slice(other.row(b, k));
            }
        }

        Ok(TokenStream {
            batch: self.batch,
            codebooks: self.codebooks,
            frames,
            codes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream() -> TokenStream {
        TokenStream::from_rows(&[vec![1, 2, 3, 4], vec![10, 20, 30, 40]]).expect("valid rows")
    }

    #[test]
    fn tail_keeps_the_last_frames_of_every_codebook() {
        let tail = stream().tail(2);
        assert_eq!(tail.frames(), 2);
        assert_eq!(tail.row(0, 0), &[3, 4]);
        assert_eq!(tail.row(0, 1), &[30, 40]);
    }

    #[test]
    fn tail_longer_than_stream_is_the_whole_stream() {
        assert_eq!(stream().tail(100), stream());
    }

    #[test]
    fn concat_joins_along_time() -> anyhow::Result<()> {
        let joined = stream().tail(1).concat_time(&stream())?;
        assert_eq!(joined.frames(), 5);
        assert_eq!(joined.row(0, 0), &[4, 1, 2, 3, 4]);
        assert_eq!(joined.row(0, 1), &[40, 10, 20, 30, 40]);
        Ok(())
    }

    #[test]
    fn concat_rejects_mismatched_codebooks() {
        let other = TokenStream::from_rows(&[vec![1, 2]]).expect("valid rows");
        assert!(stream().concat_time(&other).is_err());
    }

    #[test]
    fn new_validates_the_buffer_size() {
        assert!(TokenStream::new(1, 4, 10, vec![0; 39]).is_err());
        assert!(TokenStream::new(1, 4, 10, vec![0; 40]).is_ok());
    }
}
