//! Pose stream input: one JSON frame per line from a file, FIFO or stdin.

use anyhow::{Result, anyhow};
use log::warn;
use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};

use crate::pose::{self, Frame};

pub struct PoseReader<R> {
    inner: R,
    line: String,
    line_no: u64,
    pub skipped: u64,
}

impl<R: BufRead> PoseReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line: String::new(),
            line_no: 0,
            skipped: 0,
        }
    }

    /// Next decodable frame, or `None` at end of stream. Blank lines are
    /// ignored; malformed ones are logged and skipped.
    pub fn next_frame(&mut self) -> io::Result<Option<Frame>> {
        loop {
            self.line.clear();
            if self.inner.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let text = self.line.trim();
            if text.is_empty() {
                continue;
            }
            match pose::decode_frame(text) {
                Ok(frame) => return Ok(Some(frame)),
                Err(e) => {
                    self.skipped += 1;
                    warn!("pose line {}: {e}", self.line_no);
                }
            }
        }
    }
}

impl<R: BufRead> Iterator for PoseReader<R> {
    type Item = io::Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}

pub fn open_path(path: &Path) -> Result<PoseReader<BufReader<File>>> {
    let f = File::open(path).map_err(|e| anyhow!("failed to open {}: {e}", path.display()))?;
    Ok(PoseReader::new(BufReader::new(f)))
}

/// `-` reads stdin.
pub fn open_arg(arg: &str) -> Result<PoseReader<Box<dyn BufRead>>> {
    let inner: Box<dyn BufRead> = if arg == "-" {
        Box::new(io::stdin().lock())
    } else {
        let f = File::open(arg).map_err(|e| anyhow!("failed to open {arg}: {e}"))?;
        Box::new(BufReader::new(f))
    };
    Ok(PoseReader::new(inner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{Pose, encode_pose};

    #[test]
    fn skips_blank_and_malformed_lines() {
        let good = encode_pose(&Pose::new(3)).unwrap();
        let text = format!("\n{good}\n{{\"tracking_id\": 1}}\nnope\n\n{good}\n");
        let mut reader = PoseReader::new(text.as_bytes());

        let frames: Vec<Frame> = reader.by_ref().map(|f| f.unwrap()).collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].bodies[0].tracking_id, 3);
        assert_eq!(reader.skipped, 2);
        assert!(reader.next_frame().unwrap().is_none());
    }
}
