//! Output never exceeds its source.
//!
//! Only byte length is compared; an output that is smaller but undecodable
//! passes unnoticed.

use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

pub struct SizeGuard;

impl SizeGuard {
    /// Replaces `output` with a verbatim copy of `source` when it came out larger.
    ///
    /// Returns the final size of `output`.
    pub fn enforce(source: &Path, output: &Path, original_size: u64) -> io::Result<u64> {
        let compressed_size = fs::metadata(output)?.len();
        if compressed_size <= original_size {
            return Ok(compressed_size);
        }

        debug!(
            "{} grew from {} to {} bytes, keeping the original",
            output.display(),
            original_size,
            compressed_size
        );
        fs::copy(source, output)?;
        Ok(original_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_larger_output_is_replaced_by_source() {
        let dir = TempDir::new().unwrap();
        let (source, output) = (dir.path().join("s.png"), dir.path().join("o.png"));
        fs::write(&source, b"small").unwrap();
        fs::write(&output, b"considerably larger").unwrap();

        assert_eq!(SizeGuard::enforce(&source, &output, 5).unwrap(), 5);
        assert_eq!(fs::read(&output).unwrap(), b"small");
    }

    #[test]
    fn test_smaller_output_is_kept() {
        let dir = TempDir::new().unwrap();
        let (source, output) = (dir.path().join("s.png"), dir.path().join("o.png"));
        fs::write(&source, b"the original").unwrap();
        fs::write(&output, b"tiny").unwrap();

        assert_eq!(SizeGuard::enforce(&source, &output, 12).unwrap(), 4);
        assert_eq!(fs::read(&output).unwrap(), b"tiny");
    }
}
