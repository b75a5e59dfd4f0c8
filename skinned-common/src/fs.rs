//! Filesystem helpers shared by the codecs.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{FormatError, Result};

/// Maximum size of an asset file read into memory.
pub const MAX_ASSET_BYTES: u64 = 256 * 1024 * 1024; // 256 MiB

/// Opens `path` for buffered reading, rejecting files over `max_bytes`.
pub fn open_with_limit(path: &Path, max_bytes: u64) -> Result<BufReader<File>> {
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    if len > max_bytes {
        return Err(FormatError::decode(format!(
            "file too large: {} ({} bytes, max {} bytes)",
            path.display(),
            len,
            max_bytes
        )));
    }
    Ok(BufReader::new(file))
}

/// Creates `path` and runs `write` against it.
///
/// If `write` or the final flush fails, the partially written file is removed before the error
/// is returned.
pub fn write_with_cleanup<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    let result = write(&mut writer).and_then(|()| writer.flush().map_err(FormatError::from));
    drop(writer);

    if let Err(err) = result {
        if let Err(remove_err) = std::fs::remove_file(path) {
            tracing::warn!(
                "Failed to remove partial file {}: {}",
                path.display(),
                remove_err
            );
        }
        return Err(err);
    }
    Ok(())
}
