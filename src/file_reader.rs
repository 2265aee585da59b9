//! Input opening for CSV datasets
//!
//! Vendors ship their range files both plain and gzip-compressed. A `.gz`
//! extension (any case) selects transparent decompression and `-` reads
//! standard input.
//!
//! ```rust,no_run
//! use ip2mmdb::file_reader;
//! use std::io::BufRead;
//!
//! let input = file_reader::open("IP2LOCATION-LITE-DB1.IPV6.CSV.gz")?;
//! for line in input.lines().take(3) {
//!     println!("{}", line?);
//! }
//! # Ok::<(), std::io::Error>(())
//! ```

use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, stdin, BufRead, BufReader};
use std::path::Path;

/// Read buffer for input files
const BUFFER_SIZE: usize = 64 * 1024;

/// Open a dataset for reading
///
/// # Errors
///
/// Fails if the file doesn't exist or can't be opened. Corrupt gzip data
/// surfaces later, on the first read.
pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Box<dyn BufRead + Send>> {
    let path = path.as_ref();

    if path.to_str() == Some("-") {
        return Ok(Box::new(BufReader::with_capacity(BUFFER_SIZE, stdin())));
    }

    let file = File::open(path)?;
    if is_gzip(path) {
        // Concatenated members are common in split vendor downloads
        let decoder = MultiGzDecoder::new(file);
        Ok(Box::new(BufReader::with_capacity(BUFFER_SIZE, decoder)))
    } else {
        Ok(Box::new(BufReader::with_capacity(BUFFER_SIZE, file)))
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}
