//! Single-writer / multi-reader blocking byte log.
//!
//! # Model
//!
//! ```text
//!                 write(bytes)            ┌──────────────────────────┐
//! capture thread ───────────────────────▶ │ StreamLog                │
//!                 finish()                │  [chunk0][chunk1][...]   │
//!                                         │  finished: bool          │
//!                                         └────────────┬─────────────┘
//!                                  read(buf) ┌─────────┴─────────┐ read(buf)
//!                                     ReaderHandle (cursor)   ReaderHandle (cursor)
//! ```
//!
//! Every reader starts at byte 0 of the log, no matter when it registers, and
//! sees the bytes in exactly the order they were written.  A read blocks only
//! while its cursor has caught up with the writer and the log is still open.
//!
//! # Quick Start
//!
//! ```rust
//! use voice_fx::stream::{StreamMultiplexer, StreamOptions};
//!
//! let stream = StreamMultiplexer::new(StreamOptions::default());
//! stream.write(&[1, 2, 3, 4]).unwrap();
//! stream.write(&[5, 6, 7, 8]).unwrap();
//!
//! let mut reader = stream.register_reader().unwrap();
//! let mut buf = [0u8; 5];
//! assert_eq!(reader.read(&mut buf).unwrap(), 5);
//! assert_eq!(buf, [1, 2, 3, 4, 5]);
//!
//! stream.finish();
//! let mut rest = [0u8; 8];
//! assert_eq!(reader.read(&mut rest).unwrap(), 3);
//! assert_eq!(&rest[..3], &[6, 7, 8]);
//! assert_eq!(reader.read(&mut rest).unwrap(), 0);
//! ```

pub mod multiplexer;
pub mod reader;

pub use multiplexer::{ReaderRegistrar, StreamError, StreamMultiplexer, StreamOptions};
pub use reader::ReaderHandle;
