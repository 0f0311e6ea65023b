//! Binary XML Information Set (XBIS) codec.
//!
//! XBIS is a compact, self-describing wire representation of an XML
//! Infoset: no angle brackets, no text escaping. Element names, attribute
//! names, repeated text content, and repeated attribute values are each
//! handle-compressed into their own append-only dictionary the first time
//! they appear, then referenced by a small integer on every later
//! occurrence. Namespace declarations travel the same way, scoped to the
//! element subtree that introduced them.
//!
//! - [`Writer`]: a push-based encoder — open a document, open and close
//!   elements, write attributes and text, close the document.
//! - [`Reader`]: a pull-based decoder with a `next`/`next_token` cursor,
//!   `next` filtering down to the handful of event kinds most callers care
//!   about the way `next_token` does not.
//!
//! ## Example
//!
//! ```rust,no_run
//! use xbis::{Reader, Writer};
//!
//! # fn main() -> xbis::Result<()> {
//! let mut buf = Vec::new();
//! let mut writer = Writer::new(&mut buf)?;
//! writer.write_xml_decl()?;
//! writer.start_tag_open("", "", "greeting")?;
//! writer.close_start_tag()?;
//! writer.write_text_content("hello")?;
//! writer.end_tag("", "", "greeting")?;
//! writer.close()?;
//!
//! let mut reader = Reader::new(buf.as_slice())?;
//! while reader.next()? != xbis::EventType::EndDocument {}
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

mod error;
mod format;
mod io;
mod name;
mod namespace;
mod primitive;
mod shared;

pub mod events;
pub mod reader;
pub mod writer;

pub use error::{Error, Result};
pub use events::attributes::{Attribute, Attributes};
pub use events::EventType;
pub use reader::Reader;
pub use writer::Writer;
