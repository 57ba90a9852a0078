//! Extraction pipeline: classify downloaded bytes, unpack archives and route
//! recognised files to the indexers.

pub mod archive;
mod file;
mod pipeline;
pub mod policy;
pub mod sniff;

pub use archive::{ArchiveError, ArchiveFormat};
pub use file::ExtractedFile;
pub use pipeline::{ExtractionPipeline, HandlerError};
pub use policy::{is_subtitle_ext, ExtensionPolicy, SUBTITLE_EXTENSIONS};
pub use sniff::{sniff_ext, sniff_mime};
