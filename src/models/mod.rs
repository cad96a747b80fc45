pub mod extraction;
pub mod file;
pub mod fingerprint;
pub mod link;
pub mod verdict;

pub use extraction::{DuplicateStatus, ExtractedField, ExtractedFields, ExtractionRecord, StatusUpdate};
pub use file::FileContentRecord;
pub use fingerprint::{InvoiceFingerprint, TokenSet};
pub use link::{DuplicateCandidateLink, DuplicateType};
pub use verdict::{DuplicateVerdict, RescanStats};
