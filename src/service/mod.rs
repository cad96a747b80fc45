pub mod classifier;
pub mod facade;
pub mod file_detector;
pub mod fingerprint;
pub mod hasher;
pub mod invoice_detector;
pub mod normalizer;
pub mod scorer;

pub use classifier::ConfidenceClassifier;
pub use facade::DeduplicationFacade;
pub use file_detector::FileDuplicateDetector;
pub use fingerprint::FingerprintBuilder;
pub use hasher::ContentHasher;
pub use invoice_detector::InvoiceDuplicateDetector;
pub use normalizer::FieldNormalizer;
pub use scorer::SimilarityScorer;
