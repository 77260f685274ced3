pub mod emit;
pub mod etl;
pub mod tokenizer;
pub mod transform;

pub use crate::domain::model::{
    LoadOutcome, OutputFile, ProtocolEntry, RegistrySnapshot, RunSummary, ServiceEntry,
    SourceDocument, SourceKind, Transport, Version,
};
pub use crate::domain::ports::{ConfigProvider, ConflictPolicy, Fetcher, Pipeline, Storage};
pub use crate::utils::error::Result;
