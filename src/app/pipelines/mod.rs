pub mod iana_pipeline;
