// Application layer: pipelines wiring the ports together.

pub mod pipelines;
