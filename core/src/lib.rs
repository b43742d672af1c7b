pub mod aggregate;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod group;
pub mod ingest;
pub mod name_generator;
pub mod pipeline;
pub mod risk;
pub mod rng;
pub mod snapshot;
pub mod topology;
pub mod types;
pub mod upload;
pub mod visual;
pub mod wiring;
