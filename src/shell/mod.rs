// Composition root.
//
// Responsibilities
// - Read config from environment.
// - Instantiate concrete infrastructure implementations (Docker sandbox, DynamoDB client).
// - Wire them into the fixture, readiness gate, provisioner and writer.

pub mod bootstrap;
pub mod config;
