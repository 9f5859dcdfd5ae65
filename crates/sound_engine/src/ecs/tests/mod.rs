//! Scenario tests for entity-driven sound synchronization
