//! Scenario-based tests for leap-pipeline, driven by a scripted transport


mod cleanup;
mod fan_out;
mod fine_tune;
mod image_generation;
mod materialize;
