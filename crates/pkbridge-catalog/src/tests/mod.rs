//! Behavioural tests for the catalog backend.

mod behaviour;
