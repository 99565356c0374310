//! Behavioural tests for the dispatch protocol.
