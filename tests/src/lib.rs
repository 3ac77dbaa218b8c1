//! End to end tests for the Pkl type phases.
