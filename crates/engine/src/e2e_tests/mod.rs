//! Full-flow scenario tests over the in-memory adapters.
