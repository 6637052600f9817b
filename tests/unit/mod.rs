//! Unit test modules.

mod training_store_test;
mod zones_test;
