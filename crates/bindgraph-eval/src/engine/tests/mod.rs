mod common;
mod events;
mod property_tests;
mod references;
