//! Unit tests for the Photorama CLI.

use super::*;

mod config_unit;
