//! Unit test modules.

mod ftms_parser_test;
mod ghost_roster_test;
mod race_test;
