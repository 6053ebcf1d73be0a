//! # BASIC
//!
//! Run a program file, or enter a program a line at a time.
//!

mod term;

fn main() {
    term::main()
}
