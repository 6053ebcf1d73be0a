//! # Small BASIC
//!
//! A single pass compiler for a small structured BASIC and the stack
//! machine that runs what it produces. Everything fits in one fixed
//! block of memory: the compiler builds the image from the bottom up
//! and keeps its own records at the top.
//!
//! ```
//! use basic::mach::{compile, Event, Runtime};
//!
//! let program = compile("FOR I = 1 TO 3\nPRINT I;\nNEXT I\nPRINT").unwrap();
//! let mut runtime = Runtime::new(program);
//! assert_eq!(runtime.execute(100_000), Event::Print("123\n".to_string()));
//! assert_eq!(runtime.execute(100_000), Event::Stopped);
//! ```
//!
//! The language has integer variables, global arrays, functions with
//! arguments and locals, `IF`/`ELSE IF`/`ELSE`, `FOR`/`NEXT`,
//! `DO`/`LOOP` with `WHILE` or `UNTIL` at either end, `PRINT` and
//! inline `ASM` blocks.

pub mod lang;
pub mod mach;
