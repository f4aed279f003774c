// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]
#![allow(clippy::too_many_arguments)]

//! # classweave
//!
//! Call-site replacement for compiled JVM methods.
//!
//! `classweave` rewrites calls from application bytecode into the Java standard library, such as
//! `String.equals` or `Integer.parseInt`, into static calls to instrumented replacement functions.
//! Each replaced call receives a correlation id naming the coverage objectives of that call site,
//! so a search-based test generator can observe the branch hidden inside the library call.
//!
//! ## Features
//!
//! - **Single-pass rewriting** - A fold over the instruction events of a method body
//! - **Catalogued replacements** - Immutable registry indexed by type, name and static intent
//! - **Stable objective ids** - Derived from class, line and per-line call index
//! - **Concurrent registration** - Lock-sharded objective store shared between threads
//! - **Code attribute surgery** - Exception table, debug tables and stack map frames follow
//!   the inserted instructions
//!
//! ## Quick Start
//!
//! ```rust
//! use classweave::prelude::*;
//!
//! let registry = ReplacementRegistry::standard()?;
//! let resolver = ClassHierarchy::standard();
//! let store = ObjectiveStore::new();
//! let config = InstrumentationConfig::default();
//! let rewriter = Rewriter::new(&registry, &resolver, &store, &config);
//!
//! let method = MethodContext {
//!     class_name: "com/example/Service",
//!     method_name: "check",
//!     descriptor: "(Ljava/lang/String;Ljava/lang/Object;)Z",
//!     max_stack: 2,
//! };
//! let instructions = vec![
//!     Instruction::Label(Label(0)),
//!     Instruction::LineNumber { line: 10, start: Label(0) },
//!     Instruction::Simple(opcodes::ALOAD_1),
//!     Instruction::Simple(opcodes::ALOAD_2),
//!     Instruction::Method(MethodInsn::new(
//!         InvokeKind::Virtual,
//!         "java/lang/String",
//!         "equals",
//!         "(Ljava/lang/Object;)Z",
//!     )),
//!     Instruction::Simple(opcodes::IRETURN),
//! ];
//!
//! let rewritten = rewriter.rewrite(&method, instructions)?;
//! assert_eq!(rewritten.replaced, 1);
//! assert_eq!(rewritten.max_stack, 3);
//! assert!(store.contains("MethodReplacement_at_com.example.Service_00010_0_BOOLEAN_true"));
//! # Ok::<(), classweave::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`descriptor`] - Descriptor grammar and the [`descriptor::DescriptorMatcher`]
//! - [`replacement`] - Providers, the [`replacement::ReplacementRegistry`] and type resolution
//! - [`objectives`] - Objective naming and the concurrent [`objectives::ObjectiveStore`]
//! - [`rewriter`] - The call-site fold and the stack-depth adjustment
//! - [`bytecode`] - Decoding and encoding of instruction events
//! - [`classfile`] - Constant pool and `Code` attribute structures
//! - [`instrument`] - Glue from raw `Code` attributes to rewritten ones
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade and never installs a logger. Replaced calls are
//! reported at `debug`, unresolvable owners at `error`.

#[macro_use]
pub(crate) mod error;
pub(crate) mod file;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use classweave::prelude::*;
///
/// let store = ObjectiveStore::new();
/// assert!(store.register("objective"));
/// ```
pub mod prelude;

pub mod bytecode;
pub mod classfile;
pub mod descriptor;
pub mod instrument;
pub mod objectives;
pub mod replacement;
pub mod rewriter;

mod config;

/// `classweave` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `classweave` Error type
///
/// # Examples
///
/// ```rust
/// use classweave::{descriptor::MethodDescriptor, Error};
///
/// match MethodDescriptor::parse("(Ljava/lang/Object)Z") {
///     Err(Error::InvalidDescriptor(descriptor)) => println!("Bad descriptor {}", descriptor),
///     Err(e) => println!("Error: {}", e),
///     Ok(_) => unreachable!(),
/// }
/// ```
pub use error::Error;

/// Configuration of call-site instrumentation, see [`InstrumentationConfig`].
pub use config::InstrumentationConfig;

/// Provides access to the low-level byte parser.
///
/// # Example
///
/// ```rust
/// use classweave::Parser;
///
/// let data = [0xCA, 0xFE, 0xBA, 0xBE];
/// let mut parser = Parser::new(&data);
/// assert_eq!(parser.read_be::<u32>()?, 0xCAFE_BABE);
/// # Ok::<(), classweave::Error>(())
/// ```
pub use file::parser::Parser;
