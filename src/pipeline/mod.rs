//! Pipeline stages for turning a submissions table into printable cards.
//!
//! Each submodule implements exactly one transformation step and is callable
//! on its own; [`crate::generate`] wires them together.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ headers ──▶ links ──▶ qr ──▶ cards ──▶ document ──▶ compile
//! (CSV)    (reconcile)  (URL)    (PNG)   (.md)     (.tex)       (.pdf)
//! ```
//!
//! 1. [`input`]    — check the CSV path and parse it into a [`crate::Table`]
//! 2. [`headers`]  — match actual column names to canonical fields with an
//!    ordered list of strategies; persist operator corrections
//! 3. [`links`]    — validate rows and append a map URL per row
//! 4. [`qr`]       — render one QR image per row plus a metadata table
//! 5. [`cards`]    — fill the card template per row; parse cards back
//! 6. [`document`] — render every card into one LaTeX document
//! 7. [`compile`]  — run external compilers in order until one yields a PDF
//!
//! [`template`] and [`sanitize`] are shared text helpers.

pub mod cards;
pub mod compile;
pub mod document;
pub mod headers;
pub mod input;
pub mod links;
pub mod qr;
pub mod sanitize;
pub mod template;
