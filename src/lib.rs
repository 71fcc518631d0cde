// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Frequency lattices and cache-synchronized data stores.
//!
//! Lattica models datasets whose data nodes sit at different __frequencies__
//! of a study design, e.g., per subject, per session, or per timepoint. Each
//! frequency is a set of axes, expressed as a bit vector over the axes of a
//! __data space__. One frequency is a parent of another when its axes are a
//! subset of the other's, which makes the frequencies of a space a lattice.
//!
//! Datasets live in remote stores. The [`store::XnatStore`] gateway mirrors
//! an XNAT-style server into an in-memory [`dataset::Dataset`] tree, and
//! moves file groups between the server and a local disk cache that several
//! processes may share at once.
//!
//! # Modules
//!
//! - [`lattice`]: frequency values and lattice operations.
//! - [`dataset`]: data tree, items, and field literals.
//! - [`format`]: file format descriptors and converter registry.
//! - [`store`]: store contract, cache protocol, and XNAT gateway.
//! - [`config`]: configuration file layout.
//! - [`path`]: default locations.

pub mod config;
pub mod dataset;
pub mod format;
pub mod lattice;
pub mod path;
pub mod store;
