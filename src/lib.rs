//! Scopemap - Scope Info for Source Maps
//!
//! Encodes the scopes of authored sources and the ranges of generated code
//! that implement them into the VLQ token streams of a source map, and
//! decodes them back. Several competing encodings are provided so their
//! sizes can be compared on the same input, see [`Codec::all`].
//!
//! ```
//! use scopemap::{Binding, GeneratedRange, OriginalScope, ScopeInfo, SourceMap};
//! use std::rc::Rc;
//!
//! let function = Rc::new(
//!     OriginalScope::new((1, 0), (5, 1))
//!         .with_kind("function")
//!         .with_name("f")
//!         .stack_frame()
//!         .with_variables(["x"]),
//! );
//! let global = Rc::new(
//!     OriginalScope::new((0, 0), (10, 0)).with_child(Rc::clone(&function)),
//! );
//! let range = GeneratedRange::new((0, 0), (0, 40)).with_child(
//!     GeneratedRange::new((0, 10), (0, 30))
//!         .with_definition(&function)
//!         .stack_frame()
//!         .with_values([Binding::Expression("a".to_string())]),
//! );
//! let info = ScopeInfo::new(vec![global], vec![range]);
//!
//! let map = scopemap::encode(&info, &SourceMap::new()).unwrap();
//! assert_eq!(scopemap::decode(&map).unwrap(), info);
//! ```
mod codec;
mod log;
mod map;
mod names;
mod region;
mod scope;
pub mod vlq;

pub use codec::{Codec, Strategy};
pub use log::{Error, ErrorKind, Pointer, Visual};
pub use map::SourceMap;
pub use names::NameTable;
pub use region::Region;
pub use scope::{
    Binding, BindingRange, Callsite, GeneratedRange, OriginalScope, Position, ScopeInfo,
};
pub use vlq::Numbering;

/// Encode `info` into a copy of `map` with the default [`Codec`].
///
/// See [`Codec::encode`].
pub fn encode(info: &ScopeInfo, map: &SourceMap) -> Result<SourceMap, Error> {
    Codec::default().encode(info, map)
}

/// Decode the scope info stored in `map` with the default [`Codec`].
///
/// See [`Codec::decode`].
pub fn decode(map: &SourceMap) -> Result<ScopeInfo, Error> {
    Codec::default().decode(map)
}
