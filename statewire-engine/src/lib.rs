//! Registry-driven codec for object graphs of game state.
//!
//! Types opt in by implementing [`Persist`]: a wire name, a `schema` that
//! declares each field with a [`Codec`], and `Default` as the decode
//! constructor. Registered types get six operations, all driven by the same
//! field tables:
//!
//! - [`serialize`] / [`deserialize`]: line-oriented text documents
//! - [`diff`] / [`merge`]: sparse patches for keeping replicas in sync
//! - [`deep_copy`] / [`structural_eq`] / [`copy_from`]: graph utilities
//!
//! The format is schema-tolerant in both directions. Unknown fields are
//! skipped (structurally, using brace depth), absent fields keep their
//! defaults, and enum constants travel by name. See each module for the
//! details.
//!
//! ```
//! use statewire_engine::{Codec, Persist, TypeBuilder};
//!
//! #[derive(Default)]
//! struct Score {
//!     points: i32,
//!     label: String,
//! }
//!
//! impl Persist for Score {
//!     const TYPE_NAME: &'static str = "Score";
//!
//!     fn schema(b: &mut TypeBuilder<Self>) {
//!         b.field("points", Codec::<i32>::scalar(), |s| &s.points, |s| &mut s.points)
//!             .field("label", Codec::string(), |s| &s.label, |s| &mut s.label);
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! statewire_engine::register::<Score>()?;
//! let score = Score { points: 827, label: "win".into() };
//! let text = statewire_engine::serialize_to_string(&score)?;
//! assert_eq!(text, "points=827\nlabel=\"win\"\n");
//! # Ok(())
//! # }
//! ```

mod builder;
mod codec;
mod dynamic;
mod enums;
mod error;
mod field;
mod ops;
mod persist;
mod registry;

pub use builder::TypeBuilder;
pub use codec::{Codec, WireKey, WireScalar};
pub use dynamic::DynList;
pub use enums::WireEnum;
pub use error::{
    ConfigError, ConfigResult, DecodeError, DecodeResult, EncodeError, EncodeResult,
};
pub use field::Category;
pub use ops::{
    DecodeOptions, MergeOptions, Patch, copy_from, deep_copy, deserialize, deserialize_from_str,
    diff, from_document, load_from_file, merge, save_to_file, serialize, serialize_to_string,
    structural_eq,
};
pub use persist::{Persist, Persistable};
pub use registry::{is_registered, register};

// Custom codecs write and read wire lines directly.
pub use statewire_text::{LineReader, LineWriter, WireError, token};
