mod charmap;
mod context;
pub mod counters;
pub mod encoding;
mod error;
mod flow;
mod hash;
mod match_data;
mod proc;
mod scope;
mod string;
mod symbols;
mod value;

pub use charmap::{CharacterMap, RangeExpander};
pub use context::{ContextCreateInfo, RubyContext};
pub use encoding::{Character, Encoding, EncodingRef};
pub use error::{EncodingErrorKind, JumpReason, RubyError, RubyResult};
pub use flow::BlockResult;
pub use hash::{DefaultEquality, EqualityStrategy, HashFlags, RubyHash};
pub use match_data::{MatchData, RawMatch};
pub use proc::{BlockBody, BlockContext, BlockDispatcher, CallSite, Proc, ProcKind};
pub use scope::{Frame, FrameId, FrameStack, Scope};
pub use string::{
    MutableString, MutableStringBuilder, Representation, StringFlags, Unit, Units,
};
pub use symbols::{SymbolId, SymbolTable};
pub use value::{ArrayRef, HashRef, ProcRef, Shared, StringRef, Value};
