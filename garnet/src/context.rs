use crate::counters::{FILE_DESCRIPTORS, LINE_NUMBERS};
use crate::encoding::{self, EncodingRef};
use crate::match_data::{MatchData, RawMatch};
use crate::scope::{FrameId, FrameStack};
use crate::{
    BlockResult, MutableString, ProcRef, RubyHash, RubyResult, StringRef, SymbolId,
    SymbolTable, Value,
};

#[derive(Debug, Default)]
pub struct ContextCreateInfo {
    /// Encoding of string literals. UTF-8 when unset.
    pub default_encoding: Option<EncodingRef>,
    /// Legacy encoding whose byte offsets match data reports.
    pub kcode: Option<EncodingRef>,
    /// Scan literals for non-ascii characters when they are created.
    pub detect_literal_ascii: bool,
}

/// State of one execution context: configuration, symbols and the frames
/// of the methods it is running.
#[derive(Debug)]
pub struct RubyContext {
    default_encoding: EncodingRef,
    kcode: Option<EncodingRef>,
    detect_literal_ascii: bool,
    symbols: SymbolTable,
    frames: FrameStack,
}

impl RubyContext {
    pub fn new(info: ContextCreateInfo) -> Self {
        let default_encoding = info.default_encoding.unwrap_or(&encoding::UTF_8);
        log::debug!(
            "context: encoding {}, kcode {}",
            default_encoding.name(),
            info.kcode.map_or("none", |kcode| kcode.name())
        );
        Self {
            default_encoding,
            kcode: info.kcode,
            detect_literal_ascii: info.detect_literal_ascii,
            symbols: SymbolTable::new(),
            frames: FrameStack::new(),
        }
    }

    /// Context sharing the symbol table of `self`, with no running frames.
    pub fn fork(&self) -> Self {
        Self {
            default_encoding: self.default_encoding,
            kcode: self.kcode,
            detect_literal_ascii: self.detect_literal_ascii,
            symbols: self.symbols.clone(),
            frames: FrameStack::new(),
        }
    }

    pub fn default_encoding(&self) -> EncodingRef {
        self.default_encoding
    }

    pub fn kcode(&self) -> Option<EncodingRef> {
        self.kcode
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn intern(&self, name: &str) -> SymbolId {
        self.symbols.intern(name)
    }

    pub fn symbol(&self, name: &str) -> Value {
        Value::Symbol(self.intern(name))
    }

    pub fn string_literal(&self, text: &str) -> RubyResult<MutableString> {
        let literal = MutableString::literal_in(text, self.default_encoding)?;
        if self.detect_literal_ascii {
            literal.is_ascii();
        }
        Ok(literal)
    }

    pub fn new_hash(&self) -> Value {
        Value::hash(RubyHash::new())
    }

    /// Match data for a match against `input`, in this context's KCODE.
    pub fn match_data(
        &self,
        raw: Option<RawMatch>,
        input: &StringRef,
    ) -> RubyResult<Option<MatchData>> {
        MatchData::new(raw, input, self.kcode)
    }

    pub fn allocate_file_descriptor(&self) -> u64 {
        FILE_DESCRIPTORS.next()
    }

    pub fn next_line_number(&self) -> u64 {
        LINE_NUMBERS.next()
    }

    // ── frames ─────────────────────────────────────────────────────────

    pub fn frames(&self) -> &FrameStack {
        &self.frames
    }

    pub fn push_frame(&mut self, name: &str) -> FrameId {
        self.frames.push(name)
    }

    pub fn pop_frame(&mut self) -> Option<FrameId> {
        self.frames.pop().map(|frame| frame.id)
    }

    /// Yields to `block` from the innermost method and settles the result
    /// there. Outside any method a pending `return` or `break` fails.
    pub fn yield_block(&self, block: &ProcRef, args: Vec<Value>) -> RubyResult<BlockResult> {
        let result = block.yield_values(args)?;
        match self.frames.current() {
            Some(frame) => result.resolve_in_frame(frame.id, &self.frames),
            None => result.into_value().map(BlockResult::Normal),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::encoding::{SHIFT_JIS, US_ASCII};
    use crate::{BlockBody, BlockContext, BlockDispatcher, Proc, Scope, Shared, StringFlags};

    #[test]
    fn defaults() {
        let context = RubyContext::new(ContextCreateInfo::default());
        assert_eq!(context.default_encoding(), &encoding::UTF_8);
        assert!(context.kcode().is_none());
        let literal = context.string_literal("abc").unwrap();
        assert!(!literal.knows_ascii(), "ascii is learned lazily");
    }

    #[test]
    fn literals_use_configured_encoding() {
        let context = RubyContext::new(ContextCreateInfo {
            default_encoding: Some(&US_ASCII),
            detect_literal_ascii: true,
            ..Default::default()
        });
        let literal = context.string_literal("abc").unwrap();
        assert_eq!(literal.encoding(), &US_ASCII);
        assert!(literal.flags().contains(StringFlags::ASCII_KNOWN));
        assert!(context.string_literal("\u{e9}").is_err(), "not representable in US-ASCII");
    }

    #[test]
    fn forks_share_symbols() {
        let context = RubyContext::new(ContextCreateInfo::default());
        let fork = context.fork();
        assert_eq!(context.intern("each"), fork.intern("each"));
        assert!(matches!(context.symbol("each"), Value::Symbol(_)));
    }

    #[test]
    fn counters_advance() {
        let context = RubyContext::new(ContextCreateInfo::default());
        let fd = context.allocate_file_descriptor();
        assert!(fd >= 3, "standard streams are taken");
        assert!(context.allocate_file_descriptor() > fd);
        let line = context.next_line_number();
        assert!(context.next_line_number() > line);
    }

    #[test]
    fn match_data_uses_kcode() {
        let context = RubyContext::new(ContextCreateInfo {
            kcode: Some(&SHIFT_JIS),
            ..Default::default()
        });
        let input = Shared::new(MutableString::literal("\u{3042}x"));
        let data = context
            .match_data(Some(RawMatch::new(vec![Some(1..2)])), &input)
            .unwrap()
            .unwrap();
        assert_eq!(data.group_start(0).unwrap(), Some(2));
    }

    #[test]
    fn yield_block_settles_break_in_current_frame() {
        let mut context = RubyContext::new(ContextCreateInfo::default());
        let frame = context.push_frame("each");
        let body: BlockBody = Arc::new(|ctx: &BlockContext, _: Vec<Value>| {
            ctx.break_with(Value::Fixnum(1))
        });
        let scope = Scope::new(Value::Nil, Some(frame));
        let block = Shared::new(Proc::new_block(Value::Nil, scope, BlockDispatcher::new(0), body));
        let result = context.yield_block(&block, vec![]).unwrap();
        assert!(matches!(result, BlockResult::Normal(Value::Fixnum(1))));
        assert_eq!(context.pop_frame(), Some(frame));
        let err = context.yield_block(&block, vec![]).unwrap_err();
        assert_eq!(err.to_string(), "break from proc-closure");
    }

    #[test]
    fn new_hash_is_empty() {
        let context = RubyContext::new(ContextCreateInfo::default());
        assert!(context.new_hash().as_hash().unwrap().read().is_empty());
    }
}
