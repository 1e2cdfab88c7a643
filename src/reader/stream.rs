//! Pull-based token stream over Avro binary data.
//!
//! [`TokenStream`] owns a binary decoder and a stack of frames. Each call
//! to [`TokenStream::next_token`] advances the top frame by exactly one
//! token: scalars are decoded in place, structured values push a frame,
//! and END_* tokens pop one.
//!
//! # Example
//!
//! ```
//! use avro_tokens::reader::{SliceDecoder, Token, TokenStream};
//! use avro_tokens::schema::{AvroSchema, FieldSchema, RecordSchema};
//!
//! let schema = AvroSchema::Record(RecordSchema::new(
//!     "Person",
//!     vec![
//!         FieldSchema::new("name", AvroSchema::String),
//!         FieldSchema::new("age", AvroSchema::Int),
//!     ],
//! ));
//! let data = [0x06, b'B', b'o', b'b', 0x4E];
//!
//! let stream = TokenStream::from_schema(&schema, SliceDecoder::new(&data)).unwrap();
//! let tokens: Vec<Token> = stream.collect::<Result<_, _>>().unwrap();
//! assert_eq!(tokens[2], Token::String("Bob".to_string()));
//! assert_eq!(tokens[4], Token::Int(39));
//! ```

use std::iter::FusedIterator;
use std::sync::Arc;

use tracing::{debug, trace};

use super::binary::BinaryDecoder;
use super::context::{ContextNode, ContextTree, NodeId};
use super::frame::{resolve_union, ContextKind, Frame, FrameState, Step, ValueMode};
use super::token::{Token, TokenKind};
use crate::error::{DecodeError, StreamError};
use crate::schema::AvroSchema;

/// Default limit on structure nesting.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Configuration for a [`TokenStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Deepest allowed nesting of arrays, maps and records (default: 512).
    pub max_depth: usize,
    /// Whether the input holds one root value or a sequence of them.
    pub value_mode: ValueMode,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            value_mode: ValueMode::Single,
        }
    }
}

impl DecoderConfig {
    /// Create a new DecoderConfig with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the nesting limit.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the root value mode.
    pub fn with_value_mode(mut self, mode: ValueMode) -> Self {
        self.value_mode = mode;
        self
    }

    /// Decode root values until the input is exhausted.
    pub fn sequence(mut self) -> Self {
        self.value_mode = ValueMode::Sequence;
        self
    }
}

/// Pull-based token stream.
///
/// Fails fast: the first error is returned with the context path and byte
/// offset at which it happened, and the stream refuses further work.
pub struct TokenStream<D: BinaryDecoder> {
    tree: Arc<ContextTree>,
    decoder: D,
    config: DecoderConfig,
    /// Frame stack; index 0 is the root, the top is the current context
    frames: Vec<Frame>,
    current: Option<TokenKind>,
    poisoned: bool,
    /// Iterator has yielded END_OF_STREAM or an error
    finished: bool,
}

impl<D: BinaryDecoder> TokenStream<D> {
    /// Create a stream over `decoder` using a compiled context tree.
    pub fn new(tree: Arc<ContextTree>, decoder: D) -> Self {
        Self::with_config(tree, decoder, DecoderConfig::default())
    }

    pub fn with_config(tree: Arc<ContextTree>, decoder: D, config: DecoderConfig) -> Self {
        let root = Frame::root(tree.root());
        Self {
            tree,
            decoder,
            config,
            frames: vec![root],
            current: None,
            poisoned: false,
            finished: false,
        }
    }

    /// Compile `schema` and create a stream in one step.
    ///
    /// Prefer [`ContextTree::build`] plus [`TokenStream::new`] when the same
    /// schema decodes many inputs.
    pub fn from_schema(schema: &AvroSchema, decoder: D) -> Result<Self, StreamError> {
        let tree = ContextTree::build(schema)?;
        Ok(Self::new(Arc::new(tree), decoder))
    }

    /// Produce the next token.
    ///
    /// After END_OF_STREAM every further call returns END_OF_STREAM again.
    ///
    /// # Errors
    /// - `StreamError::Decode` wrapping the first decode failure
    /// - `StreamError::Poisoned` for every call after a failure
    pub fn next_token(&mut self) -> Result<Token, StreamError> {
        if self.poisoned {
            return Err(StreamError::Poisoned);
        }
        match self.step() {
            Ok(token) => {
                self.current = Some(token.kind());
                Ok(token)
            }
            Err(source) => Err(self.fail(source)),
        }
    }

    /// Skip the rest of the structure just opened.
    ///
    /// When the last token was START_ARRAY or START_OBJECT, consumes the
    /// remainder of that structure and returns its END_* token. Blocks with
    /// a recorded byte size are skipped without decoding their items.
    /// For any other last token this does nothing and returns `None`.
    pub fn skip_children(&mut self) -> Result<Option<Token>, StreamError> {
        if self.poisoned {
            return Err(StreamError::Poisoned);
        }
        if !matches!(
            self.current,
            Some(TokenKind::StartArray | TokenKind::StartObject)
        ) {
            return Ok(None);
        }

        let depth = self.frames.len() - 1;
        let max_depth = self.config.max_depth;
        let result = match self.frames.last_mut() {
            Some(frame) => frame.skip_rest(&self.tree, &mut self.decoder, depth, max_depth),
            None => return Ok(None),
        };
        match result {
            Ok(token) => {
                self.frames.pop();
                trace!(depth, "Skipped frame contents");
                self.current = Some(token.kind());
                Ok(Some(token))
            }
            Err(source) => Err(self.fail(source)),
        }
    }

    /// Kind of the last token returned.
    pub fn current_token(&self) -> Option<TokenKind> {
        self.current
    }

    /// Read-only view of the current (innermost) context.
    pub fn context(&self) -> ContextView<'_> {
        ContextView {
            tree: &self.tree,
            frames: &self.frames,
            depth: self.frames.len() - 1,
        }
    }

    /// Structure nesting depth of the current context. The root is 0.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// Bytes consumed from the decoder so far.
    pub fn bytes_consumed(&self) -> u64 {
        self.decoder.position()
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn tree(&self) -> &Arc<ContextTree> {
        &self.tree
    }

    /// Whether an earlier error made the stream unusable.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Release the binary decoder.
    pub fn into_inner(self) -> D {
        self.decoder
    }

    fn step(&mut self) -> Result<Token, DecodeError> {
        loop {
            let mode = self.config.value_mode;
            let frame = match self.frames.last_mut() {
                Some(frame) => frame,
                None => return Ok(Token::EndOfStream),
            };

            match frame.advance(&self.tree, &mut self.decoder, mode)? {
                Step::Emit(token) => return Ok(token),
                Step::Ascend(token) => {
                    self.frames.pop();
                    trace!(depth = self.frames.len(), "Popped frame");
                    return Ok(token);
                }
                Step::Descend(node) => {
                    if let Some(token) = self.descend(node)? {
                        return Ok(token);
                    }
                }
            }
        }
    }

    /// Decode a scalar value or push a frame for a structured one.
    ///
    /// Returns `None` after a push; the new frame emits its own START token.
    fn descend(&mut self, node: NodeId) -> Result<Option<Token>, DecodeError> {
        let node = resolve_union(&self.tree, node, &mut self.decoder)?;
        if let Some(scalar) = self.tree.node(node).scalar() {
            return scalar.decode(&mut self.decoder).map(Some);
        }

        let depth = self.frames.len();
        if depth > self.config.max_depth {
            return Err(DecodeError::NestingTooDeep(self.config.max_depth));
        }
        if let Some(frame) = Frame::structured(&self.tree, node) {
            trace!(depth, kind = ?frame.kind, "Pushed frame");
            self.frames.push(frame);
        }
        Ok(None)
    }

    fn fail(&mut self, source: DecodeError) -> StreamError {
        self.poisoned = true;
        let path = self.context().path();
        let offset = self.decoder.position();
        debug!(%path, offset, error = %source, "Token stream failed");
        StreamError::Decode {
            path,
            offset,
            source,
        }
    }
}

impl<D: BinaryDecoder> Iterator for TokenStream<D> {
    type Item = Result<Token, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let item = self.next_token();
        if matches!(item, Ok(Token::EndOfStream) | Err(_)) {
            self.finished = true;
        }
        Some(item)
    }
}

impl<D: BinaryDecoder> FusedIterator for TokenStream<D> {}

/// Borrowed view of one context on the stack.
#[derive(Clone, Copy)]
pub struct ContextView<'a> {
    tree: &'a ContextTree,
    frames: &'a [Frame],
    depth: usize,
}

impl<'a> ContextView<'a> {
    fn frame(&self) -> &'a Frame {
        &self.frames[self.depth]
    }

    pub fn kind(&self) -> ContextKind {
        self.frame().kind
    }

    /// Nesting depth; the root is 0.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Enclosing context, or `None` at the root.
    pub fn parent(&self) -> Option<ContextView<'a>> {
        self.depth.checked_sub(1).map(|depth| ContextView {
            tree: self.tree,
            frames: self.frames,
            depth,
        })
    }

    /// Record field or map key currently being decoded.
    pub fn current_name(&self) -> Option<&'a str> {
        let frame = self.frame();
        if frame.kind == ContextKind::Root {
            return None;
        }
        match self.tree.node(frame.node) {
            ContextNode::Record(record) => frame
                .entries
                .checked_sub(1)
                .and_then(|i| record.fields.get(i))
                .map(|field| &*field.name),
            ContextNode::Map { .. } => frame.key.as_deref(),
            _ => None,
        }
    }

    /// Zero-based index of the current array element, map entry, record
    /// field or root value.
    pub fn current_index(&self) -> Option<usize> {
        self.frame().entries.checked_sub(1)
    }

    /// Entries started in this context so far.
    pub fn entry_count(&self) -> usize {
        self.frame().entries
    }

    /// Full name of the record this context decodes, if it is one.
    pub fn record_name(&self) -> Option<&'a str> {
        match self.tree.node(self.frame().node) {
            ContextNode::Record(record) if self.kind() != ContextKind::Root => {
                Some(record.name.as_str())
            }
            _ => None,
        }
    }

    pub fn is_started(&self) -> bool {
        self.frame().state != FrameState::NotStarted
    }

    /// Path from the root to this context, e.g. `$.tags[2].name`.
    pub fn path(&self) -> String {
        let mut path = String::from("$");
        for (depth, frame) in self.frames[..=self.depth].iter().enumerate().skip(1) {
            let view = ContextView {
                tree: self.tree,
                frames: self.frames,
                depth,
            };
            match frame.kind {
                ContextKind::Array => {
                    if let Some(index) = view.current_index() {
                        path.push_str(&format!("[{}]", index));
                    }
                }
                ContextKind::Object => {
                    if let Some(name) = view.current_name() {
                        path.push('.');
                        path.push_str(name);
                    }
                }
                ContextKind::Root => {}
            }
        }
        path
    }
}

impl std::fmt::Debug for ContextView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextView")
            .field("kind", &self.kind())
            .field("depth", &self.depth)
            .field("path", &self.path())
            .finish()
    }
}
