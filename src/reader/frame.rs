//! Runtime frames: one live structured context on the decode stack.
//!
//! A frame moves through three states:
//!
//! ```text
//! NotStarted --(START_*)--> InProgress --(END_*)--> Exhausted
//! ```
//!
//! While in progress a frame hands the driver either a token to emit or a
//! child node whose value must be decoded next. Unions never get a frame;
//! the driver resolves them in place when it descends.

use std::sync::Arc;

use tracing::trace;

use super::binary::BinaryDecoder;
use super::context::{ContextNode, ContextTree, NodeId};
use super::token::Token;
use crate::error::DecodeError;

/// How many root values a stream decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueMode {
    /// Exactly one root value, then END_OF_STREAM
    #[default]
    Single,
    /// Back-to-back root values until the input is exhausted
    Sequence,
}

/// Kind of a context as seen by a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Root,
    Array,
    /// Record or map
    Object,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameState {
    NotStarted,
    InProgress,
    Exhausted,
}

/// What the driver should do after advancing the top frame.
#[derive(Debug)]
pub(crate) enum Step {
    /// Return this token
    Emit(Token),
    /// Decode a value of this node (scalar, union or new frame)
    Descend(NodeId),
    /// Pop the frame and return this token
    Ascend(Token),
}

#[derive(Debug, Clone)]
pub(crate) struct Frame {
    pub(crate) node: NodeId,
    pub(crate) kind: ContextKind,
    pub(crate) state: FrameState,
    /// Entries started: record fields, array elements, map entries, or
    /// root values
    pub(crate) entries: usize,
    /// Items left in the current array/map block
    remaining: u64,
    /// A field name or map key was emitted; its value comes next
    awaiting_value: bool,
    /// Most recent map key
    pub(crate) key: Option<Arc<str>>,
    /// Offset where the latest root value started
    value_start: Option<u64>,
}

impl Frame {
    pub(crate) fn root(node: NodeId) -> Self {
        Self::with_kind(node, ContextKind::Root)
    }

    /// Frame for a structured node. Returns `None` for scalars and unions.
    pub(crate) fn structured(tree: &ContextTree, node: NodeId) -> Option<Self> {
        let kind = match tree.node(node) {
            ContextNode::Array { .. } => ContextKind::Array,
            ContextNode::Map { .. } | ContextNode::Record(_) => ContextKind::Object,
            _ => return None,
        };
        Some(Self::with_kind(node, kind))
    }

    fn with_kind(node: NodeId, kind: ContextKind) -> Self {
        Self {
            node,
            kind,
            state: FrameState::NotStarted,
            entries: 0,
            remaining: 0,
            awaiting_value: false,
            key: None,
            value_start: None,
        }
    }

    /// Produce the next step of this frame.
    pub(crate) fn advance<D: BinaryDecoder + ?Sized>(
        &mut self,
        tree: &ContextTree,
        decoder: &mut D,
        mode: ValueMode,
    ) -> Result<Step, DecodeError> {
        if self.kind == ContextKind::Root {
            return self.advance_root(decoder, mode);
        }

        match self.state {
            FrameState::NotStarted => {
                self.state = FrameState::InProgress;
                Ok(Step::Emit(self.start_token()))
            }
            FrameState::Exhausted => Ok(Step::Ascend(self.end_token())),
            FrameState::InProgress => match tree.node(self.node) {
                ContextNode::Array { items } => {
                    if !self.next_item(decoder)? {
                        return Ok(self.finish());
                    }
                    self.entries += 1;
                    Ok(Step::Descend(*items))
                }
                ContextNode::Map { values } => {
                    if self.awaiting_value {
                        self.awaiting_value = false;
                        return Ok(Step::Descend(*values));
                    }
                    if !self.next_item(decoder)? {
                        return Ok(self.finish());
                    }
                    let key: Arc<str> = Arc::from(decoder.read_string()?);
                    self.key = Some(Arc::clone(&key));
                    self.entries += 1;
                    self.awaiting_value = true;
                    Ok(Step::Emit(Token::FieldName(key)))
                }
                ContextNode::Record(record) => {
                    if self.awaiting_value {
                        self.awaiting_value = false;
                        return Ok(Step::Descend(record.fields[self.entries - 1].node));
                    }
                    match record.fields.get(self.entries) {
                        Some(field) => {
                            self.entries += 1;
                            self.awaiting_value = true;
                            Ok(Step::Emit(Token::FieldName(Arc::clone(&field.name))))
                        }
                        None => Ok(self.finish()),
                    }
                }
                // Frame::structured only builds frames for the three above
                _ => Ok(self.finish()),
            },
        }
    }

    fn advance_root<D: BinaryDecoder + ?Sized>(
        &mut self,
        decoder: &mut D,
        mode: ValueMode,
    ) -> Result<Step, DecodeError> {
        let more = match (self.state, mode) {
            (FrameState::Exhausted, _) => false,
            (FrameState::NotStarted, ValueMode::Single) => true,
            (FrameState::InProgress, ValueMode::Single) => false,
            (_, ValueMode::Sequence) => !decoder.is_at_end()?,
        };

        if more {
            // A value that reads nothing would repeat forever on the same bytes
            let position = decoder.position();
            if self.value_start == Some(position) {
                return Err(DecodeError::CorruptData(format!(
                    "Root value at offset {} consumed no input",
                    position
                )));
            }
            self.value_start = Some(position);
            self.state = FrameState::InProgress;
            self.entries += 1;
            Ok(Step::Descend(self.node))
        } else {
            self.state = FrameState::Exhausted;
            Ok(Step::Emit(Token::EndOfStream))
        }
    }

    fn finish(&mut self) -> Step {
        self.state = FrameState::Exhausted;
        Step::Ascend(self.end_token())
    }

    fn start_token(&self) -> Token {
        match self.kind {
            ContextKind::Array => Token::StartArray,
            _ => Token::StartObject,
        }
    }

    pub(crate) fn end_token(&self) -> Token {
        match self.kind {
            ContextKind::Array => Token::EndArray,
            _ => Token::EndObject,
        }
    }

    /// Claim the next array element or map entry, reading block headers as
    /// needed. Returns `false` once the terminating zero-count block is read.
    fn next_item<D: BinaryDecoder + ?Sized>(&mut self, decoder: &mut D) -> Result<bool, DecodeError> {
        while self.remaining == 0 {
            match read_block_header(decoder)? {
                Some(header) => self.remaining = header.count,
                None => return Ok(false),
            }
        }
        self.remaining -= 1;
        Ok(true)
    }

    /// Consume the rest of this frame without producing tokens.
    ///
    /// Whole blocks are skipped by byte size when the writer recorded one.
    pub(crate) fn skip_rest<D: BinaryDecoder + ?Sized>(
        &mut self,
        tree: &ContextTree,
        decoder: &mut D,
        depth: usize,
        max_depth: usize,
    ) -> Result<Token, DecodeError> {
        match tree.node(self.node) {
            ContextNode::Record(record) => {
                if self.awaiting_value {
                    let node = record.fields[self.entries - 1].node;
                    skip_value(tree, node, decoder, depth + 1, max_depth)?;
                }
                for field in &record.fields[self.entries..] {
                    skip_value(tree, field.node, decoder, depth + 1, max_depth)?;
                }
                self.entries = record.fields.len();
            }
            ContextNode::Array { items } => {
                let items = *items;
                skip_blocks(tree, Some(items), decoder, self.remaining, |d| {
                    skip_value(tree, items, d, depth + 1, max_depth)
                })?;
            }
            ContextNode::Map { values } => {
                let values = *values;
                if self.awaiting_value {
                    skip_value(tree, values, decoder, depth + 1, max_depth)?;
                }
                skip_blocks(tree, None, decoder, self.remaining, |d| {
                    d.skip_bytes()?;
                    skip_value(tree, values, d, depth + 1, max_depth)
                })?;
            }
            _ => {}
        }

        self.remaining = 0;
        self.awaiting_value = false;
        self.state = FrameState::Exhausted;
        Ok(self.end_token())
    }
}

/// Decoded array/map block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockHeader {
    pub(crate) count: u64,
    /// Byte size of the block's items, present when the count was negative
    pub(crate) byte_size: Option<u64>,
}

/// Read one block header. `None` marks the terminating zero-count block.
pub(crate) fn read_block_header<D: BinaryDecoder + ?Sized>(
    decoder: &mut D,
) -> Result<Option<BlockHeader>, DecodeError> {
    let count = decoder.read_long()?;
    let header = match count {
        0 => return Ok(None),
        i64::MIN => {
            return Err(DecodeError::CorruptData(format!(
                "Block count {} cannot be negated",
                count
            )))
        }
        c if c < 0 => {
            let size = decoder.read_long()?;
            if size < 0 {
                return Err(DecodeError::CorruptData(format!(
                    "Negative block byte size: {}",
                    size
                )));
            }
            BlockHeader {
                count: c.unsigned_abs(),
                byte_size: Some(size as u64),
            }
        }
        c => BlockHeader {
            count: c as u64,
            byte_size: None,
        },
    };
    trace!(count = header.count, byte_size = ?header.byte_size, "Read block header");
    Ok(Some(header))
}

/// Resolve a union node to the branch selected by the next index on the
/// wire. Any other node is returned unchanged.
pub(crate) fn resolve_union<D: BinaryDecoder + ?Sized>(
    tree: &ContextTree,
    node: NodeId,
    decoder: &mut D,
) -> Result<NodeId, DecodeError> {
    let ContextNode::Union { branches } = tree.node(node) else {
        return Ok(node);
    };
    let index = decoder.read_long()?;
    let branch = usize::try_from(index)
        .ok()
        .and_then(|i| branches.get(i))
        .copied()
        .ok_or(DecodeError::InvalidUnionIndex {
            index,
            branches: branches.len(),
        })?;
    trace!(index, branch = tree.node(branch).type_name(), "Resolved union branch");
    Ok(branch)
}

/// Consume one value of `node`. `depth` is the depth a structured value
/// would occupy.
pub(crate) fn skip_value<D: BinaryDecoder + ?Sized>(
    tree: &ContextTree,
    node: NodeId,
    decoder: &mut D,
    depth: usize,
    max_depth: usize,
) -> Result<(), DecodeError> {
    let node = resolve_union(tree, node, decoder)?;
    let context = tree.node(node);
    if let Some(scalar) = context.scalar() {
        return scalar.skip(decoder);
    }
    if depth > max_depth {
        return Err(DecodeError::NestingTooDeep(max_depth));
    }

    match context {
        ContextNode::Array { items } => skip_blocks(tree, Some(*items), decoder, 0, |d| {
            skip_value(tree, *items, d, depth + 1, max_depth)
        }),
        ContextNode::Map { values } => skip_blocks(tree, None, decoder, 0, |d| {
            d.skip_bytes()?;
            skip_value(tree, *values, d, depth + 1, max_depth)
        }),
        ContextNode::Record(record) => {
            for field in &record.fields {
                skip_value(tree, field.node, decoder, depth + 1, max_depth)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Skip `pending` items of the current block, then every following block up
/// to and including the terminating zero count.
///
/// `item` is the array element node; map entries always carry a key and
/// pass `None`. Elements that encode to zero bytes are skipped once per
/// block instead of once per counted item.
fn skip_blocks<D, F>(
    tree: &ContextTree,
    item: Option<NodeId>,
    decoder: &mut D,
    pending: u64,
    mut skip_item: F,
) -> Result<(), DecodeError>
where
    D: BinaryDecoder + ?Sized,
    F: FnMut(&mut D) -> Result<(), DecodeError>,
{
    let zero_width = item.is_some_and(|node| tree.is_zero_width(node));
    let passes = |count: u64| if zero_width { count.min(1) } else { count };

    for _ in 0..passes(pending) {
        skip_item(decoder)?;
    }
    while let Some(header) = read_block_header(decoder)? {
        match header.byte_size {
            Some(size) => {
                let size = usize::try_from(size).map_err(|_| {
                    DecodeError::CorruptData(format!("Block byte size {} too large", size))
                })?;
                decoder.skip(size)?;
            }
            None => {
                for _ in 0..passes(header.count) {
                    skip_item(decoder)?;
                }
            }
        }
    }
    Ok(())
}
