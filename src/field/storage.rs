//! Per-variant field storage and the operation bodies over it.
//!
//! Jede [`FieldStorage`] Variante trägt ihre Art (Kind/Message-Id) selbst,
//! sodass alle Operationen erschöpfend über die Storage matchen. Der
//! Presence-Guard für singuläre Felder liegt beim Aufrufer (Message).

use std::sync::Arc;

use crate::bytestream::{WireReader, WireWriter};
use crate::deferred::{Deferred, DeferredValue, SlotList};
use crate::field::{DefaultValue, FieldPlan, FieldVariant, NumericKind, TagForm};
use crate::layout::{CompiledSchema, MessageId};
use crate::message::Message;
use crate::varint;
use crate::{Error, Result};

/// Storage of one field inside a message instance.
#[derive(Debug, Clone)]
pub(crate) enum FieldStorage<'a> {
    Scalar { kind: NumericKind, bits: u64 },
    Text(Deferred<String>),
    Blob(Deferred<Vec<u8>>),
    /// Wird erst beim ersten schreibenden Zugriff (oder Parsen) angelegt.
    Message { id: MessageId, value: Option<Box<Message<'a>>> },
    RepeatedScalar { kind: NumericKind, values: Vec<u64> },
    RepeatedText(SlotList<Deferred<String>>),
    RepeatedBlob(SlotList<Deferred<Vec<u8>>>),
    RepeatedMessage { id: MessageId, items: SlotList<Message<'a>> },
}

impl<'a> FieldStorage<'a> {
    /// Empty storage for a field, with the declared default pre-set.
    pub(crate) fn declare(plan: &FieldPlan) -> Self {
        match plan.variant {
            FieldVariant::Scalar(kind) => Self::Scalar {
                kind,
                bits: scalar_default(plan),
            },
            FieldVariant::String => Self::Text(Deferred::Empty),
            FieldVariant::Bytes => Self::Blob(Deferred::Empty),
            FieldVariant::Message(id) => Self::Message { id, value: None },
            FieldVariant::RepeatedScalar { kind, .. } => Self::RepeatedScalar {
                kind,
                values: Vec::new(),
            },
            FieldVariant::RepeatedString => Self::RepeatedText(SlotList::new()),
            FieldVariant::RepeatedBytes => Self::RepeatedBlob(SlotList::new()),
            FieldVariant::RepeatedMessage(id) => Self::RepeatedMessage {
                id,
                items: SlotList::new(),
            },
        }
    }

    /// Element count of a repeated field; 0 for singular storage.
    pub(crate) fn count(&self) -> usize {
        match self {
            Self::RepeatedScalar { values, .. } => values.len(),
            Self::RepeatedText(list) => list.len(),
            Self::RepeatedBlob(list) => list.len(),
            Self::RepeatedMessage { items, .. } => items.len(),
            Self::Scalar { .. } | Self::Text(_) | Self::Blob(_) | Self::Message { .. } => 0,
        }
    }

    pub(crate) fn variant_name(&self) -> &'static str {
        match self {
            Self::Scalar { .. } => "scalar",
            Self::Text(_) => "string",
            Self::Blob(_) => "bytes",
            Self::Message { .. } => "message",
            Self::RepeatedScalar { .. } => "repeated scalar",
            Self::RepeatedText(_) => "repeated string",
            Self::RepeatedBlob(_) => "repeated bytes",
            Self::RepeatedMessage { .. } => "repeated message",
        }
    }

    /// Encoded size contribution (tags, length prefixes, payload).
    pub(crate) fn size(&self, plan: &FieldPlan) -> usize {
        let tag_size = varint::varint_u32_size(plan.tag);
        match self {
            Self::Scalar { kind, bits } => tag_size + kind.size(*bits),
            Self::Text(holder) => tag_size + delimited_size(holder.len()),
            Self::Blob(holder) => tag_size + delimited_size(holder.len()),
            Self::Message { value, .. } => match value {
                Some(child) => tag_size + delimited_size(child.compute_size()),
                None => 0,
            },
            Self::RepeatedScalar { kind, values } => {
                let payload: usize = values.iter().map(|&bits| kind.size(bits)).sum();
                match plan.variant {
                    FieldVariant::RepeatedScalar { packed: true, .. } => {
                        if values.is_empty() {
                            0
                        } else {
                            varint::varint_u32_size(plan.write_tag()) + delimited_size(payload)
                        }
                    }
                    _ => tag_size * values.len() + payload,
                }
            }
            Self::RepeatedText(list) => list
                .iter()
                .map(|holder| tag_size + delimited_size(holder.len()))
                .sum(),
            Self::RepeatedBlob(list) => list
                .iter()
                .map(|holder| tag_size + delimited_size(holder.len()))
                .sum(),
            Self::RepeatedMessage { items, .. } => items
                .iter()
                .map(|child| tag_size + delimited_size(child.compute_size()))
                .sum(),
        }
    }

    /// Writes every occurrence of this field.
    pub(crate) fn write(&self, plan: &FieldPlan, writer: &mut WireWriter, source: Option<&[u8]>) -> Result<()> {
        match self {
            Self::Scalar { kind, bits } => {
                varint::write_varint_u32(writer, plan.tag);
                kind.write(writer, *bits);
            }
            Self::Text(holder) => write_holder(writer, plan.tag, holder, source)?,
            Self::Blob(holder) => write_holder(writer, plan.tag, holder, source)?,
            Self::Message { value, .. } => {
                if let Some(child) = value {
                    write_child(writer, plan.tag, child)?;
                }
            }
            Self::RepeatedScalar { kind, values } => match plan.variant {
                FieldVariant::RepeatedScalar { packed: true, .. } => {
                    if !values.is_empty() {
                        let payload: usize = values.iter().map(|&bits| kind.size(bits)).sum();
                        varint::write_varint_u32(writer, plan.write_tag());
                        varint::write_varint_u32(writer, length_u32(payload)?);
                        for &bits in values {
                            kind.write(writer, bits);
                        }
                    }
                }
                _ => {
                    for &bits in values {
                        varint::write_varint_u32(writer, plan.tag);
                        kind.write(writer, bits);
                    }
                }
            },
            Self::RepeatedText(list) => {
                for holder in list.iter() {
                    write_holder(writer, plan.tag, holder, source)?;
                }
            }
            Self::RepeatedBlob(list) => {
                for holder in list.iter() {
                    write_holder(writer, plan.tag, holder, source)?;
                }
            }
            Self::RepeatedMessage { items, .. } => {
                for child in items.iter() {
                    write_child(writer, plan.tag, child)?;
                }
            }
        }
        Ok(())
    }

    /// Parses one occurrence (its tag is already consumed).
    ///
    /// `form` ist nur für repeated numeric relevant: `Packed` liest einen
    /// längenpräfixierten Lauf von Werten.
    pub(crate) fn parse_one(
        &mut self,
        plan: &FieldPlan,
        form: TagForm,
        reader: &mut WireReader<'a>,
        schema: &Arc<CompiledSchema>,
        depth: usize,
    ) -> Result<()> {
        match self {
            Self::Scalar { kind, bits } => *bits = kind.read(reader)?,
            Self::Text(holder) => {
                let parsed = read_holder::<String>(reader)?;
                if schema.options().validate_utf8_on_parse() {
                    parsed.value(Some(reader.buffer()), &plan.name)?;
                }
                *holder = parsed;
            }
            Self::Blob(holder) => *holder = read_holder(reader)?,
            Self::Message { id, value } => {
                let len = read_length(reader)?;
                // Letztes Vorkommen gewinnt: der vorhandene Sub-Message wird neu geparst
                let child = value.get_or_insert_with(|| Box::new(Message::detached(schema.clone(), *id)));
                child.parse_nested(reader, len, depth + 1)?;
            }
            Self::RepeatedScalar { kind, values } => {
                let initial = schema.options().repeated_initial_capacity();
                match form {
                    TagForm::Normal => push_numeric(values, kind.read(reader)?, initial),
                    TagForm::Packed => {
                        let len = read_length(reader)?;
                        let old_limit = reader.push_limit(len)?;
                        while !reader.is_at_limit() {
                            let bits = kind.read(reader)?;
                            push_numeric(values, bits, initial);
                        }
                        reader.pop_limit(old_limit);
                    }
                }
            }
            Self::RepeatedText(list) => {
                let parsed = read_holder::<String>(reader)?;
                if schema.options().validate_utf8_on_parse() {
                    parsed.value(Some(reader.buffer()), &plan.name)?;
                }
                list.push(parsed);
            }
            Self::RepeatedBlob(list) => list.push(read_holder(reader)?),
            Self::RepeatedMessage { id, items } => {
                let len = read_length(reader)?;
                let id = *id;
                let child = items.push_slot(|| Message::detached(schema.clone(), id));
                child.parse_nested(reader, len, depth + 1)?;
            }
        }
        Ok(())
    }

    /// Resets the field; sub-messages and slots are kept for reuse.
    pub(crate) fn clear(&mut self, plan: &FieldPlan) {
        match self {
            Self::Scalar { bits, .. } => *bits = scalar_default(plan),
            Self::Text(holder) => holder.reset(),
            Self::Blob(holder) => holder.reset(),
            Self::Message { value, .. } => {
                if let Some(child) = value {
                    child.clear();
                }
            }
            Self::RepeatedScalar { values, .. } => values.clear(),
            Self::RepeatedText(list) => list.clear_with(Deferred::reset),
            Self::RepeatedBlob(list) => list.clear_with(Deferred::reset),
            Self::RepeatedMessage { items, .. } => items.clear_with(Message::clear),
        }
    }

    /// Copies `other`'s value of this field into `self`.
    ///
    /// Buffer-Referenzen werden dabei materialisiert; das Ergebnis hängt an
    /// keinem fremden Quell-Buffer.
    pub(crate) fn copy_from(
        &mut self,
        plan: &FieldPlan,
        other: &FieldStorage<'_>,
        other_source: Option<&[u8]>,
        schema: &Arc<CompiledSchema>,
    ) -> Result<()> {
        match (self, other) {
            (Self::Scalar { bits, .. }, FieldStorage::Scalar { bits: theirs, .. }) => *bits = *theirs,
            (Self::Text(holder), FieldStorage::Text(theirs)) => {
                *holder = theirs.to_owned_holder(other_source, &plan.name)?;
            }
            (Self::Blob(holder), FieldStorage::Blob(theirs)) => {
                *holder = theirs.to_owned_holder(other_source, &plan.name)?;
            }
            (Self::Message { id, value }, FieldStorage::Message { value: theirs, .. }) => {
                if let Some(theirs) = theirs {
                    let child = value.get_or_insert_with(|| Box::new(Message::detached(schema.clone(), *id)));
                    child.copy_from(theirs)?;
                }
            }
            (Self::RepeatedScalar { values, .. }, FieldStorage::RepeatedScalar { values: theirs, .. }) => {
                let initial = schema.options().repeated_initial_capacity();
                for &bits in theirs {
                    push_numeric(values, bits, initial);
                }
            }
            (Self::RepeatedText(list), FieldStorage::RepeatedText(theirs)) => {
                for holder in theirs.iter() {
                    list.push(holder.to_owned_holder(other_source, &plan.name)?);
                }
            }
            (Self::RepeatedBlob(list), FieldStorage::RepeatedBlob(theirs)) => {
                for holder in theirs.iter() {
                    list.push(holder.to_owned_holder(other_source, &plan.name)?);
                }
            }
            (Self::RepeatedMessage { id, items }, FieldStorage::RepeatedMessage { items: theirs, .. }) => {
                let id = *id;
                for theirs in theirs.iter() {
                    let child = items.push_slot(|| Message::detached(schema.clone(), id));
                    child.copy_from(theirs)?;
                }
            }
            (mine, theirs) => {
                return Err(Error::LayoutMismatch {
                    expected: mine.variant_name().into(),
                    found: theirs.variant_name().into(),
                })
            }
        }
        Ok(())
    }

    /// Value equality, resolving buffer references on both sides.
    pub(crate) fn same_value(&self, source: Option<&[u8]>, other: &FieldStorage<'_>, other_source: Option<&[u8]>) -> bool {
        match (self, other) {
            (Self::Scalar { bits, .. }, FieldStorage::Scalar { bits: theirs, .. }) => bits == theirs,
            (Self::Text(mine), FieldStorage::Text(theirs)) => same_raw(mine, source, theirs, other_source),
            (Self::Blob(mine), FieldStorage::Blob(theirs)) => same_raw(mine, source, theirs, other_source),
            (Self::Message { value: mine, .. }, FieldStorage::Message { value: theirs, .. }) => match (mine, theirs) {
                (Some(mine), Some(theirs)) => **mine == **theirs,
                (None, None) => true,
                _ => false,
            },
            (Self::RepeatedScalar { values, .. }, FieldStorage::RepeatedScalar { values: theirs, .. }) => {
                values == theirs
            }
            (Self::RepeatedText(mine), FieldStorage::RepeatedText(theirs)) => {
                mine.len() == theirs.len()
                    && mine
                        .iter()
                        .zip(theirs.iter())
                        .all(|(a, b)| same_raw(a, source, b, other_source))
            }
            (Self::RepeatedBlob(mine), FieldStorage::RepeatedBlob(theirs)) => {
                mine.len() == theirs.len()
                    && mine
                        .iter()
                        .zip(theirs.iter())
                        .all(|(a, b)| same_raw(a, source, b, other_source))
            }
            (Self::RepeatedMessage { items: mine, .. }, FieldStorage::RepeatedMessage { items: theirs, .. }) => {
                mine.len() == theirs.len() && mine.iter().zip(theirs.iter()).all(|(a, b)| a == b)
            }
            _ => false,
        }
    }
}

fn same_raw<T: DeferredValue>(
    mine: &Deferred<T>,
    source: Option<&[u8]>,
    theirs: &Deferred<T>,
    other_source: Option<&[u8]>,
) -> bool {
    match (mine.raw(source), theirs.raw(other_source)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Appends to a repeated numeric field: first allocation `initial`, then doubling.
pub(crate) fn push_numeric(values: &mut Vec<u64>, bits: u64, initial: usize) {
    if values.len() == values.capacity() {
        let target = if values.capacity() == 0 {
            initial
        } else {
            values.capacity() * 2
        };
        values.reserve_exact(target - values.len());
    }
    values.push(bits);
}

fn scalar_default(plan: &FieldPlan) -> u64 {
    match plan.default {
        Some(DefaultValue::Scalar(bits)) => bits,
        _ => 0,
    }
}

/// Length prefix plus payload.
#[inline]
fn delimited_size(len: usize) -> usize {
    varint::varint_u32_size(len as u32) + len
}

fn length_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::invalid_schema("length-delimited payload exceeds 4 GiB"))
}

fn write_holder<T: DeferredValue>(
    writer: &mut WireWriter,
    tag: u32,
    holder: &Deferred<T>,
    source: Option<&[u8]>,
) -> Result<()> {
    varint::write_varint_u32(writer, tag);
    varint::write_varint_u32(writer, length_u32(holder.len())?);
    holder.write_to(writer, source)
}

fn write_child(writer: &mut WireWriter, tag: u32, child: &Message<'_>) -> Result<()> {
    varint::write_varint_u32(writer, tag);
    varint::write_varint_u32(writer, length_u32(child.compute_size())?);
    child.write_fields(writer)
}

/// Reads a length prefix; negative lengths cannot be satisfied by any stream.
fn read_length(reader: &mut WireReader<'_>) -> Result<usize> {
    let len = varint::read_varint32(reader)?;
    usize::try_from(len).map_err(|_| Error::PrematureEndOfStream)
}

/// Records a buffer reference for the next length-delimited payload.
fn read_holder<T: DeferredValue>(reader: &mut WireReader<'_>) -> Result<Deferred<T>> {
    let len = read_length(reader)?;
    let offset = reader.position();
    reader.skip(len)?;
    Ok(Deferred::borrowed(offset, len))
}
