//! Message instances: storage, presence bits, size cache and borrowed source.
//!
//! Eine [`Message`] ist die Laufzeit-Instanz eines kompilierten Message-Typs.
//! Sie hält pro Feld eine Storage gemäß [`FieldPlan`], die Presence-Wörter,
//! einen Size-Cache und (nach `parse_from`) genau eine Referenz auf den
//! Quell-Buffer, aus dem nicht materialisierte Strings/Bytes gelesen werden.
//!
//! Felder werden per Name (`&str`) oder per vorab aufgelöstem [`FieldIdx`]
//! adressiert.
//!
//! # Beispiel
//!
//! ```
//! use protolite::layout::CompiledSchema;
//! use protolite::schema::{DefaultLiteral, FieldDecl, FieldType, MessageDecl, Schema};
//!
//! let schema = CompiledSchema::compile(&Schema::new().message(
//!     MessageDecl::new("M")
//!         .field(FieldDecl::required("a", 1, FieldType::Int32))
//!         .field(FieldDecl::optional("b", 2, FieldType::Int32).with_default(DefaultLiteral::Int(5))),
//! ))
//! .unwrap();
//!
//! let mut m = schema.new_message("M").unwrap();
//! m.set("a", 2i32).unwrap();
//! let bytes = m.to_bytes().unwrap();
//! assert_eq!(bytes, [0x08, 0x02]);
//!
//! let mut parsed = schema.new_message("M").unwrap();
//! parsed.parse_bytes(&bytes).unwrap();
//! assert_eq!(parsed.get::<i32>("a").unwrap(), 2);
//! assert!(!parsed.has("b").unwrap());
//! assert_eq!(parsed.get::<i32>("b").unwrap(), 5);
//! ```

use std::cell::Cell;
use std::sync::Arc;

use crate::bytestream::{WireReader, WireWriter};
use crate::deferred::Deferred;
use crate::field::storage::{push_numeric, FieldStorage};
use crate::field::{DefaultValue, FieldIdx, FieldPlan, FieldVariant, NumericKind, Scalar, ScalarType};
use crate::layout::{CompiledSchema, EnumId, MessageId, MessageLayout};
use crate::wire_type::{field_number_of, skip_unknown_field};
use crate::{varint, Error, Result};

/// Lifecycle of a message instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    /// Frisch erzeugt oder nach `clear()`.
    Clean,
    /// Mindestens ein Setter/Adder wurde aufgerufen.
    Building,
    /// Nach erfolgreichem `parse_from`.
    Parsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CachedSize {
    Unknown,
    Known(usize),
}

/// Decoded value of an enum field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumValue<'s> {
    Known { name: &'s str, number: i32 },
    /// Nummer ohne Eintrag in der Wertetabelle; bleibt beim Serialisieren erhalten.
    Unrecognized(i32),
}

impl EnumValue<'_> {
    pub fn number(&self) -> i32 {
        match self {
            Self::Known { number, .. } | Self::Unrecognized(number) => *number,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Known { name, .. } => Some(*name),
            Self::Unrecognized(_) => None,
        }
    }
}

/// Addresses a field of a message: by name or by pre-resolved index.
pub trait FieldRef {
    fn resolve(&self, layout: &MessageLayout) -> Result<FieldIdx>;
}

impl FieldRef for &str {
    fn resolve(&self, layout: &MessageLayout) -> Result<FieldIdx> {
        layout
            .field_index(self)
            .ok_or_else(|| Error::unknown_field(format!("{}.{self}", layout.name())))
    }
}

impl FieldRef for &String {
    fn resolve(&self, layout: &MessageLayout) -> Result<FieldIdx> {
        self.as_str().resolve(layout)
    }
}

impl FieldRef for FieldIdx {
    fn resolve(&self, layout: &MessageLayout) -> Result<FieldIdx> {
        match layout.field(*self) {
            Some(_) => Ok(*self),
            None => Err(Error::unknown_field(format!("{}#{}", layout.name(), self.0))),
        }
    }
}

/// One instance of a compiled message type.
///
/// `'a` is the lifetime of the buffer the message was last parsed from;
/// string and bytes fields may keep referring into it until they are read.
#[derive(Debug, Clone)]
pub struct Message<'a> {
    schema: Arc<CompiledSchema>,
    id: MessageId,
    fields: Vec<FieldStorage<'a>>,
    bits: Vec<u32>,
    cached_size: Cell<CachedSize>,
    source: Option<&'a [u8]>,
    state: MessageState,
}

impl<'a> Message<'a> {
    /// Creates an empty instance of the named message type.
    pub fn new(schema: &Arc<CompiledSchema>, name: &str) -> Result<Self> {
        schema.new_message(name)
    }

    pub(crate) fn detached(schema: Arc<CompiledSchema>, id: MessageId) -> Self {
        let layout = schema.layout(id);
        let fields = layout.fields().iter().map(FieldStorage::declare).collect();
        let bits = layout.presence().new_words();
        Self {
            schema,
            id,
            fields,
            bits,
            cached_size: Cell::new(CachedSize::Unknown),
            source: None,
            state: MessageState::Clean,
        }
    }

    pub fn schema(&self) -> &Arc<CompiledSchema> {
        &self.schema
    }

    pub fn layout(&self) -> &MessageLayout {
        self.schema.layout(self.id)
    }

    /// Qualified message type name.
    pub fn type_name(&self) -> &str {
        self.layout().name()
    }

    pub fn state(&self) -> MessageState {
        self.state
    }

    /// Resolves a field name to an index handle for repeated access.
    pub fn field_index(&self, name: &str) -> Result<FieldIdx> {
        name.resolve(self.layout())
    }

    // ==================== interne Helfer ====================

    fn slot(&self, field: impl FieldRef) -> Result<(&FieldPlan, &FieldStorage<'a>)> {
        let layout = self.schema.layout(self.id);
        let idx = field.resolve(layout)?;
        Ok((&layout.fields()[idx.0], &self.fields[idx.0]))
    }

    fn slot_mut(&mut self, field: impl FieldRef) -> Result<(&FieldPlan, &mut FieldStorage<'a>, &mut [u32])> {
        let layout = self.schema.layout(self.id);
        let idx = field.resolve(layout)?;
        Ok((&layout.fields()[idx.0], &mut self.fields[idx.0], &mut self.bits))
    }

    #[inline]
    fn is_present(&self, plan: &FieldPlan) -> bool {
        plan.presence.is_some_and(|bit| bit.is_set(&self.bits))
    }

    /// Every mutation ends here: size cache stale, state `Building`.
    #[inline]
    fn touch(&mut self) {
        self.cached_size.set(CachedSize::Unknown);
        self.state = MessageState::Building;
    }

    fn enum_value(&self, id: EnumId, number: i32) -> EnumValue<'_> {
        match self.schema.enum_layout(id).name_of(number) {
            Some(name) => EnumValue::Known { name, number },
            None => EnumValue::Unrecognized(number),
        }
    }

    fn enum_number(&self, id: EnumId, symbol: &str) -> Result<i32> {
        let table = self.schema.enum_layout(id);
        table.number_of(symbol).ok_or_else(|| Error::UnknownEnumValue {
            enum_name: table.name().to_string().into(),
            value: symbol.to_string().into(),
        })
    }

    // ==================== Presence ====================

    /// Presence bit for singular fields, `count > 0` for repeated ones.
    pub fn has(&self, field: impl FieldRef) -> Result<bool> {
        let (plan, storage) = self.slot(field)?;
        Ok(match plan.presence {
            Some(bit) => bit.is_set(&self.bits),
            None => storage.count() > 0,
        })
    }

    /// Element count of a repeated field.
    pub fn count(&self, field: impl FieldRef) -> Result<usize> {
        let (plan, storage) = self.slot(field)?;
        if !plan.is_repeated() {
            return Err(Error::type_mismatch(plan.name.clone(), storage.variant_name(), "repeated"));
        }
        Ok(storage.count())
    }

    // ==================== singuläre numerische Felder ====================

    /// Value of a singular numeric field in its Rust representation.
    pub fn get_scalar(&self, field: impl FieldRef) -> Result<Scalar> {
        let (plan, storage) = self.slot(field)?;
        match storage {
            FieldStorage::Scalar { kind, bits } => {
                if !self.is_present(plan) && plan.default.is_none() {
                    return Err(Error::field_not_set(plan.name.clone()));
                }
                Ok(kind.to_scalar(*bits))
            }
            other => Err(Error::type_mismatch(plan.name.clone(), other.variant_name(), "scalar")),
        }
    }

    pub fn get<T: ScalarType>(&self, field: impl FieldRef) -> Result<T> {
        let idx = field.resolve(self.layout())?;
        let value = self.get_scalar(idx)?;
        T::from_scalar(value).ok_or_else(|| {
            Error::type_mismatch(self.layout().fields()[idx.0].name.clone(), value.type_name(), T::NAME)
        })
    }

    pub fn set_scalar(&mut self, field: impl FieldRef, value: Scalar) -> Result<&mut Self> {
        let (plan, storage, bits) = self.slot_mut(field)?;
        match storage {
            FieldStorage::Scalar { kind, bits: slot } => *slot = kind.to_bits(&plan.name, value)?,
            other => {
                return Err(Error::type_mismatch(plan.name.clone(), other.variant_name(), value.type_name()))
            }
        }
        if let Some(bit) = plan.presence {
            bit.set(bits);
        }
        self.touch();
        Ok(self)
    }

    pub fn set<T: ScalarType>(&mut self, field: impl FieldRef, value: T) -> Result<&mut Self> {
        self.set_scalar(field, value.into_scalar())
    }

    // ==================== Enums ====================

    pub fn get_enum(&self, field: impl FieldRef) -> Result<EnumValue<'_>> {
        let (plan, storage) = self.slot(field)?;
        match storage {
            FieldStorage::Scalar {
                kind: NumericKind::Enum(id),
                bits,
            } => {
                if !self.is_present(plan) && plan.default.is_none() {
                    return Err(Error::field_not_set(plan.name.clone()));
                }
                Ok(self.enum_value(*id, *bits as u32 as i32))
            }
            other => Err(Error::type_mismatch(plan.name.clone(), other.variant_name(), "enum")),
        }
    }

    /// Sets an enum field by symbol name.
    pub fn set_enum(&mut self, field: impl FieldRef, symbol: &str) -> Result<&mut Self> {
        let idx = field.resolve(self.layout())?;
        let id = self.layout().fields()[idx.0]
            .variant()
            .enum_id()
            .ok_or_else(|| Error::type_mismatch(self.layout().fields()[idx.0].name.clone(), "non-enum", "enum"))?;
        let number = self.enum_number(id, symbol)?;
        self.set_scalar(idx, Scalar::I32(number))
    }

    /// Sets an enum field by number; numbers outside the table are kept as-is.
    pub fn set_enum_number(&mut self, field: impl FieldRef, number: i32) -> Result<&mut Self> {
        let idx = field.resolve(self.layout())?;
        let plan = &self.layout().fields()[idx.0];
        if plan.variant().enum_id().is_none() {
            return Err(Error::type_mismatch(plan.name.clone(), "non-enum", "enum"));
        }
        self.set_scalar(idx, Scalar::I32(number))
    }

    // ==================== Strings & Bytes ====================

    pub fn get_str(&self, field: impl FieldRef) -> Result<&str> {
        let (plan, storage) = self.slot(field)?;
        match storage {
            FieldStorage::Text(holder) => {
                if self.is_present(plan) {
                    return Ok(holder.value(self.source, &plan.name)?.map_or("", String::as_str));
                }
                match &plan.default {
                    Some(DefaultValue::Text(text)) => Ok(text),
                    _ => Err(Error::field_not_set(plan.name.clone())),
                }
            }
            other => Err(Error::type_mismatch(plan.name.clone(), other.variant_name(), "string")),
        }
    }

    pub fn set_str(&mut self, field: impl FieldRef, value: impl Into<String>) -> Result<&mut Self> {
        let (plan, storage, bits) = self.slot_mut(field)?;
        match storage {
            FieldStorage::Text(holder) => *holder = Deferred::owned(value.into()),
            other => return Err(Error::type_mismatch(plan.name.clone(), other.variant_name(), "string")),
        }
        if let Some(bit) = plan.presence {
            bit.set(bits);
        }
        self.touch();
        Ok(self)
    }

    /// Bytes of a bytes field; points into the source buffer until the value is replaced.
    pub fn get_bytes(&self, field: impl FieldRef) -> Result<&[u8]> {
        let (plan, storage) = self.slot(field)?;
        match storage {
            FieldStorage::Blob(holder) => {
                if self.is_present(plan) {
                    return holder.raw(self.source);
                }
                match &plan.default {
                    Some(DefaultValue::Blob(bytes)) => Ok(bytes),
                    _ => Err(Error::field_not_set(plan.name.clone())),
                }
            }
            other => Err(Error::type_mismatch(plan.name.clone(), other.variant_name(), "bytes")),
        }
    }

    pub fn set_bytes(&mut self, field: impl FieldRef, value: impl Into<Vec<u8>>) -> Result<&mut Self> {
        let (plan, storage, bits) = self.slot_mut(field)?;
        match storage {
            FieldStorage::Blob(holder) => *holder = Deferred::owned(value.into()),
            other => return Err(Error::type_mismatch(plan.name.clone(), other.variant_name(), "bytes")),
        }
        if let Some(bit) = plan.presence {
            bit.set(bits);
        }
        self.touch();
        Ok(self)
    }

    // ==================== Sub-Messages ====================

    pub fn get_message(&self, field: impl FieldRef) -> Result<&Message<'a>> {
        let (plan, storage) = self.slot(field)?;
        match storage {
            FieldStorage::Message { value, .. } => match value {
                Some(child) if self.is_present(plan) => Ok(&**child),
                _ => Err(Error::field_not_set(plan.name.clone())),
            },
            other => Err(Error::type_mismatch(plan.name.clone(), other.variant_name(), "message")),
        }
    }

    /// Sub-message for mutation; constructed on first access and marked present.
    pub fn mutable_message(&mut self, field: impl FieldRef) -> Result<&mut Message<'a>> {
        let Self {
            schema,
            id,
            fields,
            bits,
            cached_size,
            state,
            ..
        } = &mut *self;
        let layout = schema.layout(*id);
        let idx = field.resolve(layout)?;
        let plan = &layout.fields()[idx.0];
        match &mut fields[idx.0] {
            FieldStorage::Message { id: child_id, value } => {
                if let Some(bit) = plan.presence {
                    bit.set(bits);
                }
                cached_size.set(CachedSize::Unknown);
                *state = MessageState::Building;
                let child_id = *child_id;
                Ok(&mut **value.get_or_insert_with(|| Box::new(Message::detached(Arc::clone(schema), child_id))))
            }
            other => Err(Error::type_mismatch(plan.name.clone(), other.variant_name(), "message")),
        }
    }

    // ==================== Repeated ====================

    fn out_of_range(plan: &FieldPlan, index: usize, count: usize) -> Error {
        Error::IndexOutOfRange {
            field: plan.name.clone().into(),
            index,
            count,
        }
    }

    pub fn get_scalar_at(&self, field: impl FieldRef, index: usize) -> Result<Scalar> {
        let (plan, storage) = self.slot(field)?;
        match storage {
            FieldStorage::RepeatedScalar { kind, values } => values
                .get(index)
                .map(|&bits| kind.to_scalar(bits))
                .ok_or_else(|| Self::out_of_range(plan, index, values.len())),
            other => Err(Error::type_mismatch(plan.name.clone(), other.variant_name(), "repeated scalar")),
        }
    }

    pub fn get_at<T: ScalarType>(&self, field: impl FieldRef, index: usize) -> Result<T> {
        let idx = field.resolve(self.layout())?;
        let value = self.get_scalar_at(idx, index)?;
        T::from_scalar(value).ok_or_else(|| {
            Error::type_mismatch(self.layout().fields()[idx.0].name.clone(), value.type_name(), T::NAME)
        })
    }

    /// All values of a repeated numeric field.
    pub fn get_all<T: ScalarType>(&self, field: impl FieldRef) -> Result<Vec<T>> {
        let idx = field.resolve(self.layout())?;
        (0..self.count(idx)?).map(|i| self.get_at(idx, i)).collect()
    }

    pub fn add_scalar(&mut self, field: impl FieldRef, value: Scalar) -> Result<&mut Self> {
        let initial = self.schema.options().repeated_initial_capacity();
        let (plan, storage, _) = self.slot_mut(field)?;
        match storage {
            FieldStorage::RepeatedScalar { kind, values } => {
                let bits = kind.to_bits(&plan.name, value)?;
                push_numeric(values, bits, initial);
            }
            other => {
                return Err(Error::type_mismatch(plan.name.clone(), other.variant_name(), value.type_name()))
            }
        }
        self.touch();
        Ok(self)
    }

    pub fn add<T: ScalarType>(&mut self, field: impl FieldRef, value: T) -> Result<&mut Self> {
        self.add_scalar(field, value.into_scalar())
    }

    pub fn get_enum_at(&self, field: impl FieldRef, index: usize) -> Result<EnumValue<'_>> {
        let (plan, storage) = self.slot(field)?;
        match storage {
            FieldStorage::RepeatedScalar {
                kind: NumericKind::Enum(id),
                values,
            } => values
                .get(index)
                .map(|&bits| self.enum_value(*id, bits as u32 as i32))
                .ok_or_else(|| Self::out_of_range(plan, index, values.len())),
            other => Err(Error::type_mismatch(plan.name.clone(), other.variant_name(), "repeated enum")),
        }
    }

    pub fn add_enum(&mut self, field: impl FieldRef, symbol: &str) -> Result<&mut Self> {
        let idx = field.resolve(self.layout())?;
        let plan = &self.layout().fields()[idx.0];
        let id = match plan.variant() {
            FieldVariant::RepeatedScalar {
                kind: NumericKind::Enum(id),
                ..
            } => id,
            _ => return Err(Error::type_mismatch(plan.name.clone(), plan.variant().describe(), "repeated enum")),
        };
        let number = self.enum_number(id, symbol)?;
        self.add_scalar(idx, Scalar::I32(number))
    }

    pub fn get_str_at(&self, field: impl FieldRef, index: usize) -> Result<&str> {
        let (plan, storage) = self.slot(field)?;
        match storage {
            FieldStorage::RepeatedText(list) => {
                let holder = list
                    .get(index)
                    .ok_or_else(|| Self::out_of_range(plan, index, list.len()))?;
                Ok(holder.value(self.source, &plan.name)?.map_or("", String::as_str))
            }
            other => Err(Error::type_mismatch(plan.name.clone(), other.variant_name(), "repeated string")),
        }
    }

    pub fn add_str(&mut self, field: impl FieldRef, value: impl Into<String>) -> Result<&mut Self> {
        let (plan, storage, _) = self.slot_mut(field)?;
        match storage {
            FieldStorage::RepeatedText(list) => list.push(Deferred::owned(value.into())),
            other => return Err(Error::type_mismatch(plan.name.clone(), other.variant_name(), "string")),
        }
        self.touch();
        Ok(self)
    }

    /// Appends every string of `values`.
    pub fn add_all_str<I, S>(&mut self, field: impl FieldRef, values: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let idx = field.resolve(self.layout())?;
        for value in values {
            self.add_str(idx, value)?;
        }
        // Auch eine leere Sequenz zählt als Mutation
        self.touch();
        Ok(self)
    }

    pub fn get_bytes_at(&self, field: impl FieldRef, index: usize) -> Result<&[u8]> {
        let (plan, storage) = self.slot(field)?;
        match storage {
            FieldStorage::RepeatedBlob(list) => list
                .get(index)
                .ok_or_else(|| Self::out_of_range(plan, index, list.len()))?
                .raw(self.source),
            other => Err(Error::type_mismatch(plan.name.clone(), other.variant_name(), "repeated bytes")),
        }
    }

    pub fn add_bytes(&mut self, field: impl FieldRef, value: impl Into<Vec<u8>>) -> Result<&mut Self> {
        let (plan, storage, _) = self.slot_mut(field)?;
        match storage {
            FieldStorage::RepeatedBlob(list) => list.push(Deferred::owned(value.into())),
            other => return Err(Error::type_mismatch(plan.name.clone(), other.variant_name(), "bytes")),
        }
        self.touch();
        Ok(self)
    }

    pub fn get_message_at(&self, field: impl FieldRef, index: usize) -> Result<&Message<'a>> {
        let (plan, storage) = self.slot(field)?;
        match storage {
            FieldStorage::RepeatedMessage { items, .. } => items
                .get(index)
                .ok_or_else(|| Self::out_of_range(plan, index, items.len())),
            other => Err(Error::type_mismatch(plan.name.clone(), other.variant_name(), "repeated message")),
        }
    }

    /// Appends an element, reusing a previously allocated sub-message when available.
    pub fn add_message(&mut self, field: impl FieldRef) -> Result<&mut Message<'a>> {
        let Self {
            schema,
            id,
            fields,
            cached_size,
            state,
            ..
        } = &mut *self;
        let layout = schema.layout(*id);
        let idx = field.resolve(layout)?;
        let plan = &layout.fields()[idx.0];
        match &mut fields[idx.0] {
            FieldStorage::RepeatedMessage { id: child_id, items } => {
                cached_size.set(CachedSize::Unknown);
                *state = MessageState::Building;
                let child_id = *child_id;
                Ok(items.push_slot(|| Message::detached(Arc::clone(schema), child_id)))
            }
            other => Err(Error::type_mismatch(plan.name.clone(), other.variant_name(), "message")),
        }
    }

    // ==================== Clear ====================

    /// Resets one field to its declared default and clears its presence.
    pub fn clear_field(&mut self, field: impl FieldRef) -> Result<&mut Self> {
        let (plan, storage, bits) = self.slot_mut(field)?;
        storage.clear(plan);
        if let Some(bit) = plan.presence {
            bit.unset(bits);
        }
        self.touch();
        Ok(self)
    }

    /// Resets every field, drops the source buffer reference; allocations are kept.
    pub fn clear(&mut self) {
        let layout = self.schema.layout(self.id);
        for (storage, plan) in self.fields.iter_mut().zip(layout.fields()) {
            storage.clear(plan);
        }
        self.bits.fill(0);
        self.cached_size.set(CachedSize::Unknown);
        self.source = None;
        self.state = MessageState::Clean;
    }

    // ==================== Required ====================

    /// `Ok` iff every required field is set; otherwise lists all missing ones.
    pub fn check_required_fields(&self) -> Result<()> {
        let layout = self.layout();
        if layout.presence().check_required(&self.bits) {
            return Ok(());
        }
        Err(Error::RequiredFieldsMissing {
            message: layout.name().to_string().into(),
            missing: layout.missing_required(&self.bits),
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.layout().presence().check_required(&self.bits)
    }

    // ==================== Size & Serialize ====================

    /// Encoded size in bytes; cached until the next mutation.
    pub fn compute_size(&self) -> usize {
        if let CachedSize::Known(size) = self.cached_size.get() {
            return size;
        }
        let layout = self.layout();
        let size = layout
            .fields()
            .iter()
            .zip(&self.fields)
            .filter(|(plan, _)| plan.presence.map_or(true, |bit| bit.is_set(&self.bits)))
            .map(|(plan, storage)| storage.size(plan))
            .sum();
        self.cached_size.set(CachedSize::Known(size));
        size
    }

    /// Writes the message body; returns the number of bytes written.
    pub fn serialize(&self, writer: &mut WireWriter) -> Result<usize> {
        let start = writer.position();
        self.write_fields(writer)?;
        Ok(writer.position() - start)
    }

    /// Serializes into a fresh buffer sized by [`compute_size`](Self::compute_size).
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = WireWriter::with_capacity(self.compute_size());
        self.serialize(&mut writer)?;
        Ok(writer.into_vec())
    }

    pub(crate) fn write_fields(&self, writer: &mut WireWriter) -> Result<()> {
        let layout = self.layout();
        if layout.has_required() {
            self.check_required_fields()?;
        }
        for (plan, storage) in layout.fields().iter().zip(&self.fields) {
            if plan.presence.is_some_and(|bit| !bit.is_set(&self.bits)) {
                continue;
            }
            storage.write(plan, writer, self.source)?;
        }
        Ok(())
    }

    // ==================== Parse ====================

    /// Parses exactly `len` bytes from `reader` into this (cleared) instance.
    ///
    /// Strings and bytes stay references into the reader's buffer until read.
    pub fn parse_from(&mut self, reader: &mut WireReader<'a>, len: usize) -> Result<()> {
        self.parse_nested(reader, len, 0)
    }

    /// Parses a complete buffer.
    pub fn parse_bytes(&mut self, data: &'a [u8]) -> Result<()> {
        let mut reader = WireReader::new(data);
        self.parse_from(&mut reader, data.len())
    }

    pub(crate) fn parse_nested(&mut self, reader: &mut WireReader<'a>, len: usize, depth: usize) -> Result<()> {
        let limit = self.schema.options().recursion_limit();
        if depth > limit {
            return Err(Error::RecursionLimitExceeded(limit));
        }
        self.clear();
        let old_limit = reader.push_limit(len)?;

        let Self {
            schema, id, fields, bits, ..
        } = &mut *self;
        let layout = schema.layout(*id);
        while !reader.is_at_limit() {
            let tag = varint::read_varint32(reader)? as u32;
            if field_number_of(tag) == 0 {
                return Err(Error::InvalidTag(tag));
            }
            match layout.dispatch(tag) {
                Some((idx, form)) => {
                    let plan = &layout.fields()[idx.0];
                    fields[idx.0].parse_one(plan, form, reader, schema, depth)?;
                    if let Some(bit) = plan.presence {
                        bit.set(bits);
                    }
                }
                None => skip_unknown_field(tag, reader)?,
            }
        }
        reader.pop_limit(old_limit);

        if layout.has_required() {
            self.check_required_fields()?;
        }
        self.source = Some(reader.buffer());
        self.state = MessageState::Parsed;
        Ok(())
    }

    // ==================== Copy ====================

    /// Merges `other` into this instance.
    ///
    /// Singuläre Felder (auch required) nur wenn in `other` gesetzt, sonst
    /// bleibt der eigene Wert stehen. Repeated Felder werden angehängt.
    /// Buffer-Referenzen werden materialisiert.
    pub fn copy_from(&mut self, other: &Message<'_>) -> Result<()> {
        if !Arc::ptr_eq(&self.schema, &other.schema) || self.id != other.id {
            return Err(Error::LayoutMismatch {
                expected: self.type_name().to_string().into(),
                found: other.type_name().to_string().into(),
            });
        }
        self.touch();
        let Self {
            schema, id, fields, bits, ..
        } = &mut *self;
        let layout = schema.layout(*id);
        for (i, plan) in layout.fields().iter().enumerate() {
            let theirs = &other.fields[i];
            match plan.presence {
                Some(bit) => {
                    if bit.is_set(&other.bits) {
                        fields[i].copy_from(plan, theirs, other.source, schema)?;
                        bit.set(bits);
                    }
                }
                None => fields[i].copy_from(plan, theirs, other.source, schema)?,
            }
        }
        Ok(())
    }
}

impl PartialEq<Message<'_>> for Message<'_> {
    /// Same type, same presence bits and equal values for every present field.
    fn eq(&self, other: &Message<'_>) -> bool {
        if !Arc::ptr_eq(&self.schema, &other.schema) || self.id != other.id || self.bits != other.bits {
            return false;
        }
        let layout = self.layout();
        layout.fields().iter().enumerate().all(|(i, plan)| {
            if plan.presence.is_some_and(|bit| !bit.is_set(&self.bits)) {
                return true;
            }
            self.fields[i].same_value(self.source, &other.fields[i], other.source)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DefaultLiteral, EnumDecl, FieldDecl, FieldType, MessageDecl, Schema};

    fn schema() -> Arc<CompiledSchema> {
        CompiledSchema::compile(
            &Schema::new()
                .enumeration(EnumDecl::new("Color").value("RED", 0).value("GREEN", 1))
                .message(
                    MessageDecl::new("M")
                        .field(FieldDecl::required("a", 1, FieldType::Int32))
                        .field(FieldDecl::optional("b", 2, FieldType::Int32).with_default(DefaultLiteral::Int(5)))
                        .field(FieldDecl::optional("s", 3, FieldType::String))
                        .field(FieldDecl::repeated("v", 4, FieldType::Sint64))
                        .field(FieldDecl::optional("c", 5, FieldType::Named("Color".into())))
                        .field(FieldDecl::optional("child", 6, FieldType::Named("M".into())))
                        .field(FieldDecl::repeated("kids", 7, FieldType::Named("M".into()))),
                ),
        )
        .unwrap()
    }

    #[test]
    fn fresh_message_is_clean() {
        let s = schema();
        let m = s.new_message("M").unwrap();
        assert_eq!(m.state(), MessageState::Clean);
        assert!(!m.has("a").unwrap());
        assert_eq!(m.get::<i32>("a").unwrap_err(), Error::field_not_set("a"));
        assert_eq!(m.get::<i32>("b").unwrap(), 5);
        assert_eq!(m.count("v").unwrap(), 0);
        assert!(!m.is_initialized());
    }

    #[test]
    fn setter_marks_presence_and_building() {
        let s = schema();
        let mut m = s.new_message("M").unwrap();
        m.set("a", 7i32).unwrap().set_str("s", "x").unwrap();
        assert!(m.has("a").unwrap());
        assert!(m.has("s").unwrap());
        assert_eq!(m.state(), MessageState::Building);
        assert_eq!(m.get_str("s").unwrap(), "x");
    }

    #[test]
    fn typed_accessors_check_kind() {
        let s = schema();
        let mut m = s.new_message("M").unwrap();
        assert_eq!(
            m.set("a", 1i64).unwrap_err(),
            Error::type_mismatch("a", "i32", "i64")
        );
        assert!(matches!(m.set_str("a", "x").unwrap_err(), Error::TypeMismatch { .. }));
        assert!(matches!(m.get_str("nope").unwrap_err(), Error::UnknownField(_)));
        assert!(matches!(m.count("a").unwrap_err(), Error::TypeMismatch { .. }));
    }

    #[test]
    fn size_cache_is_invalidated() {
        let s = schema();
        let mut m = s.new_message("M").unwrap();
        m.set("a", 1i32).unwrap();
        assert_eq!(m.compute_size(), 2);
        m.add("v", -1i64).unwrap();
        assert_eq!(m.compute_size(), 4);
        m.mutable_message("child").unwrap().set("a", 300i32).unwrap();
        // Tag + Länge + (Tag + 2 Byte Varint)
        assert_eq!(m.compute_size(), 4 + 1 + 1 + 3);
        m.clear_field("child").unwrap();
        assert_eq!(m.compute_size(), 4);
        m.clear();
        assert_eq!(m.compute_size(), 0);
        assert_eq!(m.state(), MessageState::Clean);
    }

    #[test]
    fn enum_values() {
        let s = schema();
        let mut m = s.new_message("M").unwrap();
        m.set_enum("c", "GREEN").unwrap();
        assert_eq!(
            m.get_enum("c").unwrap(),
            EnumValue::Known {
                name: "GREEN",
                number: 1
            }
        );
        m.set_enum_number("c", 42).unwrap();
        assert_eq!(m.get_enum("c").unwrap(), EnumValue::Unrecognized(42));
        assert!(matches!(m.set_enum("c", "BLUE").unwrap_err(), Error::UnknownEnumValue { .. }));
        assert!(matches!(m.set_enum("a", "RED").unwrap_err(), Error::TypeMismatch { .. }));
    }

    #[test]
    fn repeated_messages_reuse_slots() {
        let s = schema();
        let mut m = s.new_message("M").unwrap();
        m.add_message("kids").unwrap().set("a", 1i32).unwrap();
        m.add_message("kids").unwrap().set("a", 2i32).unwrap();
        assert_eq!(m.count("kids").unwrap(), 2);
        assert_eq!(m.get_message_at("kids", 1).unwrap().get::<i32>("a").unwrap(), 2);
        assert!(matches!(
            m.get_message_at("kids", 2).unwrap_err(),
            Error::IndexOutOfRange { index: 2, count: 2, .. }
        ));

        m.clear();
        let kid = m.add_message("kids").unwrap();
        // wiederverwendeter Slot wurde beim clear() geleert
        assert!(!kid.has("a").unwrap());
        assert_eq!(m.count("kids").unwrap(), 1);
    }

    #[test]
    fn get_message_requires_presence() {
        let s = schema();
        let mut m = s.new_message("M").unwrap();
        assert_eq!(m.get_message("child").unwrap_err(), Error::field_not_set("child"));
        m.mutable_message("child").unwrap();
        assert!(m.has("child").unwrap());
        assert!(m.get_message("child").is_ok());
        m.clear_field("child").unwrap();
        assert!(!m.has("child").unwrap());
    }

    #[test]
    fn failed_sub_message_access_leaves_message_untouched() {
        let s = schema();
        let mut m = s.new_message("M").unwrap();
        assert!(matches!(m.mutable_message("nope").unwrap_err(), Error::UnknownField(_)));
        assert!(matches!(m.mutable_message("a").unwrap_err(), Error::TypeMismatch { .. }));
        assert!(matches!(m.add_message("child").unwrap_err(), Error::TypeMismatch { .. }));
        assert_eq!(m.state(), MessageState::Clean);

        m.set("a", 1i32).unwrap();
        assert_eq!(m.compute_size(), 2);
        assert!(m.add_message("a").is_err());
        assert_eq!(m.cached_size.get(), CachedSize::Known(2));

        m.add_message("kids").unwrap();
        assert_eq!(m.cached_size.get(), CachedSize::Unknown);
        assert_eq!(m.state(), MessageState::Building);
    }

    #[test]
    fn field_idx_handles() {
        let s = schema();
        let mut m = s.new_message("M").unwrap();
        let v = m.field_index("v").unwrap();
        for i in 0..10i64 {
            m.add(v, i - 5).unwrap();
        }
        assert_eq!(m.get_all::<i64>(v).unwrap(), (-5..5).collect::<Vec<_>>());
        assert!(matches!(
            m.get_at::<i64>(FieldIdx(99), 0).unwrap_err(),
            Error::UnknownField(_)
        ));
    }

    #[test]
    fn recursion_limit() {
        let s = CompiledSchema::compile_with_options(
            &Schema::new().message(
                MessageDecl::new("Node").field(FieldDecl::optional("next", 1, FieldType::Named("Node".into()))),
            ),
            crate::options::CompileOptions::default().with_recursion_limit(2),
        )
        .unwrap();
        // 3 Ebenen Verschachtelung: 0a 04 0a 02 0a 00
        let data = [0x0a, 0x04, 0x0a, 0x02, 0x0a, 0x00];
        let mut m = s.new_message("Node").unwrap();
        assert_eq!(m.parse_bytes(&data).unwrap_err(), Error::RecursionLimitExceeded(2));
        let ok = [0x0a, 0x02, 0x0a, 0x00];
        m.parse_bytes(&ok).unwrap();
        assert_eq!(m.state(), MessageState::Parsed);
    }

    #[test]
    fn copy_between_types_is_rejected() {
        let s = CompiledSchema::compile(&Schema::new().message(MessageDecl::new("A")).message(MessageDecl::new("B")))
            .unwrap();
        let mut a = s.new_message("A").unwrap();
        let b = s.new_message("B").unwrap();
        assert!(matches!(a.copy_from(&b).unwrap_err(), Error::LayoutMismatch { .. }));
    }
}
