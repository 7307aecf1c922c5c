//! Schema compilation: from declarations to immutable message layouts.
//!
//! [`CompiledSchema::compile`] validiert das Schema-Modell, löst Typnamen auf
//! (innerster Scope zuerst), ordnet jedes Feld einer [`FieldVariant`] zu und
//! berechnet Tags, Presence-Bits, Required-Masken und Defaults. Das Ergebnis
//! wird in einem `Arc` geteilt; alle [`Message`] Instanzen verweisen darauf.
//!
//! # Beispiel
//!
//! ```
//! use protolite::layout::CompiledSchema;
//! use protolite::schema::{FieldDecl, FieldType, MessageDecl, Schema};
//!
//! let schema = Schema::new().message(
//!     MessageDecl::new("Point")
//!         .field(FieldDecl::required("x", 1, FieldType::Int32))
//!         .field(FieldDecl::repeated("tags", 2, FieldType::String)),
//! );
//! let compiled = CompiledSchema::compile(&schema).unwrap();
//! let layout = compiled.layout_by_name("Point").unwrap();
//! assert_eq!(layout.fields().len(), 2);
//! assert!(layout.has_required());
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use log::debug;

use crate::field::{
    DefaultValue, FieldIdx, FieldPlan, FieldVariant, NumericKind, ResolvedType, Scalar, TagForm,
};
use crate::message::Message;
use crate::options::CompileOptions;
use crate::presence::PresenceLayout;
use crate::schema::{DefaultLiteral, EnumDecl, FieldDecl, FieldType, MessageDecl, Schema};
use crate::wire_type::MAX_FIELD_NUMBER;
use crate::{Error, FastHashMap, FastHashSet, FastIndexMap, Result};

/// Index of a message type in its [`CompiledSchema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub(crate) usize);

/// Index of an enum type in its [`CompiledSchema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnumId(pub(crate) usize);

/// Value table of one enum.
#[derive(Debug, Clone)]
pub struct EnumLayout {
    name: String,
    values: Vec<(String, i32)>,
    by_name: FastHashMap<String, i32>,
    /// Erster Name pro Nummer (Aliase teilen sich eine Nummer).
    by_number: FastHashMap<i32, usize>,
}

impl EnumLayout {
    fn compile(name: String, decl: &EnumDecl) -> Result<Self> {
        if decl.values.is_empty() {
            return Err(Error::invalid_schema(format!("enum '{name}' has no values")));
        }
        let mut by_name = FastHashMap::default();
        let mut by_number = FastHashMap::default();
        for (i, (symbol, number)) in decl.values.iter().enumerate() {
            if by_name.insert(symbol.clone(), *number).is_some() {
                return Err(Error::invalid_schema(format!(
                    "enum '{name}' declares '{symbol}' twice"
                )));
            }
            by_number.entry(*number).or_insert(i);
        }
        Ok(Self {
            name,
            values: decl.values.clone(),
            by_name,
            by_number,
        })
    }

    /// Qualified name (`Outer.Inner`).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[(String, i32)] {
        &self.values
    }

    pub fn name_of(&self, number: i32) -> Option<&str> {
        self.by_number.get(&number).map(|&i| self.values[i].0.as_str())
    }

    pub fn number_of(&self, symbol: &str) -> Option<i32> {
        self.by_name.get(symbol).copied()
    }
}

/// Compiled shape of one message type.
#[derive(Debug, Clone)]
pub struct MessageLayout {
    name: String,
    id: MessageId,
    fields: Vec<FieldPlan>,
    by_tag: FastHashMap<u32, (FieldIdx, TagForm)>,
    by_name: FastHashMap<String, FieldIdx>,
    presence: PresenceLayout,
}

impl MessageLayout {
    /// Qualified name (`Outer.Inner`).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Field plans in declaration order.
    pub fn fields(&self) -> &[FieldPlan] {
        &self.fields
    }

    pub fn field(&self, idx: FieldIdx) -> Option<&FieldPlan> {
        self.fields.get(idx.0)
    }

    pub fn field_index(&self, name: &str) -> Option<FieldIdx> {
        self.by_name.get(name).copied()
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldPlan> {
        self.field_index(name).and_then(|idx| self.field(idx))
    }

    /// Field and tag form for a tag read from the wire.
    #[inline]
    pub fn dispatch(&self, tag: u32) -> Option<(FieldIdx, TagForm)> {
        self.by_tag.get(&tag).copied()
    }

    pub fn presence(&self) -> &PresenceLayout {
        &self.presence
    }

    pub fn has_required(&self) -> bool {
        self.presence.has_required()
    }

    /// Names of required fields whose presence bit is unset.
    pub fn missing_required(&self, words: &[u32]) -> Vec<String> {
        self.presence
            .missing_required(words)
            .into_iter()
            .map(|i| self.fields[i].name.clone())
            .collect()
    }
}

/// All message and enum layouts of one schema, plus the options they were compiled with.
#[derive(Debug)]
pub struct CompiledSchema {
    package: Option<String>,
    messages: FastIndexMap<String, MessageLayout>,
    enums: FastIndexMap<String, EnumLayout>,
    options: CompileOptions,
}

impl CompiledSchema {
    /// Compiles with default [`CompileOptions`].
    pub fn compile(schema: &Schema) -> Result<Arc<Self>> {
        Self::compile_with_options(schema, CompileOptions::default())
    }

    pub fn compile_with_options(schema: &Schema, options: CompileOptions) -> Result<Arc<Self>> {
        options.validate()?;

        // Pass 1: alle Typnamen registrieren, damit Vorwärtsreferenzen auflösbar sind
        let mut message_decls: FastIndexMap<String, &MessageDecl> = FastIndexMap::default();
        let mut enum_decls: FastIndexMap<String, &EnumDecl> = FastIndexMap::default();
        for decl in &schema.enums {
            register_enum(&mut enum_decls, None, decl)?;
        }
        for decl in &schema.messages {
            register_message(&mut message_decls, &mut enum_decls, None, decl)?;
        }

        let mut enums = FastIndexMap::default();
        for (name, decl) in &enum_decls {
            enums.insert(name.clone(), EnumLayout::compile(name.clone(), decl)?);
        }

        let resolver = Resolver {
            package: schema.package.as_deref(),
            messages: &message_decls,
            enums: &enum_decls,
        };
        let mut messages = FastIndexMap::default();
        for (i, (name, decl)) in message_decls.iter().enumerate() {
            let layout = compile_message(name, MessageId(i), decl, &resolver, &enums)?;
            messages.insert(name.clone(), layout);
        }

        Ok(Arc::new(Self {
            package: schema.package.clone(),
            messages,
            enums,
            options,
        }))
    }

    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Resolves a qualified message name (optionally package-prefixed).
    pub fn message_id(&self, name: &str) -> Result<MessageId> {
        let name = strip_package(self.package.as_deref(), name);
        self.messages
            .get_index_of(name)
            .map(MessageId)
            .ok_or_else(|| Error::UnknownType(name.to_string().into()))
    }

    pub fn layout(&self, id: MessageId) -> &MessageLayout {
        &self.messages[id.0]
    }

    pub fn layout_by_name(&self, name: &str) -> Option<&MessageLayout> {
        self.message_id(name).ok().map(|id| self.layout(id))
    }

    pub fn enum_layout(&self, id: EnumId) -> &EnumLayout {
        &self.enums[id.0]
    }

    pub fn enum_by_name(&self, name: &str) -> Option<&EnumLayout> {
        self.enums.get(strip_package(self.package.as_deref(), name))
    }

    pub fn messages(&self) -> impl Iterator<Item = &MessageLayout> {
        self.messages.values()
    }

    pub fn enums(&self) -> impl Iterator<Item = &EnumLayout> {
        self.enums.values()
    }

    /// Creates an empty instance of the named message type.
    pub fn new_message<'a>(self: &Arc<Self>, name: &str) -> Result<Message<'a>> {
        let id = self.message_id(name)?;
        Ok(Message::detached(Arc::clone(self), id))
    }
}

fn strip_package<'n>(package: Option<&str>, name: &'n str) -> &'n str {
    let name = name.trim_start_matches('.');
    match package {
        Some(pkg) => name
            .strip_prefix(pkg)
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(name),
        None => name,
    }
}

fn qualify(scope: Option<&str>, name: &str) -> String {
    match scope {
        Some(scope) => format!("{scope}.{name}"),
        None => name.to_string(),
    }
}

fn register_enum<'s>(
    enums: &mut FastIndexMap<String, &'s EnumDecl>,
    scope: Option<&str>,
    decl: &'s EnumDecl,
) -> Result<()> {
    let name = qualify(scope, &decl.name);
    if enums.insert(name.clone(), decl).is_some() {
        return Err(Error::invalid_schema(format!("enum '{name}' is declared twice")));
    }
    Ok(())
}

fn register_message<'s>(
    messages: &mut FastIndexMap<String, &'s MessageDecl>,
    enums: &mut FastIndexMap<String, &'s EnumDecl>,
    scope: Option<&str>,
    decl: &'s MessageDecl,
) -> Result<()> {
    let name = qualify(scope, &decl.name);
    if messages.insert(name.clone(), decl).is_some() {
        return Err(Error::invalid_schema(format!("message '{name}' is declared twice")));
    }
    for nested in &decl.enums {
        register_enum(enums, Some(&name), nested)?;
    }
    for nested in &decl.messages {
        register_message(messages, enums, Some(&name), nested)?;
    }
    Ok(())
}

struct Resolver<'r, 's> {
    package: Option<&'r str>,
    messages: &'r FastIndexMap<String, &'s MessageDecl>,
    enums: &'r FastIndexMap<String, &'s EnumDecl>,
}

impl Resolver<'_, '_> {
    /// Resolves `name` from inside message `scope`: innermost scope first, then outward.
    ///
    /// Ein führender Punkt macht den Namen absolut (nur Top-Level).
    fn resolve(&self, scope: &str, name: &str) -> Option<ResolvedType> {
        let absolute = name.starts_with('.');
        let name = strip_package(self.package, name);
        let mut current = if absolute { None } else { Some(scope) };
        loop {
            let candidate = qualify(current, name);
            if let Some(i) = self.messages.get_index_of(&candidate) {
                return Some(ResolvedType::Message(MessageId(i)));
            }
            if let Some(i) = self.enums.get_index_of(&candidate) {
                return Some(ResolvedType::Numeric(NumericKind::Enum(EnumId(i))));
            }
            current = match current {
                Some(s) => s.rsplit_once('.').map(|(outer, _)| outer),
                None => return None,
            };
        }
    }

    fn resolve_type(&self, scope: &str, field: &FieldDecl) -> Result<ResolvedType> {
        let numeric = |kind: NumericKind| -> Result<ResolvedType> { Ok(ResolvedType::Numeric(kind)) };
        match &field.ty {
            FieldType::Double => numeric(NumericKind::Double),
            FieldType::Float => numeric(NumericKind::Float),
            FieldType::Int32 => numeric(NumericKind::Int32),
            FieldType::Int64 => numeric(NumericKind::Int64),
            FieldType::Uint32 => numeric(NumericKind::Uint32),
            FieldType::Uint64 => numeric(NumericKind::Uint64),
            FieldType::Sint32 => numeric(NumericKind::Sint32),
            FieldType::Sint64 => numeric(NumericKind::Sint64),
            FieldType::Fixed32 => numeric(NumericKind::Fixed32),
            FieldType::Fixed64 => numeric(NumericKind::Fixed64),
            FieldType::Sfixed32 => numeric(NumericKind::Sfixed32),
            FieldType::Sfixed64 => numeric(NumericKind::Sfixed64),
            FieldType::Bool => numeric(NumericKind::Bool),
            FieldType::String => Ok(ResolvedType::String),
            FieldType::Bytes => Ok(ResolvedType::Bytes),
            FieldType::Named(name) => self
                .resolve(scope, name)
                .ok_or_else(|| Error::UnknownType(name.clone().into())),
        }
    }
}

fn compile_message(
    name: &str,
    id: MessageId,
    decl: &MessageDecl,
    resolver: &Resolver<'_, '_>,
    enums: &FastIndexMap<String, EnumLayout>,
) -> Result<MessageLayout> {
    let (presence, bits) = PresenceLayout::assign(&decl.fields);

    let mut fields = Vec::with_capacity(decl.fields.len());
    let mut by_tag = FastHashMap::default();
    let mut by_name = FastHashMap::default();
    let mut numbers: FastHashSet<u32> = FastHashSet::default();

    for (index, field) in decl.fields.iter().enumerate() {
        if field.number == 0 || field.number > MAX_FIELD_NUMBER {
            return Err(Error::InvalidFieldNumber {
                field: format!("{name}.{}", field.name),
                number: field.number,
            });
        }
        if !numbers.insert(field.number) {
            return Err(Error::DuplicateFieldNumber {
                message: name.to_string(),
                number: field.number,
            });
        }
        if by_name.insert(field.name.clone(), FieldIdx(index)).is_some() {
            return Err(Error::invalid_schema(format!(
                "field '{}' is declared twice in message '{name}'",
                field.name
            )));
        }

        let ty = resolver.resolve_type(name, field)?;
        if field.packed && !(field.is_repeated() && matches!(ty, ResolvedType::Numeric(_))) {
            return Err(Error::invalid_schema(format!(
                "field '{name}.{}': packed encoding needs a repeated numeric, enum or bool field",
                field.name
            )));
        }

        let variant = FieldVariant::classify(ty, field.is_repeated(), field.packed);
        let mut plan = FieldPlan::new(
            field.name.clone(),
            field.number,
            index,
            variant,
            bits[index],
            field.is_required(),
        );
        plan.docs = field.docs.clone();
        if let Some(literal) = &field.default {
            plan.default = Some(compile_default(&plan, literal, enums).map_err(|reason| {
                Error::InvalidDefault {
                    field: format!("{name}.{}", field.name),
                    reason,
                }
            })?);
        }

        by_tag.insert(plan.tag, (plan.index, TagForm::Normal));
        if let Some(packed_tag) = plan.packed_tag {
            by_tag.insert(packed_tag, (plan.index, TagForm::Packed));
        }
        fields.push(plan);
    }

    debug!(
        "compiled message '{name}': {} fields, {} presence words, required masks {:?}",
        fields.len(),
        presence.word_count(),
        (0..presence.word_count())
            .map(|w| presence.required_mask(w))
            .collect::<Vec<_>>()
    );

    Ok(MessageLayout {
        name: name.to_string(),
        id,
        fields,
        by_tag,
        by_name,
        presence,
    })
}

fn compile_default(
    plan: &FieldPlan,
    literal: &DefaultLiteral,
    enums: &FastIndexMap<String, EnumLayout>,
) -> core::result::Result<DefaultValue, Cow<'static, str>> {
    let kind = match plan.variant {
        FieldVariant::Scalar(kind) => kind,
        FieldVariant::String => {
            return match literal {
                DefaultLiteral::Str(s) => Ok(DefaultValue::Text(s.clone())),
                _ => Err("expected a string literal".into()),
            }
        }
        FieldVariant::Bytes => {
            return match literal {
                DefaultLiteral::Bytes(b) => Ok(DefaultValue::Blob(b.clone())),
                DefaultLiteral::Str(s) => Ok(DefaultValue::Blob(s.as_bytes().to_vec())),
                _ => Err("expected a bytes or string literal".into()),
            }
        }
        FieldVariant::Message(_) => return Err("message fields cannot have a default".into()),
        FieldVariant::RepeatedScalar { .. }
        | FieldVariant::RepeatedString
        | FieldVariant::RepeatedBytes
        | FieldVariant::RepeatedMessage(_) => return Err("repeated fields cannot have a default".into()),
    };

    let out_of_range = || Cow::from(format!("value out of range for {}", kind.keyword()));
    let scalar = match (kind, literal) {
        (NumericKind::Bool, DefaultLiteral::Bool(b)) => Scalar::Bool(*b),
        (NumericKind::Int32 | NumericKind::Sint32 | NumericKind::Sfixed32, DefaultLiteral::Int(v)) => {
            Scalar::I32(i32::try_from(*v).map_err(|_| out_of_range())?)
        }
        (NumericKind::Int32 | NumericKind::Sint32 | NumericKind::Sfixed32, DefaultLiteral::Uint(v)) => {
            Scalar::I32(i32::try_from(*v).map_err(|_| out_of_range())?)
        }
        (NumericKind::Int64 | NumericKind::Sint64 | NumericKind::Sfixed64, DefaultLiteral::Int(v)) => Scalar::I64(*v),
        (NumericKind::Int64 | NumericKind::Sint64 | NumericKind::Sfixed64, DefaultLiteral::Uint(v)) => {
            Scalar::I64(i64::try_from(*v).map_err(|_| out_of_range())?)
        }
        (NumericKind::Uint32 | NumericKind::Fixed32, DefaultLiteral::Int(v)) => {
            Scalar::U32(u32::try_from(*v).map_err(|_| out_of_range())?)
        }
        (NumericKind::Uint32 | NumericKind::Fixed32, DefaultLiteral::Uint(v)) => {
            Scalar::U32(u32::try_from(*v).map_err(|_| out_of_range())?)
        }
        (NumericKind::Uint64 | NumericKind::Fixed64, DefaultLiteral::Int(v)) => {
            Scalar::U64(u64::try_from(*v).map_err(|_| out_of_range())?)
        }
        (NumericKind::Uint64 | NumericKind::Fixed64, DefaultLiteral::Uint(v)) => Scalar::U64(*v),
        (NumericKind::Float, DefaultLiteral::Float(f)) => Scalar::F32(*f as f32),
        (NumericKind::Float, DefaultLiteral::Int(v)) => Scalar::F32(*v as f32),
        (NumericKind::Double, DefaultLiteral::Float(f)) => Scalar::F64(*f),
        (NumericKind::Double, DefaultLiteral::Int(v)) => Scalar::F64(*v as f64),
        (NumericKind::Float | NumericKind::Double, DefaultLiteral::Ident(sym)) => {
            let f = match sym.as_str() {
                "inf" => f64::INFINITY,
                "-inf" => f64::NEG_INFINITY,
                "nan" => f64::NAN,
                _ => return Err(format!("'{sym}' is not a floating point literal").into()),
            };
            if kind == NumericKind::Float {
                Scalar::F32(f as f32)
            } else {
                Scalar::F64(f)
            }
        }
        (NumericKind::Enum(id), DefaultLiteral::Ident(sym)) => {
            let table = &enums[id.0];
            Scalar::I32(
                table
                    .number_of(sym)
                    .ok_or_else(|| Cow::from(format!("'{sym}' is not a value of enum '{}'", table.name())))?,
            )
        }
        (NumericKind::Enum(_), DefaultLiteral::Int(v)) => Scalar::I32(i32::try_from(*v).map_err(|_| out_of_range())?),
        (kind, _) => return Err(format!("literal does not fit {}", kind.keyword()).into()),
    };
    kind.to_bits(&plan.name, scalar)
        .map(DefaultValue::Scalar)
        .map_err(|e| Cow::from(e.to_string()))
}
